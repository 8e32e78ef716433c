//! Relay meter CLI entry point.

use relay_meter_lib::cli::{self, Cli};
use relay_meter_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
