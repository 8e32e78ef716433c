//! Simulated relay source for local runs and demos.
//!
//! Generates plausible per-application traffic from the configured profiles.
//! Each (application, day) pair is seeded deterministically, so re-collecting
//! a day yields the same counts and today's counts only ever grow.

use super::Source;
use crate::core::config::{SimulatedApplication, SimulationConfig};
use crate::core::types::{add_days, day_of};
use crate::core::{AppCounts, DailyUsage, Day, RelayCounts, Result, TodaysUsage};
use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Day-to-day variation in volume (±20%)
const VOLUME_VARIATION: f64 = 0.2;

/// Relay source backed by random but repeatable traffic.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    applications: Vec<SimulatedApplication>,
}

impl SimulatedSource {
    /// Create a source from the simulation profile.
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            applications: config.applications.clone(),
        }
    }

    /// Counts for one application over a full day.
    fn full_day(app: &SimulatedApplication, day: Day) -> RelayCounts {
        let mut rng = StdRng::seed_from_u64(seed(&app.id, day));
        let variation = rng.gen_range(-VOLUME_VARIATION..=VOLUME_VARIATION);
        let total = (app.daily_relays as f64 * (1.0 + variation)).round() as u64;
        let failure = (total as f64 * app.failure_ratio).round() as u64;

        RelayCounts::new(total - failure.min(total), failure.min(total))
    }

    fn day_counts(&self, day: Day, elapsed: f64) -> AppCounts {
        self.applications
            .iter()
            .filter(|app| app.daily_relays > 0)
            .map(|app| {
                let full = Self::full_day(app, day);
                let counts = RelayCounts::new(
                    (full.success as f64 * elapsed) as u64,
                    (full.failure as f64 * elapsed) as u64,
                );
                (app.id.clone(), counts)
            })
            .collect()
    }

    fn todays_counts_at(&self, now: DateTime<Utc>) -> TodaysUsage {
        let elapsed = f64::from(now.num_seconds_from_midnight()) / 86_400.0;
        self.day_counts(day_of(now), elapsed)
    }

    fn daily_counts_until(&self, from: Day, to: Day, today: Day) -> DailyUsage {
        let end = to.min(today);
        let mut usage = DailyUsage::new();
        let mut day = from;
        while day < end {
            usage.insert(day, self.day_counts(day, 1.0));
            day = add_days(day, 1);
        }
        usage
    }
}

fn seed(app: &str, day: Day) -> u64 {
    let mut hasher = DefaultHasher::new();
    app.hash(&mut hasher);
    day.num_days_from_ce().hash(&mut hasher);
    hasher.finish()
}

#[async_trait::async_trait]
impl Source for SimulatedSource {
    /// Only finalized days are produced; today is served by `todays_counts`.
    async fn daily_counts(&self, from: Day, to: Day) -> Result<DailyUsage> {
        let usage = self.daily_counts_until(from, to, day_of(Utc::now()));
        tracing::trace!(%from, %to, days = usage.len(), "Simulated daily counts");
        Ok(usage)
    }

    async fn todays_counts(&self) -> Result<TodaysUsage> {
        Ok(self.todays_counts_at(Utc::now()))
    }
}
