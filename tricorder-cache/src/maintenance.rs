//! Background cache maintenance.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use tricorder_core::constants::{SWEEP_GRACE_SECS, SWEEP_INTERVAL_SECS};

use crate::ttl_map::TtlMap;

/// Sweep schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// How long past expiry an entry may stay resident
    pub grace: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
            grace: Duration::from_secs(SWEEP_GRACE_SECS),
        }
    }
}

/// Removes entries that expired more than `grace` ago.
///
/// Entries that expired more recently stay resident; lookups already treat
/// them as missing.
pub fn sweep_once<V: Clone>(cache: &TtlMap<V>, grace: Duration) -> usize {
    match Instant::now().checked_sub(grace) {
        Some(cutoff) => cache.sweep(cutoff),
        // Clock has not been running for `grace` yet, nothing can be that old
        None => {
            trace!(?grace, "Sweep skipped");
            0
        }
    }
}

/// Spawns the periodic sweep on the current tokio runtime.
///
/// The task runs until aborted or until the runtime shuts down.
pub fn spawn_sweeper<V>(cache: Arc<TtlMap<V>>, config: SweepConfig) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let period = config.interval.max(Duration::from_millis(1));
    info!(?period, grace = ?config.grace, "Starting cache sweeper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let removed = sweep_once(&cache, config.grace);
            debug!(removed, resident = cache.len(), "Maintained cache");
        }
    })
}
