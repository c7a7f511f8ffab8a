//! Background sweep of expired cache entries.
//!
//! Lookups already ignore expired entries; the sweep only bounds memory held
//! for users that stopped making requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::authorizer::Authorizer;

/// Longest period the sweep timer accepts; longer requests are clamped.
pub const MAX_CLEANUP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

impl<S> Authorizer<S>
where
    S: Send + Sync + 'static,
{
    /// Spawns a task that sweeps expired entries every `period`.
    ///
    /// The task stops when `true` is sent on `shutdown` or the sender is
    /// dropped. The first sweep runs one full period after spawning. Periods
    /// above [`MAX_CLEANUP_INTERVAL`] are clamped to it.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero or when called outside a Tokio runtime.
    pub fn spawn_cache_cleanup(
        self: &Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        assert!(!period.is_zero(), "cleanup period must be non-zero");
        if period > MAX_CLEANUP_INTERVAL {
            warn!(
                requested_secs = period.as_secs(),
                "cleanup period too long, clamping"
            );
        }
        let period = period.min(MAX_CLEANUP_INTERVAL);
        let authorizer = Arc::clone(self);

        tokio::spawn(async move {
            if *shutdown.borrow_and_update() {
                return;
            }
            info!(interval_secs = period.as_secs(), "permission cache cleanup started");

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        match changed {
                            Ok(()) if *shutdown.borrow() => break,
                            Ok(()) => {}
                            Err(_) => break,
                        }
                    }
                    _ = ticker.tick() => {
                        let removed = authorizer.clean_expired_cache();
                        debug!(removed, "permission cache sweep finished");
                    }
                }
            }

            info!("permission cache cleanup stopped");
        })
    }
}
