//! Periodic purge of expired authorization state.
//!
//! Expiry is always enforced lazily at read time; the sweeper only bounds the
//! size of the stores.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::store::Stores;

/// Spawn a task purging expired records every `interval` until `shutdown` fires.
pub fn spawn_sweeper(stores: Stores, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("expiry sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match stores.purge_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "purged expired authorization records"),
                        Err(err) => error!(error = %err, "expiry sweep failed"),
                    }
                }
            }
        }
    })
}
