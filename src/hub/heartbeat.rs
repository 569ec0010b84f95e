//! Heartbeat sweeper
//!
//! Connections that stop sending anything (including `heartbeat-ping`) for
//! longer than the configured timeout are evicted even if the transport has
//! not reported the close yet.

use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

use super::ConnectionHub;

impl ConnectionHub {
    /// Start the background sweeper. Abort the handle to stop it.
    pub fn start_heartbeat_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let sweep_interval = hub.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(
                interval_secs = sweep_interval.as_secs(),
                timeout_secs = hub.config.heartbeat_timeout.as_secs(),
                "Heartbeat sweeper started"
            );

            loop {
                ticker.tick().await;

                let evicted = hub.evict_stale().await;
                if !evicted.is_empty() {
                    tracing::info!(evicted = evicted.len(), "Heartbeat sweep evicted idle connections");
                }
            }
        })
    }
}
