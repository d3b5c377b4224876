//! Periodic timestamp annotator

use crate::config::ServerConfig;
use crate::server::{SharedLog, ShutdownListener};
use crate::types::format_timestamp_record;
use chrono::Local;
use std::sync::Arc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Appends a timestamp record to the shared log on a fixed period
pub struct Annotator {
    log: Arc<SharedLog>,
    period: Duration,
    pattern: String,
}

impl Annotator {
    /// Create an annotator from the server configuration
    pub fn new(config: &ServerConfig, log: Arc<SharedLog>) -> Self {
        Self::with_period(
            log,
            config.annotator.interval(),
            config.annotator.timestamp_format.clone(),
        )
    }

    /// Create an annotator with an explicit period and strftime pattern
    pub fn with_period(log: Arc<SharedLog>, period: Duration, pattern: String) -> Self {
        Self {
            log,
            period,
            pattern,
        }
    }

    /// Run until shutdown is broadcast. Returns the number of records appended.
    pub async fn run(self, mut shutdown: ShutdownListener) -> usize {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut appended = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    break;
                }
                _ = ticker.tick() => {
                    let record = format_timestamp_record(&Local::now(), &self.pattern);
                    match self.log.append(record.as_bytes()).await {
                        Ok(_) => {
                            appended += 1;
                            debug!("Appended timestamp record: {}", record.trim_end());
                        }
                        Err(e) => warn!("Failed to append timestamp record: {}", e),
                    }
                }
            }
        }

        appended
    }
}
