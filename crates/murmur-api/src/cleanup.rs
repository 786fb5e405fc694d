use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::AppState;

/// Background task that expires idle sessions.
///
/// Each tick drops every session whose last activity is older than the
/// configured timeout and posts a "timed out" notice for it.
pub async fn run_sweep_loop(chat: AppState, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        match chat.sweep(Utc::now()) {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: expired {} idle sessions", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}
