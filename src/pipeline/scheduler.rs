//! Daily recalculation trigger
//!
//! Sleeps until the next configured UTC time of day, runs the orchestrator,
//! and goes back to sleep. A failed run is logged and the next day's run
//! proceeds as usual.

use super::orchestrator::Orchestrator;
use crate::error::error_chain;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use tokio::time::Duration;

/// First instant strictly after `now` at `hour:minute` UTC.
pub fn next_run_after(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    let today = now.date_naive().and_time(at).and_utc();

    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Runs indefinitely until cancelled.
pub async fn daily_scheduler_task(orchestrator: Arc<Orchestrator>, hour: u32, minute: u32) {
    log::info!("⏰ Starting daily scheduler (at {:02}:{:02} UTC)", hour, minute);

    loop {
        let now = Utc::now();
        let next = next_run_after(now, hour, minute);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        log::info!("   └─ Next recalculation at {}", next.to_rfc3339());
        tokio::time::sleep(wait).await;

        match orchestrator.run().await {
            Ok(report) => {
                log::debug!("✅ Scheduled run finished: {:?}", report);
            }
            Err(e) => {
                log::error!("❌ Scheduled run failed: {}", error_chain(&e));
            }
        }
    }
}
