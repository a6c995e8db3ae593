//! One-time wait for a configured wall-clock start time

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use std::time::Duration;
use tracing::info;

/// Time from `now` until the next occurrence of `start`
///
/// Today if `start` is still ahead, otherwise tomorrow. Exactly `start` means
/// no wait.
pub fn duration_until(now: NaiveDateTime, start: NaiveTime) -> Duration {
    let today = now.date().and_time(start);
    let next = if today >= now {
        today
    } else {
        today + TimeDelta::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Sleep until the next local occurrence of `start`
pub async fn wait_until(start: NaiveTime) {
    let now = Local::now().naive_local();
    let wait = duration_until(now, start);
    if wait.is_zero() {
        return;
    }
    info!(
        start = %start.format("%H:%M:%S"),
        wait_secs = wait.as_secs(),
        "Waiting for configured start time"
    );
    tokio::time::sleep(wait).await;
}
