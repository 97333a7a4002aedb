use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SLICE: Duration = Duration::from_millis(250);

/// Sleep for `duration`, waking early if `cancelled` is raised. Returns
/// `false` when the pause was cut short.
pub async fn pause(duration: Duration, cancelled: &AtomicBool) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancelled.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(SLICE);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
    !cancelled.load(Ordering::Relaxed)
}
