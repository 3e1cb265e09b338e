use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut,
}

/// Call `probe` until it yields a value or `timeout` elapses, sleeping
/// `interval` between attempts. The probe always runs at least once.
pub fn poll_until<T, F>(timeout: Duration, interval: Duration, mut probe: F) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Result<Option<T>>,
{
    let started = Instant::now();
    loop {
        if let Some(value) = probe()? {
            return Ok(PollOutcome::Ready(value));
        }
        if started.elapsed() >= timeout {
            return Ok(PollOutcome::TimedOut);
        }
        thread::sleep(interval);
    }
}
