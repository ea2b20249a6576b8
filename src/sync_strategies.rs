use std::marker::Send;
use std::ops::FnMut;
use std::thread;
use std::time::{Duration, Instant};

/// A WaitStrategy is a callable that blocks the thread until
/// it is allowed to continue according to some policy.
///
pub trait WaitStrategy: FnMut() + Send + 'static {}
impl<W> WaitStrategy for W where W: FnMut() + Send + 'static {}

pub fn never_wait() {
    // Do nothing, just let the caller continue.
}

/// Hold the caller so that consecutive calls are at least `period` apart.
///
/// A frame that ran long is not made up for later: the next deadline counts from when the wait
/// returned, so a lag spike does not cause a burst of frames afterwards.
pub fn real_time(period: Duration) -> impl WaitStrategy {
    let mut last: Option<Instant> = None;
    move || {
        if let Some(previous) = last {
            let since = previous.elapsed();
            if since < period {
                thread::sleep(period - since);
            }
        }
        last = Some(Instant::now());
    }
}
