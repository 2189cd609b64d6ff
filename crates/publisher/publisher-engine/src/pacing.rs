use std::time::Duration;

/// Time left to sleep after a tick that took `elapsed`, or `None` once the
/// period is used up. An overrun is not carried into the next tick.
#[inline]
pub fn sleep_budget(period: Duration, elapsed: Duration) -> Option<Duration> {
    period.checked_sub(elapsed).filter(|left| !left.is_zero())
}
