use chrono::{DateTime, Utc};
use std::time::Duration;

/// Passthrough to the system clock and tokio timers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RealtimeTime;

impl RealtimeTime {
    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    #[inline]
    pub fn sleep(&self, duration: Duration) -> tokio::time::Sleep {
        tokio::time::sleep(duration)
    }
}
