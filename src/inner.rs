use std::sync::Arc;

use crate::manual::ManualTime;
use crate::realtime::RealtimeTime;

/// Internal time implementation.
pub(crate) enum TimeInner {
    Realtime(RealtimeTime),
    Manual(Arc<ManualTime>),
}
