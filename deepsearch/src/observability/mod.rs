//! Logging setup and timing instrumentation.

mod timing;
mod tracing;

pub use self::timing::{aggregate_duration, unix_now, StageTimings, TimingRecord};
pub use self::tracing::{init_tracing, SpanTimer};
