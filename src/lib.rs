pub mod core;
pub mod error;
pub mod trace;

pub use crate::core::{Command, Queue, RunStats, Scheduled, Scheduler, Stamp, Tunables};
pub use crate::error::{RunError, ScheduleError, TraceError};
pub use crate::trace::{JobRecord, Outcome, RecordWriter, Replay, UtilLog};
