//! Error types for trace parsing, scheduling and replay.

use thiserror::Error;

use crate::core::{Queue, Stamp};

/// A line of input that could not be turned into a job record.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("malformed record (expected 5 fields): {line:?}")]
    Malformed { line: String },

    #[error("bad timestamp {text:?}: {source}")]
    Timestamp {
        text: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("unknown queue {name:?}")]
    UnknownQueue { name: String },

    #[error("bad job length {text:?}")]
    Length { text: String },
}

/// Scheduling failures. Placement is the only fatal one; everything else
/// the controller treats as a no-op.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no vm can take job {uid} ({queue}) within slack at {at}")]
    Placement { uid: String, queue: Queue, at: Stamp },
}

/// Anything that can end a replay early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// True when the downstream consumer closed the pipe on us.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, RunError::Io(err) if err.kind() == std::io::ErrorKind::BrokenPipe)
    }
}
