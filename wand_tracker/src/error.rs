// THEORY:
// Every failure the engine can meet is recoverable except one. A missing frame is
// skipped, a detection gap is absorbed by self-tuning, a failed action is logged.
// Only a frame source that is gone for good ends the tracking loop, and it is the
// only error that `TrackingSession` ever hands back to its caller.

use std::time::Duration;

/// Why a frame source could not deliver a frame this tick.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// Nothing to read right now. The tick is skipped and tracking state is kept.
    #[error("no frame available")]
    Unavailable,
    /// The source is permanently gone (device unplugged, end of stream).
    #[error("frame source closed: {0}")]
    Closed(String),
}

/// Why an action dispatch did not succeed. Logged, never retried.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("no answer within {0:?}")]
    TimedOut(Duration),
    #[error("dispatch worker is not accepting requests")]
    WorkerUnavailable,
}

/// Terminal error of the tracking loop.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("frame source closed: {0}")]
    SourceClosed(String),
}
