// THEORY:
// This file is the entry point of the `wand_tracker` library crate. It exposes
// the `TrackingSession` and its configuration as the high-level interface of
// the engine, plus the building blocks in `core_modules` for callers that want
// to drive detection or gesture recognition on their own.
//
// Camera acquisition and on-screen rendering are not part of the library. A
// caller feeds grayscale frames in through the `FrameSource` trait and reads the
// trail and last blob back out for drawing (see the `wand_tester` crate).

pub mod core_modules;
pub mod error;
pub mod session;

pub use crate::core_modules::action::{ActionConfig, ActionSink, FireOutcome, HttpActionSink};
pub use crate::core_modules::blob::{Blob, Point};
pub use crate::core_modules::blob_detector::{DetectorConfig, RelaxationStep};
pub use crate::core_modules::gesture::{GestureConfig, GestureVerdict, HeldPointPolicy, Rejection};
pub use crate::core_modules::trail::TrailBuffer;
pub use crate::error::{AcquisitionError, DispatchError, TrackingError};
pub use crate::session::{FrameReport, FrameSource, RunSummary, Tick, TrackerConfig, TrackingSession};
