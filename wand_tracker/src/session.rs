// THEORY:
// The `session` module is the top-level API of the tracking engine. A
// `TrackingSession` owns every piece of mutable tracking state (detector
// configuration, trail, detection timer, cooldown) and runs one frame at a time
// through the full stack:
//
//   grayscale frame -> binarize -> detect -> select best -> trail push / hold
//                   -> gesture evaluation -> maybe fire
//
// Frames are processed strictly one after another on the caller's thread. The
// only asynchronous piece is the action dispatcher, which lives on the tokio
// runtime the session was created in and is never awaited by the frame loop.

use crate::core_modules::action::{ActionConfig, ActionSink, ActionTrigger, Dispatcher, FireOutcome, HttpActionSink};
use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::{self, Detector, DetectorConfig, RelaxationStep};
use crate::core_modules::gesture::{GestureConfig, GestureRecognizer, GestureVerdict};
use crate::core_modules::trail::{TRAIL_CAPACITY, TrailBuffer};
use crate::error::{AcquisitionError, DispatchError, TrackingError};
use image::GrayImage;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration for a `TrackingSession`. Every field has a tuned default.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Detector thresholds at session start.
    pub detector: DetectorConfig,
    pub relaxation: RelaxationStep,
    pub trail_capacity: usize,
    /// How long without an accepted blob before the detector relaxes and the trail is dropped.
    pub detection_timeout: Duration,
    pub gesture: GestureConfig,
    pub action: ActionConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            relaxation: RelaxationStep::default(),
            trail_capacity: TRAIL_CAPACITY,
            detection_timeout: Duration::from_secs(2),
            gesture: GestureConfig::default(),
            action: ActionConfig::default(),
        }
    }
}

/// Supplies grayscale frames to the session.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<GrayImage, AcquisitionError>;
}

/// Tracks how long the marker has been missing.
#[derive(Debug, Clone, Copy)]
pub struct DetectionTimer {
    last_detection: Instant,
    last_relaxation: Option<Instant>,
    timeout: Duration,
}

impl DetectionTimer {
    pub fn new(started: Instant, timeout: Duration) -> Self {
        Self {
            last_detection: started,
            last_relaxation: None,
            timeout,
        }
    }

    pub fn last_detection(&self) -> Instant {
        self.last_detection
    }

    pub fn record_detection(&mut self, now: Instant) {
        self.last_detection = now;
    }

    pub fn record_relaxation(&mut self, now: Instant) {
        self.last_relaxation = Some(now);
    }

    /// True once a full timeout has passed since the later of the last detection and the last relaxation.
    pub fn relaxation_due(&self, now: Instant) -> bool {
        let reference = match self.last_relaxation {
            Some(relaxed) => relaxed.max(self.last_detection),
            None => self.last_detection,
        };
        now.saturating_duration_since(reference) >= self.timeout
    }
}

/// What happened to one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// The accepted blob, if any.
    pub detection: Option<Blob>,
    pub verdict: GestureVerdict,
    pub fire: FireOutcome,
    /// The detector was relaxed and the trail dropped on this frame.
    pub relaxed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Processed(FrameReport),
    /// No frame was available. Tracking state was left untouched.
    Skipped,
}

/// Counters of a finished `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub skipped: u64,
    pub gestures_fired: u64,
}

/// The single-marker tracking and gesture engine.
pub struct TrackingSession {
    detector: Detector,
    trail: TrailBuffer,
    timer: DetectionTimer,
    recognizer: GestureRecognizer,
    trigger: ActionTrigger,
    last_blob: Option<Blob>,
    last_binary: Option<GrayImage>,
}

impl TrackingSession {
    /// Creates a session that sends gestures to `sink`. Must be called inside a tokio runtime.
    pub fn new(config: TrackerConfig, sink: Arc<dyn ActionSink>, started: Instant) -> Self {
        let dispatcher = Dispatcher::spawn(sink, config.action.timeout);
        Self {
            detector: Detector::new(config.detector, config.relaxation),
            trail: TrailBuffer::with_capacity(config.trail_capacity),
            timer: DetectionTimer::new(started, config.detection_timeout),
            recognizer: GestureRecognizer::new(config.gesture),
            trigger: ActionTrigger::new(dispatcher, config.action.cooldown),
            last_blob: None,
            last_binary: None,
        }
    }

    /// Creates a session that requests `config.action.endpoint` for each gesture.
    pub fn with_http_action(config: TrackerConfig, started: Instant) -> Result<Self, DispatchError> {
        let sink = HttpActionSink::new(config.action.endpoint.clone(), config.action.timeout)?;
        Ok(Self::new(config, Arc::new(sink), started))
    }

    /// Runs one grayscale frame through the whole stack.
    pub fn process_frame(&mut self, gray: &GrayImage, now: Instant) -> FrameReport {
        let binary = self.detector.binarize(gray);
        let detection = blob_detector::select_best(self.detector.detect(&binary));

        let mut relaxed = false;
        match &detection {
            Some(blob) => {
                self.trail.push(blob.point());
                self.timer.record_detection(now);
            }
            None if self.timer.relaxation_due(now) => {
                self.detector.relax();
                self.trail.clear();
                self.timer.record_relaxation(now);
                relaxed = true;
            }
            None => {}
        }

        let verdict = self.recognizer.evaluate(&self.trail);
        let fire = self.trigger.maybe_fire(verdict.is_recognized(), now, &mut self.trail);

        // Keep the stroke alive across a missed frame without touching the timer.
        if detection.is_none() {
            self.trail.hold_last();
        }

        self.last_blob = detection.clone();
        self.last_binary = Some(binary);
        FrameReport {
            detection,
            verdict,
            fire,
            relaxed,
        }
    }

    /// Pulls one frame from `source` and processes it.
    ///
    /// A transient miss skips the tick; a closed source is terminal.
    pub fn tick<S: FrameSource + ?Sized>(&mut self, source: &mut S, now: Instant) -> Result<Tick, TrackingError> {
        match source.next_frame() {
            Ok(frame) => Ok(Tick::Processed(self.process_frame(&frame, now))),
            Err(AcquisitionError::Unavailable) => {
                debug!("no frame this tick");
                Ok(Tick::Skipped)
            }
            Err(AcquisitionError::Closed(reason)) => Err(TrackingError::SourceClosed(reason)),
        }
    }

    /// Ticks until `observer` breaks or the source closes.
    ///
    /// `clock` stamps each tick; `observer` sees the session after every tick, at a
    /// frame boundary, and decides whether to continue.
    pub fn run<S, C, O>(&mut self, source: &mut S, mut clock: C, mut observer: O) -> Result<RunSummary, TrackingError>
    where
        S: FrameSource + ?Sized,
        C: FnMut() -> Instant,
        O: FnMut(&TrackingSession, &Tick) -> ControlFlow<()>,
    {
        let mut summary = RunSummary::default();
        loop {
            let tick = self.tick(source, clock())?;
            match &tick {
                Tick::Processed(report) => {
                    summary.frames += 1;
                    if report.fire == FireOutcome::Fired {
                        summary.gestures_fired += 1;
                    }
                }
                Tick::Skipped => summary.skipped += 1,
            }
            if observer(self, &tick).is_break() {
                return Ok(summary);
            }
        }
    }

    /// Newest-first trail, for rendering.
    pub fn trail(&self) -> &TrailBuffer {
        &self.trail
    }

    /// The blob accepted on the last processed frame.
    pub fn last_blob(&self) -> Option<&Blob> {
        self.last_blob.as_ref()
    }

    /// The thresholded frame of the last processed frame.
    pub fn last_binary(&self) -> Option<&GrayImage> {
        self.last_binary.as_ref()
    }

    pub fn detector_config(&self) -> &DetectorConfig {
        self.detector.config()
    }

    pub fn timer(&self) -> &DetectionTimer {
        &self.timer
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.trigger.state().last_fired()
    }

    /// Stops the dispatcher, waiting for queued actions up to their timeout.
    pub async fn shutdown(self) {
        self.trigger.shutdown().await;
    }
}
