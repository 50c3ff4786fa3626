// THEORY:
// A recognized gesture must trigger exactly one outside action, and that action
// is a network call that can be slow or fail outright. The tracking loop must
// not feel any of that.
//
// The split:
// 1.  **ActionSink**: the thing that actually performs the action (an HTTP GET
//     in production, a counter in tests). Object safe, returns a boxed future.
// 2.  **Dispatcher**: a tokio worker task fed through a small bounded channel.
//     Every request runs under `tokio::time::timeout`. Failures are logged and
//     dropped; nothing is retried and nothing flows back to the caller.
// 3.  **ActionTrigger**: the synchronous, frame-loop side. It owns the cooldown
//     state, hands requests to the dispatcher without waiting, and clears the
//     trail once a request has been handed off.

use crate::core_modules::trail::TrailBuffer;
use crate::error::DispatchError;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const DEFAULT_ENDPOINT: &str = "http://octoplus.local/api/command/Insert Playlist Immediate/Incendio/1/1";

/// Requests waiting for the worker beyond this are dropped.
const DISPATCH_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ActionConfig {
    /// URL requested once per recognized gesture.
    pub endpoint: String,
    /// Upper bound on a single dispatch.
    pub timeout: Duration,
    /// Minimum time between two fired actions.
    pub cooldown: Duration,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(3),
            cooldown: Duration::from_secs(5),
        }
    }
}

/// Performs the outside action for one recognized gesture.
pub trait ActionSink: Send + Sync + 'static {
    fn invoke(&self) -> BoxFuture<'_, Result<(), DispatchError>>;
}

/// Issues one GET per gesture. Any success status is success.
pub struct HttpActionSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpActionSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ActionSink for HttpActionSink {
    fn invoke(&self) -> BoxFuture<'_, Result<(), DispatchError>> {
        Box::pin(async move {
            let response = self.client.get(&self.endpoint).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(DispatchError::Status(status))
            }
        })
    }
}

/// One queued dispatch. Carries the frame-loop instant it was issued at, for logging.
#[derive(Debug, Clone, Copy)]
struct DispatchRequest {
    issued_at: Instant,
}

/// Runs action dispatches on a tokio task, away from the frame loop.
pub struct Dispatcher {
    sender: mpsc::Sender<DispatchRequest>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawns the worker. Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn ActionSink>, timeout: Duration) -> Self {
        let (sender, mut receiver) = mpsc::channel::<DispatchRequest>(DISPATCH_QUEUE_DEPTH);

        let worker = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let outcome = match tokio::time::timeout(timeout, sink.invoke()).await {
                    Ok(result) => result,
                    Err(_) => Err(DispatchError::TimedOut(timeout)),
                };
                let latency = request.issued_at.elapsed();
                match outcome {
                    Ok(()) => info!(?latency, "action dispatched"),
                    Err(error) => warn!(%error, ?latency, "action dispatch failed"),
                }
            }
        });

        Self { sender, worker }
    }

    /// Queues one dispatch without waiting.
    fn dispatch(&self, issued_at: Instant) -> Result<(), DispatchError> {
        self.sender
            .try_send(DispatchRequest { issued_at })
            .map_err(|_| DispatchError::WorkerUnavailable)
    }

    /// Stops accepting requests and waits for queued ones. Each is bounded by the timeout.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(error) = self.worker.await {
            warn!(%error, "dispatch worker ended abnormally");
        }
    }
}

/// The instant of the last fired action.
#[derive(Debug, Clone, Copy, Default)]
pub struct CooldownState {
    last_fired: Option<Instant>,
}

impl CooldownState {
    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    fn is_cooling(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_fired
            .is_some_and(|fired| now.saturating_duration_since(fired) < cooldown)
    }
}

/// What `maybe_fire` did with a frame's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// No gesture this frame.
    Idle,
    /// A gesture arrived inside the cooldown and was swallowed.
    CoolingDown,
    /// The action was handed to the dispatcher.
    Fired,
    /// The dispatcher refused the request. Cooldown and trail reset still applied.
    Dropped,
}

pub struct ActionTrigger {
    dispatcher: Dispatcher,
    cooldown: Duration,
    state: CooldownState,
}

impl ActionTrigger {
    pub fn new(dispatcher: Dispatcher, cooldown: Duration) -> Self {
        Self {
            dispatcher,
            cooldown,
            state: CooldownState::default(),
        }
    }

    pub fn state(&self) -> &CooldownState {
        &self.state
    }

    /// Fires at most one action for a recognized gesture, then starts the cooldown and clears the trail.
    pub fn maybe_fire(&mut self, recognized: bool, now: Instant, trail: &mut TrailBuffer) -> FireOutcome {
        if !recognized {
            return FireOutcome::Idle;
        }
        if self.state.is_cooling(now, self.cooldown) {
            return FireOutcome::CoolingDown;
        }

        let outcome = match self.dispatcher.dispatch(now) {
            Ok(()) => {
                info!("gesture recognized, action queued");
                FireOutcome::Fired
            }
            Err(error) => {
                warn!(%error, "gesture recognized, action dropped");
                FireOutcome::Dropped
            }
        };
        self.state.last_fired = Some(now);
        trail.clear();
        outcome
    }

    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}
