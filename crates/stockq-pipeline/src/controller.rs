//! Single-flight request controller.
//!
//! `toggle` is the only entry point: when idle it starts a pipeline run,
//! while a run is in flight it requests cancellation of that run.
//!
//! State machine:
//! ```text
//! Idle ──toggle──▶ Running ──toggle──▶ Cancelling ──toggle──▶ (ignored)
//!   ▲                 │                    │
//!   └────outcome──────┴──────outcome───────┘
//! ```
//!
//! The controller only returns to `Idle` once the terminal outcome of its
//! run has been observed, so a new run can never start while the previous
//! one is still unwinding. Outcomes are delivered as `ControllerEvent`s on
//! an mpsc channel; the current `Affordance` is broadcast on a watch channel.

use crate::error::PipelineError;
use crate::outcome::PipelineOutcome;
use crate::pipeline::FetchFilterPipeline;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stockq_core::PriceRecord;
use stockq_telemetry::Metrics;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the toggle will do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Idle: toggling starts a search.
    Search,
    /// Running: toggling requests cancellation.
    Cancel,
    /// Cancellation requested, waiting for the run to unwind.
    Cancelling,
}

impl fmt::Display for Affordance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search => write!(f, "Search"),
            Self::Cancel => write!(f, "Cancel"),
            Self::Cancelling => write!(f, "Cancelling"),
        }
    }
}

/// Bookkeeping for the in-flight run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: u64,
    pub identifier: String,
    pub started_at: Instant,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug, Clone, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Running(RunHandle),
    Cancelling(RunHandle),
}

impl ControllerState {
    pub fn affordance(&self) -> Affordance {
        match self {
            Self::Idle => Affordance::Search,
            Self::Running(_) => Affordance::Cancel,
            Self::Cancelling(_) => Affordance::Cancelling,
        }
    }

    pub fn run_id(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Running(h) | Self::Cancelling(h) => Some(h.run_id),
        }
    }
}

/// Result of a `toggle` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Started { run_id: u64 },
    CancelRequested { run_id: u64 },
    /// A cancellation is already pending for this run.
    Ignored { run_id: u64 },
}

impl ToggleAction {
    fn label(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::CancelRequested { .. } => "cancel_requested",
            Self::Ignored { .. } => "ignored",
        }
    }
}

/// Final report of one run, published after the controller is back to idle.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: u64,
    pub identifier: String,
    pub outcome: PipelineOutcome,
    pub elapsed: Duration,
}

impl RunReport {
    /// Human-readable status line.
    pub fn status_message(&self) -> String {
        let ms = self.elapsed.as_millis();
        match &self.outcome {
            PipelineOutcome::Success(_) => {
                format!("Loaded stocks for {} in {ms}ms", self.identifier)
            }
            PipelineOutcome::Cancelled => {
                format!("Search for {} cancelled after {ms}ms", self.identifier)
            }
            PipelineOutcome::Failed(e) => e.to_string(),
        }
    }

    pub fn records(&self) -> &[PriceRecord] {
        self.outcome.records()
    }
}

/// Notifications from the controller, in the order they happened.
#[derive(Debug)]
pub enum ControllerEvent {
    Started { run_id: u64, identifier: String },
    CancelRequested { run_id: u64, identifier: String },
    Finished(RunReport),
}

struct Shared {
    state: Mutex<ControllerState>,
    next_run_id: AtomicU64,
    affordance_tx: watch::Sender<Affordance>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl Shared {
    fn set_state(&self, state: &mut ControllerState, next: ControllerState) {
        let affordance = next.affordance();
        *state = next;
        self.affordance_tx.send_replace(affordance);
    }

    fn publish(&self, event: ControllerEvent) {
        // A dropped receiver only means nobody is listening any more.
        if self.events_tx.send(event).is_err() {
            debug!("Controller event receiver dropped");
        }
    }

    /// Observe the terminal outcome of `run_id` and return to idle.
    fn finish(&self, run_id: u64, identifier: String, started_at: Instant, outcome: PipelineOutcome) {
        let elapsed = started_at.elapsed();
        let mut state = self.state.lock();

        if state.run_id() == Some(run_id) {
            self.set_state(&mut state, ControllerState::Idle);
        } else {
            warn!(run_id, current = ?state.run_id(), "Outcome for a run that is not current");
        }

        let report = RunReport {
            run_id,
            identifier,
            outcome,
            elapsed,
        };
        info!(
            run_id,
            outcome = report.outcome.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            status = %report.status_message(),
            "Run finished"
        );
        self.publish(ControllerEvent::Finished(report));
    }
}

/// Owns at most one in-flight pipeline run.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct RequestController {
    pipeline: FetchFilterPipeline,
    shared: Arc<Shared>,
}

impl RequestController {
    /// Create a controller and the receiver for its events.
    pub fn new(pipeline: FetchFilterPipeline) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (affordance_tx, _) = watch::channel(Affordance::Search);

        let controller = Self {
            pipeline,
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::Idle),
                next_run_id: AtomicU64::new(1),
                affordance_tx,
                events_tx,
            }),
        };

        (controller, events_rx)
    }

    /// Start a search for `identifier`, or cancel the one in flight.
    ///
    /// While a run is in flight `identifier` is ignored. Must be called from
    /// within a tokio runtime.
    pub fn toggle(&self, identifier: &str) -> ToggleAction {
        let mut state = self.shared.state.lock();

        let action = match std::mem::take(&mut *state) {
            ControllerState::Idle => {
                let handle = self.start(identifier);
                let run_id = handle.run_id;
                self.shared.publish(ControllerEvent::Started {
                    run_id,
                    identifier: handle.identifier.clone(),
                });
                self.shared
                    .set_state(&mut state, ControllerState::Running(handle));
                ToggleAction::Started { run_id }
            }
            ControllerState::Running(handle) => {
                let run_id = self.request_cancel(&mut state, handle);
                ToggleAction::CancelRequested { run_id }
            }
            ControllerState::Cancelling(handle) => {
                let run_id = handle.run_id;
                debug!(run_id, "Toggle ignored while cancelling");
                *state = ControllerState::Cancelling(handle);
                ToggleAction::Ignored { run_id }
            }
        };

        Metrics::toggle(action.label());
        action
    }

    /// Request cancellation of the in-flight run, if it is still running.
    ///
    /// Returns `true` if this call requested the cancellation.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.state.lock();

        match std::mem::take(&mut *state) {
            ControllerState::Running(handle) => {
                let run_id = self.request_cancel(&mut state, handle);
                Metrics::toggle(ToggleAction::CancelRequested { run_id }.label());
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }

    pub fn state(&self) -> ControllerState {
        self.shared.state.lock().clone()
    }

    pub fn affordance(&self) -> Affordance {
        *self.shared.affordance_tx.borrow()
    }

    pub fn is_idle(&self) -> bool {
        matches!(*self.shared.state.lock(), ControllerState::Idle)
    }

    /// Subscribe to affordance changes.
    pub fn subscribe(&self) -> watch::Receiver<Affordance> {
        self.shared.affordance_tx.subscribe()
    }

    /// Wait until the controller is idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self.shared`, so this cannot fail while we hold `self`.
        let _ = rx.wait_for(|a| *a == Affordance::Search).await;
    }

    /// Cancel `handle` and move to `Cancelling`. Called with the state lock held.
    fn request_cancel(&self, state: &mut ControllerState, handle: RunHandle) -> u64 {
        let run_id = handle.run_id;
        handle.cancel.cancel();
        info!(run_id, identifier = %handle.identifier, "Cancellation requested");
        self.shared.publish(ControllerEvent::CancelRequested {
            run_id,
            identifier: handle.identifier.clone(),
        });
        self.shared
            .set_state(state, ControllerState::Cancelling(handle));
        run_id
    }

    /// Spawn the run and its supervisor. Called with the state lock held.
    fn start(&self, identifier: &str) -> RunHandle {
        let run_id = self.shared.next_run_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let started_at = Instant::now();

        info!(run_id, identifier = %identifier, "Starting search");

        let run = self.pipeline.spawn(identifier, cancel.clone());
        let shared = Arc::clone(&self.shared);
        let owned_identifier = identifier.to_string();
        tokio::spawn(async move {
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => PipelineOutcome::Failed(PipelineError::Aborted(e.to_string())),
            };
            shared.finish(run_id, owned_identifier, started_at, outcome);
        });

        RunHandle {
            run_id,
            identifier: identifier.to_string(),
            started_at,
            cancel,
        }
    }
}

impl fmt::Debug for RequestController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestController")
            .field("source", &self.pipeline.source().to_string())
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockq_source::LineSource;
    use tokio::time::timeout;

    // `#[tokio::test]` uses a current-thread runtime: a spawned run cannot
    // make progress until the test task awaits, so back-to-back toggles
    // always reach the run before it reads anything.

    const WAIT: Duration = Duration::from_secs(2);

    fn sample_lines() -> Vec<&'static str> {
        vec!["header", "AAPL,100,t1", "MSFT,90,t2", "AAPL,101,t3"]
    }

    fn new_controller(
        lines: Vec<&'static str>,
    ) -> (RequestController, mpsc::UnboundedReceiver<ControllerEvent>) {
        RequestController::new(FetchFilterPipeline::with_source(LineSource::memory(lines)))
    }

    async fn next_finished(rx: &mut mpsc::UnboundedReceiver<ControllerEvent>) -> RunReport {
        loop {
            let event = timeout(WAIT, rx.recv())
                .await
                .expect("event expected")
                .expect("channel open");
            if let ControllerEvent::Finished(report) = event {
                return report;
            }
        }
    }

    #[tokio::test]
    async fn test_toggle_from_idle_starts_run() {
        let (controller, mut rx) = new_controller(sample_lines());
        assert_eq!(controller.affordance(), Affordance::Search);

        let action = controller.toggle("AAPL");
        assert_eq!(action, ToggleAction::Started { run_id: 1 });
        assert_eq!(controller.affordance(), Affordance::Cancel);
        assert!(matches!(
            rx.recv().await,
            Some(ControllerEvent::Started { run_id: 1, .. })
        ));

        let report = next_finished(&mut rx).await;
        assert!(report.outcome.is_success());
        assert_eq!(report.records().len(), 2);
        assert!(report
            .status_message()
            .starts_with("Loaded stocks for AAPL in "));

        assert!(controller.is_idle());
        assert_eq!(controller.affordance(), Affordance::Search);
    }

    #[tokio::test]
    async fn test_start_then_cancel_reports_cancelled() {
        let (controller, mut rx) = new_controller(sample_lines());

        let ToggleAction::Started { run_id } = controller.toggle("AAPL") else {
            panic!("expected start");
        };
        assert_eq!(
            controller.toggle("AAPL"),
            ToggleAction::CancelRequested { run_id }
        );
        assert_eq!(controller.affordance(), Affordance::Cancelling);
        assert!(!controller.is_idle());

        let report = next_finished(&mut rx).await;
        assert_eq!(report.run_id, run_id);
        assert!(report.outcome.is_cancelled());
        assert!(report.records().is_empty());
        assert!(report.status_message().contains("cancelled"));

        timeout(WAIT, controller.wait_idle()).await.unwrap();
        assert!(controller.is_idle());
    }

    #[tokio::test]
    async fn test_toggle_while_cancelling_is_ignored() {
        let (controller, mut rx) = new_controller(sample_lines());

        let ToggleAction::Started { run_id } = controller.toggle("AAPL") else {
            panic!("expected start");
        };
        controller.toggle("AAPL");

        assert_eq!(controller.toggle("MSFT"), ToggleAction::Ignored { run_id });
        assert!(matches!(
            controller.state(),
            ControllerState::Cancelling(ref h) if h.run_id == run_id && h.is_cancel_requested()
        ));

        next_finished(&mut rx).await;

        // Only now may a new run start.
        assert_eq!(
            controller.toggle("MSFT"),
            ToggleAction::Started { run_id: run_id + 1 }
        );
        let report = next_finished(&mut rx).await;
        assert_eq!(report.identifier, "MSFT");
        assert_eq!(report.records().len(), 1);
    }

    #[tokio::test]
    async fn test_never_two_runs_in_flight() {
        let (controller, mut rx) = new_controller(sample_lines());

        for i in 0..20 {
            controller.toggle("AAPL");
            if i % 3 == 0 {
                tokio::task::yield_now().await;
            }
        }

        let mut started = 0;
        let mut finished = 0;
        let mut max_in_flight = 0;
        while started == 0 || finished < started {
            match timeout(WAIT, rx.recv()).await.unwrap().unwrap() {
                ControllerEvent::Started { .. } => started += 1,
                ControllerEvent::Finished(_) => finished += 1,
                ControllerEvent::CancelRequested { .. } => {}
            }
            max_in_flight = max_in_flight.max(started - finished);
        }

        assert_eq!(max_in_flight, 1);
        timeout(WAIT, controller.wait_idle()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_run_reports_error_and_resets() {
        let (controller, mut rx) = new_controller(vec!["header", "BAD_LINE"]);

        controller.toggle("AAPL");
        let report = next_finished(&mut rx).await;

        assert!(report.outcome.is_failed());
        assert!(report.status_message().contains("Parse error on line 2"));
        assert!(report.records().is_empty());
        assert!(controller.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_noop() {
        let (controller, _rx) = new_controller(sample_lines());
        assert!(!controller.cancel());
        assert!(controller.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_only_applies_to_running() {
        let (controller, mut rx) = new_controller(sample_lines());

        controller.toggle("AAPL");
        assert!(controller.cancel());
        assert!(!controller.cancel());

        assert!(next_finished(&mut rx).await.outcome.is_cancelled());
    }

    #[tokio::test]
    async fn test_affordance_subscription_ends_on_search() {
        let (controller, mut rx) = new_controller(sample_lines());
        let mut affordance = controller.subscribe();

        controller.toggle("AAPL");
        assert_eq!(*affordance.borrow_and_update(), Affordance::Cancel);

        next_finished(&mut rx).await;
        assert_eq!(*affordance.borrow_and_update(), Affordance::Search);
    }

    #[tokio::test]
    async fn test_run_ids_increase() {
        let (controller, mut rx) = new_controller(sample_lines());

        let first = controller.toggle("AAPL");
        next_finished(&mut rx).await;
        let second = controller.toggle("AAPL");
        next_finished(&mut rx).await;

        assert_eq!(first, ToggleAction::Started { run_id: 1 });
        assert_eq!(second, ToggleAction::Started { run_id: 2 });
    }
}
