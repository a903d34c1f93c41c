//! Async completion poller for long-running Emissary operations.
//!
//! A spider crawl or active scan is started remotely and then observed on a
//! fixed interval until its status reaches 100, becomes undefined, or the
//! engine is lost. Each tracked operation owns a small state machine and a
//! single-fire result channel, so a tick that arrives after resolution is
//! ignored and the caller is settled exactly once.
//!
//! ```text
//! Pending -> Polling -> Succeeded
//!                    -> Failed
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::errors::{AppError, EngineError};
use crate::models::scan::{ScanKind, ScanStatus};

/// Lifecycle of one tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Polling,
    Succeeded,
    Failed,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Polling => write!(f, "polling"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Check if a poll state transition is valid.
pub fn is_valid_transition(from: PollState, to: PollState) -> bool {
    matches!(
        (from, to),
        (PollState::Pending, PollState::Polling)
            | (PollState::Polling, PollState::Succeeded)
            | (PollState::Polling, PollState::Failed)
    )
}

/// How many consecutive connectivity failures end a poll.
///
/// With the default of 1 the first connectivity failure before completion is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreachablePolicy {
    pub max_consecutive_connectivity_failures: u32,
}

impl Default for UnreachablePolicy {
    fn default() -> Self {
        Self {
            max_consecutive_connectivity_failures: 1,
        }
    }
}

/// Remote side of one tracked operation.
#[async_trait]
pub trait ScanProbe: Send + Sync {
    fn kind(&self) -> ScanKind;

    fn scan_id(&self) -> &str;

    /// Correlation label for log lines (the crawl or attack target).
    fn target(&self) -> &str;

    async fn status(&self) -> Result<ScanStatus, EngineError>;

    /// Alert count observed alongside the status, for probes that track one.
    async fn alerts(&self) -> Option<Result<u64, EngineError>> {
        None
    }
}

/// What one tick observed.
#[derive(Debug)]
pub struct TickObservation {
    pub status: Result<ScanStatus, EngineError>,
    pub alerts: Option<Result<u64, EngineError>>,
}

/// Resolved value of a successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub kind: ScanKind,
    pub scan_id: String,
    /// Last alert count observed, zero for probes that do not track one.
    pub alerts: u64,
    pub ticks: u32,
}

/// Result of feeding one tick to a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tracker is not polling; the tick had no effect.
    Ignored,
    Continue,
    Succeeded,
    Failed,
}

impl TickOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

type Resolver = oneshot::Sender<Result<PollOutcome, AppError>>;

/// State machine plus single-fire resolver for one tracked operation.
#[derive(Debug)]
pub struct CompletionTracker {
    state: PollState,
    kind: ScanKind,
    scan_id: String,
    target: String,
    policy: UnreachablePolicy,
    consecutive_connectivity_failures: u32,
    alerts: u64,
    ticks: u32,
    resolver: Option<Resolver>,
}

impl CompletionTracker {
    pub fn new(
        kind: ScanKind,
        scan_id: impl Into<String>,
        target: impl Into<String>,
        policy: UnreachablePolicy,
    ) -> (Self, oneshot::Receiver<Result<PollOutcome, AppError>>) {
        let (tx, rx) = oneshot::channel();
        let tracker = Self {
            state: PollState::Pending,
            kind,
            scan_id: scan_id.into(),
            target: target.into(),
            policy,
            consecutive_connectivity_failures: 0,
            alerts: 0,
            ticks: 0,
            resolver: Some(tx),
        };
        (tracker, rx)
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Move from Pending to Polling.
    pub fn start(&mut self) -> Result<(), AppError> {
        self.transition(PollState::Polling)
    }

    fn transition(&mut self, to: PollState) -> Result<(), AppError> {
        if !is_valid_transition(self.state, to) {
            return Err(AppError::InvalidState(format!(
                "{} {} cannot move from {} to {to}",
                self.kind, self.scan_id, self.state
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Evaluate one tick. Only the first terminal outcome settles the caller.
    pub fn on_tick(&mut self, observation: TickObservation) -> TickOutcome {
        if self.state != PollState::Polling {
            return TickOutcome::Ignored;
        }
        self.ticks += 1;

        match observation.alerts {
            Some(Ok(alerts)) => self.alerts = alerts,
            Some(Err(e)) => {
                let transient = AppError::TransientQuery(format!(
                    "alert count for {}: {e}",
                    self.target
                ));
                tracing::warn!(
                    scan_id = %self.scan_id,
                    error = %transient,
                    "Keeping last known alert count"
                );
            }
            None => {}
        }

        match observation.status {
            Ok(ScanStatus::Undefined) => self.fail(AppError::UnreachableEngine(format!(
                "{} {} reported an undefined status for {}",
                self.kind, self.scan_id, self.target
            ))),
            Ok(status) if status.is_complete() => self.succeed(),
            Ok(status) => {
                self.consecutive_connectivity_failures = 0;
                match self.kind {
                    ScanKind::Spider => tracing::info!(
                        audience = "build_user",
                        scan_id = %self.scan_id,
                        status = %status,
                        target = %self.target,
                        "Spider scan in progress"
                    ),
                    ScanKind::ActiveScan => tracing::info!(
                        audience = "build_user",
                        scan_id = %self.scan_id,
                        status = %status,
                        alerts = self.alerts,
                        target = %self.target,
                        "Active scan in progress"
                    ),
                }
                TickOutcome::Continue
            }
            Err(e) if e.is_connectivity() => {
                self.consecutive_connectivity_failures += 1;
                if self.consecutive_connectivity_failures
                    >= self.policy.max_consecutive_connectivity_failures
                {
                    self.fail(AppError::UnreachableEngine(format!(
                        "lost the Emissary while polling {} {} for {}: {e}",
                        self.kind, self.scan_id, self.target
                    )))
                } else {
                    tracing::warn!(
                        scan_id = %self.scan_id,
                        failures = self.consecutive_connectivity_failures,
                        error = %e,
                        "Emissary unreachable, polling again"
                    );
                    TickOutcome::Continue
                }
            }
            Err(e) => {
                let transient = AppError::TransientQuery(format!(
                    "status of {} {} for {}: {e}",
                    self.kind, self.scan_id, self.target
                ));
                tracing::warn!(error = %transient, "Polling again");
                TickOutcome::Continue
            }
        }
    }

    fn succeed(&mut self) -> TickOutcome {
        if self.transition(PollState::Succeeded).is_err() {
            return TickOutcome::Ignored;
        }
        tracing::info!(
            audience = "build_user",
            kind = %self.kind,
            scan_id = %self.scan_id,
            alerts = self.alerts,
            target = %self.target,
            "Scan complete"
        );
        let outcome = PollOutcome {
            kind: self.kind,
            scan_id: self.scan_id.clone(),
            alerts: self.alerts,
            ticks: self.ticks,
        };
        self.resolve(Ok(outcome));
        TickOutcome::Succeeded
    }

    fn fail(&mut self, error: AppError) -> TickOutcome {
        if self.transition(PollState::Failed).is_err() {
            return TickOutcome::Ignored;
        }
        tracing::error!(
            audience = "build_user",
            kind = %self.kind,
            scan_id = %self.scan_id,
            error = %error,
            "Scan polling failed"
        );
        self.resolve(Err(error));
        TickOutcome::Failed
    }

    fn resolve(&mut self, result: Result<PollOutcome, AppError>) {
        if let Some(resolver) = self.resolver.take() {
            // The caller may have gone away; nothing left to notify.
            let _ = resolver.send(result);
        }
    }
}

/// Aborts the polling task when the awaiting caller is dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Spawns and awaits interval-driven trackers.
#[derive(Debug, Clone, Copy)]
pub struct CompletionPoller {
    interval: Duration,
    policy: UnreachablePolicy,
}

impl CompletionPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            policy: UnreachablePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnreachablePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `probe` every interval until it settles.
    ///
    /// The first query happens one interval after the call. The task stops
    /// once the tracker settles or the returned future is dropped.
    pub async fn track(&self, probe: Arc<dyn ScanProbe>) -> Result<PollOutcome, AppError> {
        let (mut tracker, done) = CompletionTracker::new(
            probe.kind(),
            probe.scan_id(),
            probe.target(),
            self.policy,
        );
        tracker.start()?;

        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                let status = probe.status().await;
                let alerts = probe.alerts().await;
                if tracker.on_tick(TickObservation { status, alerts }).is_terminal() {
                    break;
                }
            }
        });
        let _guard = AbortOnDrop(task);

        done.await.map_err(|_| {
            AppError::Internal("completion poller stopped before resolving".to_string())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn tick(status: u8) -> TickObservation {
        TickObservation {
            status: Ok(ScanStatus::Progress(status)),
            alerts: None,
        }
    }

    fn connect_error() -> EngineError {
        EngineError::Connect("connection refused".to_string())
    }

    fn polling_tracker(
        policy: UnreachablePolicy,
    ) -> (
        CompletionTracker,
        oneshot::Receiver<Result<PollOutcome, AppError>>,
    ) {
        let (mut tracker, rx) = CompletionTracker::new(ScanKind::Spider, "0", "http://sut", policy);
        tracker.start().unwrap();
        (tracker, rx)
    }

    /// Probe replaying a scripted sequence, repeating the last entry.
    struct ScriptedProbe {
        kind: ScanKind,
        statuses: Mutex<VecDeque<Result<ScanStatus, EngineError>>>,
        alerts: Mutex<VecDeque<Result<u64, EngineError>>>,
        status_calls: AtomicU32,
    }

    impl ScriptedProbe {
        fn new(kind: ScanKind, statuses: Vec<Result<ScanStatus, EngineError>>) -> Self {
            Self {
                kind,
                statuses: Mutex::new(statuses.into()),
                alerts: Mutex::new(VecDeque::new()),
                status_calls: AtomicU32::new(0),
            }
        }

        fn with_alerts(self, alerts: Vec<Result<u64, EngineError>>) -> Self {
            *self.alerts.lock().unwrap() = alerts.into();
            self
        }

        fn calls(&self) -> u32 {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScanProbe for ScriptedProbe {
        fn kind(&self) -> ScanKind {
            self.kind
        }

        fn scan_id(&self) -> &str {
            "3"
        }

        fn target(&self) -> &str {
            "http://sut/profile"
        }

        async fn status(&self) -> Result<ScanStatus, EngineError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                statuses.pop_front().unwrap()
            } else {
                statuses.front().cloned().unwrap()
            }
        }

        async fn alerts(&self) -> Option<Result<u64, EngineError>> {
            if self.kind != ScanKind::ActiveScan {
                return None;
            }
            let mut alerts = self.alerts.lock().unwrap();
            if alerts.len() > 1 {
                alerts.pop_front()
            } else {
                alerts.front().cloned()
            }
        }
    }

    #[test]
    fn valid_transitions() {
        assert!(is_valid_transition(PollState::Pending, PollState::Polling));
        assert!(is_valid_transition(PollState::Polling, PollState::Succeeded));
        assert!(is_valid_transition(PollState::Polling, PollState::Failed));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!is_valid_transition(PollState::Pending, PollState::Succeeded));
        assert!(!is_valid_transition(PollState::Succeeded, PollState::Failed));
        assert!(!is_valid_transition(PollState::Failed, PollState::Polling));
        assert!(!is_valid_transition(PollState::Succeeded, PollState::Polling));
    }

    #[test]
    fn ticks_before_start_are_ignored() {
        let (mut tracker, _rx) =
            CompletionTracker::new(ScanKind::Spider, "0", "http://sut", UnreachablePolicy::default());
        assert_eq!(tracker.on_tick(tick(100)), TickOutcome::Ignored);
        assert_eq!(tracker.state(), PollState::Pending);
    }

    #[test]
    fn progress_then_complete_resolves_once() {
        let (mut tracker, mut rx) = polling_tracker(UnreachablePolicy::default());

        assert_eq!(tracker.on_tick(tick(10)), TickOutcome::Continue);
        assert_eq!(tracker.on_tick(tick(55)), TickOutcome::Continue);
        assert_eq!(tracker.on_tick(tick(100)), TickOutcome::Succeeded);
        assert_eq!(tracker.state(), PollState::Succeeded);

        // Late ticks have no effect.
        assert_eq!(tracker.on_tick(tick(100)), TickOutcome::Ignored);
        let late = TickObservation {
            status: Ok(ScanStatus::Undefined),
            alerts: None,
        };
        assert_eq!(tracker.on_tick(late), TickOutcome::Ignored);
        assert_eq!(tracker.state(), PollState::Succeeded);

        let outcome = rx.try_recv().unwrap().unwrap();
        assert_eq!(outcome.ticks, 3);
        assert_eq!(outcome.scan_id, "0");
    }

    #[test]
    fn undefined_status_fails() {
        let (mut tracker, mut rx) = polling_tracker(UnreachablePolicy::default());
        assert_eq!(tracker.on_tick(tick(30)), TickOutcome::Continue);
        let undefined = TickObservation {
            status: Ok(ScanStatus::Undefined),
            alerts: None,
        };
        assert_eq!(tracker.on_tick(undefined), TickOutcome::Failed);
        assert!(matches!(rx.try_recv().unwrap(), Err(AppError::UnreachableEngine(_))));
    }

    #[test]
    fn connectivity_error_before_completion_fails() {
        let (mut tracker, mut rx) = polling_tracker(UnreachablePolicy::default());
        tracker.on_tick(tick(40));
        let lost = TickObservation {
            status: Err(connect_error()),
            alerts: None,
        };
        assert_eq!(tracker.on_tick(lost), TickOutcome::Failed);
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(err.is_unreachable());
    }

    #[test]
    fn other_status_errors_are_transient() {
        let (mut tracker, mut rx) = polling_tracker(UnreachablePolicy::default());
        let timeout = TickObservation {
            status: Err(EngineError::Timeout("slow".to_string())),
            alerts: None,
        };
        assert_eq!(tracker.on_tick(timeout), TickOutcome::Continue);
        assert_eq!(tracker.state(), PollState::Polling);
        assert!(rx.try_recv().is_err());
        assert_eq!(tracker.on_tick(tick(100)), TickOutcome::Succeeded);
    }

    #[test]
    fn tolerant_policy_resets_on_progress() {
        let policy = UnreachablePolicy {
            max_consecutive_connectivity_failures: 2,
        };
        let (mut tracker, _rx) = polling_tracker(policy);
        let lost = || TickObservation {
            status: Err(connect_error()),
            alerts: None,
        };

        assert_eq!(tracker.on_tick(tick(40)), TickOutcome::Continue);
        assert_eq!(tracker.on_tick(lost()), TickOutcome::Continue);
        assert_eq!(tracker.on_tick(tick(60)), TickOutcome::Continue);
        assert_eq!(tracker.on_tick(lost()), TickOutcome::Continue);
        assert_eq!(tracker.on_tick(lost()), TickOutcome::Failed);
    }

    #[test]
    fn alert_query_failure_keeps_last_count() {
        let (mut tracker, mut rx) = CompletionTracker::new(
            ScanKind::ActiveScan,
            "1",
            "http://sut/profile",
            UnreachablePolicy::default(),
        );
        tracker.start().unwrap();

        tracker.on_tick(TickObservation {
            status: Ok(ScanStatus::Progress(20)),
            alerts: Some(Ok(2)),
        });
        tracker.on_tick(TickObservation {
            status: Ok(ScanStatus::Progress(70)),
            alerts: Some(Err(EngineError::Timeout("slow".to_string()))),
        });
        tracker.on_tick(TickObservation {
            status: Ok(ScanStatus::Progress(100)),
            alerts: Some(Err(EngineError::Timeout("slow".to_string()))),
        });

        assert_eq!(rx.try_recv().unwrap().unwrap().alerts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_stops_querying_after_success() {
        let probe = Arc::new(ScriptedProbe::new(
            ScanKind::Spider,
            vec![
                Ok(ScanStatus::Progress(10)),
                Ok(ScanStatus::Progress(55)),
                Ok(ScanStatus::Progress(100)),
            ],
        ));
        let poller = CompletionPoller::new(Duration::from_secs(5));

        let start = Instant::now();
        let outcome = poller.track(probe.clone()).await.unwrap();
        assert_eq!(outcome.ticks, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_rejects_on_undefined_status() {
        let probe = Arc::new(ScriptedProbe::new(
            ScanKind::Spider,
            vec![Ok(ScanStatus::Progress(30)), Ok(ScanStatus::Undefined)],
        ));
        let result = CompletionPoller::new(Duration::from_secs(1))
            .track(probe.clone())
            .await;
        assert!(matches!(result, Err(AppError::UnreachableEngine(_))));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_rejects_when_engine_is_lost() {
        let probe = Arc::new(ScriptedProbe::new(
            ScanKind::ActiveScan,
            vec![Ok(ScanStatus::Progress(40)), Err(connect_error())],
        ));
        let result = CompletionPoller::new(Duration::from_secs(1))
            .track(probe)
            .await;
        assert!(result.unwrap_err().is_unreachable());
    }

    #[tokio::test(start_paused = true)]
    async fn active_scan_outcome_carries_terminal_alert_count() {
        let probe = Arc::new(
            ScriptedProbe::new(
                ScanKind::ActiveScan,
                vec![Ok(ScanStatus::Progress(50)), Ok(ScanStatus::Progress(100))],
            )
            .with_alerts(vec![Ok(1), Ok(4)]),
        );
        let outcome = CompletionPoller::new(Duration::from_secs(1))
            .track(probe)
            .await
            .unwrap();
        assert_eq!(outcome.kind, ScanKind::ActiveScan);
        assert_eq!(outcome.alerts, 4);
    }
}
