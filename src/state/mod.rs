pub mod roster;
pub mod session;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::league_store::LeagueStore,
    error::ServiceError,
    gateways::{Mailer, PaymentGateway},
    state::{roster::RosterCache, session::GameSession, state_machine::SessionPhase},
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::state_machine::{SessionEvent, SessionStateMachine};

/// Shared handle passed to every handler and background task.
pub type SharedState = Arc<AppState>;

const SCOREBOARD_CHANNEL_CAPACITY: usize = 64;

/// Central application state: storage handle, external gateways and the live session.
pub struct AppState {
    store: RwLock<Option<Arc<dyn LeagueStore>>>,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
    mailer: Arc<dyn Mailer>,
    payments: Arc<dyn PaymentGateway>,
    scoreboard: SseHub,
    roster: RosterCache,
    machine: RwLock<SessionStateMachine>,
    session: RwLock<Option<GameSession>>,
    session_gate: Mutex<()>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        payments: Arc<dyn PaymentGateway>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let transition_timeout = Some(config.session.transition_timeout());
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            config: Arc::new(config),
            mailer,
            payments,
            scoreboard: SseHub::new(SCOREBOARD_CHANNEL_CAPACITY),
            roster: RosterCache::default(),
            machine: RwLock::new(SessionStateMachine::new()),
            session: RwLock::new(None),
            session_gate: Mutex::new(()),
            transition_gate: Mutex::new(()),
            transition_timeout,
        })
    }

    /// Obtain a handle to the current storage backend, if one is installed.
    pub async fn league_store(&self) -> Option<Arc<dyn LeagueStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Storage backend, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn LeagueStore>, ServiceError> {
        self.league_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new storage backend and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn LeagueStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.roster.clear();
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Transactional email client.
    pub fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.mailer
    }

    /// Payment processor client.
    pub fn payments(&self) -> &Arc<dyn PaymentGateway> {
        &self.payments
    }

    /// Broadcast hub feeding the scoreboard SSE stream.
    pub fn scoreboard(&self) -> &SseHub {
        &self.scoreboard
    }

    /// Per-team roster cache.
    pub fn roster(&self) -> &RosterCache {
        &self.roster
    }

    /// Live session, if a game is open.
    pub fn session(&self) -> &RwLock<Option<GameSession>> {
        &self.session
    }

    /// Serializes session operations that persist data (add, remove, finalize, close).
    ///
    /// Always taken before the transition gate.
    pub fn session_gate(&self) -> &Mutex<()> {
        &self.session_gate
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.machine.read().await.phase()
    }

    /// Lifecycle snapshot including any pending transition.
    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.machine.read().await;
        sm.snapshot()
    }

    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    async fn plan_transition(&self, event: SessionEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    async fn apply_planned_transition(
        &self,
        plan_id: PlanId,
    ) -> Result<SessionPhase, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Plan `event`, run `work`, then apply the plan on success or abort it on failure.
    ///
    /// Work is bounded by the configured transition timeout.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: SessionEvent,
        work: F,
    ) -> Result<(T, SessionPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_state;

    use super::*;

    #[tokio::test]
    async fn failed_work_aborts_the_plan() {
        let (state, _store) = test_state().await;

        let result = state
            .run_transition(SessionEvent::OpenGame, || async {
                Err::<(), _>(ServiceError::InvalidInput("boom".into()))
            })
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.pending, None);
    }

    #[tokio::test]
    async fn successful_work_applies_the_plan() {
        let (state, _store) = test_state().await;

        let (value, phase) = state
            .run_transition(SessionEvent::OpenGame, || async { Ok(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(phase, SessionPhase::Live);
        assert_eq!(state.phase().await, SessionPhase::Live);
    }

    #[tokio::test]
    async fn degraded_flag_follows_the_store() {
        let (state, _store) = test_state().await;
        let mut watcher = state.degraded_watcher();
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));
    }
}
