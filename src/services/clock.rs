use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{
    services::{session_service, sse_events::broadcast_session_snapshot},
    state::{SharedState, session::TickOutcome},
};

/// Wall-clock period of one scoreboard second.
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Tick the live session once per second until the process stops.
///
/// Ticks missed while a finalization is saving stats are skipped, not replayed.
pub async fn run(state: SharedState) {
    let period = TICK_PERIOD;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_ms = period.as_millis() as u64, "game clock driver started");

    loop {
        ticker.tick().await;
        match tick_once(&state).await {
            TickOutcome::Idle => {}
            TickOutcome::Advanced => broadcast_session_snapshot(&state).await,
            TickOutcome::Expired => {
                broadcast_session_snapshot(&state).await;
                if let Err(err) = session_service::finalize(&state).await {
                    warn!(error = %err, "failed to finalize the game after the clock expired");
                }
            }
        }
    }
}

/// Advance the live session by one second, if a game is open.
pub async fn tick_once(state: &SharedState) -> TickOutcome {
    let mut guard = state.session().write().await;
    guard
        .as_mut()
        .map(|session| session.tick())
        .unwrap_or(TickOutcome::Idle)
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_state;

    use super::*;

    #[tokio::test]
    async fn ticks_without_a_session_are_idle() {
        let (state, _store) = test_state().await;
        assert_eq!(tick_once(&state).await, TickOutcome::Idle);
    }
}
