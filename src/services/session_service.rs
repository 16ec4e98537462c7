//! Scoreboard commands: lifecycle transitions, clock control and on-court stat tracking.

use std::{sync::Arc, time::SystemTime};

use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::FlushPolicy,
    dao::{
        league_store::LeagueStore,
        models::{StatLineEntity, UserEntity},
        storage::StorageError,
    },
    dto::session::{AdjustStatRequest, AdjustStatResponse, SessionSnapshotResponse},
    error::ServiceError,
    services::{
        game_service, roster_service,
        sse_events::{broadcast_session_snapshot, session_snapshot},
    },
    state::{
        SharedState,
        session::{CurrentGame, GameSession, StatLine},
        state_machine::{SessionEvent, SessionPhase},
        transitions::run_transition_with_broadcast,
    },
};

/// Current scoreboard projection.
pub async fn snapshot(state: &SharedState) -> SessionSnapshotResponse {
    session_snapshot(state).await
}

/// Open the scoreboard on one of the caller's games.
pub async fn open_session(
    state: &SharedState,
    caller: &UserEntity,
    game_id: Uuid,
) -> Result<SessionSnapshotResponse, ServiceError> {
    let _gate = state.session_gate().lock().await;
    let store = state.require_store().await?;
    let game = game_service::owned_game(store.as_ref(), caller, game_id).await?;
    let current = CurrentGame::from(&game);

    run_transition_with_broadcast(state, SessionEvent::OpenGame, || async {
        *state.session().write().await = Some(GameSession::new(current));
        Ok(())
    })
    .await?;

    info!(game_id = %game.id, opponent = %game.opponent, "scoreboard opened");
    Ok(session_snapshot(state).await)
}

/// Save every on-court line and drop the session.
pub async fn close_session(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<SessionSnapshotResponse, ServiceError> {
    let _gate = state.session_gate().lock().await;
    ensure_owner(state, caller).await?;
    let store = state.require_store().await?;

    let outcome = run_transition_with_broadcast(state, SessionEvent::CloseGame, || async {
        let saved = flush_all(state, &store).await?;
        state.session().write().await.take();
        Ok(saved)
    })
    .await;

    let saved = settle_bulk_flush(state, outcome).await?;
    info!(saved, "scoreboard closed");
    Ok(session_snapshot(state).await)
}

/// Save every on-court line once the clock ran out and move to the final phase.
///
/// Does nothing unless a game is live.
pub async fn finalize(state: &SharedState) -> Result<(), ServiceError> {
    let _gate = state.session_gate().lock().await;
    if state.phase().await != SessionPhase::Live {
        return Ok(());
    }
    let store = state.require_store().await?;

    let outcome = run_transition_with_broadcast(state, SessionEvent::ClockExpired, || {
        flush_all(state, &store)
    })
    .await;

    let saved = settle_bulk_flush(state, outcome).await?;
    info!(saved, "clock expired; game finalized");
    Ok(())
}

/// Stop the clock, restore the full duration and zero the on-court seconds.
pub async fn reset_clock(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<SessionSnapshotResponse, ServiceError> {
    ensure_owner(state, caller).await?;
    run_transition_with_broadcast(state, SessionEvent::ClockReset, || async {
        if let Some(session) = state.session().write().await.as_mut() {
            session.reset();
        }
        Ok(())
    })
    .await?;
    Ok(session_snapshot(state).await)
}

/// Clock command accepted by [`control_clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCommand {
    /// Run the clock; rejected when no time is left.
    Start,
    /// Stop the clock.
    Pause,
    /// Flip between running and paused.
    Toggle,
}

/// Start, pause or toggle the clock.
pub async fn control_clock(
    state: &SharedState,
    caller: &UserEntity,
    command: ClockCommand,
) -> Result<SessionSnapshotResponse, ServiceError> {
    {
        let mut guard = state.session().write().await;
        let session = owned_session_mut(&mut guard, caller)?;
        match command {
            ClockCommand::Start => session.start()?,
            ClockCommand::Pause => session.pause(),
            ClockCommand::Toggle => {
                session.toggle()?;
            }
        }
    }
    broadcast_session_snapshot(state).await;
    Ok(session_snapshot(state).await)
}

/// Put a rostered player on court, resuming from their saved line for this game.
pub async fn add_active(
    state: &SharedState,
    caller: &UserEntity,
    player_id: Uuid,
) -> Result<SessionSnapshotResponse, ServiceError> {
    let _gate = state.session_gate().lock().await;
    ensure_live(state).await?;

    let game_id = {
        let guard = state.session().read().await;
        let session = owned_session(&guard, caller)?;
        session.ensure_can_add(player_id)?;
        session.game().id
    };

    let store = state.require_store().await?;
    let player = roster_service::owned_player(store.as_ref(), caller, player_id).await?;
    let starting = store
        .find_stat_line(game_id, player_id)
        .await?
        .map(|line| StatLine::from(&line))
        .unwrap_or_default();

    {
        let mut guard = state.session().write().await;
        let session = owned_session_mut(&mut guard, caller)?;
        session.add_active(player.id, player.name, starting)?;
    }
    info!(player_id = %player_id, game_id = %game_id, "player on court");

    broadcast_session_snapshot(state).await;
    Ok(session_snapshot(state).await)
}

/// Save a player's counters for the current game, then take them off court.
///
/// The entry is frozen while the write is retried. If every attempt fails it is thawed and
/// stays on court with its counters.
pub async fn remove_active(
    state: &SharedState,
    caller: &UserEntity,
    player_id: Uuid,
) -> Result<SessionSnapshotResponse, ServiceError> {
    let _gate = state.session_gate().lock().await;
    ensure_live(state).await?;
    let store = state.require_store().await?;

    let (game_id, stats) = {
        let mut guard = state.session().write().await;
        let session = owned_session_mut(&mut guard, caller)?;
        let stats = session.begin_flush(player_id)?;
        (session.game().id, stats)
    };
    broadcast_session_snapshot(state).await;

    let policy = state.config().flush.clone();
    let result = persist_with_retry(&store, &policy, stat_line(game_id, player_id, stats)).await;

    {
        let mut guard = state.session().write().await;
        if let Some(session) = guard.as_mut() {
            match &result {
                Ok(()) => {
                    session.finish_flush(player_id);
                }
                Err(_) => session.abort_flush(player_id),
            }
        }
    }
    broadcast_session_snapshot(state).await;

    match result {
        Ok(()) => {
            info!(player_id = %player_id, game_id = %game_id, "player off court; stats saved");
            Ok(session_snapshot(state).await)
        }
        Err(err) => {
            warn!(
                player_id = %player_id,
                game_id = %game_id,
                error = %err,
                "failed to save stats; player stays on court"
            );
            Err(err.into())
        }
    }
}

/// Add `delta` to one counter of an on-court player; counters never drop below zero.
pub async fn adjust_stat(
    state: &SharedState,
    caller: &UserEntity,
    player_id: Uuid,
    request: AdjustStatRequest,
) -> Result<AdjustStatResponse, ServiceError> {
    ensure_live(state).await?;
    let value = {
        let mut guard = state.session().write().await;
        let session = owned_session_mut(&mut guard, caller)?;
        session.adjust_stat(player_id, request.stat.into(), request.delta)?
    };
    broadcast_session_snapshot(state).await;
    Ok(AdjustStatResponse {
        player_id,
        stat: request.stat,
        value,
    })
}

async fn ensure_live(state: &SharedState) -> Result<(), ServiceError> {
    match state.phase().await {
        SessionPhase::Live => Ok(()),
        SessionPhase::Idle => Err(ServiceError::InvalidState("no game is open".into())),
        SessionPhase::Final => Err(ServiceError::InvalidState(
            "the game is over; reset the clock to keep tracking".into(),
        )),
    }
}

async fn ensure_owner(state: &SharedState, caller: &UserEntity) -> Result<(), ServiceError> {
    let guard = state.session().read().await;
    owned_session(&guard, caller).map(|_| ())
}

fn owned_session<'a>(
    slot: &'a Option<GameSession>,
    caller: &UserEntity,
) -> Result<&'a GameSession, ServiceError> {
    match slot {
        Some(session) if session.game().team_id == caller.team_id => Ok(session),
        Some(_) => Err(ServiceError::InvalidState(
            "the scoreboard is in use by another team".into(),
        )),
        None => Err(ServiceError::InvalidState("no game is open".into())),
    }
}

fn owned_session_mut<'a>(
    slot: &'a mut Option<GameSession>,
    caller: &UserEntity,
) -> Result<&'a mut GameSession, ServiceError> {
    owned_session(slot, caller)?;
    slot.as_mut()
        .ok_or_else(|| ServiceError::InvalidState("no game is open".into()))
}

fn stat_line(game_id: Uuid, player_id: Uuid, stats: StatLine) -> StatLineEntity {
    StatLineEntity {
        game_id,
        player_id,
        points: stats.points,
        rebounds: stats.rebounds,
        assists: stats.assists,
        seconds_played: stats.seconds_played,
        recorded_at: SystemTime::now(),
    }
}

/// Upsert a stat line, retrying with exponential backoff. Writes are keyed by game and
/// player, so a retry after an ambiguous failure cannot duplicate the line.
async fn persist_with_retry(
    store: &Arc<dyn LeagueStore>,
    policy: &FlushPolicy,
    line: StatLineEntity,
) -> Result<(), StorageError> {
    let mut attempt = 1;
    loop {
        match store.save_stat_line(line.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    attempt,
                    player_id = %line.player_id,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "stat line write failed; retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Freeze and save every on-court entry. Saved entries leave the court; failed ones are
/// thawed and the first failure is returned.
async fn flush_all(state: &SharedState, store: &Arc<dyn LeagueStore>) -> Result<usize, ServiceError> {
    let (game_id, pending) = {
        let mut guard = state.session().write().await;
        let Some(session) = guard.as_mut() else {
            return Ok(0);
        };
        (session.game().id, session.begin_flush_all())
    };

    let policy = state.config().flush.clone();
    let mut saved = 0;
    let mut first_failure = None;
    for (player_id, stats) in pending {
        let result = persist_with_retry(store, &policy, stat_line(game_id, player_id, stats)).await;
        let mut guard = state.session().write().await;
        let Some(session) = guard.as_mut() else {
            continue;
        };
        match result {
            Ok(()) => {
                session.finish_flush(player_id);
                saved += 1;
            }
            Err(err) => {
                warn!(player_id = %player_id, error = %err, "failed to save stats");
                session.abort_flush(player_id);
                first_failure.get_or_insert(err);
            }
        }
    }

    match first_failure {
        Some(err) => Err(err.into()),
        None => Ok(saved),
    }
}

/// Thaw entries left frozen by a failed or timed out bulk flush.
async fn settle_bulk_flush(
    state: &SharedState,
    outcome: Result<usize, ServiceError>,
) -> Result<usize, ServiceError> {
    if outcome.is_err() {
        if let Some(session) = state.session().write().await.as_mut() {
            session.abort_all_flushes();
        }
        broadcast_session_snapshot(state).await;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use crate::{
        dao::{league_store::LeagueStore, models::GameEntity},
        dto::session::{StatKindDto, VisibleSessionPhase},
        services::clock,
        state::session::{MAX_ACTIVE_PLAYERS, TickOutcome},
        test_support::{registered_caller, seed_game, seed_player, test_state},
    };

    use super::*;

    async fn live_game(state: &SharedState, caller: &UserEntity, minutes: u32) -> GameEntity {
        let store = state.require_store().await.unwrap();
        let game = seed_game(store.as_ref(), caller, minutes).await;
        open_session(state, caller, game.id).await.unwrap();
        game
    }

    fn adjust(stat: StatKindDto, delta: i32) -> AdjustStatRequest {
        AdjustStatRequest { stat, delta }
    }

    #[tokio::test]
    async fn opening_builds_a_paused_session_with_the_full_duration() {
        let (state, _store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let store = state.require_store().await.unwrap();
        let game = seed_game(store.as_ref(), &caller, 20).await;

        let snapshot = open_session(&state, &caller, game.id).await.unwrap();

        assert_eq!(snapshot.phase, VisibleSessionPhase::Live);
        let clock = snapshot.clock.unwrap();
        assert!(!clock.running);
        assert_eq!(clock.time_left_secs, 20 * 60);
        assert!(matches!(
            open_session(&state, &caller, game.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn opening_a_foreign_game_is_not_found() {
        let (state, store) = test_state().await;
        let owner = registered_caller(&state, "owner@example.com").await;
        let other = registered_caller(&state, "other@example.com").await;
        let game = seed_game(&store, &owner, 32).await;

        assert!(matches!(
            open_session(&state, &other, game.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(state.phase().await, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn thirty_seconds_and_three_adjustments() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        live_game(&state, &caller, 32).await;
        let player = seed_player(&store, &caller, "Mia").await;

        control_clock(&state, &caller, ClockCommand::Start).await.unwrap();
        add_active(&state, &caller, player.id).await.unwrap();
        for _ in 0..30 {
            assert_eq!(clock::tick_once(&state).await, TickOutcome::Advanced);
        }
        for delta in [1, 1, -1] {
            adjust_stat(&state, &caller, player.id, adjust(StatKindDto::Points, delta))
                .await
                .unwrap();
        }

        let snapshot = snapshot(&state).await;
        assert_eq!(snapshot.players[0].points, 1);
        assert_eq!(snapshot.players[0].seconds_on_court, 30);
    }

    #[tokio::test]
    async fn counters_never_drop_below_zero() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        live_game(&state, &caller, 32).await;
        let player = seed_player(&store, &caller, "Mia").await;
        add_active(&state, &caller, player.id).await.unwrap();

        let response = adjust_stat(&state, &caller, player.id, adjust(StatKindDto::Rebounds, -3))
            .await
            .unwrap();
        assert_eq!(response.value, 0);
    }

    #[tokio::test]
    async fn a_sixth_player_is_rejected() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        live_game(&state, &caller, 32).await;

        for index in 0..MAX_ACTIVE_PLAYERS {
            let player = seed_player(&store, &caller, &format!("P{index}")).await;
            add_active(&state, &caller, player.id).await.unwrap();
        }
        let sixth = seed_player(&store, &caller, "P6").await;

        assert!(matches!(
            add_active(&state, &caller, sixth.id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert_eq!(snapshot(&state).await.players.len(), MAX_ACTIVE_PLAYERS);
    }

    #[tokio::test]
    async fn removal_saves_the_line_and_re_add_resumes_from_it() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = live_game(&state, &caller, 32).await;
        let player = seed_player(&store, &caller, "Mia").await;

        control_clock(&state, &caller, ClockCommand::Start).await.unwrap();
        add_active(&state, &caller, player.id).await.unwrap();
        for _ in 0..12 {
            clock::tick_once(&state).await;
        }
        adjust_stat(&state, &caller, player.id, adjust(StatKindDto::Assists, 2))
            .await
            .unwrap();

        let after_remove = remove_active(&state, &caller, player.id).await.unwrap();
        assert!(after_remove.players.is_empty());
        let saved = store.find_stat_line(game.id, player.id).await.unwrap().unwrap();
        assert_eq!(saved.assists, 2);
        assert_eq!(saved.seconds_played, 12);

        let after_add = add_active(&state, &caller, player.id).await.unwrap();
        assert_eq!(after_add.players[0].assists, 2);
        assert_eq!(after_add.players[0].seconds_on_court, 12);
    }

    #[tokio::test]
    async fn failed_flush_keeps_the_player_on_court() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = live_game(&state, &caller, 32).await;
        let player = seed_player(&store, &caller, "Mia").await;
        add_active(&state, &caller, player.id).await.unwrap();
        adjust_stat(&state, &caller, player.id, adjust(StatKindDto::Points, 3))
            .await
            .unwrap();

        store.fail_next_stat_writes(state.config().flush.max_attempts);
        let err = remove_active(&state, &caller, player.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        let snapshot = snapshot(&state).await;
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].points, 3);
        assert!(!snapshot.players[0].flushing);
        assert!(store.find_stat_line(game.id, player.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retried_flush_writes_a_single_line() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = live_game(&state, &caller, 32).await;
        let player = seed_player(&store, &caller, "Mia").await;
        add_active(&state, &caller, player.id).await.unwrap();

        store.fail_next_stat_writes(state.config().flush.max_attempts - 1);
        remove_active(&state, &caller, player.id).await.unwrap();

        assert_eq!(store.list_stat_lines(game.id).await.unwrap().len(), 1);
        assert!(snapshot(&state).await.players.is_empty());
    }

    #[tokio::test]
    async fn reset_zeroes_time_but_keeps_counters() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = live_game(&state, &caller, 32).await;
        let player = seed_player(&store, &caller, "Mia").await;
        control_clock(&state, &caller, ClockCommand::Start).await.unwrap();
        add_active(&state, &caller, player.id).await.unwrap();
        for _ in 0..45 {
            clock::tick_once(&state).await;
        }
        adjust_stat(&state, &caller, player.id, adjust(StatKindDto::Points, 4))
            .await
            .unwrap();

        let snapshot = reset_clock(&state, &caller).await.unwrap();

        let clock = snapshot.clock.unwrap();
        assert!(!clock.running);
        assert_eq!(clock.elapsed_secs, 0);
        assert_eq!(clock.time_left_secs, 32 * 60);
        assert_eq!(snapshot.players[0].seconds_on_court, 0);
        assert_eq!(snapshot.players[0].points, 4);
        assert!(store.find_stat_line(game.id, player.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expiry_flushes_everyone_and_finalizes() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = live_game(&state, &caller, 1).await;
        let mia = seed_player(&store, &caller, "Mia").await;
        let noah = seed_player(&store, &caller, "Noah").await;
        add_active(&state, &caller, mia.id).await.unwrap();
        add_active(&state, &caller, noah.id).await.unwrap();
        control_clock(&state, &caller, ClockCommand::Start).await.unwrap();

        let mut last = TickOutcome::Idle;
        for _ in 0..60 {
            last = clock::tick_once(&state).await;
        }
        assert_eq!(last, TickOutcome::Expired);
        finalize(&state).await.unwrap();

        let snapshot = snapshot(&state).await;
        assert_eq!(snapshot.phase, VisibleSessionPhase::Final);
        assert!(!snapshot.clock.unwrap().running);
        assert!(snapshot.players.is_empty());
        let lines = store.list_stat_lines(game.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|line| line.seconds_played == 60));
        assert!(matches!(
            add_active(&state, &caller, mia.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn failed_finalize_stays_live_and_thaws_entries() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        live_game(&state, &caller, 32).await;
        let mia = seed_player(&store, &caller, "Mia").await;
        add_active(&state, &caller, mia.id).await.unwrap();

        store.fail_next_stat_writes(state.config().flush.max_attempts);
        assert!(finalize(&state).await.is_err());

        let snapshot = snapshot(&state).await;
        assert_eq!(snapshot.phase, VisibleSessionPhase::Live);
        assert_eq!(snapshot.players.len(), 1);
        assert!(!snapshot.players[0].flushing);
    }

    #[tokio::test]
    async fn closing_saves_remaining_players_and_returns_to_idle() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = live_game(&state, &caller, 32).await;
        let mia = seed_player(&store, &caller, "Mia").await;
        add_active(&state, &caller, mia.id).await.unwrap();

        let snapshot = close_session(&state, &caller).await.unwrap();

        assert_eq!(snapshot.phase, VisibleSessionPhase::Idle);
        assert!(snapshot.game.is_none());
        assert!(store.find_stat_line(game.id, mia.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn other_teams_cannot_drive_the_scoreboard() {
        let (state, _store) = test_state().await;
        let owner = registered_caller(&state, "owner@example.com").await;
        let other = registered_caller(&state, "other@example.com").await;
        live_game(&state, &owner, 32).await;

        assert!(matches!(
            control_clock(&state, &other, ClockCommand::Start).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            close_session(&state, &other).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn on_court_players_cannot_be_deleted() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = live_game(&state, &caller, 32).await;
        let mia = seed_player(&store, &caller, "Mia").await;
        add_active(&state, &caller, mia.id).await.unwrap();

        assert!(matches!(
            roster_service::delete_player(&state, &caller, mia.id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            game_service::delete_game(&state, &caller, game.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }
}
