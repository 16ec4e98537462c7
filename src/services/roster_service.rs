use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        league_store::LeagueStore,
        models::{PlayerEntity, UserEntity},
    },
    dto::{
        roster::{CreatePlayerRequest, PlayerSummary},
        stats::StatLineSummary,
    },
    error::ServiceError,
    services::game_service,
    state::SharedState,
};

/// Load a player that belongs to the caller's team; foreign players are reported as missing.
pub(crate) async fn owned_player(
    store: &dyn LeagueStore,
    caller: &UserEntity,
    id: Uuid,
) -> Result<PlayerEntity, ServiceError> {
    match store.find_player(id).await? {
        Some(player) if player.team_id == caller.team_id => Ok(player),
        _ => Err(ServiceError::NotFound(format!("player `{id}` not found"))),
    }
}

/// Roster of a team, served from the cache when possible.
pub(crate) async fn team_roster(
    state: &SharedState,
    team_id: Uuid,
) -> Result<Vec<PlayerEntity>, ServiceError> {
    if let Some(players) = state.roster().get(team_id) {
        return Ok(players);
    }
    let store = state.require_store().await?;
    let players = store.list_players(team_id).await?;
    debug!(team_id = %team_id, count = players.len(), "roster cache filled");
    state.roster().fill(team_id, players.clone());
    Ok(players)
}

/// Players of the caller's team, oldest first.
pub async fn list_players(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<Vec<PlayerSummary>, ServiceError> {
    Ok(team_roster(state, caller.team_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Add a player to the caller's roster.
pub async fn create_player(
    state: &SharedState,
    caller: &UserEntity,
    request: CreatePlayerRequest,
) -> Result<PlayerSummary, ServiceError> {
    let store = state.require_store().await?;
    let player = PlayerEntity {
        id: Uuid::new_v4(),
        team_id: caller.team_id,
        name: request.name.trim().to_owned(),
        created_at: SystemTime::now(),
    };
    store.save_player(player.clone()).await?;
    state.roster().invalidate(caller.team_id);
    info!(player_id = %player.id, team_id = %player.team_id, "player added to roster");
    Ok(player.into())
}

/// Remove a player from the roster. Players on court cannot be removed.
pub async fn delete_player(
    state: &SharedState,
    caller: &UserEntity,
    id: Uuid,
) -> Result<(), ServiceError> {
    let _gate = state.session_gate().lock().await;
    let store = state.require_store().await?;
    owned_player(store.as_ref(), caller, id).await?;

    let on_court = state
        .session()
        .read()
        .await
        .as_ref()
        .is_some_and(|session| session.is_active(id));
    if on_court {
        return Err(ServiceError::InvalidState(format!(
            "player `{id}` is on court; remove them from the active roster first"
        )));
    }

    let deleted = store.delete_player(id).await?;
    state.roster().invalidate(caller.team_id);
    if !deleted {
        return Err(ServiceError::NotFound(format!("player `{id}` not found")));
    }
    info!(player_id = %id, "player removed from roster");
    Ok(())
}

/// Latest stat line of a player for a game.
pub async fn player_stats(
    state: &SharedState,
    caller: &UserEntity,
    player_id: Uuid,
    game_id: Uuid,
) -> Result<StatLineSummary, ServiceError> {
    let store = state.require_store().await?;
    owned_player(store.as_ref(), caller, player_id).await?;
    game_service::owned_game(store.as_ref(), caller, game_id).await?;
    store
        .find_stat_line(game_id, player_id)
        .await?
        .map(Into::into)
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "no stats recorded for player `{player_id}` in game `{game_id}`"
            ))
        })
}
