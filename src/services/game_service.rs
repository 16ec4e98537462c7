use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        league_store::LeagueStore,
        models::{GameEntity, UserEntity},
    },
    dto::game::{CreateGameRequest, GameSummary},
    error::ServiceError,
    state::SharedState,
};

/// Load a game that belongs to the caller's team; foreign games are reported as missing.
pub(crate) async fn owned_game(
    store: &dyn LeagueStore,
    caller: &UserEntity,
    id: Uuid,
) -> Result<GameEntity, ServiceError> {
    match store.find_game(id).await? {
        Some(game) if game.team_id == caller.team_id => Ok(game),
        _ => Err(ServiceError::NotFound(format!("game `{id}` not found"))),
    }
}

/// Store a new game for the caller's team.
pub async fn create_game(
    state: &SharedState,
    caller: &UserEntity,
    request: CreateGameRequest,
) -> Result<GameSummary, ServiceError> {
    let store = state.require_store().await?;
    let game = GameEntity {
        id: Uuid::new_v4(),
        team_id: caller.team_id,
        opponent: request.opponent.trim().to_owned(),
        duration_minutes: request
            .duration_minutes
            .unwrap_or(state.config().session.default_duration_minutes),
        created_at: SystemTime::now(),
    };
    store.save_game(game.clone()).await?;
    info!(game_id = %game.id, opponent = %game.opponent, "game created");
    Ok(game.into())
}

/// Games of the caller's team, oldest first.
pub async fn list_games(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<Vec<GameSummary>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_games(caller.team_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// One of the caller's games.
pub async fn get_game(
    state: &SharedState,
    caller: &UserEntity,
    id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let store = state.require_store().await?;
    Ok(owned_game(store.as_ref(), caller, id).await?.into())
}

/// Delete a game and its stat lines. The game open on the scoreboard cannot be deleted.
pub async fn delete_game(
    state: &SharedState,
    caller: &UserEntity,
    id: Uuid,
) -> Result<(), ServiceError> {
    let _gate = state.session_gate().lock().await;
    let store = state.require_store().await?;
    owned_game(store.as_ref(), caller, id).await?;

    let open_game = state
        .session()
        .read()
        .await
        .as_ref()
        .map(|session| session.game().id);
    if open_game == Some(id) {
        return Err(ServiceError::InvalidState(
            "the game is open on the scoreboard; close it first".into(),
        ));
    }

    if !store.delete_game(id).await? {
        return Err(ServiceError::NotFound(format!("game `{id}` not found")));
    }
    info!(game_id = %id, "game and stat lines deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::test_support::{registered_caller, test_state};

    use super::*;

    #[tokio::test]
    async fn duration_defaults_to_configuration() {
        let (state, _store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;

        let game = create_game(
            &state,
            &caller,
            CreateGameRequest {
                opponent: "Hornets".into(),
                duration_minutes: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            game.duration_minutes,
            state.config().session.default_duration_minutes
        );
        assert_eq!(list_games(&state, &caller).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn games_of_other_teams_are_invisible() {
        let (state, _store) = test_state().await;
        let owner = registered_caller(&state, "owner@example.com").await;
        let other = registered_caller(&state, "other@example.com").await;
        let game = create_game(
            &state,
            &owner,
            CreateGameRequest {
                opponent: "Hornets".into(),
                duration_minutes: Some(20),
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            get_game(&state, &other, game.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            delete_game(&state, &other, game.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(list_games(&state, &other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_twice_reports_not_found() {
        let (state, _store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = create_game(
            &state,
            &caller,
            CreateGameRequest {
                opponent: "Hornets".into(),
                duration_minutes: None,
            },
        )
        .await
        .unwrap();

        delete_game(&state, &caller, game.id).await.unwrap();
        assert!(matches!(
            delete_game(&state, &caller, game.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
