use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{SiteDataEntity, SubscriptionStatus, TeamEntity, UserEntity},
    dto::{
        site_data::{SiteDataResponse, UpdateSiteDataRequest},
        user::{RegisterUserRequest, RegistrationResponse, TeamSummary, UserSummary},
    },
    error::ServiceError,
    services::{game_service, roster_service},
    state::SharedState,
};

/// Canonical form of an identity email: trimmed and lowercased. `None` when blank.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Load the registered user behind an identity email.
pub async fn resolve_caller(state: &SharedState, email: &str) -> Result<UserEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_user_by_email(email.to_owned())
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(format!("no user registered for `{email}`")))
}

/// Create a user and the team they own.
pub async fn register(
    state: &SharedState,
    email: String,
    request: RegisterUserRequest,
) -> Result<RegistrationResponse, ServiceError> {
    let store = state.require_store().await?;
    if store.find_user_by_email(email.clone()).await?.is_some() {
        return Err(ServiceError::InvalidState(format!(
            "`{email}` is already registered"
        )));
    }

    let now = SystemTime::now();
    let user_id = Uuid::new_v4();
    let team = TeamEntity {
        id: Uuid::new_v4(),
        name: request.team_name.trim().to_owned(),
        owner_id: user_id,
        created_at: now,
    };
    let user = UserEntity {
        id: user_id,
        email,
        team_id: team.id,
        subscription: SubscriptionStatus::Inactive,
        created_at: now,
    };

    // The user references the team, so the team is written first.
    store.save_team(team.clone()).await?;
    store.save_user(user.clone()).await?;
    info!(user_id = %user.id, team_id = %team.id, "registered user");

    Ok(RegistrationResponse {
        user: user.into(),
        team: team.into(),
    })
}

/// Users of the caller's team.
pub async fn list_users(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<Vec<UserSummary>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_users()
        .await?
        .into_iter()
        .filter(|user| user.team_id == caller.team_id)
        .map(Into::into)
        .collect())
}

/// Teams owned by the caller.
pub async fn list_teams(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<Vec<TeamSummary>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_teams()
        .await?
        .into_iter()
        .filter(|team| team.id == caller.team_id)
        .map(Into::into)
        .collect())
}

/// Current selection of the caller; an empty selection when none was saved yet.
pub async fn get_site_data(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<SiteDataResponse, ServiceError> {
    let store = state.require_store().await?;
    let data = store
        .find_site_data(caller.id)
        .await?
        .unwrap_or_else(|| SiteDataEntity {
            user_id: caller.id,
            team_id: caller.team_id,
            game_id: None,
            player_id: None,
            updated_at: caller.created_at,
        });
    Ok(data.into())
}

/// Replace the caller's selection. Selected records must belong to the caller's team.
pub async fn update_site_data(
    state: &SharedState,
    caller: &UserEntity,
    request: UpdateSiteDataRequest,
) -> Result<SiteDataResponse, ServiceError> {
    let store = state.require_store().await?;
    if let Some(game_id) = request.game_id {
        game_service::owned_game(store.as_ref(), caller, game_id).await?;
    }
    if let Some(player_id) = request.player_id {
        roster_service::owned_player(store.as_ref(), caller, player_id).await?;
    }

    let data = SiteDataEntity {
        user_id: caller.id,
        team_id: caller.team_id,
        game_id: request.game_id,
        player_id: request.player_id,
        updated_at: SystemTime::now(),
    };
    store.save_site_data(data.clone()).await?;
    Ok(data.into())
}

/// Persist a new subscription status for `user`.
pub async fn set_subscription(
    state: &SharedState,
    mut user: UserEntity,
    status: SubscriptionStatus,
) -> Result<UserEntity, ServiceError> {
    if user.subscription == status {
        return Ok(user);
    }
    let store = state.require_store().await?;
    user.subscription = status;
    store.save_user(user.clone()).await?;
    info!(user_id = %user.id, subscription = ?status, "subscription status changed");
    Ok(user)
}
