use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerEntity,
    dto::{format_system_time, validation::validate_not_blank},
};

/// Payload adding a player to the caller's roster.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePlayerRequest {
    #[validate(length(min = 1, max = 80), custom(function = validate_not_blank))]
    pub name: String,
}

/// Rostered player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub created_at: String,
}

impl From<PlayerEntity> for PlayerSummary {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            name: value.name,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Selects the game a player's stat line is read from.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlayerStatsQuery {
    pub game_id: Uuid,
}
