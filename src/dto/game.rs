use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::GameEntity,
    dto::{format_system_time, validation::validate_not_blank},
};

/// Payload creating a game against an opponent.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    #[validate(length(min = 1, max = 100), custom(function = validate_not_blank))]
    pub opponent: String,
    /// Duration in minutes; the configured default applies when omitted.
    #[serde(default)]
    #[validate(range(min = 1, max = 180))]
    pub duration_minutes: Option<u32>,
}

/// Stored game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSummary {
    pub id: Uuid,
    pub team_id: Uuid,
    pub opponent: String,
    pub duration_minutes: u32,
    pub created_at: String,
}

impl From<GameEntity> for GameSummary {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            opponent: value.opponent,
            duration_minutes: value.duration_minutes,
            created_at: format_system_time(value.created_at),
        }
    }
}
