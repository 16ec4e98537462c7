use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{dao::models::StatLineEntity, dto::format_system_time};

/// Direct write of a stat line, replacing any previous one of the same game and player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RecordStatLineRequest {
    pub game_id: Uuid,
    pub player_id: Uuid,
    #[serde(default)]
    #[validate(range(max = 500))]
    pub points: u32,
    #[serde(default)]
    #[validate(range(max = 500))]
    pub rebounds: u32,
    #[serde(default)]
    #[validate(range(max = 500))]
    pub assists: u32,
    #[serde(default)]
    #[validate(range(max = 10_800))]
    pub seconds_played: u32,
}

/// Persisted stat line.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatLineSummary {
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub points: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub seconds_played: u32,
    pub recorded_at: String,
}

impl From<StatLineEntity> for StatLineSummary {
    fn from(value: StatLineEntity) -> Self {
        Self {
            game_id: value.game_id,
            player_id: value.player_id,
            points: value.points,
            rebounds: value.rebounds,
            assists: value.assists,
            seconds_played: value.seconds_played,
            recorded_at: format_system_time(value.recorded_at),
        }
    }
}

/// One player's row of a box score.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoxScoreRow {
    pub player_id: Uuid,
    /// Roster name, or `None` when the player has since been deleted.
    pub name: Option<String>,
    pub points: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub seconds_played: u32,
}

/// Team totals of a box score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BoxScoreTotals {
    pub points: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub seconds_played: u32,
}

/// Box score of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoxScoreResponse {
    pub game_id: Uuid,
    pub opponent: String,
    pub rows: Vec<BoxScoreRow>,
    pub totals: BoxScoreTotals,
}
