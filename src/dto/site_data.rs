use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::SiteDataEntity, dto::format_system_time};

/// Selection pointers of the caller. Omitted fields clear the selection.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateSiteDataRequest {
    #[serde(default)]
    pub game_id: Option<Uuid>,
    #[serde(default)]
    pub player_id: Option<Uuid>,
}

/// Current selection of the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct SiteDataResponse {
    pub team_id: Uuid,
    pub game_id: Option<Uuid>,
    pub player_id: Option<Uuid>,
    pub updated_at: String,
}

impl From<SiteDataEntity> for SiteDataResponse {
    fn from(value: SiteDataEntity) -> Self {
        Self {
            team_id: value.team_id,
            game_id: value.game_id,
            player_id: value.player_id,
            updated_at: format_system_time(value.updated_at),
        }
    }
}
