use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::{
    EmailLogEntity, GameEntity, PlayerEntity, SiteDataEntity, StatLineEntity, TeamEntity,
    UserEntity, stat_line_key,
};

pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// Entity stored in the shared database under a type prefix.
pub trait CouchEntity: Serialize + for<'de> Deserialize<'de> + Send + 'static {
    /// Prefix shared by every document of this type, e.g. `game::`.
    const PREFIX: &'static str;

    /// Suffix appended to [`Self::PREFIX`] to build the document id.
    fn key(&self) -> String;

    fn doc_id(&self) -> String {
        format!("{}{}", Self::PREFIX, self.key())
    }
}

/// Build a document id from a prefix and key.
pub fn doc_id<T: CouchEntity>(key: impl std::fmt::Display) -> String {
    format!("{}{}", T::PREFIX, key)
}

/// Envelope adding CouchDB bookkeeping fields around an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T: CouchEntity> CouchDocument<T> {
    pub fn new(body: T, rev: Option<String>) -> Self {
        Self {
            id: body.doc_id(),
            rev,
            body,
        }
    }
}

impl CouchEntity for UserEntity {
    const PREFIX: &'static str = "user::";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl CouchEntity for TeamEntity {
    const PREFIX: &'static str = "team::";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl CouchEntity for GameEntity {
    const PREFIX: &'static str = "game::";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl CouchEntity for PlayerEntity {
    const PREFIX: &'static str = "player::";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl CouchEntity for StatLineEntity {
    const PREFIX: &'static str = "stat::";

    fn key(&self) -> String {
        stat_line_key(self.game_id, self.player_id)
    }
}

impl CouchEntity for EmailLogEntity {
    const PREFIX: &'static str = "email::";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl CouchEntity for SiteDataEntity {
    const PREFIX: &'static str = "site::";

    fn key(&self) -> String {
        self.user_id.to_string()
    }
}

/// Prefix selecting every stat line of one game.
pub fn game_stats_prefix(game_id: Uuid) -> String {
    format!("{}{game_id}:", StatLineEntity::PREFIX)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn stat_line_ids_group_by_game() {
        let game_id = Uuid::new_v4();
        let line = StatLineEntity {
            game_id,
            player_id: Uuid::new_v4(),
            points: 4,
            rebounds: 1,
            assists: 0,
            seconds_played: 90,
            recorded_at: SystemTime::now(),
        };

        let document = CouchDocument::new(line, None);
        assert!(document.id.starts_with(&game_stats_prefix(game_id)));
    }

    #[test]
    fn envelope_flattens_entity_fields() {
        let player = PlayerEntity {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            name: "Ava".into(),
            created_at: SystemTime::now(),
        };
        let document = CouchDocument::new(player.clone(), Some("1-abc".into()));

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["_id"], format!("player::{}", player.id));
        assert_eq!(value["_rev"], "1-abc");
        assert_eq!(value["name"], "Ava");

        let back: CouchDocument<PlayerEntity> = serde_json::from_value(value).unwrap();
        assert_eq!(back.body, player);
    }
}
