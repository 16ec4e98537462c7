use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    EmailLogEntity, GameEntity, PlayerEntity, SiteDataEntity, StatLineEntity, SubscriptionStatus,
    TeamEntity, UserEntity, stat_line_key,
};

pub const USERS: &str = "users";
pub const TEAMS: &str = "teams";
pub const GAMES: &str = "games";
pub const PLAYERS: &str = "players";
pub const STAT_LINES: &str = "stat_lines";
pub const EMAIL_LOGS: &str = "email_logs";
pub const SITE_DATA: &str = "site_data";

fn parse_id(collection: &'static str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|source| MongoDaoError::InvalidId {
        collection,
        id: raw.to_owned(),
        source,
    })
}

fn parse_optional_id(collection: &'static str, raw: Option<&str>) -> MongoResult<Option<Uuid>> {
    raw.map(|raw| parse_id(collection, raw)).transpose()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    team_id: String,
    #[serde(default)]
    subscription: SubscriptionStatus,
    created_at: DateTime,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id.to_string(),
            email: value.email,
            team_id: value.team_id.to_string(),
            subscription: value.subscription,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoUserDocument> for UserEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoUserDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(USERS, &value.id)?,
            email: value.email,
            team_id: parse_id(USERS, &value.team_id)?,
            subscription: value.subscription,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    owner_id: String,
    created_at: DateTime,
}

impl From<TeamEntity> for MongoTeamDocument {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            owner_id: value.owner_id.to_string(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoTeamDocument> for TeamEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoTeamDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(TEAMS, &value.id)?,
            name: value.name,
            owner_id: parse_id(TEAMS, &value.owner_id)?,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    team_id: String,
    opponent: String,
    duration_minutes: u32,
    created_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            team_id: value.team_id.to_string(),
            opponent: value.opponent,
            duration_minutes: value.duration_minutes,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(GAMES, &value.id)?,
            team_id: parse_id(GAMES, &value.team_id)?,
            opponent: value.opponent,
            duration_minutes: value.duration_minutes,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    team_id: String,
    name: String,
    created_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            team_id: value.team_id.to_string(),
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PLAYERS, &value.id)?,
            team_id: parse_id(PLAYERS, &value.team_id)?,
            name: value.name,
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// Stat line keyed by `game_id:player_id` so that writes replace each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatLineDocument {
    #[serde(rename = "_id")]
    id: String,
    game_id: String,
    player_id: String,
    points: u32,
    rebounds: u32,
    assists: u32,
    seconds_played: u32,
    recorded_at: DateTime,
}

impl From<StatLineEntity> for MongoStatLineDocument {
    fn from(value: StatLineEntity) -> Self {
        Self {
            id: stat_line_key(value.game_id, value.player_id),
            game_id: value.game_id.to_string(),
            player_id: value.player_id.to_string(),
            points: value.points,
            rebounds: value.rebounds,
            assists: value.assists,
            seconds_played: value.seconds_played,
            recorded_at: DateTime::from_system_time(value.recorded_at),
        }
    }
}

impl TryFrom<MongoStatLineDocument> for StatLineEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoStatLineDocument) -> MongoResult<Self> {
        Ok(Self {
            game_id: parse_id(STAT_LINES, &value.game_id)?,
            player_id: parse_id(STAT_LINES, &value.player_id)?,
            points: value.points,
            rebounds: value.rebounds,
            assists: value.assists,
            seconds_played: value.seconds_played,
            recorded_at: value.recorded_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEmailLogDocument {
    #[serde(rename = "_id")]
    id: String,
    team_id: String,
    sender: String,
    recipients: Vec<String>,
    subject: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attachment_name: Option<String>,
    created_at: DateTime,
}

impl From<EmailLogEntity> for MongoEmailLogDocument {
    fn from(value: EmailLogEntity) -> Self {
        Self {
            id: value.id.to_string(),
            team_id: value.team_id.to_string(),
            sender: value.sender,
            recipients: value.recipients,
            subject: value.subject,
            message: value.message,
            attachment_name: value.attachment_name,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoEmailLogDocument> for EmailLogEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoEmailLogDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(EMAIL_LOGS, &value.id)?,
            team_id: parse_id(EMAIL_LOGS, &value.team_id)?,
            sender: value.sender,
            recipients: value.recipients,
            subject: value.subject,
            message: value.message,
            attachment_name: value.attachment_name,
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// One document per user, keyed by the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSiteDataDocument {
    #[serde(rename = "_id")]
    user_id: String,
    team_id: String,
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    player_id: Option<String>,
    updated_at: DateTime,
}

impl From<SiteDataEntity> for MongoSiteDataDocument {
    fn from(value: SiteDataEntity) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            team_id: value.team_id.to_string(),
            game_id: value.game_id.map(|id| id.to_string()),
            player_id: value.player_id.map(|id| id.to_string()),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoSiteDataDocument> for SiteDataEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSiteDataDocument) -> MongoResult<Self> {
        Ok(Self {
            user_id: parse_id(SITE_DATA, &value.user_id)?,
            team_id: parse_id(SITE_DATA, &value.team_id)?,
            game_id: parse_optional_id(SITE_DATA, value.game_id.as_deref())?,
            player_id: parse_optional_id(SITE_DATA, value.player_id.as_deref())?,
            updated_at: value.updated_at.to_system_time(),
        })
    }
}
