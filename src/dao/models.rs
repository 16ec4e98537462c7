use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Billing state of a user's subscription to the communication feature.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed, or the subscription lapsed.
    #[default]
    Inactive,
    /// A paid subscription is running.
    Active,
    /// The payment processor reported the subscription as deleted.
    Canceled,
}

/// Registered coach account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Email reported by the identity provider (unique).
    pub email: String,
    /// Team owned by this user.
    pub team_id: Uuid,
    /// Current subscription status.
    pub subscription: SubscriptionStatus,
    /// Registration timestamp.
    pub created_at: SystemTime,
}

/// Team registered alongside its owning user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name of the team.
    pub name: String,
    /// User that registered the team.
    pub owner_id: Uuid,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// A single match against an opponent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Team playing the game.
    pub team_id: Uuid,
    /// Name of the opposing team.
    pub opponent: String,
    /// Configured game duration in minutes.
    pub duration_minutes: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Rostered player, independent of any single game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier for the player.
    pub id: Uuid,
    /// Team the player belongs to.
    pub team_id: Uuid,
    /// Display name of the player.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Persisted stat record of one player for one game.
///
/// At most one line exists per `(game_id, player_id)`: every write replaces the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatLineEntity {
    /// Game the stats were recorded in.
    pub game_id: Uuid,
    /// Player the stats belong to.
    pub player_id: Uuid,
    /// Points scored.
    pub points: u32,
    /// Rebounds grabbed.
    pub rebounds: u32,
    /// Assists made.
    pub assists: u32,
    /// Time spent on court, in seconds.
    pub seconds_played: u32,
    /// Last time the line was written.
    pub recorded_at: SystemTime,
}

/// Record of an email sent to parents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailLogEntity {
    /// Stable identifier for the log entry.
    pub id: Uuid,
    /// Team the email was sent on behalf of.
    pub team_id: Uuid,
    /// Sender address used for delivery.
    pub sender: String,
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Email subject.
    pub subject: String,
    /// Email body.
    pub message: String,
    /// Name of the attached file, if any.
    pub attachment_name: Option<String>,
    /// Sending timestamp.
    pub created_at: SystemTime,
}

/// Per-user pointer to the currently selected team, game and player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteDataEntity {
    /// Owner of the record (one record per user).
    pub user_id: Uuid,
    /// Selected team.
    pub team_id: Uuid,
    /// Selected game, if any.
    pub game_id: Option<Uuid>,
    /// Selected player, if any.
    pub player_id: Option<Uuid>,
    /// Last update timestamp.
    pub updated_at: SystemTime,
}

/// Composite key under which a stat line is stored.
pub fn stat_line_key(game_id: Uuid, player_id: Uuid) -> String {
    format!("{game_id}:{player_id}")
}
