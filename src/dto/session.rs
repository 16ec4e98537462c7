use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    session::{ActivePlayerEntry, CurrentGame, GameClock, SessionSnapshot, StatKind},
    state_machine::SessionPhase,
};

/// Opens the scoreboard on a stored game.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenSessionRequest {
    pub game_id: Uuid,
}

/// Puts a rostered player on court.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddActivePlayerRequest {
    pub player_id: Uuid,
}

/// Counter names accepted by the stat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatKindDto {
    Points,
    Rebounds,
    Assists,
}

impl From<StatKindDto> for StatKind {
    fn from(value: StatKindDto) -> Self {
        match value {
            StatKindDto::Points => StatKind::Points,
            StatKindDto::Rebounds => StatKind::Rebounds,
            StatKindDto::Assists => StatKind::Assists,
        }
    }
}

/// Adds `delta` (possibly negative) to one counter of an on-court player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStatRequest {
    pub stat: StatKindDto,
    pub delta: i32,
}

/// Result of a stat adjustment.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustStatResponse {
    pub player_id: Uuid,
    pub stat: StatKindDto,
    pub value: u32,
}

/// Lifecycle phase exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSessionPhase {
    Idle,
    Live,
    Final,
}

impl From<SessionPhase> for VisibleSessionPhase {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Idle => VisibleSessionPhase::Idle,
            SessionPhase::Live => VisibleSessionPhase::Live,
            SessionPhase::Final => VisibleSessionPhase::Final,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionGameDto {
    pub id: Uuid,
    pub team_id: Uuid,
    pub opponent: String,
    pub duration_minutes: u32,
}

impl From<CurrentGame> for SessionGameDto {
    fn from(value: CurrentGame) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            opponent: value.opponent,
            duration_minutes: value.duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameClockDto {
    pub running: bool,
    pub elapsed_secs: u32,
    pub time_left_secs: u32,
}

impl From<GameClock> for GameClockDto {
    fn from(value: GameClock) -> Self {
        Self {
            running: value.running,
            elapsed_secs: value.elapsed_secs,
            time_left_secs: value.time_left_secs,
        }
    }
}

/// On-court entry with its live counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivePlayerDto {
    pub player_id: Uuid,
    pub name: String,
    pub points: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub seconds_on_court: u32,
    /// True while the counters are being saved.
    pub flushing: bool,
}

impl From<ActivePlayerEntry> for ActivePlayerDto {
    fn from(value: ActivePlayerEntry) -> Self {
        Self {
            player_id: value.player_id,
            name: value.name,
            points: value.stats.points,
            rebounds: value.stats.rebounds,
            assists: value.stats.assists,
            seconds_on_court: value.stats.seconds_played,
            flushing: value.flushing,
        }
    }
}

/// Scoreboard projection served over REST and broadcast over SSE.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshotResponse {
    pub phase: VisibleSessionPhase,
    pub degraded: bool,
    /// Absent while no game is open.
    pub game: Option<SessionGameDto>,
    pub clock: Option<GameClockDto>,
    pub players: Vec<ActivePlayerDto>,
}

impl SessionSnapshotResponse {
    /// Build the projection from the lifecycle phase and the live session, if any.
    pub fn new(phase: SessionPhase, degraded: bool, session: Option<SessionSnapshot>) -> Self {
        match session {
            Some(SessionSnapshot {
                game,
                clock,
                players,
            }) => Self {
                phase: phase.into(),
                degraded,
                game: Some(game.into()),
                clock: Some(clock.into()),
                players: players.into_iter().map(Into::into).collect(),
            },
            None => Self {
                phase: phase.into(),
                degraded,
                game: None,
                clock: None,
                players: Vec::new(),
            },
        }
    }
}
