#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    EmailLogEntity, GameEntity, PlayerEntity, SiteDataEntity, StatLineEntity, TeamEntity,
    UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for users, rosters, games and stats.
///
/// Every `save_*` method is an upsert keyed by the entity identifier, so callers may retry a
/// failed write without creating duplicates.
pub trait LeagueStore: Send + Sync {
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn find_user_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn list_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>>;
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    fn list_games(&self, team_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Delete a game and every stat line recorded for it. Returns `false` when the game does
    /// not exist.
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn list_players(&self, team_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Upsert the stat line identified by `(line.game_id, line.player_id)`.
    fn save_stat_line(&self, line: StatLineEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_stat_line(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StatLineEntity>>>;
    fn list_stat_lines(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatLineEntity>>>;

    fn save_email_log(&self, log: EmailLogEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_email_logs(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<EmailLogEntity>>>;

    fn save_site_data(&self, data: SiteDataEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_site_data(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SiteDataEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
