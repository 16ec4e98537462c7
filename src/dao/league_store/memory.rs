//! Process-local storage backend used for development runs and tests.

use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    league_store::LeagueStore,
    models::{
        EmailLogEntity, GameEntity, PlayerEntity, SiteDataEntity, StatLineEntity, TeamEntity,
        UserEntity, stat_line_key,
    },
    storage::StorageResult,
};

/// In-memory [`LeagueStore`]; data lives as long as the process.
#[derive(Clone, Default)]
pub struct MemoryLeagueStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: DashMap<Uuid, UserEntity>,
    teams: DashMap<Uuid, TeamEntity>,
    games: DashMap<Uuid, GameEntity>,
    players: DashMap<Uuid, PlayerEntity>,
    stat_lines: DashMap<String, StatLineEntity>,
    email_logs: DashMap<Uuid, EmailLogEntity>,
    site_data: DashMap<Uuid, SiteDataEntity>,
    #[cfg(test)]
    failing_stat_writes: AtomicU32,
}

impl MemoryLeagueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` stat line writes fail with an unavailable error.
    #[cfg(test)]
    pub fn fail_next_stat_writes(&self, count: u32) {
        self.inner
            .failing_stat_writes
            .store(count, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn take_injected_failure(&self) -> StorageResult<()> {
        let injected = self.inner.failing_stat_writes.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |remaining| remaining.checked_sub(1),
        );
        match injected {
            Ok(_) => Err(crate::dao::storage::StorageError::unavailable(
                "injected stat write failure".into(),
                std::io::Error::other("injected"),
            )),
            Err(_) => Ok(()),
        }
    }

    #[cfg(not(test))]
    fn take_injected_failure(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

impl LeagueStore for MemoryLeagueStore {
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.users.insert(user.id, user);
        Box::pin(async { Ok(()) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let found = self.inner.users.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn find_user_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let found = self
            .inner
            .users
            .iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(&email))
            .map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let users = self.inner.users.iter().map(|e| e.clone()).collect();
        Box::pin(async move { Ok(sorted_by(users, |u: &UserEntity| u.created_at)) })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.teams.insert(team.id, team);
        Box::pin(async { Ok(()) })
    }

    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let found = self.inner.teams.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let teams = self.inner.teams.iter().map(|e| e.clone()).collect();
        Box::pin(async move { Ok(sorted_by(teams, |t: &TeamEntity| t.created_at)) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.games.insert(game.id, game);
        Box::pin(async { Ok(()) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let found = self.inner.games.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_games(&self, team_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let games = self
            .inner
            .games
            .iter()
            .filter(|e| e.team_id == team_id)
            .map(|e| e.clone())
            .collect();
        Box::pin(async move { Ok(sorted_by(games, |g: &GameEntity| g.created_at)) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.stat_lines.retain(|_, line| line.game_id != id);
        let deleted = self.inner.games.remove(&id).is_some();
        Box::pin(async move { Ok(deleted) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.players.insert(player.id, player);
        Box::pin(async { Ok(()) })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let found = self.inner.players.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_players(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let players = self
            .inner
            .players
            .iter()
            .filter(|e| e.team_id == team_id)
            .map(|e| e.clone())
            .collect();
        Box::pin(async move { Ok(sorted_by(players, |p: &PlayerEntity| p.created_at)) })
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let deleted = self.inner.players.remove(&id).is_some();
        Box::pin(async move { Ok(deleted) })
    }

    fn save_stat_line(&self, line: StatLineEntity) -> BoxFuture<'static, StorageResult<()>> {
        let outcome = self.take_injected_failure().map(|()| {
            self.inner
                .stat_lines
                .insert(stat_line_key(line.game_id, line.player_id), line);
        });
        Box::pin(async move { outcome })
    }

    fn find_stat_line(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StatLineEntity>>> {
        let found = self
            .inner
            .stat_lines
            .get(&stat_line_key(game_id, player_id))
            .map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_stat_lines(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatLineEntity>>> {
        let lines = self
            .inner
            .stat_lines
            .iter()
            .filter(|e| e.game_id == game_id)
            .map(|e| e.clone())
            .collect();
        Box::pin(async move { Ok(sorted_by(lines, |l: &StatLineEntity| l.recorded_at)) })
    }

    fn save_email_log(&self, log: EmailLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.email_logs.insert(log.id, log);
        Box::pin(async { Ok(()) })
    }

    fn list_email_logs(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<EmailLogEntity>>> {
        let logs = self
            .inner
            .email_logs
            .iter()
            .filter(|e| e.team_id == team_id)
            .map(|e| e.clone())
            .collect();
        Box::pin(async move { Ok(sorted_by(logs, |l: &EmailLogEntity| l.created_at)) })
    }

    fn save_site_data(&self, data: SiteDataEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.site_data.insert(data.user_id, data);
        Box::pin(async { Ok(()) })
    }

    fn find_site_data(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SiteDataEntity>>> {
        let found = self.inner.site_data.get(&user_id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn line(game_id: Uuid, player_id: Uuid, points: u32) -> StatLineEntity {
        StatLineEntity {
            game_id,
            player_id,
            points,
            rebounds: 0,
            assists: 0,
            seconds_played: 0,
            recorded_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn stat_lines_are_upserted_per_game_and_player() {
        let store = MemoryLeagueStore::new();
        let (game, player) = (Uuid::new_v4(), Uuid::new_v4());

        store.save_stat_line(line(game, player, 2)).await.unwrap();
        store.save_stat_line(line(game, player, 7)).await.unwrap();

        let lines = store.list_stat_lines(game).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].points, 7);
    }

    #[tokio::test]
    async fn deleting_a_game_drops_its_stat_lines() {
        let store = MemoryLeagueStore::new();
        let team_id = Uuid::new_v4();
        let game = GameEntity {
            id: Uuid::new_v4(),
            team_id,
            opponent: "Hornets".into(),
            duration_minutes: 32,
            created_at: SystemTime::now(),
        };
        let other_game = Uuid::new_v4();
        store.save_game(game.clone()).await.unwrap();
        store
            .save_stat_line(line(game.id, Uuid::new_v4(), 1))
            .await
            .unwrap();
        store
            .save_stat_line(line(other_game, Uuid::new_v4(), 1))
            .await
            .unwrap();

        assert!(store.delete_game(game.id).await.unwrap());
        assert!(!store.delete_game(game.id).await.unwrap());
        assert!(store.list_stat_lines(game.id).await.unwrap().is_empty());
        assert_eq!(store.list_stat_lines(other_game).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_one_by_one() {
        let store = MemoryLeagueStore::new();
        let (game, player) = (Uuid::new_v4(), Uuid::new_v4());
        store.fail_next_stat_writes(2);

        assert!(store.save_stat_line(line(game, player, 1)).await.is_err());
        assert!(store.save_stat_line(line(game, player, 1)).await.is_err());
        assert!(store.save_stat_line(line(game, player, 1)).await.is_ok());
    }
}
