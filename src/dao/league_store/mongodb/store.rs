use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        EMAIL_LOGS, GAMES, MongoEmailLogDocument, MongoGameDocument, MongoPlayerDocument,
        MongoSiteDataDocument, MongoStatLineDocument, MongoTeamDocument, MongoUserDocument,
        PLAYERS, SITE_DATA, STAT_LINES, TEAMS, USERS,
    },
};
use crate::dao::{
    league_store::LeagueStore,
    models::{
        EmailLogEntity, GameEntity, PlayerEntity, SiteDataEntity, StatLineEntity, TeamEntity,
        UserEntity, stat_line_key,
    },
    storage::StorageResult,
};

/// [`LeagueStore`] backed by one MongoDB collection per entity.
#[derive(Clone)]
pub struct MongoLeagueStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn id_filter(id: impl ToString) -> Document {
    doc! { "_id": id.to_string() }
}

impl MongoLeagueStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document, bool); 5] = [
            (USERS, "email", doc! {"email": 1}, true),
            (GAMES, "team_id", doc! {"team_id": 1, "created_at": 1}, false),
            (PLAYERS, "team_id", doc! {"team_id": 1, "created_at": 1}, false),
            (STAT_LINES, "game_id", doc! {"game_id": 1}, false),
            (EMAIL_LOGS, "team_id", doc! {"team_id": 1, "created_at": 1}, false),
        ];

        for (collection, index, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_{index}_idx")))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<D>(&self, name: &str) -> Collection<D>
    where
        D: Send + Sync,
    {
        let guard = self.inner.state.read().await;
        guard.database.collection::<D>(name)
    }

    async fn upsert<D>(&self, name: &'static str, id: String, document: D) -> MongoResult<()>
    where
        D: Serialize + Send + Sync,
    {
        self.collection::<D>(name)
            .await
            .replace_one(doc! { "_id": id.as_str() }, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: name,
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_one<D, E>(&self, name: &'static str, filter: Document) -> MongoResult<Option<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let document = self
            .collection::<D>(name)
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: name,
                source,
            })?;

        document.map(E::try_from).transpose()
    }

    async fn find_many<D, E>(&self, name: &'static str, filter: Document) -> MongoResult<Vec<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let documents: Vec<D> = self
            .collection::<D>(name)
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: name,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: name,
                source,
            })?;

        documents.into_iter().map(E::try_from).collect()
    }

    async fn delete_many(&self, name: &'static str, filter: Document) -> MongoResult<u64> {
        let result = self
            .collection::<Document>(name)
            .await
            .delete_many(filter)
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: name,
                source,
            })?;
        Ok(result.deleted_count)
    }

    async fn delete_game(&self, id: Uuid) -> MongoResult<bool> {
        self.delete_many(STAT_LINES, doc! { "game_id": id.to_string() })
            .await?;
        let deleted = self.delete_many(GAMES, id_filter(id)).await?;
        Ok(deleted > 0)
    }
}

macro_rules! boxed {
    ($this:expr, |$store:ident| $body:expr) => {{
        let $store = $this.clone();
        Box::pin(async move { $body.await.map_err(Into::into) })
    }};
}

impl LeagueStore for MongoLeagueStore {
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.upsert(USERS, user.id.to_string(), MongoUserDocument::from(user)))
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        boxed!(self, |store| store.find_one::<MongoUserDocument, _>(USERS, id_filter(id)))
    }

    fn find_user_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        boxed!(self, |store| store.find_one::<MongoUserDocument, _>(USERS, doc! { "email": email }))
    }

    fn list_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        boxed!(self, |store| store.find_many::<MongoUserDocument, _>(USERS, doc! {}))
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.upsert(TEAMS, team.id.to_string(), MongoTeamDocument::from(team)))
    }

    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        boxed!(self, |store| store.find_one::<MongoTeamDocument, _>(TEAMS, id_filter(id)))
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        boxed!(self, |store| store.find_many::<MongoTeamDocument, _>(TEAMS, doc! {}))
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.upsert(GAMES, game.id.to_string(), MongoGameDocument::from(game)))
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        boxed!(self, |store| store.find_one::<MongoGameDocument, _>(GAMES, id_filter(id)))
    }

    fn list_games(&self, team_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        boxed!(
            self,
            |store| store.find_many::<MongoGameDocument, _>(GAMES, doc! { "team_id": team_id.to_string() })
        )
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, |store| store.delete_game(id))
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(
            self,
            |store| store.upsert(PLAYERS, player.id.to_string(), MongoPlayerDocument::from(player))
        )
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        boxed!(self, |store| store.find_one::<MongoPlayerDocument, _>(PLAYERS, id_filter(id)))
    }

    fn list_players(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        boxed!(
            self,
            |store| store.find_many::<MongoPlayerDocument, _>(
                PLAYERS,
                doc! { "team_id": team_id.to_string() }
            )
        )
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let deleted = store.delete_many(PLAYERS, id_filter(id)).await?;
            Ok(deleted > 0)
        })
    }

    fn save_stat_line(&self, line: StatLineEntity) -> BoxFuture<'static, StorageResult<()>> {
        let key = stat_line_key(line.game_id, line.player_id);
        boxed!(self, |store| store.upsert(STAT_LINES, key, MongoStatLineDocument::from(line)))
    }

    fn find_stat_line(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<StatLineEntity>>> {
        boxed!(
            self,
            |store| store.find_one::<MongoStatLineDocument, _>(
                STAT_LINES,
                id_filter(stat_line_key(game_id, player_id))
            )
        )
    }

    fn list_stat_lines(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StatLineEntity>>> {
        boxed!(
            self,
            |store| store.find_many::<MongoStatLineDocument, _>(
                STAT_LINES,
                doc! { "game_id": game_id.to_string() }
            )
        )
    }

    fn save_email_log(&self, log: EmailLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(
            self,
            |store| store.upsert(EMAIL_LOGS, log.id.to_string(), MongoEmailLogDocument::from(log))
        )
    }

    fn list_email_logs(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<EmailLogEntity>>> {
        boxed!(
            self,
            |store| store.find_many::<MongoEmailLogDocument, _>(
                EMAIL_LOGS,
                doc! { "team_id": team_id.to_string() }
            )
        )
    }

    fn save_site_data(&self, data: SiteDataEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(
            self,
            |store| store.upsert(SITE_DATA, data.user_id.to_string(), MongoSiteDataDocument::from(data))
        )
    }

    fn find_site_data(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SiteDataEntity>>> {
        boxed!(self, |store| store.find_one::<MongoSiteDataDocument, _>(SITE_DATA, id_filter(user_id)))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
