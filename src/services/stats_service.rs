use std::{collections::HashMap, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{StatLineEntity, UserEntity},
    dto::stats::{
        BoxScoreResponse, BoxScoreRow, BoxScoreTotals, RecordStatLineRequest, StatLineSummary,
    },
    error::ServiceError,
    services::{game_service, roster_service},
    state::SharedState,
};

/// Write a stat line directly, replacing the previous line of the same game and player.
///
/// Rejected while the player is on court in that game, since the scoreboard owns the line.
pub async fn record_stat_line(
    state: &SharedState,
    caller: &UserEntity,
    request: RecordStatLineRequest,
) -> Result<StatLineSummary, ServiceError> {
    let _gate = state.session_gate().lock().await;
    let store = state.require_store().await?;
    game_service::owned_game(store.as_ref(), caller, request.game_id).await?;
    roster_service::owned_player(store.as_ref(), caller, request.player_id).await?;

    let on_court = state.session().read().await.as_ref().is_some_and(|session| {
        session.game().id == request.game_id && session.is_active(request.player_id)
    });
    if on_court {
        return Err(ServiceError::InvalidState(format!(
            "player `{}` is on court in this game; remove them from the active roster first",
            request.player_id
        )));
    }

    let line = StatLineEntity {
        game_id: request.game_id,
        player_id: request.player_id,
        points: request.points,
        rebounds: request.rebounds,
        assists: request.assists,
        seconds_played: request.seconds_played,
        recorded_at: SystemTime::now(),
    };
    store.save_stat_line(line.clone()).await?;
    info!(game_id = %line.game_id, player_id = %line.player_id, "stat line recorded");
    Ok(line.into())
}

/// Every stat line of a game. A game without lines is reported as missing.
pub async fn game_stats(
    state: &SharedState,
    caller: &UserEntity,
    game_id: Uuid,
) -> Result<Vec<StatLineSummary>, ServiceError> {
    let store = state.require_store().await?;
    game_service::owned_game(store.as_ref(), caller, game_id).await?;
    let lines = store.list_stat_lines(game_id).await?;
    if lines.is_empty() {
        return Err(no_stats(game_id));
    }
    Ok(lines.into_iter().map(Into::into).collect())
}

/// Stat lines of a game joined with roster names, with team totals.
pub async fn box_score(
    state: &SharedState,
    caller: &UserEntity,
    game_id: Uuid,
) -> Result<BoxScoreResponse, ServiceError> {
    let store = state.require_store().await?;
    let game = game_service::owned_game(store.as_ref(), caller, game_id).await?;
    let lines = store.list_stat_lines(game_id).await?;
    if lines.is_empty() {
        return Err(no_stats(game_id));
    }

    let names: HashMap<Uuid, String> = roster_service::team_roster(state, game.team_id)
        .await?
        .into_iter()
        .map(|player| (player.id, player.name))
        .collect();
    let rows: Vec<BoxScoreRow> = lines
        .into_iter()
        .map(|line| BoxScoreRow {
            player_id: line.player_id,
            name: names.get(&line.player_id).cloned(),
            points: line.points,
            rebounds: line.rebounds,
            assists: line.assists,
            seconds_played: line.seconds_played,
        })
        .collect();

    Ok(BoxScoreResponse {
        game_id,
        opponent: game.opponent,
        totals: totals(&rows),
        rows,
    })
}

fn totals(rows: &[BoxScoreRow]) -> BoxScoreTotals {
    rows.iter().fold(BoxScoreTotals::default(), |acc, row| BoxScoreTotals {
        points: acc.points.saturating_add(row.points),
        rebounds: acc.rebounds.saturating_add(row.rebounds),
        assists: acc.assists.saturating_add(row.assists),
        seconds_played: acc.seconds_played.saturating_add(row.seconds_played),
    })
}

fn no_stats(game_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("no stats recorded for game `{game_id}`"))
}

#[cfg(test)]
mod tests {
    use crate::{
        dao::league_store::LeagueStore,
        dto::session::{AdjustStatRequest, StatKindDto},
        services::session_service,
        test_support::{registered_caller, seed_game, seed_player, test_state},
    };

    use super::*;

    fn record(game_id: Uuid, player_id: Uuid, points: u32) -> RecordStatLineRequest {
        RecordStatLineRequest {
            game_id,
            player_id,
            points,
            rebounds: 1,
            assists: 2,
            seconds_played: 60,
        }
    }

    #[tokio::test]
    async fn box_score_joins_names_and_sums_totals() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = seed_game(&store, &caller, 32).await;
        let mia = seed_player(&store, &caller, "Mia").await;
        let noah = seed_player(&store, &caller, "Noah").await;

        record_stat_line(&state, &caller, record(game.id, mia.id, 10))
            .await
            .unwrap();
        record_stat_line(&state, &caller, record(game.id, noah.id, 4))
            .await
            .unwrap();
        // Replaces Noah's first line.
        record_stat_line(&state, &caller, record(game.id, noah.id, 6))
            .await
            .unwrap();

        let score = box_score(&state, &caller, game.id).await.unwrap();
        assert_eq!(score.rows.len(), 2);
        assert_eq!(
            score.totals,
            BoxScoreTotals {
                points: 16,
                rebounds: 2,
                assists: 4,
                seconds_played: 120,
            }
        );
        let mia_row = score.rows.iter().find(|row| row.player_id == mia.id).unwrap();
        assert_eq!(mia_row.name.as_deref(), Some("Mia"));
    }

    #[tokio::test]
    async fn deleted_players_keep_their_rows_without_a_name() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = seed_game(&store, &caller, 32).await;
        let mia = seed_player(&store, &caller, "Mia").await;
        record_stat_line(&state, &caller, record(game.id, mia.id, 3))
            .await
            .unwrap();
        store.delete_player(mia.id).await.unwrap();

        let score = box_score(&state, &caller, game.id).await.unwrap();
        assert_eq!(score.rows[0].name, None);
        assert_eq!(score.totals.points, 3);
    }

    #[tokio::test]
    async fn games_without_stats_are_not_found() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = seed_game(&store, &caller, 32).await;

        assert!(matches!(
            box_score(&state, &caller, game.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            game_stats(&state, &caller, game.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn recording_for_an_unknown_player_is_rejected() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = seed_game(&store, &caller, 32).await;

        assert!(matches!(
            record_stat_line(&state, &caller, record(game.id, Uuid::new_v4(), 1)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn recording_for_an_on_court_player_is_rejected() {
        let (state, store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let game = seed_game(&store, &caller, 32).await;
        let mia = seed_player(&store, &caller, "Mia").await;
        session_service::open_session(&state, &caller, game.id)
            .await
            .unwrap();
        session_service::add_active(&state, &caller, mia.id)
            .await
            .unwrap();
        let adjust = AdjustStatRequest {
            stat: StatKindDto::Points,
            delta: 5,
        };
        session_service::adjust_stat(&state, &caller, mia.id, adjust)
            .await
            .unwrap();

        assert!(matches!(
            record_stat_line(&state, &caller, record(game.id, mia.id, 20)).await,
            Err(ServiceError::InvalidState(_))
        ));

        session_service::remove_active(&state, &caller, mia.id)
            .await
            .unwrap();
        let line = store.find_stat_line(game.id, mia.id).await.unwrap().unwrap();
        assert_eq!(line.points, 5);

        // Off court, the manual line replaces the flushed one.
        record_stat_line(&state, &caller, record(game.id, mia.id, 20))
            .await
            .unwrap();
        let line = store.find_stat_line(game.id, mia.id).await.unwrap().unwrap();
        assert_eq!(line.points, 20);
    }
}
