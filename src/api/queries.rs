use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MatchId, TournamentId};
use crate::engine::ArenaEngine;
use crate::infra::MatchStore;

use super::dto::{MatchSummaryDto, MatchViewDto, TournamentSummaryDto};
use super::errors::ApiError;

/// Запросы "только чтение".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Состояние матча (живого или из истории).
    GetMatch { match_id: MatchId },

    GetTournament { tournament_id: TournamentId },

    /// Турниры, созданные сегодня (UTC), с участниками.
    TodaysTournaments,

    /// Матчи, созданные сегодня (UTC).
    TodaysMatches,

    /// Матчи турнира по раундам и номерам.
    TournamentMatches { tournament_id: TournamentId },
}

/// Результат запроса "только чтение".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum QueryResponse {
    Match(MatchViewDto),
    Tournament(TournamentSummaryDto),
    Tournaments(Vec<TournamentSummaryDto>),
    Matches(Vec<MatchSummaryDto>),
}

/// Сутки (UTC), в которые попадает `now`: `[полночь, следующая полночь)`.
pub fn day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

pub async fn todays_tournaments(
    store: &dyn MatchStore,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentSummaryDto>, ApiError> {
    let (from, to) = day_window(now);
    let tournaments = store
        .list_tournaments_between(from, to)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(tournaments.iter().map(TournamentSummaryDto::from).collect())
}

pub async fn todays_matches(
    store: &dyn MatchStore,
    now: DateTime<Utc>,
) -> Result<Vec<MatchSummaryDto>, ApiError> {
    let (from, to) = day_window(now);
    let matches = store
        .list_matches_between(from, to)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(matches.iter().map(MatchSummaryDto::from).collect())
}

pub async fn tournament_matches(
    store: &dyn MatchStore,
    tournament_id: &TournamentId,
) -> Result<Vec<MatchSummaryDto>, ApiError> {
    let matches = store
        .list_tournament_matches(tournament_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(matches.iter().map(MatchSummaryDto::from).collect())
}

/// Выполнить запрос на чтение.
pub async fn run_query(engine: &ArenaEngine, query: Query) -> Result<QueryResponse, ApiError> {
    let store = engine.store().as_ref();
    let now = engine.now().wall;

    let response = match query {
        Query::GetMatch { match_id } => {
            let view = engine.match_view(&match_id).await?;
            QueryResponse::Match(MatchViewDto::from(&view))
        }
        Query::GetTournament { tournament_id } => {
            let tournament = engine.tournament(&tournament_id).await?;
            QueryResponse::Tournament(TournamentSummaryDto::from(&tournament))
        }
        Query::TodaysTournaments => QueryResponse::Tournaments(todays_tournaments(store, now).await?),
        Query::TodaysMatches => QueryResponse::Matches(todays_matches(store, now).await?),
        Query::TournamentMatches { tournament_id } => {
            QueryResponse::Matches(tournament_matches(store, &tournament_id).await?)
        }
    };

    Ok(response)
}
