// src/api/graphql.rs
//! GraphQL-схема отчётов для операционных инструментов. Только чтение.

use std::sync::Arc;

use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Schema};

use crate::domain::TournamentId;
use crate::infra::MatchStore;
use crate::time_ctrl::TimeSource;

use super::dto::{MatchSummaryDto, TournamentSummaryDto};
use super::queries;

pub type ReportingSchema = Schema<ReportingQuery, EmptyMutation, EmptySubscription>;

pub struct ReportingQuery;

#[Object]
impl ReportingQuery {
    /// Турниры, созданные сегодня, с участниками.
    async fn todays_tournaments(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<TournamentSummaryDto>> {
        let store = ctx.data::<Arc<dyn MatchStore>>()?;
        let now = ctx.data::<Arc<dyn TimeSource>>()?.now().wall;
        Ok(queries::todays_tournaments(store.as_ref(), now).await?)
    }

    /// Матчи, созданные сегодня: оба игрока и победитель.
    async fn todays_matches(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<MatchSummaryDto>> {
        let store = ctx.data::<Arc<dyn MatchStore>>()?;
        let now = ctx.data::<Arc<dyn TimeSource>>()?.now().wall;
        Ok(queries::todays_matches(store.as_ref(), now).await?)
    }

    /// Матчи одного турнира по раундам и номерам.
    async fn tournament_matches(
        &self,
        ctx: &Context<'_>,
        tournament_id: String,
    ) -> async_graphql::Result<Vec<MatchSummaryDto>> {
        let store = ctx.data::<Arc<dyn MatchStore>>()?;
        Ok(queries::tournament_matches(store.as_ref(), &TournamentId::new(tournament_id)).await?)
    }
}

pub fn build_schema(store: Arc<dyn MatchStore>, time: Arc<dyn TimeSource>) -> ReportingSchema {
    Schema::build(ReportingQuery, EmptyMutation, EmptySubscription)
        .data(store)
        .data(time)
        .finish()
}
