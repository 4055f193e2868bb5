//! Ranking views: derived, sorted reads over account counters.
//!
//! Rankings never mutate the store. Accounts whose period markers lag the
//! current boundary are scored as zero, so an idle account cannot keep last
//! week's total on this week's board.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::EntityTrait;
use serde::Deserialize;

use crate::clock::{self, PeriodBoundaries};
use crate::entities::account;
use crate::ledger::rollover;
use crate::models::ledger::RankingEntry;
use crate::state::AppState;

use super::HttpError;

pub const MAX_RANKING_LIMIT: u64 = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/{period}", get(get_rankings))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RankingPeriod {
    AllTime,
    Weekly,
    Monthly,
}

impl RankingPeriod {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "all-time" => Some(Self::AllTime),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::AllTime => "all-time",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    fn amount(self, account: &account::Model) -> i64 {
        match self {
            Self::AllTime => account.all_time_received,
            Self::Weekly => account.weekly_received,
            Self::Monthly => account.monthly_received,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RankingQuery {
    limit: Option<u64>,
}

async fn get_rankings(
    Path(period): Path<String>,
    Query(query): Query<RankingQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RankingEntry>>, HttpError> {
    let period = RankingPeriod::parse(&period).ok_or_else(|| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("unknown ranking period '{period}'"),
        )
    })?;
    let requested_limit = query.limit.unwrap_or(25);
    if requested_limit == 0 {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "limit must be positive".to_string(),
        ));
    }
    let limit = requested_limit.min(MAX_RANKING_LIMIT) as usize;

    let cache_key = format!("{}:{limit}", period.key());
    if let Some(cached) = state.cache.rankings.get(&cache_key).await {
        return Ok(Json((*cached).clone()));
    }

    let accounts = account::Entity::find()
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let boundaries = clock::boundaries_in(Utc::now(), state.ledger_offset);
    let entries = rank_accounts(accounts, period, boundaries, limit);

    state
        .cache
        .rankings
        .insert(cache_key, Arc::new(entries.clone()))
        .await;
    Ok(Json(entries))
}

/// Descending by the period's received counter, stable tie-break by user id.
fn rank_accounts(
    accounts: Vec<account::Model>,
    period: RankingPeriod,
    boundaries: PeriodBoundaries,
    limit: usize,
) -> Vec<RankingEntry> {
    let mut scored: Vec<(i64, String, String)> = accounts
        .into_iter()
        .map(|model| {
            let due = rollover::plan(&model, boundaries);
            let fresh = rollover::apply(model, due, boundaries);
            (period.amount(&fresh), fresh.user_id, fresh.display_name)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (amount, user_id, display_name))| RankingEntry {
            rank: index as u32 + 1,
            user_id,
            display_name,
            amount,
        })
        .collect()
}
