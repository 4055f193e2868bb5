//! Account HTTP handlers: provisioning, rollover-fresh snapshots, pending
//! queue views, bulk acceptance and the activity feed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use tracing::info;

use crate::entities::{account, activity_entry};
use crate::ledger::{LedgerError, queue, rollover, settlement};
use crate::models::ledger::{
    AcceptAllResponse, AccountView, ActivityEntryView, PendingQueueView, PendingTransferView,
};
use crate::state::AppState;

use super::HttpError;

pub const MAX_USER_ID_LEN: usize = 64;
pub const MAX_DISPLAY_NAME_LEN: usize = 64;
pub const MAX_ACTIVITY_LIMIT: u64 = 200;

/// GET snapshots retry rollover persistence this many times when an
/// optimistic update loses a race.
const SNAPSHOT_RETRIES: usize = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(provision_account))
        .route("/{user_id}", get(get_account))
        .route("/{user_id}/pending", get(get_pending))
        .route("/{user_id}/accept-all", post(accept_all_pending))
        .route("/{user_id}/activity", get(get_activity))
}

#[derive(Debug, Deserialize)]
struct ProvisionRequest {
    user_id: String,
    display_name: String,
    product: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ActivityQuery {
    limit: Option<u64>,
    offset: Option<u64>,
}

/// Create a zeroed account row. Deployments pre-seed their roster through
/// this surface; the ledger core never creates accounts on its own.
async fn provision_account(
    State(state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<(StatusCode, Json<AccountView>), HttpError> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() || user_id.len() > MAX_USER_ID_LEN {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("user_id must be 1-{MAX_USER_ID_LEN} characters"),
        ));
    }
    let display_name = request.display_name.trim();
    if display_name.is_empty() || display_name.len() > MAX_DISPLAY_NAME_LEN {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("display_name must be 1-{MAX_DISPLAY_NAME_LEN} characters"),
        ));
    }

    let existing = account::Entity::find_by_id(user_id)
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    if existing.is_some() {
        return Err(HttpError::new(
            StatusCode::CONFLICT,
            format!("Account {user_id} already exists"),
        ));
    }

    let stamp = Utc::now().fixed_offset();
    let model = account::ActiveModel {
        user_id: Set(user_id.to_string()),
        display_name: Set(display_name.to_string()),
        product: Set(request.product.clone()),
        all_time_received: Set(0),
        all_time_given: Set(0),
        daily_received: Set(0),
        daily_given: Set(0),
        weekly_received: Set(0),
        weekly_given: Set(0),
        monthly_received: Set(0),
        monthly_given: Set(0),
        last_daily_reset: Set(None),
        last_weekly_reset: Set(None),
        last_monthly_reset: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    };
    let created = account::Entity::insert(model)
        .exec_with_returning(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    info!("Provisioned account {user_id}");
    Ok((StatusCode::CREATED, Json(account_view(created, 0))))
}

/// Current account snapshot with rollover applied first, plus the live
/// pending total.
async fn get_account(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountView>, HttpError> {
    let fresh = freshen(&state, &user_id).await?;
    let pending_total = queue::total_pending(&state.database, &user_id)
        .await
        .map_err(HttpError::from)?;
    Ok(Json(account_view(fresh, pending_total)))
}

async fn get_pending(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PendingQueueView>, HttpError> {
    // Surface UnknownAccount before an empty listing.
    freshen(&state, &user_id).await?;

    let total = queue::total_pending(&state.database, &user_id)
        .await
        .map_err(HttpError::from)?;
    let transfers = queue::list_pending(&state.database, &user_id)
        .await
        .map_err(HttpError::from)?
        .into_iter()
        .map(|t| PendingTransferView {
            id: t.id,
            sender_id: t.sender_id,
            sender_name: t.sender_name,
            amount: t.amount,
            note: t.note,
            created_at: t.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(Json(PendingQueueView { total, transfers }))
}

async fn accept_all_pending(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AcceptAllResponse>, HttpError> {
    let settled = settlement::accept_all(&state.database, &user_id, Utc::now(), state.ledger_offset)
        .await
        .map_err(HttpError::from)?;
    Ok(Json(AcceptAllResponse {
        success: true,
        amount: settled.total_amount,
        count: settled.count,
    }))
}

/// Newest-first activity feed for one account.
async fn get_activity(
    Path(user_id): Path<String>,
    Query(query): Query<ActivityQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ActivityEntryView>>, HttpError> {
    let requested_limit = query.limit.unwrap_or(50);
    if requested_limit == 0 {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "limit must be positive".to_string(),
        ));
    }
    let limit = requested_limit.min(MAX_ACTIVITY_LIMIT);
    let offset = query.offset.unwrap_or(0);
    assert!(
        offset <= i64::MAX as u64,
        "Activity offset exceeds database bounds"
    );

    let entries = activity_entry::Entity::find()
        .filter(activity_entry::Column::AccountId.eq(user_id))
        .order_by_desc(activity_entry::Column::CreatedAt)
        .order_by_desc(activity_entry::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let views = entries
        .into_iter()
        .map(|e| ActivityEntryView {
            id: e.id,
            message: e.message,
            created_at: e.created_at.with_timezone(&Utc),
        })
        .collect::<Vec<_>>();
    assert!(
        views.len() <= limit as usize,
        "Returned more activity entries than requested"
    );
    Ok(Json(views))
}

/// Persist any due rollover and return the fresh snapshot, retrying a
/// bounded number of times when the optimistic update loses a race.
async fn freshen(state: &AppState, user_id: &str) -> Result<account::Model, HttpError> {
    let mut last_conflict = None;
    for _ in 0..SNAPSHOT_RETRIES {
        match rollover::ensure_current(&state.database, user_id, Utc::now(), state.ledger_offset)
            .await
        {
            Ok(fresh) => return Ok(fresh),
            Err(err @ LedgerError::ConcurrencyConflict(_)) => last_conflict = Some(err),
            Err(err) => return Err(HttpError::from(err)),
        }
    }
    Err(HttpError::from(last_conflict.expect(
        "retry loop only exits with a recorded conflict",
    )))
}

fn account_view(model: account::Model, pending_total: i64) -> AccountView {
    AccountView {
        user_id: model.user_id,
        display_name: model.display_name,
        product: model.product,
        all_time_received: model.all_time_received,
        all_time_given: model.all_time_given,
        daily_received: model.daily_received,
        daily_given: model.daily_given,
        weekly_received: model.weekly_received,
        weekly_given: model.weekly_given,
        monthly_received: model.monthly_received,
        monthly_given: model.monthly_given,
        pending_total,
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
