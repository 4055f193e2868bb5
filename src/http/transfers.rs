//! Transfer HTTP handlers: initiation and per-transfer acceptance.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::EntityTrait;
use serde::Deserialize;

use crate::entities::account;
use crate::ledger::{MAX_TRANSFER_AMOUNT, queue, settlement};
use crate::models::ledger::{AcceptResponse, TransferCreatedResponse};
use crate::state::AppState;

use super::HttpError;
use super::accounts::MAX_DISPLAY_NAME_LEN;

pub const MAX_NOTE_LEN: usize = 512;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(send_transfer))
        .route("/{transfer_id}/accept", post(accept_transfer))
}

#[derive(Debug, Deserialize)]
struct SendTransferRequest {
    recipient_id: String,
    sender_id: String,
    /// Optional override; defaults to the sender account's current name.
    sender_name: Option<String>,
    amount: i64,
    note: Option<String>,
}

/// Offer a transfer: enqueue it for the recipient and record the sender's
/// given-side ledger transition in one transaction. Nothing reaches the
/// recipient's balance until acceptance.
async fn send_transfer(
    State(state): State<AppState>,
    Json(request): Json<SendTransferRequest>,
) -> Result<(StatusCode, Json<TransferCreatedResponse>), HttpError> {
    if let Some(note) = &request.note {
        if note.len() > MAX_NOTE_LEN {
            return Err(HttpError::new(
                StatusCode::BAD_REQUEST,
                format!("note exceeds {MAX_NOTE_LEN} bytes"),
            ));
        }
    }
    if request.amount > MAX_TRANSFER_AMOUNT {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("amount exceeds the per-transfer bound of {MAX_TRANSFER_AMOUNT}"),
        ));
    }

    let sender_name = match request.sender_name {
        Some(name) if !name.trim().is_empty() => {
            let name = name.trim();
            if name.len() > MAX_DISPLAY_NAME_LEN {
                return Err(HttpError::new(
                    StatusCode::BAD_REQUEST,
                    format!("sender_name exceeds {MAX_DISPLAY_NAME_LEN} characters"),
                ));
            }
            name.to_string()
        }
        _ => {
            // Denormalize the sender's current display name into the offer.
            account::Entity::find_by_id(request.sender_id.as_str())
                .one(&state.database)
                .await
                .map_err(|err| {
                    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                })?
                .map(|sender| sender.display_name)
                .ok_or_else(|| {
                    HttpError::new(
                        StatusCode::NOT_FOUND,
                        format!("account {} not found", request.sender_id),
                    )
                })?
        }
    };

    let transfer = settlement::send(
        &state.database,
        queue::EnqueueRequest {
            recipient_id: request.recipient_id,
            sender_id: request.sender_id,
            sender_name,
            amount: request.amount,
            note: request.note,
        },
        Utc::now(),
        state.ledger_offset,
    )
    .await
    .map_err(HttpError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(TransferCreatedResponse {
            success: true,
            transfer_id: transfer.id,
            amount: transfer.amount,
            recipient_id: transfer.recipient_id,
        }),
    ))
}

/// Accept a single pending transfer. A missing id means the transfer never
/// existed or was already settled; either way nothing changes. Ids the
/// store never issued (negative included) fall out the same way.
async fn accept_transfer(
    Path(transfer_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AcceptResponse>, HttpError> {
    let settled = settlement::accept_one(
        &state.database,
        transfer_id,
        Utc::now(),
        state.ledger_offset,
    )
    .await
    .map_err(HttpError::from)?;

    Ok(Json(AcceptResponse {
        success: true,
        amount: settled.amount,
        from_name: settled.from_name,
    }))
}
