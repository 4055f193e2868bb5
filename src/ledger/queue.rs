//! Pending transfer queue: durable offers awaiting recipient acceptance.
//!
//! Enqueueing never touches a balance; the amount only reaches the
//! recipient's counters when the settlement engine consumes the row. The
//! pending total is always computed live from the queue, never cached.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entities::{account, pending_transfer};

use super::{LedgerError, MAX_TRANSFER_AMOUNT};

#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub recipient_id: String,
    pub sender_id: String,
    /// Denormalized at creation time; unaffected by later renames.
    pub sender_name: String,
    pub amount: i64,
    pub note: Option<String>,
}

/// Durable insert of an offered transfer. Fails with `InvalidAmount` for
/// non-positive (or implausibly large) amounts and `UnknownAccount` when
/// either side does not resolve; on failure no record is created.
pub async fn enqueue<C: ConnectionTrait>(
    db: &C,
    request: EnqueueRequest,
    now: DateTime<Utc>,
) -> Result<pending_transfer::Model, LedgerError> {
    if request.amount <= 0 || request.amount > MAX_TRANSFER_AMOUNT {
        return Err(LedgerError::InvalidAmount(request.amount));
    }
    ensure_account_exists(db, &request.recipient_id).await?;
    ensure_account_exists(db, &request.sender_id).await?;

    let model = pending_transfer::ActiveModel {
        id: NotSet,
        recipient_id: Set(request.recipient_id),
        sender_id: Set(request.sender_id),
        sender_name: Set(request.sender_name),
        amount: Set(request.amount),
        note: Set(request.note),
        created_at: Set(now.fixed_offset()),
    };
    Ok(model.insert(db).await?)
}

/// Live `SUM(amount)` over the recipient's queue; 0 when empty.
pub async fn total_pending<C: ConnectionTrait>(
    db: &C,
    recipient_id: &str,
) -> Result<i64, LedgerError> {
    let total = pending_transfer::Entity::find()
        .select_only()
        .column_as(pending_transfer::Column::Amount.sum(), "total_amount")
        .filter(pending_transfer::Column::RecipientId.eq(recipient_id))
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten()
        .unwrap_or(0);
    assert!(total >= 0, "Pending totals cannot be negative");
    Ok(total)
}

/// Read-only listing, oldest first (creation time, then id). Display only;
/// settlement correctness does not depend on this order.
pub async fn list_pending<C: ConnectionTrait>(
    db: &C,
    recipient_id: &str,
) -> Result<Vec<pending_transfer::Model>, LedgerError> {
    Ok(pending_transfer::Entity::find()
        .filter(pending_transfer::Column::RecipientId.eq(recipient_id))
        .order_by_asc(pending_transfer::Column::CreatedAt)
        .order_by_asc(pending_transfer::Column::Id)
        .all(db)
        .await?)
}

async fn ensure_account_exists<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> Result<(), LedgerError> {
    let found = account::Entity::find_by_id(user_id).one(db).await?;
    if found.is_none() {
        return Err(LedgerError::UnknownAccount(user_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing;

    fn request(amount: i64) -> EnqueueRequest {
        EnqueueRequest {
            recipient_id: "u_bob".to_string(),
            sender_id: "u_alice".to_string(),
            sender_name: "Alice".to_string(),
            amount,
            note: None,
        }
    }

    #[tokio::test]
    async fn enqueue_inserts_without_touching_counters() {
        let db = testing::database().await;
        testing::seed_account(&db, "u_alice", "Alice").await;
        testing::seed_account(&db, "u_bob", "Bob").await;

        let transfer = enqueue(&db, request(50), testing::moment())
            .await
            .expect("enqueue succeeds");
        assert_eq!(transfer.amount, 50);
        assert_eq!(transfer.sender_name, "Alice");

        let recipient = testing::fetch_account(&db, "u_bob").await;
        assert_eq!(recipient.all_time_received, 0);
        assert_eq!(recipient.daily_received, 0);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected_without_a_record() {
        let db = testing::database().await;
        testing::seed_account(&db, "u_alice", "Alice").await;
        testing::seed_account(&db, "u_bob", "Bob").await;

        for amount in [0, -1, -50] {
            let err = enqueue(&db, request(amount), testing::moment())
                .await
                .expect_err("non-positive amount must fail");
            assert!(matches!(err, LedgerError::InvalidAmount(a) if a == amount));
        }
        assert_eq!(total_pending(&db, "u_bob").await.unwrap(), 0);
        assert!(list_pending(&db, "u_bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_accounts_are_rejected() {
        let db = testing::database().await;
        testing::seed_account(&db, "u_alice", "Alice").await;

        let err = enqueue(&db, request(10), testing::moment())
            .await
            .expect_err("missing recipient must fail");
        assert!(matches!(err, LedgerError::UnknownAccount(id) if id == "u_bob"));

        let mut from_ghost = request(10);
        from_ghost.recipient_id = "u_alice".to_string();
        from_ghost.sender_id = "u_ghost".to_string();
        let err = enqueue(&db, from_ghost, testing::moment())
            .await
            .expect_err("missing sender must fail");
        assert!(matches!(err, LedgerError::UnknownAccount(id) if id == "u_ghost"));
    }

    #[tokio::test]
    async fn total_tracks_the_live_queue_and_listing_is_oldest_first() {
        let db = testing::database().await;
        testing::seed_account(&db, "u_alice", "Alice").await;
        testing::seed_account(&db, "u_bob", "Bob").await;

        assert_eq!(total_pending(&db, "u_bob").await.unwrap(), 0);

        let t0 = testing::moment();
        for (offset_secs, amount) in [(0, 10), (60, 20), (120, 30)] {
            let at = t0 + chrono::Duration::seconds(offset_secs);
            enqueue(&db, request(amount), at)
                .await
                .expect("enqueue succeeds");
        }

        assert_eq!(total_pending(&db, "u_bob").await.unwrap(), 60);
        let listed = list_pending(&db, "u_bob").await.unwrap();
        let amounts: Vec<i64> = listed.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![10, 20, 30]);
    }
}
