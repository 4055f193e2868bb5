//! Settlement engine: the transactional `Pending -> Settled` transition.
//!
//! Each entry point runs inside one database transaction so that, from any
//! other observer's perspective, transfer removal, counter increments and
//! the activity log append happen together or not at all. The rows-affected
//! count of the delete is the at-most-once guard against double settlement.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use tracing::info;

use crate::clock;
use crate::entities::{account, activity_entry, pending_transfer};

use super::rollover;
use super::{LedgerError, Side, queue};

/// Outcome of settling a single transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub amount: i64,
    pub from_name: String,
}

/// Outcome of a bulk settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkSettled {
    pub total_amount: i64,
    pub count: u64,
}

/// Accept a single pending transfer.
pub async fn accept_one(
    db: &DatabaseConnection,
    transfer_id: i64,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Settled, LedgerError> {
    let txn = db.begin().await?;

    let transfer = pending_transfer::Entity::find_by_id(transfer_id)
        .one(&txn)
        .await?
        .ok_or(LedgerError::TransferNotFound(transfer_id))?;

    // Locate-and-remove in one step: losing this race means another
    // settlement already consumed the transfer, and nothing else happens.
    let removed = pending_transfer::Entity::delete_by_id(transfer_id)
        .exec(&txn)
        .await?;
    if removed.rows_affected == 0 {
        return Err(LedgerError::TransferNotFound(transfer_id));
    }

    credit(
        &txn,
        &transfer.recipient_id,
        Side::Received,
        transfer.amount,
        now,
        offset,
    )
    .await?;
    append_activity(
        &txn,
        &transfer.recipient_id,
        format!(
            "Accepted {} tokens from {}",
            transfer.amount, transfer.sender_name
        ),
        now,
    )
    .await?;

    txn.commit().await?;
    info!(
        "Settled transfer {transfer_id}: {} tokens to {}",
        transfer.amount, transfer.recipient_id
    );
    Ok(Settled {
        amount: transfer.amount,
        from_name: transfer.sender_name,
    })
}

/// Accept every transfer currently pending for the recipient as one unit.
pub async fn accept_all(
    db: &DatabaseConnection,
    recipient_id: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<BulkSettled, LedgerError> {
    let txn = db.begin().await?;

    let pending = pending_transfer::Entity::find()
        .filter(pending_transfer::Column::RecipientId.eq(recipient_id))
        .all(&txn)
        .await?;
    if pending.is_empty() {
        let exists = account::Entity::find_by_id(recipient_id)
            .one(&txn)
            .await?
            .is_some();
        return Err(if exists {
            LedgerError::NoPendingTransfers(recipient_id.to_string())
        } else {
            LedgerError::UnknownAccount(recipient_id.to_string())
        });
    }

    let total: i64 = pending.iter().map(|t| t.amount).sum();
    let count = pending.len() as u64;
    assert!(total > 0, "Pending transfers are strictly positive");

    // Delete exactly the snapshotted ids: a transfer enqueued after the sum
    // was taken stays queued; one settled elsewhere in the meantime shows up
    // as a short delete count and aborts the whole unit.
    let ids: Vec<i64> = pending.iter().map(|t| t.id).collect();
    let removed = pending_transfer::Entity::delete_many()
        .filter(pending_transfer::Column::Id.is_in(ids))
        .exec(&txn)
        .await?;
    if removed.rows_affected != count {
        return Err(LedgerError::ConcurrencyConflict(recipient_id.to_string()));
    }

    credit(&txn, recipient_id, Side::Received, total, now, offset).await?;
    append_activity(
        &txn,
        recipient_id,
        format!("Accepted {count} transfers totalling {total} tokens"),
        now,
    )
    .await?;

    txn.commit().await?;
    info!("Settled {count} transfers totalling {total} tokens for {recipient_id}");
    Ok(BulkSettled {
        total_amount: total,
        count,
    })
}

/// Transfer initiation: enqueue the offer and apply the sender's given-side
/// transition in one transaction. The queue insert itself stays
/// counter-neutral; only the sender's `given` counters move here, the
/// recipient's `received` counters wait for acceptance.
pub async fn send(
    db: &DatabaseConnection,
    request: queue::EnqueueRequest,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<pending_transfer::Model, LedgerError> {
    let txn = db.begin().await?;

    let transfer = queue::enqueue(&txn, request, now).await?;
    credit(
        &txn,
        &transfer.sender_id,
        Side::Given,
        transfer.amount,
        now,
        offset,
    )
    .await?;
    append_activity(
        &txn,
        &transfer.sender_id,
        format!(
            "Sent {} tokens to {}",
            transfer.amount, transfer.recipient_id
        ),
        now,
    )
    .await?;

    txn.commit().await?;
    info!(
        "Transfer {} offered: {} tokens from {} to {}",
        transfer.id, transfer.amount, transfer.sender_id, transfer.recipient_id
    );
    Ok(transfer)
}

/// Rollover first, then credit one side's all-time and period counters in a
/// single guarded UPDATE.
async fn credit<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    side: Side,
    amount: i64,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<(), LedgerError> {
    assert!(amount > 0, "Ledger credits must be positive");

    let account = account::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::UnknownAccount(user_id.to_string()))?;

    let boundaries = clock::boundaries_in(now, offset);
    let due = rollover::plan(&account, boundaries);
    let update = rollover::build_update(
        &account,
        due,
        boundaries,
        Some((side, amount)),
        now.fixed_offset(),
    );
    rollover::commit_update(db, &account, update).await
}

async fn append_activity<C: ConnectionTrait>(
    db: &C,
    account_id: &str,
    message: String,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    assert!(
        message.len() <= 512,
        "Activity messages are bounded by the schema"
    );
    let entry = activity_entry::ActiveModel {
        id: NotSet,
        account_id: Set(Some(account_id.to_string())),
        message: Set(message),
        created_at: Set(now.fixed_offset()),
    };
    activity_entry::Entity::insert(entry).exec(db).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn testing_credit(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<(), LedgerError> {
    credit(db, user_id, Side::Received, amount, now, offset).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing;
    use chrono::TimeZone;
    use sea_orm::{PaginatorTrait, QueryOrder};

    async fn seed_pair(db: &DatabaseConnection) {
        testing::seed_account(db, "u_alice", "Alice").await;
        testing::seed_account(db, "u_bob", "Bob").await;
    }

    fn offer(amount: i64) -> queue::EnqueueRequest {
        queue::EnqueueRequest {
            recipient_id: "u_bob".to_string(),
            sender_id: "u_alice".to_string(),
            sender_name: "Alice".to_string(),
            amount,
            note: None,
        }
    }

    async fn activity_count(db: &DatabaseConnection, account_id: &str) -> u64 {
        activity_entry::Entity::find()
            .filter(activity_entry::Column::AccountId.eq(account_id))
            .count(db)
            .await
            .expect("activity count query succeeds")
    }

    #[tokio::test]
    async fn accept_one_settles_into_all_four_received_counters() {
        let db = testing::database().await;
        seed_pair(&db).await;
        let now = testing::moment();

        let transfer = queue::enqueue(&db, offer(50), now).await.unwrap();
        let settled = accept_one(&db, transfer.id, now, testing::utc())
            .await
            .expect("settlement succeeds");
        assert_eq!(settled.amount, 50);
        assert_eq!(settled.from_name, "Alice");

        let bob = testing::fetch_account(&db, "u_bob").await;
        assert_eq!(bob.all_time_received, 50);
        assert_eq!(bob.daily_received, 50);
        assert_eq!(bob.weekly_received, 50);
        assert_eq!(bob.monthly_received, 50);
        assert_eq!(bob.all_time_given, 0);

        assert!(queue::list_pending(&db, "u_bob").await.unwrap().is_empty());
        assert_eq!(activity_count(&db, "u_bob").await, 1);
    }

    #[tokio::test]
    async fn accept_one_on_missing_id_changes_nothing() {
        let db = testing::database().await;
        seed_pair(&db).await;
        let now = testing::moment();

        let before = testing::fetch_account(&db, "u_bob").await;
        let err = accept_one(&db, 9_999, now, testing::utc())
            .await
            .expect_err("missing transfer must fail");
        assert!(matches!(err, LedgerError::TransferNotFound(9_999)));

        let after = testing::fetch_account(&db, "u_bob").await;
        assert_eq!(before, after);
        assert_eq!(activity_count(&db, "u_bob").await, 0);
    }

    #[tokio::test]
    async fn second_accept_of_the_same_transfer_is_not_found() {
        let db = testing::database().await;
        seed_pair(&db).await;
        let now = testing::moment();

        let transfer = queue::enqueue(&db, offer(25), now).await.unwrap();
        accept_one(&db, transfer.id, now, testing::utc())
            .await
            .expect("first settlement succeeds");

        let err = accept_one(&db, transfer.id, now, testing::utc())
            .await
            .expect_err("double settlement must fail");
        assert!(matches!(err, LedgerError::TransferNotFound(id) if id == transfer.id));

        // Counters reflect exactly one settlement.
        let bob = testing::fetch_account(&db, "u_bob").await;
        assert_eq!(bob.all_time_received, 25);
        assert_eq!(activity_count(&db, "u_bob").await, 1);
    }

    #[tokio::test]
    async fn accept_all_sums_and_drains_the_queue() {
        let db = testing::database().await;
        seed_pair(&db).await;
        let now = testing::moment();

        for amount in [10, 20, 30] {
            queue::enqueue(&db, offer(amount), now).await.unwrap();
        }

        let settled = accept_all(&db, "u_bob", now, testing::utc())
            .await
            .expect("bulk settlement succeeds");
        assert_eq!(settled.total_amount, 60);
        assert_eq!(settled.count, 3);

        let bob = testing::fetch_account(&db, "u_bob").await;
        assert_eq!(bob.all_time_received, 60);
        assert_eq!(bob.daily_received, 60);
        assert_eq!(bob.weekly_received, 60);
        assert_eq!(bob.monthly_received, 60);

        assert_eq!(queue::total_pending(&db, "u_bob").await.unwrap(), 0);
        assert_eq!(activity_count(&db, "u_bob").await, 1);
    }

    #[tokio::test]
    async fn accept_all_with_empty_queue_fails_cleanly() {
        let db = testing::database().await;
        seed_pair(&db).await;

        let err = accept_all(&db, "u_bob", testing::moment(), testing::utc())
            .await
            .expect_err("empty queue must fail");
        assert!(matches!(err, LedgerError::NoPendingTransfers(_)));

        let err = accept_all(&db, "u_ghost", testing::moment(), testing::utc())
            .await
            .expect_err("unknown account must fail");
        assert!(matches!(err, LedgerError::UnknownAccount(_)));
    }

    #[tokio::test]
    async fn send_moves_only_the_senders_given_counters() {
        let db = testing::database().await;
        seed_pair(&db).await;
        let now = testing::moment();

        let transfer = send(&db, offer(15), now, testing::utc())
            .await
            .expect("send succeeds");
        assert_eq!(transfer.amount, 15);

        let alice = testing::fetch_account(&db, "u_alice").await;
        assert_eq!(alice.all_time_given, 15);
        assert_eq!(alice.daily_given, 15);
        assert_eq!(alice.weekly_given, 15);
        assert_eq!(alice.monthly_given, 15);
        assert_eq!(alice.all_time_received, 0);

        // Recipient untouched until acceptance; offer is queued.
        let bob = testing::fetch_account(&db, "u_bob").await;
        assert_eq!(bob.all_time_received, 0);
        assert_eq!(queue::total_pending(&db, "u_bob").await.unwrap(), 15);
        assert_eq!(activity_count(&db, "u_alice").await, 1);
    }

    #[tokio::test]
    async fn send_with_invalid_amount_leaves_sender_untouched() {
        let db = testing::database().await;
        seed_pair(&db).await;

        let err = send(&db, offer(0), testing::moment(), testing::utc())
            .await
            .expect_err("zero amount must fail");
        assert!(matches!(err, LedgerError::InvalidAmount(0)));

        let alice = testing::fetch_account(&db, "u_alice").await;
        assert_eq!(alice.all_time_given, 0);
        assert_eq!(activity_count(&db, "u_alice").await, 0);
    }

    #[tokio::test]
    async fn settlement_runs_rollover_before_crediting() {
        let db = testing::database().await;
        seed_pair(&db).await;

        // Credit on Wednesday, then accept a transfer on Thursday: the daily
        // counter restarts from the new settlement alone.
        let wednesday = chrono::Utc.with_ymd_and_hms(2026, 8, 19, 9, 0, 0).unwrap();
        testing_credit(&db, "u_bob", 5, wednesday, testing::utc())
            .await
            .expect("credit applies");

        let thursday = testing::moment();
        let transfer = queue::enqueue(&db, offer(40), thursday).await.unwrap();
        accept_one(&db, transfer.id, thursday, testing::utc())
            .await
            .expect("settlement succeeds");

        let bob = testing::fetch_account(&db, "u_bob").await;
        assert_eq!(bob.daily_received, 40);
        assert_eq!(bob.weekly_received, 45);
        assert_eq!(bob.monthly_received, 45);
        assert_eq!(bob.all_time_received, 45);
    }

    #[tokio::test]
    async fn counters_never_go_negative_across_a_mixed_sequence() {
        let db = testing::database().await;
        seed_pair(&db).await;
        let now = testing::moment();

        let first = send(&db, offer(5), now, testing::utc()).await.unwrap();
        send(&db, offer(7), now, testing::utc()).await.unwrap();
        accept_one(&db, first.id, now, testing::utc()).await.unwrap();
        accept_all(&db, "u_bob", now, testing::utc()).await.unwrap();

        for user in ["u_alice", "u_bob"] {
            let account = testing::fetch_account(&db, user).await;
            for counter in [
                account.all_time_received,
                account.all_time_given,
                account.daily_received,
                account.daily_given,
                account.weekly_received,
                account.weekly_given,
                account.monthly_received,
                account.monthly_given,
            ] {
                assert!(counter >= 0, "counter went negative for {user}");
            }
        }
    }

    #[tokio::test]
    async fn activity_feed_is_append_only_and_ordered() {
        let db = testing::database().await;
        seed_pair(&db).await;
        let now = testing::moment();

        let first = queue::enqueue(&db, offer(10), now).await.unwrap();
        let second = queue::enqueue(&db, offer(20), now).await.unwrap();
        accept_one(&db, first.id, now, testing::utc()).await.unwrap();
        accept_one(&db, second.id, now + chrono::Duration::seconds(30), testing::utc())
            .await
            .unwrap();

        let entries = activity_entry::Entity::find()
            .filter(activity_entry::Column::AccountId.eq("u_bob"))
            .order_by_asc(activity_entry::Column::Id)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].message.contains("10 tokens"));
        assert!(entries[1].message.contains("20 tokens"));
    }
}
