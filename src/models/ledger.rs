use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub user_id: String,
    pub display_name: String,
    pub product: Option<String>,
    pub all_time_received: i64,
    pub all_time_given: i64,
    pub daily_received: i64,
    pub daily_given: i64,
    pub weekly_received: i64,
    pub weekly_given: i64,
    pub monthly_received: i64,
    pub monthly_given: i64,
    /// Live sum of the account's pending queue, never a stored counter.
    pub pending_total: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTransferView {
    pub id: i64,
    pub sender_id: String,
    pub sender_name: String,
    pub amount: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingQueueView {
    pub total: i64,
    pub transfers: Vec<PendingTransferView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntryView {
    pub id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferCreatedResponse {
    pub success: bool,
    pub transfer_id: i64,
    pub amount: i64,
    pub recipient_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptResponse {
    pub success: bool,
    pub amount: i64,
    pub from_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptAllResponse {
    pub success: bool,
    pub amount: i64,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn ranking_entry_wire_shape_is_flat() {
        let entry = RankingEntry {
            rank: 1,
            user_id: "u_alice".to_string(),
            display_name: "Alice".to_string(),
            amount: 40,
        };
        let value = serde_json::to_value(&entry).expect("entry serializes");
        assert_eq!(
            value,
            json!({
                "rank": 1,
                "user_id": "u_alice",
                "display_name": "Alice",
                "amount": 40,
            })
        );
    }

    #[test]
    fn pending_queue_view_nests_transfers_under_a_total() {
        let created_at = Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).unwrap();
        let view = PendingQueueView {
            total: 25,
            transfers: vec![PendingTransferView {
                id: 7,
                sender_id: "u_bob".to_string(),
                sender_name: "Bob".to_string(),
                amount: 25,
                note: None,
                created_at,
            }],
        };
        let value = serde_json::to_value(&view).expect("view serializes");
        assert_eq!(value["total"], json!(25));
        assert_eq!(value["transfers"][0]["id"], json!(7));
        assert_eq!(value["transfers"][0]["note"], serde_json::Value::Null);
        assert_eq!(
            value["transfers"][0]["created_at"],
            json!("2026-08-20T12:00:00Z")
        );
    }
}
