//! Ledger core: period rollover, the pending transfer queue and the
//! settlement engine that moves transfers from pending to settled.

pub mod queue;
pub mod rollover;
pub mod settlement;

use thiserror::Error;

/// Defensive upper bound on a single transfer (1 billion tokens).
pub const MAX_TRANSFER_AMOUNT: i64 = 1_000_000_000;

/// Which side of the ledger a settlement credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Received,
    Given,
}

/// Everything here is recoverable by the caller; nothing is process-fatal.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account {0} not found")]
    UnknownAccount(String),
    #[error("transfer amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("transfer {0} not found")]
    TransferNotFound(i64),
    #[error("no pending transfers for account {0}")]
    NoPendingTransfers(String),
    #[error("account {0} changed concurrently; retry the operation")]
    ConcurrencyConflict(String),
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}
