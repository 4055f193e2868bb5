pub mod account;
pub mod activity_entry;
pub mod pending_transfer;
pub mod prelude;
