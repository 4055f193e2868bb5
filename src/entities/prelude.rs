#![allow(unused_imports)]

pub use super::account::Entity as Account;
pub use super::activity_entry::Entity as ActivityEntry;
pub use super::pending_transfer::Entity as PendingTransfer;
