//! Tagged wallet record store.
//!
//! Persistence and query layer shared by every protocol service acting for
//! one agent identity. Records are stored per kind, addressed by id, with a
//! denormalized tag projection written atomically with the body. Search is
//! an exact-match (or range) predicate over tags, returned in insertion
//! order.

mod query;
mod wallet;

pub use query::{SearchQuery, TagFilter};
pub use wallet::{Wallet, WalletConfig};
