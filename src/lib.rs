//! # Pactum - Decentralized Agent Protocol Engine
//!
//! A protocol engine for autonomous agents exchanging encrypted, addressed
//! messages to establish connections and issue, hold, and prove credentials:
//! - **fsm**: guarded finite-state-machine engine for record lifecycles
//! - **store**: tagged wallet record store with predicate search
//! - **envelope**: sealed, key-addressed message envelopes
//! - **dispatch**: message-type registry routing inbound protocol messages
//! - **protocol**: connection, credential, proof and schema services
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pactum::store::{Wallet, WalletConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Open an agent wallet
//!     let wallet = Wallet::open(WalletConfig::new("alice")).await.unwrap();
//!     println!("Wallet open: {}", wallet.name());
//! }
//! ```

pub mod core;
pub mod dispatch;
pub mod envelope;
pub mod fsm;
pub mod messages;
pub mod protocol;
pub mod provider;
pub mod records;
pub mod store;

pub use core::error::{Error, Result};
