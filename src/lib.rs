//! Persisted event-log index.
//!
//! This crate stores the immutable log records emitted by transaction
//! execution (one contract event per record) and answers range/attribute
//! filter queries over them. It is the node's `eth_getLogs`-style facility,
//! kept separate from core state storage so chain data can have its own
//! retention and access patterns.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌─────────────────────┐
//! │ Block processing     │      │ Query consumers     │
//! │ (receipt extraction) │      │ (RPC, subscriptions)│
//! └──────────┬───────────┘      └──────────┬──────────┘
//!            │ insert (exclusive)          │ filter (shared)
//!            ▼                             ▼
//!      ┌───────────────────────────────────────┐
//!      │               LogStore                │
//!      │   guard ─ writer conn ─ read pool     │
//!      └───────────────────┬───────────────────┘
//!                          ▼
//!                    SQLite (WAL)
//! ```
//!
//! A batch insert is one SQLite transaction: either every record in the
//! batch becomes visible or none does. Filters run concurrently with each
//! other on pooled read-only connections; a store-owned reader/writer lock
//! keeps them from overlapping an in-flight insert.

pub mod error;
pub mod state;
pub mod store;
pub mod types;

pub use error::{LogStoreError, LogStoreResult};
pub use state::AccountState;
pub use store::LogStore;
pub use types::{LogFilter, LogRecord, TOPIC_SLOTS};
