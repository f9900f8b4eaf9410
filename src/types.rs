//! Types for stored event logs and filter predicates.
//!
//! These types are the storage-facing shapes, separate from any RPC
//! response formats. Topic arrays are fixed at [`TOPIC_SLOTS`] entries with
//! an explicit `Option` per slot: `None` in a record means the topic is
//! absent, `None` in a filter means the slot is a wildcard. The two are
//! deliberately distinct notions and never share a sentinel value.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Number of topic slots carried by every record and every filter.
///
/// Slot 0 conventionally holds the event signature hash; slots 1..=4 hold
/// indexed event arguments.
pub const TOPIC_SLOTS: usize = 5;

/// One persisted contract-emitted event.
///
/// Records are immutable: created once by the block-processing pipeline,
/// never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Hash of the containing block.
    pub block_id: B256,
    /// Height of the containing block.
    pub block_number: u64,
    /// Hash of the originating transaction.
    pub tx_id: B256,
    /// Address that signed the originating transaction.
    pub tx_origin: Address,
    /// Contract address that emitted the event (always a contract).
    pub address: Address,
    /// ABI-encoded event payload, opaque to the store.
    pub data: Bytes,
    /// Indexed topics; `None` marks an absent slot.
    pub topics: [Option<B256>; TOPIC_SLOTS],
}

/// One filter predicate over the log store.
///
/// Fields within a filter combine with AND; a list of filters passed to
/// [`crate::LogStore::filter`] combines with OR. A topic slot of `None` is
/// a wildcard and matches any record, including one whose corresponding
/// topic is absent. Block bounds are inclusive; an inverted range
/// (`from_block > to_block`) is not an error, it simply matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Lowest matching block number, inclusive.
    pub from_block: u64,
    /// Highest matching block number, inclusive.
    pub to_block: u64,
    /// Exact-match emitting contract address.
    pub address: Address,
    /// Per-slot topic constraints; `None` is a wildcard.
    pub topics: [Option<B256>; TOPIC_SLOTS],
}

impl LogFilter {
    /// Match every record in a block range from one address, regardless of
    /// topics.
    pub fn for_address(address: Address, from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            address,
            topics: [None; TOPIC_SLOTS],
        }
    }

    /// Whether `record` satisfies this filter.
    ///
    /// This is the reference semantics for the store's query path: a
    /// required topic only matches an identical stored topic (an absent
    /// stored topic matches no required value), while a wildcard slot
    /// matches anything.
    pub fn matches(&self, record: &LogRecord) -> bool {
        if record.block_number < self.from_block || record.block_number > self.to_block {
            return false;
        }
        if record.address != self.address {
            return false;
        }
        self.topics
            .iter()
            .zip(record.topics.iter())
            .all(|(wanted, stored)| match wanted {
                None => true,
                Some(topic) => stored.as_ref() == Some(topic),
            })
    }
}
