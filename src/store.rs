//! Persistent log store backed by SQLite.
//!
//! Uses a connection pool (r2d2) for concurrent filter queries and a
//! dedicated writer connection for serialized batch inserts. A store-owned
//! reader/writer lock is the single synchronization point: `insert` holds
//! it exclusively for the duration of its transaction, `filter` holds it
//! shared, so a query never observes a half-committed batch.

use alloy_primitives::{Address, Bytes, B256};
use parking_lot::{Mutex, RwLock};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::error::{LogStoreError, LogStoreResult};
use crate::types::{LogFilter, LogRecord, TOPIC_SLOTS};

/// Schema for the log table.
///
/// Hashes and addresses are raw BLOBs (32 and 20 bytes), absent topics are
/// NULL. The `id` column is not part of the logical record; it exists so
/// query results have a documented, stable order (insertion order).
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS logs (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         block_id BLOB NOT NULL,
         block_number INTEGER NOT NULL,
         tx_id BLOB NOT NULL,
         tx_origin BLOB NOT NULL,
         address BLOB NOT NULL,
         data BLOB NOT NULL,
         topic0 BLOB,
         topic1 BLOB,
         topic2 BLOB,
         topic3 BLOB,
         topic4 BLOB
     );
     CREATE INDEX IF NOT EXISTS idx_logs_block ON logs(block_number);
     CREATE INDEX IF NOT EXISTS idx_logs_address ON logs(address);";

const INSERT_SQL: &str = "INSERT INTO logs
     (block_id, block_number, tx_id, tx_origin, address, data,
      topic0, topic1, topic2, topic3, topic4)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SELECT_COLUMNS: &str = "SELECT block_id, block_number, tx_id, tx_origin, address, data,
      topic0, topic1, topic2, topic3, topic4 FROM logs";

/// Persistent store for contract event logs.
///
/// One instance owns the underlying database handle; all access funnels
/// through it. Insert and filter may be called from any number of threads.
#[derive(Debug)]
pub struct LogStore {
    path: String,
    /// Shared/exclusive guard: filters shared, inserts exclusive.
    guard: RwLock<()>,
    /// Dedicated connection for batch inserts (serialized).
    writer: Mutex<Connection>,
    /// Connection pool for filter queries (concurrent).
    read_pool: Pool<SqliteConnectionManager>,
}

/// Configure a connection with standard PRAGMAs for WAL mode.
fn configure_connection(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;",
    )
}

fn open_err(err: impl ToString) -> LogStoreError {
    LogStoreError::Open(err.to_string())
}

fn insert_err(err: impl ToString) -> LogStoreError {
    LogStoreError::Insert(err.to_string())
}

fn query_err(err: impl ToString) -> LogStoreError {
    LogStoreError::Query(err.to_string())
}

impl LogStore {
    /// Open or create the log database at `path`.
    ///
    /// Provisions the log table and its indexes if they do not exist yet.
    /// The store is process-lifetime state; there is no close operation.
    pub fn open(path: impl AsRef<std::path::Path>) -> LogStoreResult<Self> {
        let path = path.as_ref();

        // Writer connection creates the file and the schema.
        let writer = Connection::open(path).map_err(open_err)?;
        configure_connection(&writer).map_err(open_err)?;
        writer.execute_batch(SCHEMA).map_err(open_err)?;

        // Read pool: concurrent read-only connections.
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_init(|conn| configure_connection(conn));
        let read_pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(open_err)?;

        tracing::info!(path = %path.display(), "opened log store");
        Ok(Self {
            path: path.display().to_string(),
            guard: RwLock::new(()),
            writer: Mutex::new(writer),
            read_pool,
        })
    }

    /// Create an in-memory log store for testing.
    ///
    /// In-memory SQLite databases are per-connection, so this uses a named
    /// shared-cache URI to let the writer and the pooled readers see the
    /// same data.
    pub fn in_memory() -> LogStoreResult<Self> {
        let uri = format!("file:logstore_{}?mode=memory&cache=shared", unique_id());

        let writer = Connection::open(&uri).map_err(open_err)?;
        configure_connection(&writer).map_err(open_err)?;
        writer.execute_batch(SCHEMA).map_err(open_err)?;

        let manager =
            SqliteConnectionManager::file(&uri).with_init(|conn| configure_connection(conn));
        let read_pool = Pool::builder()
            .max_size(2)
            .build(manager)
            .map_err(open_err)?;

        Ok(Self {
            path: uri,
            guard: RwLock::new(()),
            writer: Mutex::new(writer),
            read_pool,
        })
    }

    /// The configured database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Insert a batch of records as one atomic write.
    ///
    /// Either every record in `records` becomes durably visible or none
    /// does: any row-level failure rolls the whole transaction back and
    /// leaves the store's visible state unchanged. An empty batch is a
    /// no-op. There is no implicit retry; the caller decides whether to
    /// resubmit.
    pub fn insert(&self, records: &[LogRecord]) -> LogStoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.guard.write();
        let mut conn = self.writer.lock();
        let tx = conn.transaction().map_err(insert_err)?;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL).map_err(insert_err)?;
            for record in records {
                // SQLite INTEGER is signed 64-bit; reject rather than wrap.
                let block_number = i64::try_from(record.block_number)
                    .map_err(|_| insert_err("block number exceeds i64 range"))?;
                stmt.execute(params![
                    record.block_id.as_slice(),
                    block_number,
                    record.tx_id.as_slice(),
                    record.tx_origin.as_slice(),
                    record.address.as_slice(),
                    record.data.as_ref(),
                    record.topics[0].as_ref().map(|t| t.as_slice()),
                    record.topics[1].as_ref().map(|t| t.as_slice()),
                    record.topics[2].as_ref().map(|t| t.as_slice()),
                    record.topics[3].as_ref().map(|t| t.as_slice()),
                    record.topics[4].as_ref().map(|t| t.as_slice()),
                ])
                .map_err(insert_err)?;
            }
        }
        tx.commit().map_err(insert_err)?;

        tracing::debug!(count = records.len(), "committed log batch");
        Ok(())
    }

    /// Return every record satisfying at least one filter in `criteria`.
    ///
    /// A record satisfies a filter iff its block number falls inside the
    /// inclusive range, its address matches exactly, and every non-wildcard
    /// topic slot matches the stored topic exactly. An empty criteria list
    /// returns every stored record (explicit full-scan semantics; callers
    /// relying on this must be aware of the cost). A record matching
    /// several filters still appears exactly once.
    ///
    /// Results are in insertion order, stable for a fixed store state.
    pub fn filter(&self, criteria: &[LogFilter]) -> LogStoreResult<Vec<LogRecord>> {
        let _guard = self.guard.read();
        let conn = self.read_pool.get().map_err(query_err)?;

        let (sql, args) = build_filter_query(criteria);
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_record)
            .map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }
}

/// Translate a list of filters into one SELECT with bound parameters.
///
/// Every field value is bound, never interpolated into the statement text:
/// attacker-influenced data (origin, address, topics) must not be able to
/// alter query structure. Wildcard topic slots emit no clause at all, which
/// is what lets them match rows whose topic column is NULL; a required slot
/// emits `topicN = ?`, which under SQL NULL semantics never matches an
/// absent topic.
fn build_filter_query(criteria: &[LogFilter]) -> (String, Vec<Value>) {
    let mut sql = String::from(SELECT_COLUMNS);
    let mut args: Vec<Value> = Vec::new();

    if !criteria.is_empty() {
        let mut groups = Vec::with_capacity(criteria.len());
        for filter in criteria {
            let mut clauses = vec![
                "block_number >= ?".to_string(),
                "block_number <= ?".to_string(),
                "address = ?".to_string(),
            ];
            args.push(Value::Integer(block_bound(filter.from_block)));
            args.push(Value::Integer(block_bound(filter.to_block)));
            args.push(Value::Blob(filter.address.as_slice().to_vec()));
            for (slot, topic) in filter.topics.iter().enumerate() {
                if let Some(topic) = topic {
                    clauses.push(format!("topic{slot} = ?"));
                    args.push(Value::Blob(topic.as_slice().to_vec()));
                }
            }
            groups.push(format!("({})", clauses.join(" AND ")));
        }
        sql.push_str(" WHERE ");
        sql.push_str(&groups.join(" OR "));
    }

    sql.push_str(" ORDER BY id");
    (sql, args)
}

/// Clamp a block bound to SQLite's signed 64-bit INTEGER.
///
/// No stored row can exceed `i64::MAX` (insert rejects them), so clamping
/// an oversized bound preserves the filter's meaning.
fn block_bound(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogRecord> {
    let block_id: Vec<u8> = row.get(0)?;
    let block_number: i64 = row.get(1)?;
    let tx_id: Vec<u8> = row.get(2)?;
    let tx_origin: Vec<u8> = row.get(3)?;
    let address: Vec<u8> = row.get(4)?;
    let data: Vec<u8> = row.get(5)?;

    let mut topics = [None; TOPIC_SLOTS];
    for (slot, topic) in topics.iter_mut().enumerate() {
        let raw: Option<Vec<u8>> = row.get(6 + slot)?;
        *topic = raw.as_deref().map(|b| b256_from_row(b, 6 + slot)).transpose()?;
    }

    Ok(LogRecord {
        block_id: b256_from_row(&block_id, 0)?,
        block_number: block_number as u64,
        tx_id: b256_from_row(&tx_id, 2)?,
        tx_origin: address_from_row(&tx_origin, 3)?,
        address: address_from_row(&address, 4)?,
        data: Bytes::from(data),
        topics,
    })
}

fn b256_from_row(bytes: &[u8], col: usize) -> rusqlite::Result<B256> {
    if bytes.len() != 32 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Blob,
            format!("expected 32 bytes for B256, got {}", bytes.len()).into(),
        ));
    }
    Ok(B256::from_slice(bytes))
}

fn address_from_row(bytes: &[u8], col: usize) -> rusqlite::Result<Address> {
    if bytes.len() != 20 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Blob,
            format!("expected 20 bytes for Address, got {}", bytes.len()).into(),
        ));
    }
    Ok(Address::from_slice(bytes))
}

/// Generate a unique name for in-memory shared-cache SQLite databases.
fn unique_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}


#[cfg(test)]
mod model_tests {
    use super::tests::make_test_record;
    use super::*;
    use proptest::prelude::*;

    /// Reference model: a plain vector plus the `LogFilter::matches`
    /// predicate, kept in insertion order like the store.
    #[derive(Debug, Default)]
    struct LogStoreModel {
        records: Vec<LogRecord>,
    }

    impl LogStoreModel {
        fn insert(&mut self, records: &[LogRecord]) {
            self.records.extend_from_slice(records);
        }

        fn filter(&self, criteria: &[LogFilter]) -> Vec<LogRecord> {
            self.records
                .iter()
                .filter(|record| {
                    criteria.is_empty() || criteria.iter().any(|c| c.matches(record))
                })
                .cloned()
                .collect()
        }
    }

    #[derive(Debug, Clone)]
    enum Operation {
        Insert(Vec<LogRecord>),
        Filter(Vec<LogFilter>),
    }

    // Small value pools so inserts and filters actually collide.
    fn arb_address() -> impl Strategy<Value = Address> {
        (0u8..3).prop_map(Address::repeat_byte)
    }

    fn arb_topic_slot() -> impl Strategy<Value = Option<B256>> {
        prop_oneof![
            3 => Just(None),
            2 => (1u8..4).prop_map(|b| Some(B256::repeat_byte(b))),
        ]
    }

    fn arb_topics() -> impl Strategy<Value = [Option<B256>; TOPIC_SLOTS]> {
        proptest::array::uniform5(arb_topic_slot())
    }

    fn arb_record() -> impl Strategy<Value = LogRecord> {
        (0u64..20, arb_address(), arb_topics(), proptest::collection::vec(any::<u8>(), 0..8))
            .prop_map(|(block_number, address, topics, data)| {
                let mut record = make_test_record(block_number, address, topics);
                record.data = Bytes::from(data);
                record
            })
    }

    fn arb_filter() -> impl Strategy<Value = LogFilter> {
        (0u64..20, 0u64..25, arb_address(), arb_topics()).prop_map(
            |(from_block, to_block, address, topics)| LogFilter {
                from_block,
                to_block,
                address,
                topics,
            },
        )
    }

    fn arb_operation() -> impl Strategy<Value = Operation> {
        prop_oneof![
            proptest::collection::vec(arb_record(), 0..4).prop_map(Operation::Insert),
            proptest::collection::vec(arb_filter(), 0..3).prop_map(Operation::Filter),
        ]
    }

    proptest! {
        /// The store behaves identically to the in-memory reference model
        /// over arbitrary insert/filter interleavings, result order
        /// included.
        #[test]
        fn prop_store_matches_model(
            operations in proptest::collection::vec(arb_operation(), 1..25)
        ) {
            let store = LogStore::in_memory().unwrap();
            let mut model = LogStoreModel::default();

            for op in operations {
                match op {
                    Operation::Insert(records) => {
                        store.insert(&records).unwrap();
                        model.insert(&records);
                    }
                    Operation::Filter(criteria) => {
                        let got = store.filter(&criteria).unwrap();
                        let expected = model.filter(&criteria);
                        prop_assert_eq!(got, expected);
                    }
                }
            }
        }

        /// Every inserted record is found again by a filter built from its
        /// own fields, with every topic slot required.
        #[test]
        fn prop_exact_filter_round_trips(records in proptest::collection::vec(arb_record(), 1..10)) {
            let store = LogStore::in_memory().unwrap();
            store.insert(&records).unwrap();

            for record in &records {
                let criteria = LogFilter {
                    from_block: record.block_number,
                    to_block: record.block_number,
                    address: record.address,
                    topics: record.topics,
                };
                let found = store.filter(&[criteria]).unwrap();
                prop_assert!(found.contains(record));
            }
        }
    }
}
