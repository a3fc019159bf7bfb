//! Persistence collaborators
//!
//! The engine writes through the [`Store`] trait on every state change.
//! Two implementations ship with the crate:
//!
//! - [`RocksStore`] - RocksDB with one column family per record kind
//! - [`MemoryStore`] - process-local maps, for tests and dry runs
//!
//! # Column Families
//!
//! - `holders` - Holder records (key: holder id)
//! - `inventory` - Availability snapshot (key: `available`)
//! - `transactions` - Append-only audit trail (key: big-endian sequence)

use crate::{
    error::{Error, Result},
    types::{ClassCounts, Holder, TransactionRecord},
    Config,
};
use parking_lot::{Mutex, RwLock};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Column family names
const CF_HOLDERS: &str = "holders";
const CF_INVENTORY: &str = "inventory";
const CF_TRANSACTIONS: &str = "transactions";

const INVENTORY_KEY: &[u8] = b"available";

/// Load/save collaborator for holders, inventory and the audit trail
pub trait Store: Send + Sync {
    /// All persisted holders
    fn load_holders(&self) -> Result<Vec<Holder>>;

    /// Insert or overwrite one holder
    fn save_holder(&self, holder: &Holder) -> Result<()>;

    /// Persisted availability, if any was ever saved
    fn load_inventory(&self) -> Result<Option<ClassCounts>>;

    /// Overwrite the availability snapshot
    fn save_inventory(&self, available: &ClassCounts) -> Result<()>;

    /// Append one audit record; records are never rewritten
    fn append_transaction(&self, record: &TransactionRecord) -> Result<()>;

    /// Full audit trail in append order
    fn load_transactions(&self) -> Result<Vec<TransactionRecord>>;

    /// Persist a committed allocation or cancellation
    ///
    /// Implementations that can write atomically should override this.
    fn commit(
        &self,
        holder: &Holder,
        available: &ClassCounts,
        record: &TransactionRecord,
    ) -> Result<()> {
        self.save_holder(holder)?;
        self.save_inventory(available)?;
        self.append_transaction(record)
    }

    /// Flush buffered writes (shutdown)
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// RocksDB

/// RocksDB-backed store
pub struct RocksStore {
    db: Arc<DB>,
    sync_writes: bool,
    next_seq: Mutex<u64>,
}

impl RocksStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_HOLDERS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INVENTORY, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let store = Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
            next_seq: Mutex::new(0),
        };
        *store.next_seq.lock() = store.last_sequence()?.map_or(0, |s| s + 1);

        tracing::info!(
            path = ?path,
            next_seq = *store.next_seq.lock(),
            "Opened RocksDB allocation store"
        );

        Ok(store)
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Holders are read at startup and rewritten often
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn last_sequence(&self) -> Result<Option<u64>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let mut iter = self.db.iterator_cf(cf, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let bytes: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed transaction key".to_string()))?;
                Ok(Some(u64::from_be_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    fn take_sequence(&self) -> u64 {
        let mut next = self.next_seq.lock();
        let seq = *next;
        *next += 1;
        seq
    }
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}

impl Store for RocksStore {
    fn load_holders(&self) -> Result<Vec<Holder>> {
        let cf = self.cf_handle(CF_HOLDERS)?;
        let mut holders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            holders.push(bincode::deserialize(&value)?);
        }
        Ok(holders)
    }

    fn save_holder(&self, holder: &Holder) -> Result<()> {
        let cf = self.cf_handle(CF_HOLDERS)?;
        let value = bincode::serialize(holder)?;
        self.db
            .put_cf_opt(cf, holder.id.as_str().as_bytes(), value, &self.write_opts())?;
        Ok(())
    }

    fn load_inventory(&self) -> Result<Option<ClassCounts>> {
        let cf = self.cf_handle(CF_INVENTORY)?;
        match self.db.get_cf(cf, INVENTORY_KEY)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn save_inventory(&self, available: &ClassCounts) -> Result<()> {
        let cf = self.cf_handle(CF_INVENTORY)?;
        let value = bincode::serialize(available)?;
        self.db.put_cf_opt(cf, INVENTORY_KEY, value, &self.write_opts())?;
        Ok(())
    }

    fn append_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = bincode::serialize(record)?;
        let seq = self.take_sequence();
        self.db
            .put_cf_opt(cf, seq.to_be_bytes(), value, &self.write_opts())?;

        tracing::debug!(
            seq,
            record_id = %record.record_id,
            holder = %record.holder,
            outcome = %record.outcome,
            "Transaction appended"
        );
        Ok(())
    }

    fn load_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    fn commit(
        &self,
        holder: &Holder,
        available: &ClassCounts,
        record: &TransactionRecord,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Holder
        let cf_holders = self.cf_handle(CF_HOLDERS)?;
        batch.put_cf(cf_holders, holder.id.as_str().as_bytes(), bincode::serialize(holder)?);

        // 2. Inventory
        let cf_inventory = self.cf_handle(CF_INVENTORY)?;
        batch.put_cf(cf_inventory, INVENTORY_KEY, bincode::serialize(available)?);

        // 3. Audit record
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let seq = self.take_sequence();
        batch.put_cf(cf_transactions, seq.to_be_bytes(), bincode::serialize(record)?);

        // Atomic commit
        self.db.write_opt(batch, &self.write_opts())?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

// In-memory

#[derive(Debug, Default)]
struct MemoryState {
    holders: BTreeMap<String, Holder>,
    inventory: Option<ClassCounts>,
    transactions: Vec<TransactionRecord>,
}

/// Process-local store
///
/// Clones share the same state, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a storage error
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Storage("Injected write failure".to_string()));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn load_holders(&self) -> Result<Vec<Holder>> {
        Ok(self.state.read().holders.values().cloned().collect())
    }

    fn save_holder(&self, holder: &Holder) -> Result<()> {
        self.check_writable()?;
        self.state
            .write()
            .holders
            .insert(holder.id.as_str().to_string(), holder.clone());
        Ok(())
    }

    fn load_inventory(&self) -> Result<Option<ClassCounts>> {
        Ok(self.state.read().inventory)
    }

    fn save_inventory(&self, available: &ClassCounts) -> Result<()> {
        self.check_writable()?;
        self.state.write().inventory = Some(*available);
        Ok(())
    }

    fn append_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.check_writable()?;
        self.state.write().transactions.push(record.clone());
        Ok(())
    }

    fn load_transactions(&self) -> Result<Vec<TransactionRecord>> {
        Ok(self.state.read().transactions.clone())
    }

    fn commit(
        &self,
        holder: &Holder,
        available: &ClassCounts,
        record: &TransactionRecord,
    ) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.write();
        state
            .holders
            .insert(holder.id.as_str().to_string(), holder.clone());
        state.inventory = Some(*available);
        state.transactions.push(record.clone());
        Ok(())
    }
}
