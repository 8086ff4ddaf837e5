//! redb-backed store — a single ordered byte-key table with auto-commit
//! operations, scoped write transactions, and a failure hook.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use crate::error::KvError;
use crate::Kv;

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("ordinals");
const DB_FILE: &str = "ordinals.redb";

type FailureHook = Box<dyn Fn(&KvError) + Send + Sync>;

struct StoreInner {
    dir: PathBuf,
    db: RwLock<Option<Database>>,
    failure_hook: Mutex<Option<FailureHook>>,
}

/// Cloneable handle to the on-disk store.
///
/// Every clone refers to the same database; `close` and `reopen` affect all
/// of them. Individual `put`/`remove` calls commit immediately, so writes
/// are visible to subsequent reads without an explicit commit. Multi-key
/// atomicity is available through [`KvStore::batch`].
#[derive(Clone)]
pub struct KvStore {
    inner: Arc<StoreInner>,
}

impl KvStore {
    /// Open (or create) the store in the given directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, KvError> {
        let dir = dir.as_ref().to_path_buf();
        let db = Self::open_db(&dir)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                db: RwLock::new(Some(db)),
                failure_hook: Mutex::new(None),
            }),
        })
    }

    fn open_db(dir: &Path) -> Result<Database, KvError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| KvError::Backend(format!("create {}: {e}", dir.display())))?;
        let db = Database::create(dir.join(DB_FILE))
            .map_err(|e| KvError::Backend(e.to_string()))?;
        // Make sure the table exists so that read transactions never race
        // its creation.
        let txn = db.begin_write().map_err(|e| KvError::Backend(e.to_string()))?;
        txn.open_table(TABLE)
            .map_err(|e| KvError::Backend(e.to_string()))?;
        txn.commit().map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(db)
    }

    /// Attach the failure hook. Invoked with every storage error before it
    /// is returned to the caller; the indexer uses this to log and decide
    /// whether to hold back its checkpoint.
    pub fn set_failure_hook(&self, hook: impl Fn(&KvError) + Send + Sync + 'static) {
        *self.inner.failure_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Close the store. Subsequent operations fail with [`KvError::Closed`]
    /// until [`reopen`](Self::reopen) succeeds.
    pub fn close(&self) {
        self.inner.db.write().unwrap().take();
    }

    /// Reopen a closed store (the single lazy-reinit the indexer attempts
    /// after a storage failure).
    pub fn reopen(&self) -> Result<(), KvError> {
        let mut slot = self.inner.db.write().unwrap();
        if slot.is_none() {
            tracing::warn!(dir = %self.inner.dir.display(), "Reopening closed store");
            *slot = Some(Self::open_db(&self.inner.dir).map_err(|e| self.fail(e))?);
        }
        Ok(())
    }

    /// Drop every entry (rebuild path). The table is deleted and recreated
    /// in one transaction.
    pub fn clear(&self) -> Result<(), KvError> {
        self.with_db(|db| {
            let txn = db.begin_write().map_err(|e| KvError::Backend(e.to_string()))?;
            txn.delete_table(TABLE)
                .map_err(|e| KvError::Backend(e.to_string()))?;
            txn.open_table(TABLE)
                .map_err(|e| KvError::Backend(e.to_string()))?;
            txn.commit().map_err(|e| KvError::Backend(e.to_string()))
        })
    }

    /// Total number of entries.
    pub fn size(&self) -> Result<u64, KvError> {
        self.with_table(|table| table.len().map_err(|e| KvError::Backend(e.to_string())))
    }

    /// Entry with the lexicographically smallest key.
    pub fn first(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        self.with_table(|table| {
            let pair = table.first().map_err(|e| KvError::Backend(e.to_string()))?;
            Ok(pair.map(|(k, v)| (k.value().to_vec(), v.value().to_vec())))
        })
    }

    /// Entry with the lexicographically largest key.
    pub fn last(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        self.with_table(|table| {
            let pair = table.last().map_err(|e| KvError::Backend(e.to_string()))?;
            Ok(pair.map(|(k, v)| (k.value().to_vec(), v.value().to_vec())))
        })
    }

    /// Run `f` inside a single write transaction. All puts and removes either
    /// commit together or, if `f` returns an error, not at all. Reads inside
    /// the batch observe its own pending writes.
    pub fn batch<T, E>(&self, f: impl FnOnce(&mut KvBatch<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<KvError>,
    {
        let guard = self.inner.db.read().unwrap();
        let db = match guard.as_ref() {
            Some(db) => db,
            None => return Err(self.fail(KvError::Closed).into()),
        };
        let txn = db
            .begin_write()
            .map_err(|e| self.fail(KvError::Backend(e.to_string())))?;
        let out = {
            let table = match txn.open_table(TABLE) {
                Ok(table) => table,
                Err(e) => return Err(self.fail(KvError::Backend(e.to_string())).into()),
            };
            let mut batch = KvBatch { table };
            f(&mut batch)
        };
        match out {
            Ok(value) => {
                txn.commit()
                    .map_err(|e| self.fail(KvError::Backend(e.to_string())))?;
                Ok(value)
            }
            // Dropping the transaction without commit aborts it.
            Err(e) => Err(e),
        }
    }

    fn fail(&self, err: KvError) -> KvError {
        if let Some(hook) = self.inner.failure_hook.lock().unwrap().as_ref() {
            hook(&err);
        }
        err
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T, KvError>) -> Result<T, KvError> {
        let guard = self.inner.db.read().unwrap();
        match guard.as_ref() {
            Some(db) => f(db).map_err(|e| self.fail(e)),
            None => Err(self.fail(KvError::Closed)),
        }
    }

    fn with_table<T>(
        &self,
        f: impl FnOnce(&redb::ReadOnlyTable<&'static [u8], &'static [u8]>) -> Result<T, KvError>,
    ) -> Result<T, KvError> {
        self.with_db(|db| {
            let txn = db.begin_read().map_err(|e| KvError::Backend(e.to_string()))?;
            let table = txn
                .open_table(TABLE)
                .map_err(|e| KvError::Backend(e.to_string()))?;
            f(&table)
        })
    }
}

impl Kv for KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.with_table(|table| {
            let value = table.get(key).map_err(|e| KvError::Backend(e.to_string()))?;
            Ok(value.map(|v| v.value().to_vec()))
        })
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.batch(move |b| b.put(&key, &value))
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), KvError> {
        let key = key.to_vec();
        self.batch(move |b| b.remove(&key))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KvError> {
        self.with_table(|table| {
            let value = table.get(key).map_err(|e| KvError::Backend(e.to_string()))?;
            Ok(value.is_some())
        })
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), KvError> {
        self.with_table(|table| {
            let range = table
                .range(prefix..)
                .map_err(|e| KvError::Backend(e.to_string()))?;
            for entry in range {
                let (k, v) = entry.map_err(|e| KvError::Backend(e.to_string()))?;
                let key = k.value();
                if !key.starts_with(prefix) {
                    break;
                }
                if !visit(key, v.value()) {
                    break;
                }
            }
            Ok(())
        })
    }
}

/// A scoped write transaction over the store's table.
///
/// Obtained through [`KvStore::batch`]; every operation stages into the same
/// transaction and becomes durable only when the batch closure returns `Ok`.
pub struct KvBatch<'txn> {
    table: redb::Table<'txn, &'static [u8], &'static [u8]>,
}

impl Kv for KvBatch<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let value = self
            .table
            .get(key)
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        if key.is_empty() {
            return Err(KvError::Corrupt("empty key".into()));
        }
        self.table
            .insert(key, value)
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), KvError> {
        self.table
            .remove(key)
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), KvError> {
        let range = self
            .table
            .range(prefix..)
            .map_err(|e| KvError::Backend(e.to_string()))?;
        for entry in range {
            let (k, v) = entry.map_err(|e| KvError::Backend(e.to_string()))?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            if !visit(key, v.value()) {
                break;
            }
        }
        Ok(())
    }
}
