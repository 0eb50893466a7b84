//! redb-backed document store
//!
//! # Tables
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `registrations` | normalized email | `Registration` |
//! | `branches` | branch id | `Branch` |
//! | `users` | uid | `UserProfile` |
//! | `orders` | order id | `Order` |
//! | `order_lines` | `<orderId>/<productId>` | `OrderLine` |
//! | `accounts` | uid | identity account |
//!
//! Every value is a JSON document. Writes go through [`DocumentStore::transaction`],
//! which runs a synchronous closure inside one redb write transaction. redb
//! allows a single writer at a time and its write transactions are
//! serializable, so a read-validate-write inside one closure can never
//! interleave with another.

pub mod query;

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use query::{Direction, Query};

const REGISTRATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("registrations");
const BRANCHES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("branches");
const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");
/// Subordinate collection: key = `<orderId>/<productId>`
const ORDER_LINES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("order_lines");
const ACCOUNTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Separator between a parent id and a child id in subordinate keys
const CHILD_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Registrations,
    Branches,
    Users,
    Orders,
    OrderLines,
    Accounts,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Registrations,
        Collection::Branches,
        Collection::Users,
        Collection::Orders,
        Collection::OrderLines,
        Collection::Accounts,
    ];

    fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Collection::Registrations => REGISTRATIONS_TABLE,
            Collection::Branches => BRANCHES_TABLE,
            Collection::Users => USERS_TABLE,
            Collection::Orders => ORDERS_TABLE,
            Collection::OrderLines => ORDER_LINES_TABLE,
            Collection::Accounts => ACCOUNTS_TABLE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Collection::Registrations => "registrations",
            Collection::Branches => "branches",
            Collection::Users => "users",
            Collection::Orders => "orders",
            Collection::OrderLines => "order_lines",
            Collection::Accounts => "accounts",
        }
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists {
        collection: &'static str,
        id: String,
    },

    #[error("Invalid document key: {0:?}")]
    InvalidKey(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key of a child document under `parent`
pub fn child_key(parent: &str, child: &str) -> String {
    format!("{parent}{CHILD_SEPARATOR}{child}")
}

fn validate_key(id: &str) -> StoreResult<()> {
    if id.is_empty() || id.len() > 512 {
        return Err(StoreError::InvalidKey(id.to_string()));
    }
    Ok(())
}

/// Transactional JSON document store
#[derive(Clone)]
pub struct DocumentStore {
    db: Arc<Database>,
}

impl DocumentStore {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the write is on disk.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and local tooling)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        for collection in Collection::ALL {
            let _ = write_txn.open_table(collection.table())?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Point read outside any write transaction
    pub fn get<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> StoreResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;
        read_doc(&table, id)
    }

    pub fn query<T: DeserializeOwned>(&self, query: &Query) -> StoreResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(query.collection.table())?;
        scan(&table, query)
    }

    /// All children of `parent` in key order
    pub fn children<T: DeserializeOwned>(&self, collection: Collection, parent: &str) -> StoreResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;
        scan_children(&table, parent)
    }

    pub fn create<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> StoreResult<()> {
        self.transaction(|txn| txn.create(collection, id, doc))
    }

    pub fn set<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> StoreResult<()> {
        self.transaction(|txn| txn.set(collection, id, doc))
    }

    /// Deep-merge into an existing document, creating it when absent
    pub fn merge(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<Value> {
        self.transaction(|txn| txn.merge(collection, id, patch))
    }

    /// Run `f` inside one write transaction
    ///
    /// Commits when `f` returns `Ok`, aborts on `Err`. The closure is
    /// synchronous; nothing can await while the writer lock is held.
    pub fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&DocTxn<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let txn = self.db.begin_write().map_err(StoreError::from)?;
        let result = {
            let scope = DocTxn { txn: &txn };
            f(&scope)
        };
        match result {
            Ok(value) => {
                txn.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = txn.abort() {
                    tracing::warn!(error = %e, "Failed to abort write transaction");
                }
                Err(err)
            }
        }
    }
}

/// Document operations inside one write transaction
pub struct DocTxn<'a> {
    txn: &'a WriteTransaction,
}

impl DocTxn<'_> {
    pub fn get<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> StoreResult<Option<T>> {
        let table = self.txn.open_table(collection.table())?;
        read_doc(&table, id)
    }

    /// Insert a new document; fails with [`StoreError::AlreadyExists`] if the id is taken
    pub fn create<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> StoreResult<()> {
        validate_key(id)?;
        let mut table = self.txn.open_table(collection.table())?;
        if table.get(id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                collection: collection.name(),
                id: id.to_string(),
            });
        }
        let bytes = serde_json::to_vec(doc)?;
        table.insert(id, bytes.as_slice())?;
        Ok(())
    }

    /// Overwrite (or insert) a document
    pub fn set<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> StoreResult<()> {
        validate_key(id)?;
        let bytes = serde_json::to_vec(doc)?;
        let mut table = self.txn.open_table(collection.table())?;
        table.insert(id, bytes.as_slice())?;
        Ok(())
    }

    /// Deep-merge `patch` into the stored document and return the result
    pub fn merge(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<Value> {
        validate_key(id)?;
        let mut table = self.txn.open_table(collection.table())?;
        let mut doc = match read_doc::<Value, _>(&table, id)? {
            Some(existing) => existing,
            None => Value::Object(Default::default()),
        };
        query::merge_json(&mut doc, patch);
        let bytes = serde_json::to_vec(&doc)?;
        table.insert(id, bytes.as_slice())?;
        Ok(doc)
    }

    /// Remove a document; returns whether it existed
    pub fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let mut table = self.txn.open_table(collection.table())?;
        let removed = table.remove(id)?.is_some();
        Ok(removed)
    }

    pub fn query<T: DeserializeOwned>(&self, query: &Query) -> StoreResult<Vec<T>> {
        let table = self.txn.open_table(query.collection.table())?;
        scan(&table, query)
    }

    pub fn children<T: DeserializeOwned>(&self, collection: Collection, parent: &str) -> StoreResult<Vec<T>> {
        let table = self.txn.open_table(collection.table())?;
        scan_children(&table, parent)
    }
}

fn read_doc<T, Tbl>(table: &Tbl, id: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

fn scan<T, Tbl>(table: &Tbl, query: &Query) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    let mut docs = Vec::new();
    for entry in table.iter()? {
        let (_key, value) = entry?;
        let doc: Value = serde_json::from_slice(value.value())?;
        if query.matches(&doc) {
            docs.push(doc);
        }
    }
    query
        .finish(docs)
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}

fn scan_children<T, Tbl>(table: &Tbl, parent: &str) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    // '0' is the byte right after '/', so this covers exactly "<parent>/..."
    let start = format!("{parent}{CHILD_SEPARATOR}");
    let end = format!("{parent}0");

    let mut children = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (_key, value) = entry?;
        children.push(serde_json::from_slice(value.value())?);
    }
    Ok(children)
}
