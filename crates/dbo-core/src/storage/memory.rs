//! In-memory reference store
//!
//! Keeps rows per registered table, generates integer keys for single-column
//! primary keys the way SQLite's rowid aliasing does (max + 1), and evaluates
//! [`SelectQuery`] conditions directly. Raw SQL goes to an optional handler.

use super::{Bindings, ResultSet, SelectQuery, Storage, StorageError};
use dbo_schema::{Direction, PrimaryKey, Record, Table, Value};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Handler for raw SQL sent to [`MemoryStorage::execute`]
pub type ExecuteHandler =
    Arc<dyn Fn(&str, &Bindings) -> Result<ResultSet, StorageError> + Send + Sync>;

#[derive(Debug)]
struct MemTable {
    table: Arc<Table>,
    rows: Vec<Record>,
    /// `None` once the largest integer key has been used
    next_key: Option<i64>,
}

/// In-memory [`Storage`]
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, MemTable>>,
    execute_handler: RwLock<Option<ExecuteHandler>>,
    executed: Mutex<Vec<(String, Bindings)>>,
    injected_failure: Mutex<Option<StorageError>>,
    select_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("tables", &self.tables.read().keys().collect::<Vec<_>>())
            .field("select_calls", &self.select_calls())
            .field("insert_calls", &self.insert_calls())
            .finish_non_exhaustive()
    }
}

impl MemoryStorage {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a table known to the store
    pub fn register(&self, table: Arc<Table>) {
        self.tables.write().insert(
            table.name().to_string(),
            MemTable {
                table,
                rows: Vec::new(),
                next_key: Some(1),
            },
        );
    }

    /// Install the handler used for raw SQL
    pub fn on_execute(&self, handler: ExecuteHandler) {
        *self.execute_handler.write() = Some(handler);
    }

    /// Make the next insert fail with `error`
    pub fn fail_next_insert(&self, error: StorageError) {
        *self.injected_failure.lock() = Some(error);
    }

    /// Snapshot of a table's rows
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Raw statements seen by `execute`
    #[must_use]
    pub fn executed(&self) -> Vec<(String, Bindings)> {
        self.executed.lock().clone()
    }

    #[must_use]
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(AtomicOrdering::SeqCst)
    }

    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    /// Total store interactions
    #[must_use]
    pub fn calls(&self) -> usize {
        self.select_calls() + self.insert_calls() + self.executed.lock().len()
    }

    fn key_of(primary: &PrimaryKey, record: &Record) -> Vec<String> {
        primary
            .columns()
            .into_iter()
            .map(|c| record.get(c).map(Value::normalized).unwrap_or_default())
            .collect()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn execute(&self, sql: &str, bindings: &Bindings) -> Result<ResultSet, StorageError> {
        self.executed
            .lock()
            .push((sql.to_string(), bindings.clone()));
        let handler = self.execute_handler.read().clone();
        match handler {
            Some(handler) => handler(sql, bindings),
            None => Err(StorageError::Sql(format!(
                "memory storage has no handler for: {sql}"
            ))),
        }
    }

    async fn select(&self, query: &SelectQuery) -> Result<ResultSet, StorageError> {
        self.select_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let tables = self.tables.read();
        let mem = tables
            .get(query.table_ref().name())
            .ok_or_else(|| StorageError::UnknownTable(query.table_ref().name().to_string()))?;

        let mut rows: Vec<Record> = mem
            .rows
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();

        for order in query.order_by().iter().rev() {
            rows.sort_by(|a, b| {
                let ordering = match (a.get(&order.column), b.get(&order.column)) {
                    (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(columns) = query.columns() {
            rows = rows.iter().map(|row| row.project(columns)).collect();
        }

        let mut result = ResultSet::from_rows(rows);
        if result.columns.is_empty() {
            result.columns = match query.columns() {
                Some(columns) => columns.to_vec(),
                None => mem.table.columns().iter().cloned().collect(),
            };
        }
        Ok(result)
    }

    async fn insert(&self, table: &Table, record: &Record) -> Result<Record, StorageError> {
        self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(error) = self.injected_failure.lock().take() {
            return Err(error);
        }

        let mut tables = self.tables.write();
        let mem = tables
            .get_mut(table.name())
            .ok_or_else(|| StorageError::UnknownTable(table.name().to_string()))?;

        if let Some(column) = record.columns().find(|c| !mem.table.has_column(c)) {
            return Err(StorageError::Sql(format!(
                "table {} has no column named {column}",
                table.name()
            )));
        }

        let mut stored = record.clone();
        let mut next_key = mem.next_key;
        match mem.table.primary() {
            PrimaryKey::Single(column) => match stored.get(column).and_then(Value::as_i64) {
                // an explicit key with no successor exhausts the sequence
                Some(explicit) => {
                    next_key = explicit
                        .checked_add(1)
                        .and_then(|successor| next_key.map(|n| n.max(successor)));
                }
                None if !stored.contains(column) => {
                    let Some(key) = next_key else {
                        return Err(StorageError::Constraint(format!(
                            "key sequence exhausted: {}.{column}",
                            table.name()
                        )));
                    };
                    stored.set(column.clone(), key);
                    next_key = key.checked_add(1);
                }
                None => {}
            },
            PrimaryKey::Composite(columns) => {
                if let Some(column) = columns.iter().find(|c| !stored.contains(c)) {
                    return Err(StorageError::Constraint(format!(
                        "NOT NULL constraint failed: {}.{column}",
                        table.name()
                    )));
                }
            }
        }

        let key = Self::key_of(mem.table.primary(), &stored);
        if mem
            .rows
            .iter()
            .any(|row| Self::key_of(mem.table.primary(), row) == key)
        {
            return Err(StorageError::Constraint(format!(
                "UNIQUE constraint failed: {}.{}",
                table.name(),
                mem.table.primary()
            )));
        }

        mem.rows.push(stored.clone());
        mem.next_key = next_key;
        Ok(stored)
    }
}
