//! In-memory `Store` implementation.
//!
//! Tables are keyed by table name and rows by integer primary key. Queries are
//! evaluated directly against the stored rows, so association behaviour can be
//! exercised and observed without a database. Joins are not evaluated.

use super::{Query, Row, Store};
use crate::error::{OrmError, Result};
use crate::value;
use sea_query::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct MemoryTable {
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl MemoryTable {
    fn allocate(&mut self, requested: Option<i64>) -> i64 {
        let id = requested.unwrap_or(self.next_id.max(1));
        self.next_id = self.next_id.max(id + 1);
        id
    }
}

/// Store that keeps every table in memory
///
/// # Example
///
/// ```
/// use lifeline::{row, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.put("comments", row([("id", 1i64), ("post_id", 5i64)]));
/// assert_eq!(store.rows("comments").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RefCell<BTreeMap<String, MemoryTable>>,
    writes: Cell<usize>,
    statements: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly; the `id` column (or the next free id) is its key
    ///
    /// Seeding is not counted as a write.
    pub fn put(&self, table: &str, mut row: Row) -> i64 {
        let mut tables = self.tables.borrow_mut();
        let table_rows = tables.entry(table.to_string()).or_default();
        let id = table_rows.allocate(row.get("id").and_then(value::as_id));
        row.insert("id".to_string(), Value::BigInt(Some(id)));
        table_rows.rows.insert(id, row);
        id
    }

    /// Snapshot of one row
    pub fn row(&self, table: &str, id: i64) -> Option<Row> {
        self.tables
            .borrow()
            .get(table)
            .and_then(|t| t.rows.get(&id).cloned())
    }

    /// Snapshot of a table, ordered by primary key
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .borrow()
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of INSERT/UPDATE/DELETE statements that reached the store
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    /// Number of statements of any kind that reached the store
    pub fn statements(&self) -> usize {
        self.statements.get()
    }

    fn record_statement(&self, write: bool) {
        self.statements.set(self.statements.get() + 1);
        if write {
            self.writes.set(self.writes.get() + 1);
        }
    }

    fn reject_joins(query: &Query) -> Result<()> {
        if query.joins().is_empty() {
            Ok(())
        } else {
            Err(OrmError::Query(format!(
                "MemoryStore cannot evaluate joins (query on {})",
                query.table()
            )))
        }
    }
}

impl Store for MemoryStore {
    fn select(&self, query: &Query) -> Result<Vec<Row>> {
        Self::reject_joins(query)?;
        self.record_statement(false);
        let tables = self.tables.borrow();
        let Some(table) = tables.get(query.table()) else {
            return Ok(Vec::new());
        };
        let limit = query
            .limit_value()
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(table
            .rows
            .values()
            .filter(|row| query.matches(row))
            .take(limit)
            .cloned()
            .collect())
    }

    fn insert(&self, query: &Query) -> Result<i64> {
        self.record_statement(true);
        let mut tables = self.tables.borrow_mut();
        let table = tables.entry(query.table().to_string()).or_default();
        let pk = query.primary_key().to_string();

        let mut row: Row = query.values().iter().cloned().collect();
        let requested = row.get(&pk).and_then(value::as_id);
        if let Some(id) = requested {
            if table.rows.contains_key(&id) {
                return Err(OrmError::Store(format!(
                    "duplicate key {id} in table {}",
                    query.table()
                )));
            }
        }
        let id = table.allocate(requested);
        row.insert(pk, Value::BigInt(Some(id)));
        table.rows.insert(id, row);
        log::trace!("memory insert into {} id={}", query.table(), id);
        Ok(id)
    }

    fn update(&self, query: &Query) -> Result<u64> {
        Self::reject_joins(query)?;
        self.record_statement(true);
        let mut tables = self.tables.borrow_mut();
        let Some(table) = tables.get_mut(query.table()) else {
            return Ok(0);
        };
        let pk = query.primary_key();
        let matching: Vec<i64> = table
            .rows
            .iter()
            .filter(|(_, row)| query.matches(row))
            .map(|(id, _)| *id)
            .collect();

        for id in &matching {
            let Some(mut row) = table.rows.remove(id) else {
                continue;
            };
            for (field, value) in query.values() {
                row.insert(field.clone(), value.clone());
            }
            // primary key updates re-key the row
            let new_id = row.get(pk).and_then(value::as_id).unwrap_or(*id);
            table.next_id = table.next_id.max(new_id + 1);
            table.rows.insert(new_id, row);
        }
        log::trace!("memory update {} rows={}", query.table(), matching.len());
        Ok(matching.len() as u64)
    }

    fn delete(&self, query: &Query) -> Result<u64> {
        Self::reject_joins(query)?;
        self.record_statement(true);
        let mut tables = self.tables.borrow_mut();
        let Some(table) = tables.get_mut(query.table()) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|_, row| !query.matches(row));
        let removed = before - table.rows.len();
        log::trace!("memory delete {} rows={}", query.table(), removed);
        Ok(removed as u64)
    }
}
