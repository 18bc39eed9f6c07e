//! Query description consumed by stores.
//!
//! A [`Query`] is a plain value: the target table, its key columns, WHERE filters,
//! SET values, an optional primary-key restriction, a limit and joins. Building one
//! never touches the database; executing it hands it to a [`Store`], which either
//! evaluates it in memory ([`MemoryStore`]) or renders it to SQL ([`SqlStore`]).
//!
//! # Example
//!
//! ```no_run
//! use lifeline::{Context, Op, Query};
//! # fn example(ctx: &Context<'_>) -> lifeline::Result<()> {
//! // UPDATE comments SET post_id = 0 WHERE post_id = 5 AND id IN (1, 2)
//! let affected = ctx
//!     .query("comment")?
//!     .filter("post_id", Op::Eq, 5i64)
//!     .key([1, 2])
//!     .value("post_id", 0i64)
//!     .update(ctx.store)?;
//! # let _ = affected;
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod sql;
pub mod store;

pub use memory::MemoryStore;
pub use sql::{Executor, SqlStore};
pub use store::Store;

use crate::error::Result;
use crate::meta::Meta;
use crate::value;
use sea_query::Value;
use std::collections::BTreeMap;

/// A row as returned by a store: column name -> value
pub type Row = BTreeMap<String, Value>;

/// Build a [`Row`] from column/value pairs
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Comparison operator for filters and join conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
    IsNotNull,
}

/// Right-hand side of a filter or join condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A bound value
    Value(Value),
    /// A list of bound values (for `Op::In`)
    List(Vec<Value>),
    /// A table-qualified column (for join conditions)
    Column(String, String),
    /// No operand (for `IsNull` / `IsNotNull`)
    None,
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Vec<Value>> for Operand {
    fn from(values: Vec<Value>) -> Self {
        Operand::List(values)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Value(Value::BigInt(Some(value)))
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Value(Value::String(Some(value.to_string())))
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Value(Value::String(Some(value)))
    }
}

impl Operand {
    /// Evaluate `lhs <op> self` against a concrete value
    pub(crate) fn matches(&self, op: Op, lhs: &Value) -> bool {
        match (op, self) {
            (Op::IsNull, _) => value::is_null(lhs),
            (Op::IsNotNull, _) => !value::is_null(lhs),
            (Op::In, Operand::List(values)) => values.iter().any(|v| value::same(lhs, v)),
            (Op::In, Operand::Value(v)) => value::same(lhs, v),
            (_, Operand::Value(rhs)) => {
                if value::is_null(lhs) || value::is_null(rhs) {
                    // SQL three-valued logic: comparisons with NULL never match
                    return false;
                }
                match op {
                    Op::Eq => value::same(lhs, rhs),
                    Op::Ne => !value::same(lhs, rhs),
                    Op::Gt => value::compare(lhs, rhs).is_some_and(|o| o.is_gt()),
                    Op::Gte => value::compare(lhs, rhs).is_some_and(|o| o.is_ge()),
                    Op::Lt => value::compare(lhs, rhs).is_some_and(|o| o.is_lt()),
                    Op::Lte => value::compare(lhs, rhs).is_some_and(|o| o.is_le()),
                    Op::In | Op::IsNull | Op::IsNotNull => false,
                }
            }
            _ => false,
        }
    }
}

/// A single `field <op> operand` restriction
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: Op,
    pub operand: Operand,
}

/// Join flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

/// Join clause against another table
///
/// Conditions compare a column of the joined table (left side) with an operand;
/// use [`Operand::Column`] to reference the other side of the join.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub alias: Option<String>,
    pub kind: JoinKind,
    pub conditions: Vec<Filter>,
}

impl Join {
    pub fn new(table: impl Into<String>, kind: JoinKind) -> Self {
        Self {
            table: table.into(),
            alias: None,
            kind,
            conditions: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add an `ON <joined>.<field> <op> <operand>` condition
    pub fn on(mut self, field: impl Into<String>, op: Op, operand: impl Into<Operand>) -> Self {
        self.conditions.push(Filter {
            field: field.into(),
            op,
            operand: operand.into(),
        });
        self
    }

    /// Name the joined table is referenced by (alias or table name)
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// Query against one model's table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    model: String,
    table: String,
    primary_key: String,
    name_key: String,
    filters: Vec<Filter>,
    values: Vec<(String, Value)>,
    keys: Option<Vec<Value>>,
    limit: Option<u64>,
    joins: Vec<Join>,
}

impl Query {
    /// Start a query for the model described by `meta`
    pub fn new(meta: &Meta) -> Self {
        Self {
            model: meta.model().to_string(),
            table: meta.table().to_string(),
            primary_key: meta.primary_key().to_string(),
            name_key: meta.name_key().to_string(),
            filters: Vec::new(),
            values: Vec::new(),
            keys: None,
            limit: None,
            joins: Vec::new(),
        }
    }

    /// Add a WHERE restriction
    pub fn filter(mut self, field: impl Into<String>, op: Op, operand: impl Into<Operand>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            operand: operand.into(),
        });
        self
    }

    /// Add a SET value (update) or column value (insert)
    ///
    /// Setting the same field twice keeps the last value.
    pub fn value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.values.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.values.push((field, value)),
        }
        self
    }

    /// Restrict to rows whose primary key is one of `ids`
    ///
    /// Repeated calls intersect. An empty id list matches no rows.
    pub fn key<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let ids: Vec<Value> = ids.into_iter().map(|id| Value::BigInt(Some(id))).collect();
        self.keys = Some(match self.keys.take() {
            Some(existing) => existing
                .into_iter()
                .filter(|k| ids.iter().any(|id| value::same(k, id)))
                .collect(),
            None => ids,
        });
        self
    }

    /// Restrict by unique key: integers match the primary key, anything else the
    /// model's name key
    pub fn unique_key(self, key: &Value) -> Self {
        match value::as_id(key) {
            Some(id) => self.key([id]),
            None => {
                let field = self.name_key.clone();
                self.filter(field, Op::Eq, key.clone())
            }
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    pub fn keys(&self) -> Option<&[Value]> {
        self.keys.as_deref()
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// True when a restriction makes the query match nothing
    pub fn is_empty_key(&self) -> bool {
        matches!(&self.keys, Some(keys) if keys.is_empty())
    }

    /// Evaluate filters and key restriction against a row (joins are ignored)
    pub(crate) fn matches(&self, row: &Row) -> bool {
        let null = Value::BigInt(None);
        if let Some(keys) = &self.keys {
            let pk = row.get(&self.primary_key).unwrap_or(&null);
            if !keys.iter().any(|k| value::same(pk, k)) {
                return false;
            }
        }
        self.filters.iter().all(|filter| {
            let lhs = row.get(&filter.field).unwrap_or(&null);
            filter.operand.matches(filter.op, lhs)
        })
    }

    /// Run as SELECT and return all matching rows
    pub fn all(&self, store: &dyn Store) -> Result<Vec<Row>> {
        store.select(self)
    }

    /// Run as SELECT ... LIMIT 1
    pub fn first(&self, store: &dyn Store) -> Result<Option<Row>> {
        let query = self.clone().limit(1);
        Ok(store.select(&query)?.into_iter().next())
    }

    /// Run as SELECT COUNT(*)
    pub fn count(&self, store: &dyn Store) -> Result<u64> {
        store.count(self)
    }

    /// Run as INSERT with the query's values, returning the new primary key
    pub fn insert(&self, store: &dyn Store) -> Result<i64> {
        store.insert(self)
    }

    /// Run as UPDATE ... SET values WHERE filters, returning affected rows
    pub fn update(&self, store: &dyn Store) -> Result<u64> {
        if self.values.is_empty() || self.is_empty_key() {
            return Ok(0);
        }
        store.update(self)
    }

    /// Run as DELETE ... WHERE filters, returning affected rows
    pub fn delete(&self, store: &dyn Store) -> Result<u64> {
        if self.is_empty_key() {
            return Ok(0);
        }
        store.delete(self)
    }
}
