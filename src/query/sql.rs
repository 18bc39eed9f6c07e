//! SQL `Store` implementation on top of SeaQuery.
//!
//! [`SqlStore`] renders each [`Query`] into a SeaQuery statement, builds it with
//! `PostgresQueryBuilder` and hands the SQL plus bound values to an [`Executor`].
//! The executor owns the connection (and any surrounding transaction).

use super::{Filter, JoinKind, Op, Operand, Query, Row, Store};
use crate::error::{OrmError, Result};
use crate::value;
use sea_query::{
    Asterisk, Condition, DeleteStatement, Expr, ExprTrait, Iden, InsertStatement, JoinType,
    Order, PostgresQueryBuilder, SelectStatement, UpdateStatement, Value,
};
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Owned identifier for dynamic table and column names
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ident(String);

impl Ident {
    pub(crate) fn new(name: &str) -> Self {
        Ident(name.to_string())
    }
}

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Trait for executing rendered SQL
///
/// This abstracts the connection layer so that [`SqlStore`] can run on a direct
/// client, a pooled connection or a transaction.
///
/// # Examples
///
/// ```no_run
/// use lifeline::{Executor, Result, Row};
/// use sea_query::Value;
///
/// struct Logging;
///
/// impl Executor for Logging {
///     fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
///         println!("{sql} {params:?}");
///         Ok(0)
///     }
///
///     fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
///         println!("{sql} {params:?}");
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait Executor {
    /// Execute a statement and return the number of rows affected
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query and return all rows
    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query and return exactly one row
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Store` if the query returns no rows.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Row> {
        self.query_all(sql, params)?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::Store(format!("query returned no rows: {sql}")))
    }
}

/// Store that renders queries to PostgreSQL and runs them on an [`Executor`]
pub struct SqlStore<E> {
    executor: E,
}

impl<E: Executor> SqlStore<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Get a reference to the underlying executor
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Consume the store and return the executor
    pub fn into_executor(self) -> E {
        self.executor
    }

    fn timed<T>(&self, sql: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = run();
        let elapsed = start.elapsed();
        log::trace!("{sql} ({elapsed:?})");
        #[cfg(feature = "metrics")]
        METRICS.record_statement(elapsed, result.is_ok());
        result
    }
}

fn column(table: &str, field: &str) -> Expr {
    Expr::col((Ident::new(table), Ident::new(field)))
}

fn filter_expr(table: &str, filter: &Filter) -> Expr {
    let col = column(table, &filter.field);
    let rhs = match &filter.operand {
        Operand::Value(v) => Expr::val(v.clone()),
        Operand::Column(t, c) => column(t, c),
        Operand::List(values) => {
            return match filter.op {
                Op::In if values.is_empty() => Expr::cust("1 = 0"),
                _ => col.is_in(values.iter().cloned()),
            };
        }
        Operand::None => {
            return match filter.op {
                Op::IsNotNull => col.is_not_null(),
                _ => col.is_null(),
            };
        }
    };
    match filter.op {
        Op::Eq | Op::In => col.eq(rhs),
        Op::Ne => col.ne(rhs),
        Op::Gt => col.gt(rhs),
        Op::Gte => col.gte(rhs),
        Op::Lt => col.lt(rhs),
        Op::Lte => col.lte(rhs),
        Op::IsNull => col.is_null(),
        Op::IsNotNull => col.is_not_null(),
    }
}

fn where_condition(query: &Query) -> Condition {
    let table = query.table();
    let mut condition = Condition::all();
    if let Some(keys) = query.keys() {
        condition = condition.add(column(table, query.primary_key()).is_in(keys.iter().cloned()));
    }
    for filter in query.filters() {
        condition = condition.add(filter_expr(table, filter));
    }
    condition
}

fn join_type(kind: JoinKind) -> JoinType {
    match kind {
        JoinKind::Inner => JoinType::InnerJoin,
        JoinKind::Left => JoinType::LeftJoin,
        JoinKind::Right => JoinType::RightJoin,
    }
}

/// `SELECT "table".* FROM "table" [JOIN ...] WHERE ... ORDER BY pk [LIMIT n]`
pub(crate) fn select_statement(query: &Query) -> SelectStatement {
    let table = query.table();
    let mut stmt = SelectStatement::default();
    stmt.column((Ident::new(table), Asterisk))
        .from(Ident::new(table))
        .cond_where(where_condition(query))
        .order_by((Ident::new(table), Ident::new(query.primary_key())), Order::Asc);

    for join in query.joins() {
        let reference = join.reference().to_string();
        let mut on = Condition::all();
        for condition in &join.conditions {
            on = on.add(filter_expr(&reference, condition));
        }
        match &join.alias {
            Some(alias) => {
                stmt.join_as(join_type(join.kind), Ident::new(&join.table), Ident::new(alias), on);
            }
            None => {
                stmt.join(join_type(join.kind), Ident::new(&join.table), on);
            }
        }
    }
    if let Some(limit) = query.limit_value() {
        stmt.limit(limit);
    }
    stmt
}

pub(crate) fn count_statement(query: &Query) -> SelectStatement {
    let mut stmt = select_statement(query);
    stmt.clear_selects();
    stmt.clear_order_by();
    stmt.expr_as(Expr::cust("COUNT(*)"), Ident::new("count"));
    stmt
}

pub(crate) fn insert_statement(query: &Query) -> InsertStatement {
    let mut stmt = InsertStatement::default();
    stmt.into_table(Ident::new(query.table()));
    let values: Vec<&(String, Value)> = query
        .values()
        .iter()
        .filter(|(field, v)| !(field == query.primary_key() && value::is_null(v)))
        .collect();
    if values.is_empty() {
        stmt.or_default_values();
    } else {
        stmt.columns(values.iter().map(|(field, _)| Ident::new(field)));
        stmt.values_panic(values.iter().map(|(_, v)| Expr::val(v.clone())));
    }
    stmt.returning_col(Ident::new(query.primary_key()));
    stmt
}

pub(crate) fn update_statement(query: &Query) -> UpdateStatement {
    let mut stmt = UpdateStatement::default();
    stmt.table(Ident::new(query.table()));
    for (field, v) in query.values() {
        stmt.value(Ident::new(field), Expr::val(v.clone()));
    }
    stmt.cond_where(where_condition(query));
    stmt
}

pub(crate) fn delete_statement(query: &Query) -> DeleteStatement {
    let mut stmt = DeleteStatement::default();
    stmt.from_table(Ident::new(query.table()));
    stmt.cond_where(where_condition(query));
    stmt
}

impl<E: Executor> Store for SqlStore<E> {
    fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let (sql, values) = select_statement(query).build(PostgresQueryBuilder);
        self.timed(&sql, || self.executor.query_all(&sql, &values.0))
    }

    fn count(&self, query: &Query) -> Result<u64> {
        let (sql, values) = count_statement(query).build(PostgresQueryBuilder);
        let row = self.timed(&sql, || self.executor.query_one(&sql, &values.0))?;
        row.get("count")
            .and_then(value::as_id)
            .and_then(|c| u64::try_from(c).ok())
            .ok_or_else(|| OrmError::Store(format!("COUNT(*) returned no integer for {}", query.table())))
    }

    fn insert(&self, query: &Query) -> Result<i64> {
        let (sql, values) = insert_statement(query).build(PostgresQueryBuilder);
        let row = self.timed(&sql, || self.executor.query_one(&sql, &values.0))?;
        row.get(query.primary_key())
            .and_then(value::as_id)
            .ok_or_else(|| OrmError::Store(format!("INSERT into {} returned no primary key", query.table())))
    }

    fn update(&self, query: &Query) -> Result<u64> {
        let (sql, values) = update_statement(query).build(PostgresQueryBuilder);
        self.timed(&sql, || self.executor.execute(&sql, &values.0))
    }

    fn delete(&self, query: &Query) -> Result<u64> {
        let (sql, values) = delete_statement(query).build(PostgresQueryBuilder);
        self.timed(&sql, || self.executor.execute(&sql, &values.0))
    }
}
