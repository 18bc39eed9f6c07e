//! `Store` trait - the persistence seam under associations and records.
//!
//! Associations only ever emit bulk statements through this trait: SELECTs to
//! resolve related rows, UPDATEs to move foreign keys and DELETEs for cascades.
//! Transactions are the store's concern; a store that wraps a whole record save in
//! one transaction gets atomic cascades for free.

use super::{Query, Row};
use crate::error::Result;

/// Executes [`Query`] values
///
/// All methods are blocking. Implementations are used from a single thread and
/// may rely on interior mutability.
pub trait Store {
    /// Rows matching the query's filters, keys, joins and limit
    fn select(&self, query: &Query) -> Result<Vec<Row>>;

    /// Number of rows matching the query
    fn count(&self, query: &Query) -> Result<u64> {
        Ok(self.select(query)?.len() as u64)
    }

    /// Insert one row built from the query's values and return its primary key
    fn insert(&self, query: &Query) -> Result<i64>;

    /// Apply the query's values to every matching row
    fn update(&self, query: &Query) -> Result<u64>;

    /// Delete every matching row
    fn delete(&self, query: &Query) -> Result<u64>;
}
