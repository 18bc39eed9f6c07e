//! Integration tests for association cascades
//!
//! Most tests run against `MemoryStore` and assert on the stored rows after a
//! save or delete. `sql_store` checks the statements `SqlStore` emits and the
//! order they are executed in.

mod common;
mod dependent;
mod errors;
mod has_many;
mod has_one;
