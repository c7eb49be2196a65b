//! SQLite backend for the Muster inventory store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The single serialized
//! connection is also what makes each refresh's read-max-then-write
//! sequence atomic per key.

mod encode;
mod schema;
mod store;

pub use muster_core::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
