//! PostgreSQL backend for the PMG Portal version store.
//!
//! Wraps a [`sqlx`] connection pool. The version row lives in the same
//! database as the rest of the portal's data.

mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::PgVersionStore;

#[cfg(test)]
mod tests;
