//! Core types and trait definitions for PMG Portal version tracking and
//! backups.
//!
//! This crate is deliberately free of HTTP, subprocess and database
//! dependencies. Every other crate depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod compat;
pub mod config;
pub mod error;
pub mod manifest;
pub mod probe;
pub mod store;
pub mod version;

pub use error::{Error, Result};
