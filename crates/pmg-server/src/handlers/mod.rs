//! Route handlers.

pub mod backup;
pub mod restore;
pub mod version;

pub async fn healthz() -> &'static str { "ok" }
