//! SQL for the version record table.
//!
//! The table normally comes from the portal's own schema migrations; the DDL
//! here only fills the gap on a database that has never been migrated.

/// Idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS portal_systeminfo (
    id          BIGSERIAL PRIMARY KEY,
    key         VARCHAR(128) NOT NULL UNIQUE,
    value       TEXT NOT NULL DEFAULT '',
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

pub const SELECT_VALUE: &str =
  "SELECT value FROM portal_systeminfo WHERE key = $1";

/// Single-statement upsert; repeated calls leave exactly one row per key.
pub const UPSERT_VALUE: &str = "
INSERT INTO portal_systeminfo (key, value, updated_at)
VALUES ($1, $2, now())
ON CONFLICT (key) DO UPDATE
   SET value = EXCLUDED.value,
       updated_at = EXCLUDED.updated_at
";
