//! Postgres backend for the points gateway.
//!
//! Some guarantees are pushed into the SQL rather than the code; if you're seeing unexpected
//! behaviour, check the schema in `migrations/` first:
//!
//! * The reserved system account (user id 1) is seeded by the initial migration.
//! * A partial unique index on `posting` allows at most one positive posting per order, which is
//!   what makes accrual credits idempotent.
//! * Terminal order statuses are frozen by the WHERE clause of the status update, not by a
//!   read-modify-write in code.
pub mod db;
mod pg_impl;

pub use pg_impl::PostgresDatabase;
