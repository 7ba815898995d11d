//! End-to-end pipeline tests
//!
//! Full runs through the standard pipeline against a SQLite state store and
//! a SQLite target database:
//! - Apply, status and revert of SQL changes
//! - Drift detection after files change
//! - Environment-restricted changes and per-environment configuration
//! - Lock contention between independent processes sharing one store

mod common;

mod apply_flow;
mod drift;
mod environments;
mod locking;
