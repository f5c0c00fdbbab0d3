//! Schemagate: startup database readiness gate
//!
//! Wires the core sequencer to a concrete `SQLite` database, the compiled-in
//! CMS migration plan and an HTTP health endpoint.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod cli;
pub mod db;
pub mod health;
pub mod shutdown;

pub use bootstrap::{bootstrap, BootstrapOptions, Bootstrapped};
pub use db::SqliteDatabase;
pub use health::{router, HealthState};
