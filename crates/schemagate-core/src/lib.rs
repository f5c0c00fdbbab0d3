//! # Schemagate Core
//!
//! Startup database-readiness sequencing: decide, before a process accepts
//! traffic, whether its database is usable, try to repair it when the repair
//! is known to be safe, and report a single verdict.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Components
//!
//! - [`catalog`]: read-only catalog probes (`table_exists`, `table_is_queryable`)
//! - [`ledger`]: migration history wrapper over the migration framework
//! - [`classify`]: failure classification (transient / conflict / missing / fatal)
//! - [`reconcile`]: schema-drift reconciliation without executing DDL
//! - [`readiness`]: critical-table validation and the readiness verdict
//! - [`sequencer`]: the boot-time state machine composing all of the above
//! - [`policy`]: what the process does with the verdict

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod health;
pub mod identifier;
pub mod ledger;
pub mod migration;
pub mod policy;
pub mod readiness;
pub mod reconcile;
pub mod sequencer;

pub use catalog::{CatalogProber, CatalogQuery, Dialect, TableExistenceFact};
pub use classify::{classify, FailureClass};
pub use config::{AppConfig, DatabaseConfig, ServerConfig};
pub use error::{ClassifiedError, DbError, DbResult, Error, ProviderCode, Result};
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use identifier::TableName;
pub use ledger::{ApplyFailure, MigrationBackend, MigrationLedger};
pub use migration::{MigrationDescriptor, MigrationRecord, MigrationSet};
pub use policy::{enforce, ExecutionContext, StartupAbort};
pub use readiness::{ReadinessStatus, ReadinessValidator, ReadinessVerdict};
pub use reconcile::{DriftReconciler, ReconcileOutcome};
pub use sequencer::{Connector, SequencerConfig, SequencerState, StartupReport, StartupSequencer};
