#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! End-to-end startup scenarios against the scripted database.

mod common;

use common::{
    cms_plan, critical_tables, login_failed, transient, FakeDb, ADD_BILLING, ADD_IDENTITY,
    ADD_PAGE_VERSIONS, ADD_THEMES, CMS_PLAN, FIRST_THREE_TABLES, INITIAL_CREATE,
};
use schemagate_core::{
    enforce, DbError, ExecutionContext, FailureClass, ReadinessStatus, SequencerConfig,
    SequencerState, StartupSequencer,
};

fn config() -> SequencerConfig {
    SequencerConfig {
        critical_tables: critical_tables(),
        ..SequencerConfig::default()
    }
}

fn all_ids() -> Vec<&'static str> {
    CMS_PLAN.iter().map(|(id, _)| *id).collect()
}

#[tokio::test]
async fn clean_start_applies_everything_and_is_ready() {
    let db = FakeDb::new();
    let plan = cms_plan();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();

    assert_eq!(report.verdict.status, ReadinessStatus::Ready);
    assert_eq!(report.applied, all_ids());
    assert_eq!(db.executed(), all_ids());
    assert!(report.reconciled.is_empty());
    assert_eq!(report.trace.first(), Some(&SequencerState::Start));
    assert_eq!(report.trace.last(), Some(&SequencerState::Ready));
    assert!(report.trace.contains(&SequencerState::ValidatingReadiness));
}

#[tokio::test]
async fn drift_is_reconciled_then_remaining_migrations_apply() {
    let db = FakeDb::new();
    db.create_tables(FIRST_THREE_TABLES);
    let plan = cms_plan();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();

    assert_eq!(report.verdict.status, ReadinessStatus::Ready);
    assert_eq!(report.reconciled, vec![INITIAL_CREATE, ADD_IDENTITY, ADD_THEMES]);
    assert_eq!(report.applied, vec![ADD_BILLING, ADD_PAGE_VERSIONS]);
    assert_eq!(db.executed(), vec![ADD_BILLING, ADD_PAGE_VERSIONS]);
    assert!(report.trace.contains(&SequencerState::ReconcilingDrift));
    assert_eq!(db.history_ids().len(), CMS_PLAN.len());
}

#[tokio::test]
async fn transient_connection_failure_degrades_and_continues() {
    let db = FakeDb::new();
    db.fail_open(transient());
    let plan = cms_plan();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();

    assert_eq!(report.verdict.status, ReadinessStatus::DegradedTransient);
    assert!(report.verdict.reason.contains("not currently available"));
    assert_eq!(report.trace.last(), Some(&SequencerState::DegradedTransient));
    assert!(db.executed().is_empty());

    let verdict = enforce(Ok(report), ExecutionContext::Production).unwrap();
    assert!(verdict.is_degraded());
}

#[tokio::test]
async fn missing_critical_table_after_migrations_blocks() {
    let db = FakeDb::migrated();
    db.drop_table("AspNetUsers");
    let plan = cms_plan();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();

    assert_eq!(report.verdict.status, ReadinessStatus::Blocked);
    assert_eq!(report.verdict.missing_tables, vec!["AspNetUsers"]);
    assert!(report
        .verdict
        .remediation
        .as_deref()
        .is_some_and(|r| r.contains("apply pending migrations")));
    assert!(report.applied.is_empty());

    let abort = enforce(Ok(report.clone()), ExecutionContext::Production).unwrap_err();
    assert_eq!(abort.exit_code(), 3);
    assert!(abort.diagnostic().contains("AspNetUsers"));

    let verdict = enforce(Ok(report), ExecutionContext::Testing).unwrap();
    assert!(verdict.is_blocked());
}

#[tokio::test]
async fn disabled_auto_apply_blocks_without_ddl() {
    let db = FakeDb::new();
    let plan = cms_plan();
    let config = SequencerConfig {
        auto_apply_migrations: false,
        ..config()
    };

    let report = StartupSequencer::new(&db, &plan, config).run().await.unwrap();

    assert_eq!(report.verdict.status, ReadinessStatus::Blocked);
    assert!(report.verdict.reason.starts_with("5 pending migration(s)"));
    assert!(report.verdict.reason.contains(INITIAL_CREATE));
    assert!(db.executed().is_empty());
    assert!(db.history_ids().is_empty());
    assert!(!report.trace.contains(&SequencerState::ApplyingMigrations));
}

#[tokio::test]
async fn disabled_auto_apply_with_nothing_pending_is_ready() {
    let db = FakeDb::migrated();
    let plan = cms_plan();
    let config = SequencerConfig {
        auto_apply_migrations: false,
        ..config()
    };

    let report = StartupSequencer::new(&db, &plan, config).run().await.unwrap();
    assert!(report.verdict.is_ready());
}

#[tokio::test]
async fn partial_drift_is_not_reconciled() {
    let db = FakeDb::new();
    db.create_tables(&["Sites", "Pages"]);
    let plan = cms_plan();

    let err = StartupSequencer::new(&db, &plan, config()).run().await.unwrap_err();

    assert_eq!(err.class, FailureClass::SchemaConflict);
    assert_eq!(err.stage, SequencerState::ReconcilingDrift);
    assert_eq!(err.migration_id.as_deref(), Some(INITIAL_CREATE));
    assert!(err.remediation.contains("partially present"));
    assert!(err.remediation.contains("Modules"));
    assert!(db.history_ids().is_empty());
}

#[tokio::test]
async fn second_conflict_after_reconciling_aborts() {
    let db = FakeDb::new();
    db.create_tables(&["Sites", "Pages", "Modules", "Themes"]);
    let plan = cms_plan();

    let err = StartupSequencer::new(&db, &plan, config()).run().await.unwrap_err();

    assert_eq!(err.class, FailureClass::SchemaConflict);
    assert_eq!(err.stage, SequencerState::ApplyingMigrations);
    assert_eq!(err.migration_id.as_deref(), Some(ADD_THEMES));
    // Reconciled InitialCreate, then applied AddIdentity before the conflict
    assert_eq!(db.executed(), vec![ADD_IDENTITY]);
}

#[tokio::test]
async fn fatal_migration_failure_stops_at_that_migration() {
    let db = FakeDb::new();
    db.fail_apply(ADD_IDENTITY, login_failed());
    let plan = cms_plan();

    let err = StartupSequencer::new(&db, &plan, config()).run().await.unwrap_err();

    assert_eq!(err.class, FailureClass::Fatal);
    assert_eq!(err.stage, SequencerState::ApplyingMigrations);
    assert_eq!(err.migration_id.as_deref(), Some(ADD_IDENTITY));
    assert_eq!(db.executed(), vec![INITIAL_CREATE]);
    assert_eq!(err.exit_code(), 4);

    let abort = enforce(Err(err), ExecutionContext::Development).unwrap_err();
    let text = abort.diagnostic();
    assert!(text.contains("Fatal (SQL Server error 18456)"));
    assert!(text.contains("Stage:       ApplyingMigrations"));
}

#[tokio::test]
async fn transient_failure_while_applying_aborts() {
    let db = FakeDb::new();
    db.fail_apply(ADD_THEMES, transient());
    let plan = cms_plan();

    let err = StartupSequencer::new(&db, &plan, config()).run().await.unwrap_err();

    assert_eq!(err.class, FailureClass::Transient);
    assert_eq!(err.migration_id.as_deref(), Some(ADD_THEMES));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn fatal_connection_failure_aborts() {
    let db = FakeDb::new();
    db.fail_open(login_failed());
    let plan = cms_plan();

    let err = StartupSequencer::new(&db, &plan, config()).run().await.unwrap_err();

    assert_eq!(err.class, FailureClass::Fatal);
    assert_eq!(err.stage, SequencerState::ProbingConnectivity);
    assert!(err.migration_id.is_none());
}

#[tokio::test]
async fn transient_history_failure_degrades() {
    let db = FakeDb::new();
    db.fail_history(DbError::sqlite(5, "database is locked"));
    let plan = cms_plan();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();

    assert!(report.verdict.is_degraded());
    assert_eq!(report.trace.last(), Some(&SequencerState::DegradedTransient));
}

#[tokio::test]
async fn transient_failure_during_validation_degrades() {
    let db = FakeDb::migrated();
    db.fail_catalog(transient());
    let plan = cms_plan();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();
    assert!(report.verdict.is_degraded());
}

#[tokio::test]
async fn unreadable_table_blocks_with_permission_remediation() {
    let db = FakeDb::migrated();
    db.fail_probe(
        "Pages",
        DbError::sql_server(229, "The SELECT permission was denied on the object 'Pages'."),
    );
    let plan = cms_plan();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();

    assert!(report.verdict.is_blocked());
    assert_eq!(report.verdict.unqueryable_tables, vec!["Pages"]);
    assert!(report.verdict.missing_tables.is_empty());
    assert!(report
        .verdict
        .remediation
        .as_deref()
        .is_some_and(|r| r.contains("SELECT")));
}

#[tokio::test]
async fn empty_database_without_migrations_reports_none_exist() {
    let db = FakeDb::with_plan(&[]);
    let plan = schemagate_core::MigrationSet::default();

    let report = StartupSequencer::new(&db, &plan, config()).run().await.unwrap();

    assert!(report.verdict.is_blocked());
    assert!(report.verdict.reason.contains("none of the critical tables exist"));
    assert_eq!(report.verdict.missing_tables.len(), critical_tables().len());
}
