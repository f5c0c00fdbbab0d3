//! Termination policy: what the process does with a startup outcome.
//!
//! Only [`ExecutionContext::Testing`] may continue past a blocked database.
//! Every other context aborts before serving traffic.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::warn;

use crate::{
    error::ClassifiedError,
    readiness::ReadinessVerdict,
    sequencer::StartupReport,
};

/// Execution context the process runs in. Decided once at configuration load.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ExecutionContext {
    #[default]
    Production,
    Development,
    /// Test suites against a fresh in-memory store
    Testing,
}

impl ExecutionContext {
    pub const fn may_continue_when_blocked(self) -> bool {
        matches!(self, Self::Testing)
    }
}

/// Startup refused: the process must terminate without serving.
#[derive(Debug, Clone, Error)]
#[error("startup aborted in {context}: {}", .verdict.reason)]
pub struct StartupAbort {
    pub context: ExecutionContext,
    pub verdict: ReadinessVerdict,
    /// Classified failure behind the block, when there was one
    pub error: Option<ClassifiedError>,
}

impl StartupAbort {
    /// Process exit code: the classified error's, else 3 for missing tables, else 4.
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or_else(
            || {
                if self.verdict.missing_tables.is_empty() {
                    4
                } else {
                    3
                }
            },
            ClassifiedError::exit_code,
        )
    }

    /// Multi-line operator diagnostic.
    pub fn diagnostic(&self) -> String {
        let mut out = format!(
            "Startup aborted: database is not ready ({} context)\n  Status:      {}\n",
            self.context, self.verdict.status
        );
        if let Some(err) = &self.error {
            let code = err
                .source
                .code
                .map_or_else(|| "no provider code".to_string(), |c| c.to_string());
            let _ = writeln!(out, "  Error class: {} ({code})", err.class);
            let _ = writeln!(out, "  Stage:       {}", err.stage);
            if let Some(id) = &err.migration_id {
                let _ = writeln!(out, "  Migration:   {id}");
            }
            let _ = writeln!(out, "  Error:       {}", err.source.message);
            let _ = writeln!(out, "  Root cause:  {}", err.root_cause());
        }
        let _ = writeln!(out, "  Reason:      {}", self.verdict.reason);
        if !self.verdict.missing_tables.is_empty() {
            let _ = writeln!(out, "  Missing:     {}", self.verdict.missing_tables.join(", "));
        }
        if !self.verdict.unqueryable_tables.is_empty() {
            let _ = writeln!(
                out,
                "  Unreadable:  {}",
                self.verdict.unqueryable_tables.join(", ")
            );
        }
        if let Some(remediation) = &self.verdict.remediation {
            let _ = writeln!(out, "  Remediation: {remediation}");
        }
        out
    }
}

/// Apply the termination policy to a startup outcome.
///
/// `Ready` and `DegradedTransient` always continue. A block (either a
/// `Blocked` verdict or a classified error) continues only in `Testing`.
pub fn enforce(
    outcome: Result<StartupReport, ClassifiedError>,
    context: ExecutionContext,
) -> Result<ReadinessVerdict, StartupAbort> {
    let (verdict, error) = match outcome {
        Ok(report) if !report.verdict.is_blocked() => return Ok(report.verdict),
        Ok(report) => (report.verdict, None),
        Err(err) => (err.to_verdict(), Some(err)),
    };

    if context.may_continue_when_blocked() {
        warn!(
            %context,
            reason = %verdict.reason,
            "Database blocked; continuing because the execution context permits it"
        );
        return Ok(verdict);
    }

    Err(StartupAbort {
        context,
        verdict,
        error,
    })
}
