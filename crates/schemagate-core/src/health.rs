//! Health report model derived from a readiness verdict.
//!
//! Body shape: `{status, checks: [{name: "database", status, description, data}]}`.
//! Only the structured verdict is exposed; raw driver errors stay in logs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::Display;

use crate::readiness::{ReadinessStatus, ReadinessVerdict};

/// Name of the database check in the report.
pub const DATABASE_CHECK: &str = "database";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub description: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    pub fn from_verdict(verdict: &ReadinessVerdict) -> Self {
        let status = match verdict.status {
            ReadinessStatus::Ready => HealthStatus::Healthy,
            ReadinessStatus::DegradedTransient | ReadinessStatus::Blocked => {
                HealthStatus::Unhealthy
            }
        };
        let check = HealthCheck {
            name: DATABASE_CHECK.to_string(),
            status,
            description: verdict.reason.clone(),
            data: json!({
                "readiness": verdict.status,
                "reason": verdict.reason,
                "missing_tables": verdict.missing_tables,
                "unqueryable_tables": verdict.unqueryable_tables,
                "remediation": verdict.remediation,
            }),
        };
        Self {
            status,
            checks: vec![check],
        }
    }

    /// 200 when healthy, 503 otherwise.
    pub const fn http_status(&self) -> u16 {
        match self.status {
            HealthStatus::Healthy => 200,
            HealthStatus::Unhealthy => 503,
        }
    }
}
