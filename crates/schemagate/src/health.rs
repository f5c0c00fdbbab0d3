//! HTTP health endpoint
//!
//! `GET /health` serves the stored readiness verdict as a [`HealthReport`]
//! (200 when healthy, 503 otherwise). While the verdict is
//! `DegradedTransient` every request re-runs the full startup sequence, so
//! migrations skipped during the outage are applied once the database
//! responds. The outcome goes through the termination policy; an abort is
//! published on [`HealthState::aborted`] for the server to shut down on.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use schemagate_core::{
    enforce, CatalogQuery, Connector, HealthReport, MigrationBackend, MigrationSet,
    ReadinessVerdict, SequencerConfig, StartupAbort, StartupSequencer,
};
use tokio::sync::{watch, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state behind the health routes.
pub struct HealthState<D: ?Sized> {
    verdict: RwLock<ReadinessVerdict>,
    plan: MigrationSet,
    config: SequencerConfig,
    abort: watch::Sender<Option<StartupAbort>>,
    db: Arc<D>,
}

impl<D> HealthState<D>
where
    D: Connector + MigrationBackend + CatalogQuery + ?Sized,
{
    pub fn new(
        db: Arc<D>,
        verdict: ReadinessVerdict,
        plan: MigrationSet,
        config: SequencerConfig,
    ) -> Self {
        let (abort, _) = watch::channel(None);
        Self {
            verdict: RwLock::new(verdict),
            plan,
            config,
            abort,
            db,
        }
    }

    pub async fn verdict(&self) -> ReadinessVerdict {
        self.verdict.read().await.clone()
    }

    /// Receiver that holds `Some` once a re-run aborted under the policy.
    pub fn aborted(&self) -> watch::Receiver<Option<StartupAbort>> {
        self.abort.subscribe()
    }

    /// Current verdict, re-running the startup sequence first when it is
    /// transient.
    pub async fn refresh(&self) -> ReadinessVerdict {
        // Held across the re-run so concurrent requests never apply twice
        let mut verdict = self.verdict.write().await;
        if !verdict.is_degraded() {
            return verdict.clone();
        }

        let outcome = StartupSequencer::new(self.db.as_ref(), &self.plan, self.config.clone())
            .run()
            .await;
        let fresh = match enforce(outcome, self.config.execution_context) {
            Ok(fresh) => fresh,
            Err(abort) => {
                error!(
                    exit_code = abort.exit_code(),
                    "{}",
                    abort.diagnostic()
                );
                let fresh = abort.verdict.clone();
                self.abort.send_replace(Some(abort));
                fresh
            }
        };

        if fresh.status != verdict.status {
            info!(from = %verdict.status, to = %fresh.status, "Readiness changed");
        }
        *verdict = fresh.clone();
        fresh
    }
}

/// Resolves once `receiver` reports an abort.
pub async fn abort_signal(mut receiver: watch::Receiver<Option<StartupAbort>>) {
    let closed = receiver.wait_for(Option::is_some).await.is_err();
    if closed {
        // Sender dropped with the state: no abort can arrive any more
        std::future::pending::<()>().await;
    }
}

/// Build the router for the health endpoint.
pub fn router<D>(state: Arc<HealthState<D>>) -> Router
where
    D: Connector + MigrationBackend + CatalogQuery + ?Sized + 'static,
{
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health::<D>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn banner() -> &'static str {
    concat!("schemagate ", env!("CARGO_PKG_VERSION"))
}

async fn health<D>(State(state): State<Arc<HealthState<D>>>) -> (StatusCode, Json<HealthReport>)
where
    D: Connector + MigrationBackend + CatalogQuery + ?Sized + 'static,
{
    let report = HealthReport::from_verdict(&state.refresh().await);
    let status =
        StatusCode::from_u16(report.http_status()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (status, Json(report))
}
