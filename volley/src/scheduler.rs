use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::descriptor::RequestDescriptor;
use crate::dispatch::{dispatch_attempt, AttemptSettings};
use crate::outcome::{AttemptState, Failure, FailureKind, Outcome, OutcomeRecord};
use crate::pacing::PacingPlan;
use crate::transport::{HttpTransport, Transport};

/// Fires `requests_per_second * repetitions` copies of a request on the pacing plan and
/// collects one record per attempt.
///
/// All attempts are spawned up front, each sleeping until its own offset, and joined in
/// scheduling order. The transport handle is owned here and shared by every attempt.
pub struct PacingScheduler<T> {
    transport: Arc<T>,
    config: DispatchConfig,
    plan: PacingPlan,
}

impl<T: Transport> PacingScheduler<T> {
    #[must_use]
    pub fn new(transport: T, config: DispatchConfig) -> Self {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    #[must_use]
    pub fn with_shared_transport(transport: Arc<T>, config: DispatchConfig) -> Self {
        let plan = PacingPlan::new(&config);
        Self {
            transport,
            config,
            plan,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn plan(&self) -> &PacingPlan {
        &self.plan
    }

    /// Runs every attempt to completion. Individual failures and timeouts become failure
    /// records; the returned collection always has exactly `total_attempts` entries,
    /// ordered by scheduling index.
    pub async fn dispatch(
        &self,
        descriptor: impl Into<Arc<RequestDescriptor>>,
    ) -> Vec<OutcomeRecord> {
        let descriptor = descriptor.into();
        let settings = AttemptSettings {
            timeout: self.config.timeout(),
            include_response_body: self.config.include_response_body(),
            correlation_id: self.config.correlation_id().cloned(),
        };
        info!(
            method = %descriptor.method(),
            endpoint = %descriptor.endpoint(),
            requests_per_second = self.config.requests_per_second(),
            batch_size = self.config.batch_size(),
            repetitions = self.config.repetitions(),
            tick_interval_ms = self.plan.tick_interval().as_millis() as u64,
            "dispatching"
        );

        let mut tasks = Vec::with_capacity(self.plan.total_attempts());
        for (index, delay) in self.plan.offsets().enumerate() {
            tasks.push(tokio::spawn(dispatch_attempt(
                index,
                delay,
                self.transport.clone(),
                descriptor.clone(),
                settings.clone(),
            )));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            match task.await {
                Ok(record) => results.push(record),
                Err(e) => {
                    warn!(index, error = %e, "attempt task did not complete");
                    results.push(abandoned(index, &settings, &e));
                }
            }
        }

        let (mut succeeded, mut timed_out, mut errored) = (0usize, 0usize, 0usize);
        for record in &results {
            match record.state() {
                AttemptState::Succeeded => succeeded += 1,
                AttemptState::TimedOut => timed_out += 1,
                AttemptState::Errored => errored += 1,
            }
        }
        info!(
            attempts = results.len(),
            succeeded, timed_out, errored, "dispatch finished"
        );
        results
    }
}

impl PacingScheduler<HttpTransport> {
    /// Scheduler over a default-configured [`HttpTransport`].
    #[must_use]
    pub fn http(config: DispatchConfig) -> Self {
        Self::new(HttpTransport::default(), config)
    }
}

/// One-shot dispatch over a fresh [`HttpTransport`].
///
/// Both arguments are validated when they are built, so nothing here can fail.
pub async fn dispatch(descriptor: RequestDescriptor, config: DispatchConfig) -> Vec<OutcomeRecord> {
    PacingScheduler::http(config).dispatch(descriptor).await
}

// A task that panicked or was cancelled still owes the caller a record.
fn abandoned(index: usize, settings: &AttemptSettings, err: &JoinError) -> OutcomeRecord {
    OutcomeRecord {
        id: Uuid::new_v4(),
        index,
        correlation_id: settings.correlation_id.clone(),
        timestamp: Utc::now(),
        elapsed_millis: 0,
        outcome: Outcome::Failed(Failure {
            kind: FailureKind::TransportError,
            message: format!("attempt task failed: {err}"),
        }),
    }
}
