use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::body::BodyPolicy;
use crate::descriptor::RequestDescriptor;
use crate::error::TransportError;
use crate::outcome::{Failure, FailureKind, Outcome, OutcomeRecord};
use crate::transport::Transport;

/// Per-run settings every attempt needs, cloned into each spawned attempt.
#[derive(Debug, Clone)]
pub(crate) struct AttemptSettings {
    pub(crate) timeout: Duration,
    pub(crate) include_response_body: bool,
    pub(crate) correlation_id: Option<Arc<str>>,
}

/// One attempt: sleep out the scheduled delay, run the exchange under the timeout and
/// turn whatever happened into a record. Never fails.
pub(crate) async fn dispatch_attempt<T: Transport>(
    index: usize,
    delay: Duration,
    transport: Arc<T>,
    descriptor: Arc<RequestDescriptor>,
    settings: AttemptSettings,
) -> OutcomeRecord {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let timestamp = Utc::now();
    let policy = if settings.include_response_body {
        BodyPolicy::Retain
    } else {
        BodyPolicy::Discard
    };
    let (elapsed, res) = run_timed(tokio::time::timeout(
        settings.timeout,
        transport.execute(&descriptor, policy),
    ))
    .await;

    let (elapsed_millis, outcome) = match res {
        Ok(Ok(mut response)) => {
            if !settings.include_response_body {
                response.body = None;
            }
            let elapsed_millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            debug!(index, status = %response.status, elapsed_millis, "attempt succeeded");
            (elapsed_millis, Outcome::Succeeded(response))
        }
        Ok(Err(TransportError::TimedOut)) | Err(_) => {
            debug!(index, "attempt timed out");
            (
                timeout_millis(settings.timeout),
                Outcome::Failed(Failure {
                    kind: FailureKind::Timeout,
                    message: format!("no response within {}s", settings.timeout.as_secs()),
                }),
            )
        }
        Ok(Err(e)) => {
            let message = e.chain_message();
            debug!(index, error = %message, "attempt errored");
            (
                0,
                Outcome::Failed(Failure {
                    kind: FailureKind::TransportError,
                    message,
                }),
            )
        }
    };

    OutcomeRecord {
        id: Uuid::new_v4(),
        index,
        correlation_id: settings.correlation_id,
        timestamp,
        elapsed_millis,
        outcome,
    }
}

#[inline]
pub(crate) fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[inline]
async fn run_timed<T, F: Future<Output = T>>(fut: F) -> (Duration, T) {
    let start = Instant::now();
    let res = fut.await;
    (start.elapsed(), res)
}
