use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use uuid::Uuid;

/// What came back from a completed exchange.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` unless the run asked for response bodies.
    pub body: Option<Bytes>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    TransportError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

/// Terminal state of one attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeeded(ResponseSnapshot),
    Failed(Failure),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Succeeded,
    TimedOut,
    Errored,
}

/// Result of one dispatched attempt.
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    pub id: Uuid,
    /// Position in the pacing plan; the aggregate is ordered by this.
    pub index: usize,
    pub correlation_id: Option<Arc<str>>,
    /// When the attempt started executing, after its scheduled delay.
    pub timestamp: DateTime<Utc>,
    /// Network exchange only. Fixed to the timeout for [`FailureKind::Timeout`] and to `0`
    /// for [`FailureKind::TransportError`].
    pub elapsed_millis: u64,
    pub outcome: Outcome,
}

impl OutcomeRecord {
    #[inline]
    #[must_use]
    pub fn response(&self) -> Option<&ResponseSnapshot> {
        match &self.outcome {
            Outcome::Succeeded(resp) => Some(resp),
            Outcome::Failed(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Succeeded(_) => None,
            Outcome::Failed(failure) => Some(failure),
        }
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        match &self.outcome {
            Outcome::Succeeded(_) => AttemptState::Succeeded,
            Outcome::Failed(Failure {
                kind: FailureKind::Timeout,
                ..
            }) => AttemptState::TimedOut,
            Outcome::Failed(Failure {
                kind: FailureKind::TransportError,
                ..
            }) => AttemptState::Errored,
        }
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state() == AttemptState::Succeeded
    }
}
