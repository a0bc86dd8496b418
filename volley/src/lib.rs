//! Paced HTTP load generation.
//!
//! Build a [`RequestDescriptor`] and a [`DispatchConfig`], hand both to a
//! [`PacingScheduler`] and get back one [`OutcomeRecord`] per attempt, in scheduling
//! order. Attempt failures are data, never errors.

pub mod body;
pub mod config;
pub mod descriptor;
mod dispatch;
pub mod error;
pub mod outcome;
pub mod pacing;
pub mod report;
pub mod scheduler;
pub mod transport;

pub use config::{DispatchConfig, TransportOptions};
pub use descriptor::{RequestBody, RequestDescriptor};
pub use error::{ConfigError, TransportError};
pub use outcome::{AttemptState, Failure, FailureKind, Outcome, OutcomeRecord, ResponseSnapshot};
pub use pacing::PacingPlan;
pub use scheduler::{dispatch, PacingScheduler};
pub use transport::{HttpTransport, Transport};
