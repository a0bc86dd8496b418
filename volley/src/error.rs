use thiserror::Error;

/// Rejected while building a [`crate::RequestDescriptor`] or [`crate::DispatchConfig`].
///
/// Nothing has been sent when one of these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("requests per second must be at least 1")]
    ZeroRate,
    #[error("batch size must be at least 1")]
    ZeroBatch,
    #[error("repetitions must be at least 1")]
    ZeroRepetitions,
    #[error("timeout must be at least 1 second")]
    ZeroTimeout,
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("failed to serialize json body")]
    Json(#[from] serde_json::Error),
    #[error("multipart body needs at least one file")]
    EmptyMultipart,
}

/// Failure of a single exchange as reported by a [`crate::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("exchange timed out")]
    TimedOut,
    #[error("failed to build request")]
    Build(#[from] http::Error),
    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to decode {encoding} body: {source}")]
    Decompress {
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Full cause chain, joined with `: `. hyper-util errors keep the useful part
    /// (connection refused, dns failure) in their sources.
    #[must_use]
    pub fn chain_message(&self) -> String {
        let mut msg = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let next = cause.to_string();
            if !msg.contains(&next) {
                msg.push_str(": ");
                msg.push_str(&next);
            }
            source = cause.source();
        }
        msg
    }
}
