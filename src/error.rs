//! Crate-wide error type
//!
//! Retrieval and write paths share one error enum. Resolution failures never
//! reach it (the resolver fails closed) and write failures are logged by the
//! job listener instead of propagating.
//!
//! Wrapped errors are exposed through `source()` only, so [`error_chain`]
//! prints every cause exactly once.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON")]
    Json(#[from] serde_json::Error),

    /// The endpoint answered with a GraphQL `errors` array
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The job listener task ended (panicked) before the queue drained
    #[error("Job listener exited with {0} jobs still queued")]
    ListenerExited(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

/// `Display` of an error followed by its sources
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(" | caused by: {}", cause));
        source = cause.source();
    }
    message
}
