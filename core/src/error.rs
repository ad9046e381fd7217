//! Error types for suite composition, transport, and assertions.
//!
//! # Design
//! The three enums map to the three places things go wrong. `SuiteError` is
//! a programmer error in suite authoring and is returned synchronously while
//! the suite is being built. `TransportError` is what a `Transport` hands
//! back when no HTTP response could be produced. `AssertionError` is what a
//! generated or custom check returns when its condition does not hold; the
//! runner turns it into a broken or errored result.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors raised while composing a suite.
#[derive(Debug, Error)]
pub enum SuiteError {
    /// A custom assertion description was given without a check function.
    #[error("custom assertion {description:?} has no check function")]
    MissingCheck { description: String },

    /// A custom check function was given without a description.
    #[error("custom check function has no description")]
    MissingDescription,

    /// `expect` was called before any request was composed in this batch.
    #[error("no request has been composed in the current batch")]
    NoCurrentCase,
}

/// Failures that prevent a request from producing a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failure or non-HTTP response.
    #[error("transport failed: {0}")]
    Connection(String),

    /// The upload file could not be read before dispatch.
    #[error("failed to read upload file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The descriptor cannot be expressed as an HTTP request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A failed assertion on one case.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssertionError {
    /// The case's topic returned a transport error instead of a response.
    #[error("expected no error, got: {0}")]
    Transport(String),

    #[error("expected status {expected}, got {actual}")]
    Status { expected: u16, actual: u16 },

    #[error("expected body {expected}, got {actual}")]
    Body { expected: String, actual: String },

    /// The response body is not valid JSON.
    #[error("response body is not JSON: {0}")]
    InvalidJson(String),

    /// A custom check reported a failure.
    #[error("{0}")]
    Failed(String),
}

impl AssertionError {
    /// Shorthand for a custom check failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
