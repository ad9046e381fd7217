//! Fluent builder for declarative HTTP API test suites.
//!
//! # Overview
//! A suite describes a sequence of HTTP requests against a resource, attaches
//! assertions to each response, and runs them as ordered batches. State
//! derived from one batch (an auth token, say) reaches later batches through
//! named before-hooks that rewrite each request right before dispatch.
//!
//! # Design
//! - Composition never performs I/O. Each request call snapshots the path
//!   stack, the defaults and the target into an `OutgoingRequest` and files
//!   it as a case under the current discussion text.
//! - A `Transport` executes requests (host-does-IO). `UreqTransport` is the
//!   default; tests plug in closures.
//! - Batches run strictly in order; cases inside a batch may run
//!   concurrently.

pub mod config;
pub mod error;
pub mod expect;
pub mod form;
pub mod hooks;
pub mod http;
pub mod path;
pub mod runner;
pub mod suite;
pub mod topic;
pub mod transport;
pub mod tree;

pub use config::{RequestDefaults, RunConfig, Target};
pub use error::{AssertionError, SuiteError, TransportError};
pub use expect::{Assertion, CheckFn, Expect, Verdict};
pub use hooks::HookRegistry;
pub use http::{HttpMethod, HttpResponse, MultipartPart, OutgoingRequest};
pub use runner::{AssertionReport, RunReport, RunSummary, SuitePlan};
pub use suite::{ApiSuite, Call};
pub use topic::{task_fn, Dispatch, Outcome, TaskFn, Topic};
pub use transport::{transport_fn, DispatchFuture, Transport, UreqTransport};
pub use tree::{CaseNode, CaseWork, FlatCase};

/// Starts a new suite described by `text`.
pub fn describe(text: impl Into<String>) -> ApiSuite {
    ApiSuite::describe(text)
}
