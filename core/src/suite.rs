//! Fluent suite builder.
//!
//! # Design
//! `ApiSuite` owns all authoring state: the discussion stack, the path
//! stack, the request defaults snapshot, the target, and the batch being
//! built. Every request method composes a fresh `OutgoingRequest` from that
//! state, files it under the current discussion as a new case, and makes it
//! the case that following `expect` calls attach to.
//!
//! Uri, body and query parameters are separate fields on `Call` rather than
//! positional guesses, so a single object is never ambiguous between body
//! and query.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{RequestDefaults, RunConfig, Target};
use crate::error::SuiteError;
use crate::expect::Expect;
use crate::form;
use crate::hooks::HookRegistry;
use crate::http::{HttpMethod, OutgoingRequest};
use crate::path::PathStack;
use crate::runner::{RunReport, SuitePlan};
use crate::topic::{Dispatch, Topic};
use crate::transport::{Transport, UreqTransport};
use crate::tree::CaseNode;

/// One request to compose.
#[derive(Debug, Clone)]
pub struct Call {
    method: HttpMethod,
    uri: Option<String>,
    data: Option<Value>,
    params: Option<Value>,
    dispatch: Dispatch,
}

impl Call {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            uri: None,
            data: None,
            params: None,
            dispatch: Dispatch::Suite,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(HttpMethod::Get).uri(uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(HttpMethod::Post).uri(uri)
    }

    pub fn put(uri: &str) -> Self {
        Self::new(HttpMethod::Put).uri(uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(HttpMethod::Delete).uri(uri)
    }

    pub fn head(uri: &str) -> Self {
        Self::new(HttpMethod::Head).uri(uri)
    }

    /// Extra path segment appended to the suite's path stack. Empty means none.
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = (!uri.is_empty()).then(|| uri.to_string());
        self
    }

    /// Request body, JSON or form encoded depending on the `Content-Type` default.
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Query parameters, appended as `?k=v&...` in key order.
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Sends this request through `transport` instead of the suite's.
    pub fn dispatcher(mut self, transport: Arc<dyn Transport>) -> Self {
        self.dispatch = Dispatch::Custom(transport);
        self
    }
}

/// A fluent, batch-ordered HTTP API test suite.
///
/// ```no_run
/// use apisuite_core::{describe, RunConfig};
/// use serde_json::json;
///
/// # async fn demo() -> Result<(), apisuite_core::SuiteError> {
/// let mut suite = describe("users api");
/// suite
///     .use_host("localhost", Some(3000))
///     .discuss("When listing users")
///     .get("/users")
///     .expect((200, json!([])))?;
/// let report = suite.run(&RunConfig::default()).await;
/// assert!(report.is_success());
/// # Ok(())
/// # }
/// ```
pub struct ApiSuite {
    description: String,
    discussion: Vec<String>,
    paths: PathStack,
    defaults: RequestDefaults,
    hooks: HookRegistry,
    target: Target,
    /// Discussion snapshot plus case key of the latest request.
    current: Option<Vec<String>>,
    batch: CaseNode,
    batches: Vec<CaseNode>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ApiSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSuite")
            .field("description", &self.description)
            .field("discussion", &self.discussion)
            .field("paths", &self.paths)
            .field("defaults", &self.defaults)
            .field("hooks", &self.hooks)
            .field("target", &self.target)
            .field("current", &self.current)
            .field("batches", &self.batches.len())
            .finish()
    }
}

impl ApiSuite {
    pub fn describe(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            discussion: Vec::new(),
            paths: PathStack::new(),
            defaults: RequestDefaults::default(),
            hooks: HookRegistry::new(),
            target: Target::default(),
            current: None,
            batch: CaseNode::new(),
            batches: Vec::new(),
            transport: Arc::new(UreqTransport),
        }
    }

    // --- narrative ---

    pub fn discuss(&mut self, text: impl Into<String>) -> &mut Self {
        self.discussion.push(text.into());
        self
    }

    pub fn undiscuss(&mut self) -> &mut Self {
        self.undiscuss_n(1)
    }

    pub fn undiscuss_n(&mut self, n: usize) -> &mut Self {
        let keep = self.discussion.len().saturating_sub(n);
        self.discussion.truncate(keep);
        self
    }

    // --- target and defaults ---

    /// Sets host and port. An empty host means `localhost`, `None` port means 80.
    pub fn use_host(&mut self, host: &str, port: Option<u16>) -> &mut Self {
        self.target.host = if host.is_empty() {
            Target::default().host
        } else {
            host.to_string()
        };
        self.target.port = port.unwrap_or(Target::default().port);
        self
    }

    pub fn use_target(&mut self, target: Target) -> &mut Self {
        self.target = target;
        self
    }

    /// Switches between `https` and `http`.
    pub fn secure(&mut self, secure: bool) -> &mut Self {
        self.target.secure = secure;
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.defaults = self.defaults.with_header(key, value);
        self
    }

    pub fn remove_header(&mut self, key: &str) -> &mut Self {
        self.defaults = self.defaults.without_header(key);
        self
    }

    /// Replaces every default header.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers = headers.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.defaults = self.defaults.with_headers(headers);
        self
    }

    pub fn follow_redirect(&mut self, follow: bool) -> &mut Self {
        self.defaults = self.defaults.with_follow_redirect(follow);
        self
    }

    pub fn max_redirects(&mut self, max: u32) -> &mut Self {
        self.defaults = self.defaults.with_max_redirects(max);
        self
    }

    // --- paths ---

    pub fn path(&mut self, segment: &str) -> &mut Self {
        self.paths.push(segment);
        self
    }

    pub fn unpath(&mut self) -> &mut Self {
        self.unpath_n(1)
    }

    pub fn unpath_n(&mut self, n: usize) -> &mut Self {
        self.paths.pop(n);
        self
    }

    pub fn root(&mut self, segment: &str) -> &mut Self {
        self.paths.set_root(segment);
        self
    }

    // --- before hooks ---

    pub fn before<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(OutgoingRequest) -> OutgoingRequest + Send + Sync + 'static,
    {
        self.hooks.register(name, hook);
        self
    }

    pub fn unbefore(&mut self, name: &str) -> &mut Self {
        self.hooks.unregister(name);
        self
    }

    /// A handle to the live hook registry, for registering hooks from checks.
    pub fn hooks(&self) -> HookRegistry {
        self.hooks.clone()
    }

    // --- requests ---

    pub fn get(&mut self, uri: &str) -> &mut Self {
        self.request(Call::get(uri))
    }

    pub fn head(&mut self, uri: &str) -> &mut Self {
        self.request(Call::head(uri))
    }

    pub fn del(&mut self, uri: &str) -> &mut Self {
        self.request(Call::delete(uri))
    }

    pub fn post(&mut self, uri: &str, data: impl Into<Option<Value>>) -> &mut Self {
        let call = Call::post(uri);
        self.request(match data.into() {
            Some(data) => call.data(data),
            None => call,
        })
    }

    pub fn put(&mut self, uri: &str, data: impl Into<Option<Value>>) -> &mut Self {
        let call = Call::put(uri);
        self.request(match data.into() {
            Some(data) => call.data(data),
            None => call,
        })
    }

    /// POSTs the file at `file` as a single multipart part named `part`.
    ///
    /// The file is read when the case runs, after the before-hooks.
    pub fn upload_file(&mut self, uri: &str, file: impl Into<PathBuf>, part: &str) -> &mut Self {
        let mut call = Call::post(uri);
        call.dispatch = Dispatch::Upload {
            path: file.into(),
            part: part.to_string(),
        };
        self.request(call)
    }

    /// Composes `call` into a new case under the current discussion.
    pub fn request(&mut self, call: Call) -> &mut Self {
        let Call {
            method,
            uri,
            data,
            params,
            dispatch,
        } = call;

        let mut full_path = self.paths.resolve(uri.as_deref());
        if let Some(params) = &params {
            full_path.push('?');
            full_path.push_str(&form::encode(params));
        }

        let body = data.map(|data| {
            if self.defaults.is_form_encoded() {
                form::encode(&data)
            } else {
                data.to_string()
            }
        });

        let outgoing = OutgoingRequest {
            method,
            uri: format!("{}{full_path}", self.target.origin()),
            headers: self.defaults.headers.clone(),
            body,
            multipart: Vec::new(),
            follow_redirect: self.defaults.follow_redirect,
            max_redirects: self.defaults.max_redirects,
        };

        let key = format!("A {method} to {full_path}");
        tracing::debug!(case = %key, uri = %outgoing.uri, "Composed request");

        let topic = Topic::new(outgoing, self.hooks.clone(), dispatch);
        self.batch.locate(&self.discussion).insert_case(key.clone(), topic);
        let mut path = self.discussion.clone();
        path.push(key);
        self.current = Some(path);
        self
    }

    // --- assertions ---

    /// Attaches assertions to the most recently composed case, wherever the
    /// discussion stack has moved since.
    pub fn expect(&mut self, expect: impl Into<Expect>) -> Result<&mut Self, SuiteError> {
        let path = self.current.as_ref().ok_or(SuiteError::NoCurrentCase)?;
        self.batch
            .get_mut(path)
            .ok_or(SuiteError::NoCurrentCase)?
            .expect(expect)?;
        Ok(self)
    }

    // --- batches ---

    /// Closes the current batch. Cases composed after this run only once
    /// every case before it has finished.
    pub fn next_batch(&mut self) -> &mut Self {
        let batch = std::mem::take(&mut self.batch);
        tracing::debug!(batch = self.batches.len(), entries = batch.len(), "Closed batch");
        self.batches.push(batch);
        self.current = None;
        self
    }

    /// Flushes any open batch, then appends `batch` as a batch of its own.
    ///
    /// `batch` may hold task cases (`CaseNode::insert_task`) as well as
    /// requests; it runs after everything composed so far and before
    /// anything composed later.
    pub fn add_batch(&mut self, batch: CaseNode) -> &mut Self {
        if !self.batch.is_empty() {
            self.next_batch();
        }
        tracing::debug!(batch = self.batches.len(), entries = batch.len(), "Added batch");
        self.batches.push(batch);
        self.current = None;
        self
    }

    /// Flushes any open batch and hands out every batch in order.
    pub fn export(&mut self) -> SuitePlan {
        if !self.batch.is_empty() {
            self.next_batch();
        }
        SuitePlan {
            description: self.description.clone(),
            batches: std::mem::take(&mut self.batches),
        }
    }

    /// Exports and runs the suite with its transport.
    pub async fn run(&mut self, config: &RunConfig) -> RunReport {
        let plan = self.export();
        plan.run(Arc::clone(&self.transport), config).await
    }

    pub fn with_transport(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.transport = transport;
        self
    }

    // --- introspection ---

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn discussion(&self) -> &[String] {
        &self.discussion
    }

    pub fn paths(&self) -> &[String] {
        self.paths.segments()
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Key of the case `expect` attaches to.
    pub fn current_case(&self) -> Option<&str> {
        self.current.as_ref().and_then(|path| path.last()).map(String::as_str)
    }

    /// The batch being built.
    pub fn batch(&self) -> &CaseNode {
        &self.batch
    }

    /// Batches closed so far and not yet exported.
    pub fn batches(&self) -> &[CaseNode] {
        &self.batches
    }
}
