//! The asynchronous operation behind one case.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::TransportError;
use crate::hooks::HookRegistry;
use crate::http::{HttpResponse, MultipartPart, OutgoingRequest};
use crate::transport::{DispatchFuture, Transport};

/// What a topic resolves to: a response or the reason there is none.
pub type Outcome = Result<HttpResponse, TransportError>;

/// How a topic hands its request to the network.
#[derive(Clone, Default)]
pub enum Dispatch {
    /// The transport the suite runs with.
    #[default]
    Suite,
    /// A per-call transport that replaces the suite's.
    Custom(Arc<dyn Transport>),
    /// Read `path` into one multipart part named `part`, then use the suite
    /// transport.
    Upload { path: PathBuf, part: String },
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Suite => f.write_str("Suite"),
            Dispatch::Custom(_) => f.write_str("Custom"),
            Dispatch::Upload { path, part } => f
                .debug_struct("Upload")
                .field("path", path)
                .field("part", part)
                .finish(),
        }
    }
}

/// A non-HTTP case: any async computation resolving to an outcome the
/// assertions can inspect.
pub type TaskFn = Arc<dyn Fn() -> DispatchFuture + Send + Sync>;

/// Wraps a closure as a task for `ApiSuite::add_batch`.
pub fn task_fn<F>(f: F) -> TaskFn
where
    F: Fn() -> DispatchFuture + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A composed request waiting to run.
///
/// Holds the descriptor as composed plus a handle to the live hook
/// registry; hooks are applied when the topic is prepared.
#[derive(Debug, Clone)]
pub struct Topic {
    outgoing: OutgoingRequest,
    hooks: HookRegistry,
    hooks_at_compose: Vec<String>,
    dispatch: Dispatch,
}

impl Topic {
    pub fn new(outgoing: OutgoingRequest, hooks: HookRegistry, dispatch: Dispatch) -> Self {
        let hooks_at_compose = hooks.names();
        Self {
            outgoing,
            hooks,
            hooks_at_compose,
            dispatch,
        }
    }

    /// The descriptor as composed, before any hook ran.
    pub fn outgoing(&self) -> &OutgoingRequest {
        &self.outgoing
    }

    /// Names of the hooks registered when this topic was composed.
    pub fn hook_names(&self) -> &[String] {
        &self.hooks_at_compose
    }

    pub fn dispatch_mode(&self) -> &Dispatch {
        &self.dispatch
    }

    /// The descriptor with every currently registered hook applied.
    pub fn prepared(&self) -> OutgoingRequest {
        self.hooks.apply(self.outgoing.clone())
    }

    /// Applies hooks, then dispatches once and returns the outcome.
    pub async fn execute(&self, transport: &Arc<dyn Transport>) -> Outcome {
        self.send(self.prepared(), transport).await
    }

    /// Dispatches an already prepared descriptor once.
    ///
    /// The runner prepares every case of a batch before any of them runs, so
    /// a hook registered by one case's check never reaches its siblings.
    pub async fn send(&self, request: OutgoingRequest, transport: &Arc<dyn Transport>) -> Outcome {
        tracing::debug!(method = %request.method, uri = %request.uri, "Dispatching request");
        match &self.dispatch {
            Dispatch::Suite => transport.dispatch(request).await,
            Dispatch::Custom(custom) => custom.dispatch(request).await,
            Dispatch::Upload { path, part } => {
                let request = attach_file(request, path, part).await?;
                transport.dispatch(request).await
            }
        }
    }
}

async fn attach_file(
    mut request: OutgoingRequest,
    path: &Path,
    part: &str,
) -> Result<OutgoingRequest, TransportError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| TransportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::debug!(file = %path.display(), bytes = data.len(), "Attached upload file");
    request.multipart = vec![MultipartPart {
        name: part.to_string(),
        filename,
        content_type: "application/octet-stream".to_string(),
        data,
    }];
    Ok(request)
}
