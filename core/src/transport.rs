//! The seam between composed cases and the network.
//!
//! # Design
//! A `Transport` turns a finished `OutgoingRequest` into exactly one
//! `Result<HttpResponse, TransportError>`. The suite never talks to the
//! network directly, so tests can swap in a closure that fabricates
//! responses. `UreqTransport` is the default and executes the round-trip
//! with a blocking `ureq` agent on tokio's blocking pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TransportError;
use crate::http::{HttpResponse, OutgoingRequest};

/// The single completion of one dispatched request.
pub type DispatchFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send>>;

/// Executes outgoing requests.
pub trait Transport: Send + Sync {
    fn dispatch(&self, request: OutgoingRequest) -> DispatchFuture;
}

impl<F> Transport for F
where
    F: Fn(OutgoingRequest) -> DispatchFuture + Send + Sync,
{
    fn dispatch(&self, request: OutgoingRequest) -> DispatchFuture {
        self(request)
    }
}

/// Wraps a closure as a shareable transport.
pub fn transport_fn<F>(f: F) -> Arc<dyn Transport>
where
    F: Fn(OutgoingRequest) -> DispatchFuture + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Default transport backed by `ureq`.
///
/// Redirect policy comes from the request: `follow_redirect = Some(false)`
/// returns the 3xx response as-is, otherwise `max_redirects` (default 10)
/// bounds how many hops are followed. Non-2xx statuses are data, not errors.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport;

const DEFAULT_MAX_REDIRECTS: u32 = 10;

impl Transport for UreqTransport {
    fn dispatch(&self, request: OutgoingRequest) -> DispatchFuture {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || execute(request))
                .await
                .map_err(|e| TransportError::Connection(format!("dispatch task failed: {e}")))?
        })
    }
}

fn execute(request: OutgoingRequest) -> Result<HttpResponse, TransportError> {
    let max_redirects = match request.follow_redirect {
        Some(false) => 0,
        _ => request.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
    };
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(max_redirects)
        .max_redirects_will_error(false)
        .build()
        .new_agent();

    let encoded = request.encoded_body();
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.uri.as_str());
    for (name, value) in &request.headers {
        let replaced = encoded
            .as_ref()
            .is_some_and(|b| b.content_type.is_some() && name.eq_ignore_ascii_case("content-type"));
        if !replaced {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    let result = match encoded {
        Some(body) => {
            if let Some(content_type) = body.content_type {
                builder = builder.header("content-type", content_type);
            }
            let req = builder
                .body(body.bytes)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            agent.run(req)
        }
        None => {
            let req = builder
                .body(())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            agent.run(req)
        }
    };
    let mut response = result.map_err(|e| TransportError::Connection(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    tracing::debug!(status, uri = %request.uri, "Received response");
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use indexmap::IndexMap;

    fn request(uri: &str) -> OutgoingRequest {
        OutgoingRequest {
            method: HttpMethod::Get,
            uri: uri.to_string(),
            headers: IndexMap::new(),
            body: None,
            multipart: Vec::new(),
            follow_redirect: None,
            max_redirects: None,
        }
    }

    #[tokio::test]
    async fn closures_are_transports() {
        let transport = transport_fn(|req: OutgoingRequest| -> DispatchFuture {
            Box::pin(async move {
                Ok(HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: req.uri,
                })
            })
        });
        let res = transport.dispatch(request("http://x/y")).await.unwrap();
        assert_eq!(res.body, "http://x/y");
    }

    #[tokio::test]
    async fn ureq_reports_connection_failures() {
        // Port 9 (discard) on loopback is closed on test machines.
        let err = UreqTransport.dispatch(request("http://127.0.0.1:9/")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
