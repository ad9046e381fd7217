//! HTTP descriptor types for the host-does-IO pattern.
//!
//! # Design
//! A composed case never performs I/O itself. It owns an `OutgoingRequest`,
//! a plain-data description of the request, and hands it to a `Transport`
//! once the before-hooks have run. The response comes back as plain data in
//! `HttpResponse`, which is what every assertion inspects.
//!
//! All fields use owned types so descriptors can move freely into tasks and
//! hooks without lifetime concerns.

use std::fmt;

use indexmap::IndexMap;
use uuid::Uuid;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A fully resolved request for one case.
///
/// Built by the suite at composition time from a copy of the current
/// defaults; before-hooks may rewrite it right before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub method: HttpMethod,
    pub uri: String,
    pub headers: IndexMap<String, String>,
    pub body: Option<String>,
    pub multipart: Vec<MultipartPart>,
    pub follow_redirect: Option<bool>,
    pub max_redirects: Option<u32>,
}

/// Bytes ready to go on the wire, with the content type they require.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl OutgoingRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Inserts a header, or replaces the value of one with the same name in
    /// any case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.headers, name.into(), value.into());
    }

    /// Encodes the body for transmission.
    ///
    /// Multipart parts take precedence over a text body and force a
    /// `multipart/form-data` content type carrying a fresh boundary.
    pub fn encoded_body(&self) -> Option<EncodedBody> {
        if !self.multipart.is_empty() {
            let boundary = format!("apisuite-{}", Uuid::new_v4().simple());
            return Some(EncodedBody {
                content_type: Some(format!("multipart/form-data; boundary={boundary}")),
                bytes: encode_multipart(&self.multipart, &boundary),
            });
        }
        self.body.as_ref().map(|body| EncodedBody {
            content_type: None,
            bytes: body.clone().into_bytes(),
        })
    }
}

/// Case-insensitive insert. An existing header keeps its position and first
/// spelling; only its value changes.
pub(crate) fn insert_header(headers: &mut IndexMap<String, String>, name: String, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
        Some((_, existing)) => *existing = value,
        None => {
            headers.insert(name, value);
        }
    }
}

/// Frames `parts` as `multipart/form-data` using `boundary`.
pub fn encode_multipart(parts: &[MultipartPart], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.name, part.filename
            )
            .as_bytes(),
        );
        out.extend_from_slice(format!("Content-Type: {}\r\n", part.content_type).as_bytes());
        out.extend_from_slice(b"Content-Transfer-Encoding: binary\r\n\r\n");
        out.extend_from_slice(&part.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
