//! Target, request defaults, and run configuration.
//!
//! # Design
//! `RequestDefaults` is an immutable snapshot. Every "mutation" returns a new
//! snapshot that the suite stores back in place of the old one, and each
//! composed request takes its own clone. A request that was already composed
//! can therefore never observe a later `set_header`.

use indexmap::IndexMap;

use crate::http::insert_header;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 80;

/// `Content-Type` value that switches request bodies to form encoding.
pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Where requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secure: false,
        }
    }
}

impl Target {
    /// Reads `APISUITE_HOST`, `APISUITE_PORT` and `APISUITE_SECURE`.
    ///
    /// Unset or unparsable values fall back to `localhost`, port 80, plain
    /// HTTP.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("APISUITE_HOST")
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = lookup("APISUITE_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let secure = lookup("APISUITE_SECURE")
            .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { host, port, secure }
    }

    /// `scheme://host[:port]`, omitting the port when it is 80.
    pub fn origin(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        if self.port == DEFAULT_PORT {
            format!("{scheme}://{}", self.host)
        } else {
            format!("{scheme}://{}:{}", self.host, self.port)
        }
    }
}

/// Baseline configuration copied into every composed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDefaults {
    pub headers: IndexMap<String, String>,
    pub follow_redirect: Option<bool>,
    pub max_redirects: Option<u32>,
}

impl RequestDefaults {
    /// Sets `key`, replacing any header of the same name in any case.
    pub fn with_header(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        insert_header(&mut next.headers, key.into(), value.into());
        next
    }

    /// Removes `key` in any case, keeping the order of the remaining headers.
    pub fn without_header(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.headers.retain(|k, _| !k.eq_ignore_ascii_case(key));
        next
    }

    /// Replaces the whole header map.
    pub fn with_headers(&self, headers: IndexMap<String, String>) -> Self {
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn with_follow_redirect(&self, follow: bool) -> Self {
        Self {
            follow_redirect: Some(follow),
            ..self.clone()
        }
    }

    pub fn with_max_redirects(&self, max: u32) -> Self {
        Self {
            max_redirects: Some(max),
            ..self.clone()
        }
    }

    /// True when the `Content-Type` default selects form encoding.
    pub fn is_form_encoded(&self) -> bool {
        self.headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v == FORM_CONTENT_TYPE)
    }
}

/// How the runner executes a suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Run the cases of one batch concurrently. Batches are always
    /// sequential.
    pub concurrent: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { concurrent: true }
    }
}
