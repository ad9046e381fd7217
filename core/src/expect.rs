//! Assertion composer.
//!
//! # Design
//! `Expect` is an explicit parameter object: a status code, an expected JSON
//! body, and a described custom check can be combined freely, and each one
//! present becomes its own named assertion on the current case. Conversions
//! from `u16`, `serde_json::Value` and `(u16, Value)` keep the common calls
//! short: `.expect(200)`, `.expect((200, json!({"ok": true})))`.
//!
//! Every generated assertion first requires that the topic produced a
//! response. A transport failure therefore shows up as the same "expected no
//! error" failure on every assertion of the case.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{AssertionError, SuiteError};
use crate::http::HttpResponse;
use crate::topic::Outcome;

/// Longest body excerpt used in a generated assertion name.
const BODY_KEY_LIMIT: usize = 50;

/// A custom check on a received response.
pub type CheckFn = Arc<dyn Fn(&HttpResponse) -> Result<(), AssertionError> + Send + Sync>;

/// Result of evaluating one assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum Verdict {
    Honored,
    Broken(String),
    Errored(String),
    Pending,
}

/// One named assertion attached to a case.
#[derive(Clone)]
pub enum Assertion {
    Check(CheckFn),
    Pending,
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::Check(_) => f.write_str("Check"),
            Assertion::Pending => f.write_str("Pending"),
        }
    }
}

impl Assertion {
    /// Evaluates against a topic outcome. Panics inside the check count as
    /// broken, undecodable JSON as errored.
    pub fn evaluate(&self, outcome: &Outcome) -> Verdict {
        let check = match self {
            Assertion::Check(check) => check,
            Assertion::Pending => return Verdict::Pending,
        };
        let response = match outcome {
            Ok(response) => response,
            Err(e) => return Verdict::Broken(AssertionError::Transport(e.to_string()).to_string()),
        };
        match catch_unwind(AssertUnwindSafe(|| check(response))) {
            Ok(Ok(())) => Verdict::Honored,
            Ok(Err(e @ AssertionError::InvalidJson(_))) => Verdict::Errored(e.to_string()),
            Ok(Err(e)) => Verdict::Broken(e.to_string()),
            Err(payload) => Verdict::Broken(panic_message(payload.as_ref())),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "check panicked".to_string()
    }
}

/// What to assert about a case's response.
#[derive(Clone, Default)]
pub struct Expect {
    status: Option<u16>,
    body: Option<Value>,
    description: Option<String>,
    check: Option<CheckFn>,
    pending: bool,
}

impl fmt::Debug for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expect")
            .field("status", &self.status)
            .field("body", &self.body)
            .field("description", &self.description)
            .field("check", &self.check.is_some())
            .field("pending", &self.pending)
            .finish()
    }
}

impl Expect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(code: u16) -> Self {
        Self::new().with_status(code)
    }

    pub fn json(body: Value) -> Self {
        Self::new().with_json(body)
    }

    /// A described custom check.
    pub fn custom<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&HttpResponse) -> Result<(), AssertionError> + Send + Sync + 'static,
    {
        Self::new().describe(description).check(check)
    }

    /// A described assertion with no check yet; reported as pending.
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            pending: true,
            ..Self::new().describe(description)
        }
    }

    pub fn with_status(mut self, code: u16) -> Self {
        self.status = Some(code);
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&HttpResponse) -> Result<(), AssertionError> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Expands into named assertions: custom, then status, then body.
    ///
    /// A description without a check (unless pending), or a check without a
    /// description, is rejected before anything is produced.
    pub fn into_assertions(self) -> Result<Vec<(String, Assertion)>, SuiteError> {
        let mut out = Vec::with_capacity(3);

        match (self.description, self.check) {
            (Some(description), Some(check)) => out.push((description, Assertion::Check(check))),
            (Some(description), None) if self.pending => out.push((description, Assertion::Pending)),
            (Some(description), None) => return Err(SuiteError::MissingCheck { description }),
            (None, Some(_)) => return Err(SuiteError::MissingDescription),
            (None, None) => {}
        }

        if let Some(expected) = self.status {
            let check: CheckFn = Arc::new(move |res: &HttpResponse| {
                if res.status == expected {
                    Ok(())
                } else {
                    Err(AssertionError::Status {
                        expected,
                        actual: res.status,
                    })
                }
            });
            out.push((format!("should respond with {expected}"), Assertion::Check(check)));
        }

        if let Some(expected) = self.body {
            let key: String = expected.to_string().chars().take(BODY_KEY_LIMIT).collect();
            let check: CheckFn = Arc::new(move |res: &HttpResponse| {
                let actual: Value = serde_json::from_str(&res.body)
                    .map_err(|e| AssertionError::InvalidJson(e.to_string()))?;
                if actual == expected {
                    Ok(())
                } else {
                    Err(AssertionError::Body {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    })
                }
            });
            out.push((format!("should respond with {key}"), Assertion::Check(check)));
        }

        Ok(out)
    }
}

impl From<u16> for Expect {
    fn from(code: u16) -> Self {
        Self::status(code)
    }
}

impl From<Value> for Expect {
    fn from(body: Value) -> Self {
        Self::json(body)
    }
}

impl From<(u16, Value)> for Expect {
    fn from((code, body): (u16, Value)) -> Self {
        Self::status(code).with_json(body)
    }
}
