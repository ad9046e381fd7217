//! Executes flushed batches in order and aggregates results.
//!
//! # Design
//! A `SuitePlan` is the ordered list of batches the suite hands out. Batch
//! N+1 does not start until every case of batch N has resolved and all of
//! its assertions were evaluated. Within a batch each case runs as its own
//! tokio task unless `RunConfig::concurrent` is off.
//!
//! Before-hooks are applied to every request of a batch before the first
//! case of that batch runs. A hook registered by a check in batch N is
//! therefore seen from batch N+1 on, never by batch N's own requests,
//! whatever the scheduling.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::RunConfig;
use crate::expect::{panic_message, Assertion, Verdict};
use crate::http::OutgoingRequest;
use crate::topic::{TaskFn, Topic};
use crate::transport::Transport;
use crate::tree::{CaseNode, CaseWork, FlatCase};

/// Result of one assertion in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionReport {
    pub batch: usize,
    /// Keys from the batch root down to the case.
    pub context: Vec<String>,
    pub description: String,
    pub verdict: Verdict,
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub honored: usize,
    pub broken: usize,
    pub errored: usize,
    pub pending: usize,
    pub total: usize,
}

impl RunSummary {
    fn record(&mut self, verdict: &Verdict) {
        self.total += 1;
        match verdict {
            Verdict::Honored => self.honored += 1,
            Verdict::Broken(_) => self.broken += 1,
            Verdict::Errored(_) => self.errored += 1,
            Verdict::Pending => self.pending += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub description: String,
    pub assertions: Vec<AssertionReport>,
    pub summary: RunSummary,
}

impl RunReport {
    /// No broken and no errored assertions.
    pub fn is_success(&self) -> bool {
        self.summary.broken == 0 && self.summary.errored == 0
    }
}

/// The ordered batches of one suite, ready to run.
#[derive(Debug, Clone, Default)]
pub struct SuitePlan {
    pub description: String,
    pub batches: Vec<CaseNode>,
}

impl SuitePlan {
    pub async fn run(self, transport: Arc<dyn Transport>, config: &RunConfig) -> RunReport {
        let mut report = RunReport {
            description: self.description,
            ..RunReport::default()
        };

        for (index, batch) in self.batches.into_iter().enumerate() {
            let cases: Vec<ReadyCase> = batch.flatten().into_iter().map(prepare).collect();
            tracing::info!(batch = index, cases = cases.len(), "Starting batch");

            let results = if config.concurrent {
                run_concurrent(cases, &transport).await
            } else {
                run_sequential(cases, &transport).await
            };

            let mut batch_summary = RunSummary::default();
            for (context, description, verdict) in results {
                match &verdict {
                    Verdict::Broken(msg) | Verdict::Errored(msg) => {
                        tracing::warn!(batch = index, assertion = %description, reason = %msg, "Assertion failed");
                    }
                    _ => tracing::debug!(batch = index, assertion = %description, "Assertion evaluated"),
                }
                batch_summary.record(&verdict);
                report.summary.record(&verdict);
                report.assertions.push(AssertionReport {
                    batch: index,
                    context,
                    description,
                    verdict,
                });
            }
            tracing::info!(
                batch = index,
                honored = batch_summary.honored,
                broken = batch_summary.broken,
                errored = batch_summary.errored,
                "Finished batch"
            );
        }

        report
    }
}

type CaseResults = Vec<(Vec<String>, String, Verdict)>;

/// What a case dispatches once the batch has been prepared.
enum Ready {
    Request { topic: Topic, request: OutgoingRequest },
    Task(TaskFn),
    /// A before-hook panicked while preparing the request.
    Failed(String),
}

struct ReadyCase {
    path: Vec<String>,
    assertions: Vec<(String, Assertion)>,
    ready: Ready,
}

/// Applies the before-hooks registered right now. Called for every case of
/// a batch before any case runs.
fn prepare(case: FlatCase) -> ReadyCase {
    let ready = match case.work {
        CaseWork::Request(topic) => match catch_unwind(AssertUnwindSafe(|| topic.prepared())) {
            Ok(request) => Ready::Request { topic, request },
            Err(payload) => Ready::Failed(format!("before hook panicked: {}", panic_message(payload.as_ref()))),
        },
        CaseWork::Task(task) => Ready::Task(task),
    };
    ReadyCase {
        path: case.path,
        assertions: case.assertions,
        ready,
    }
}

async fn run_case(case: ReadyCase, transport: Arc<dyn Transport>) -> CaseResults {
    let outcome = match case.ready {
        Ready::Request { topic, request } => topic.send(request, &transport).await,
        Ready::Task(task) => task().await,
        Ready::Failed(reason) => {
            return case
                .assertions
                .into_iter()
                .map(|(description, _)| (case.path.clone(), description, Verdict::Errored(reason.clone())))
                .collect();
        }
    };
    case.assertions
        .into_iter()
        .map(|(description, assertion)| {
            let verdict = assertion.evaluate(&outcome);
            (case.path.clone(), description, verdict)
        })
        .collect()
}

type CaseHandle = (Vec<String>, Vec<String>, JoinHandle<CaseResults>);

fn spawn_case(case: ReadyCase, transport: &Arc<dyn Transport>) -> CaseHandle {
    let names: Vec<String> = case.assertions.iter().map(|(n, _)| n.clone()).collect();
    let path = case.path.clone();
    let handle = tokio::spawn(run_case(case, Arc::clone(transport)));
    (path, names, handle)
}

async fn join_case((path, names, handle): CaseHandle) -> CaseResults {
    match handle.await {
        Ok(case_results) => case_results,
        Err(e) => {
            // The transport or task itself panicked.
            let reason = format!("case task failed: {e}");
            names
                .into_iter()
                .map(|name| (path.clone(), name, Verdict::Errored(reason.clone())))
                .collect()
        }
    }
}

async fn run_sequential(cases: Vec<ReadyCase>, transport: &Arc<dyn Transport>) -> CaseResults {
    let mut results = Vec::new();
    for case in cases {
        results.extend(join_case(spawn_case(case, transport)).await);
    }
    results
}

async fn run_concurrent(cases: Vec<ReadyCase>, transport: &Arc<dyn Transport>) -> CaseResults {
    let handles: Vec<CaseHandle> = cases.into_iter().map(|case| spawn_case(case, transport)).collect();

    let mut results = Vec::new();
    for handle in handles {
        results.extend(join_case(handle).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::expect::{Assertion, Expect};
    use crate::hooks::HookRegistry;
    use crate::http::{HttpMethod, HttpResponse, OutgoingRequest};
    use crate::topic::Dispatch;
    use crate::topic::Topic;
    use crate::transport::{transport_fn, DispatchFuture};
    use indexmap::IndexMap;

    fn topic(uri: &str, hooks: &HookRegistry) -> Topic {
        Topic::new(
            OutgoingRequest {
                method: HttpMethod::Get,
                uri: uri.to_string(),
                headers: IndexMap::new(),
                body: None,
                multipart: Vec::new(),
                follow_redirect: None,
                max_redirects: None,
            },
            hooks.clone(),
            Dispatch::Suite,
        )
    }

    fn status_from_uri() -> Arc<dyn Transport> {
        transport_fn(|req: OutgoingRequest| -> DispatchFuture {
            Box::pin(async move {
                if req.uri.ends_with("/down") {
                    return Err(TransportError::Connection("refused".to_string()));
                }
                let fallback = if req.uri.ends_with("/restricted") { 401 } else { 200 };
                let status = req
                    .uri
                    .rsplit('/')
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(fallback);
                Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: "{}".to_string(),
                })
            })
        })
    }

    fn case(batch: &mut CaseNode, hooks: &HookRegistry, uri: &str, expect: impl Into<Expect>) {
        batch.insert_case(uri, topic(uri, hooks));
        let node = batch.locate(&[uri]);
        for (name, assertion) in expect.into().into_assertions().unwrap() {
            node.insert_assertion(name, assertion);
        }
    }

    #[tokio::test]
    async fn counts_every_kind_of_verdict() {
        let hooks = HookRegistry::new();
        let mut batch = CaseNode::new();
        case(&mut batch, &hooks, "http://h/200", 200);
        case(&mut batch, &hooks, "http://h/404", 200);
        case(&mut batch, &hooks, "http://h/down", 200);
        case(&mut batch, &hooks, "http://h/201", Expect::pending("later"));
        batch
            .locate(&["http://h/201"])
            .insert_assertion("bad json", Assertion::Check(Arc::new(|res: &HttpResponse| {
                serde_json::from_str::<Vec<u8>>(&res.body)
                    .map(|_| ())
                    .map_err(|e| crate::error::AssertionError::InvalidJson(e.to_string()))
            })));

        let plan = SuitePlan {
            description: "counts".to_string(),
            batches: vec![batch],
        };
        let report = plan.run(status_from_uri(), &RunConfig::default()).await;
        assert_eq!(
            report.summary,
            RunSummary {
                honored: 1,
                broken: 2,
                errored: 1,
                pending: 1,
                total: 5,
            }
        );
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn hooks_registered_in_one_batch_reach_the_next() {
        let hooks = HookRegistry::new();
        let mut first = CaseNode::new();
        let registrar = hooks.clone();
        first.insert_case("login", topic("http://h/login", &hooks));
        first.locate(&["login"]).insert_assertion(
            "captures token",
            Assertion::Check(Arc::new(move |_res: &HttpResponse| {
                registrar.register("auth", |mut req| {
                    req.uri = req.uri.replace("/restricted", "/200");
                    req
                });
                Ok(())
            })),
        );
        let mut second = CaseNode::new();
        case(&mut second, &hooks, "http://h/restricted", 200);

        let plan = SuitePlan {
            description: "sequencing".to_string(),
            batches: vec![first, second],
        };
        let report = plan.run(status_from_uri(), &RunConfig::default()).await;
        assert_eq!(report.summary.honored, 2);
        assert_eq!(report.assertions[1].batch, 1);
    }

    #[tokio::test]
    async fn sequential_mode_preserves_case_order() {
        let hooks = HookRegistry::new();
        let mut batch = CaseNode::new();
        for code in ["201", "202", "203"] {
            case(&mut batch, &hooks, &format!("http://h/{code}"), code.parse::<u16>().unwrap());
        }
        let plan = SuitePlan {
            description: "order".to_string(),
            batches: vec![batch],
        };
        let report = plan
            .run(status_from_uri(), &RunConfig { concurrent: false })
            .await;
        let names: Vec<&str> = report.assertions.iter().map(|a| a.description.as_str()).collect();
        assert_eq!(
            names,
            ["should respond with 201", "should respond with 202", "should respond with 203"]
        );
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn panicking_hook_marks_case_errored() {
        let hooks = HookRegistry::new();
        let mut batch = CaseNode::new();
        case(&mut batch, &hooks, "http://h/200", (200, serde_json::json!({})));
        hooks.register("boom", |_req| panic!("hook exploded"));

        for concurrent in [true, false] {
            let plan = SuitePlan {
                description: "panic".to_string(),
                batches: vec![batch.clone()],
            };
            let report = plan.run(status_from_uri(), &RunConfig { concurrent }).await;
            assert_eq!(report.summary.errored, 2, "concurrent = {concurrent}");
        }
    }

    /// Echoes the `x-token` header back as the body.
    fn echo_token() -> Arc<dyn Transport> {
        transport_fn(|req: OutgoingRequest| -> DispatchFuture {
            Box::pin(async move {
                Ok(HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: req.header("x-token").unwrap_or_default().to_string(),
                })
            })
        })
    }

    fn sees_token(expected: &'static str) -> Assertion {
        Assertion::Check(Arc::new(move |res: &HttpResponse| {
            if res.body == expected {
                Ok(())
            } else {
                Err(crate::error::AssertionError::failed(format!("saw {:?}", res.body)))
            }
        }))
    }

    #[tokio::test]
    async fn hook_from_a_check_skips_its_own_batch() {
        for concurrent in [true, false] {
            let hooks = HookRegistry::new();
            let registrar = hooks.clone();

            let mut first = CaseNode::new();
            first.insert_case("login", topic("http://h/login", &hooks));
            first.locate(&["login"]).insert_assertion(
                "registers token",
                Assertion::Check(Arc::new(move |_res: &HttpResponse| {
                    registrar.register("auth", |mut req| {
                        req.set_header("x-token", "T");
                        req
                    });
                    Ok(())
                })),
            );
            first.insert_case("sibling", topic("http://h/sibling", &hooks));
            first.locate(&["sibling"]).insert_assertion("sees no token", sees_token(""));

            let mut second = CaseNode::new();
            second.insert_case("later", topic("http://h/later", &hooks));
            second.locate(&["later"]).insert_assertion("sees token", sees_token("T"));

            let plan = SuitePlan {
                description: "isolation".to_string(),
                batches: vec![first, second],
            };
            let report = plan.run(echo_token(), &RunConfig { concurrent }).await;
            assert_eq!(report.summary.honored, 3, "concurrent = {concurrent}: {:?}", report.assertions);
        }
    }

    #[tokio::test]
    async fn task_batches_run_in_order_with_request_batches() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let request_log = Arc::clone(&log);
        let transport = transport_fn(move |req: OutgoingRequest| -> DispatchFuture {
            request_log.lock().push(req.uri.clone());
            Box::pin(async {
                Ok(HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: String::new(),
                })
            })
        });

        let hooks = HookRegistry::new();
        let mut first = CaseNode::new();
        case(&mut first, &hooks, "http://h/first", 200);

        let task_log = Arc::clone(&log);
        let mut custom = CaseNode::new();
        custom
            .locate(&["custom"])
            .insert_task(
                "a task",
                crate::topic::task_fn(move || -> DispatchFuture {
                    task_log.lock().push("task".to_string());
                    Box::pin(async {
                        Ok(HttpResponse {
                            status: 204,
                            headers: Vec::new(),
                            body: String::new(),
                        })
                    })
                }),
            )
            .expect(204)
            .unwrap();

        let mut last = CaseNode::new();
        case(&mut last, &hooks, "http://h/last", 200);

        let plan = SuitePlan {
            description: "mixed".to_string(),
            batches: vec![first, custom, last],
        };
        let report = plan.run(transport, &RunConfig::default()).await;
        assert_eq!(report.summary.honored, 3);
        assert_eq!(report.assertions[1].batch, 1);
        assert_eq!(report.assertions[1].context, ["custom", "a task"]);
        assert_eq!(*log.lock(), ["http://h/first", "task", "http://h/last"]);
    }
}
