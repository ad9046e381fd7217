//! Nested case tree keyed by narrative text.
//!
//! # Design
//! A batch is a tree of `CaseNode`s. Interior nodes exist only to carry the
//! discussion text that describes their children; a node with work attached
//! is a case and owns its named assertions. `locate` walks a path of keys and
//! creates missing nodes on the way, so discussion can be pushed in any
//! order as long as the stack is right when a request is composed.
//!
//! Work is either a composed HTTP request (`Topic`) or an arbitrary async
//! task added through `ApiSuite::add_batch`.

use std::fmt;

use indexmap::IndexMap;

use crate::error::SuiteError;
use crate::expect::{Assertion, Expect};
use crate::topic::{TaskFn, Topic};

/// What a case runs to produce the outcome its assertions inspect.
#[derive(Clone)]
pub enum CaseWork {
    Request(Topic),
    Task(TaskFn),
}

impl fmt::Debug for CaseWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseWork::Request(topic) => f.debug_tuple("Request").field(topic).finish(),
            CaseWork::Task(_) => f.write_str("Task"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaseNode {
    work: Option<CaseWork>,
    assertions: IndexMap<String, Assertion>,
    children: IndexMap<String, CaseNode>,
}

/// A case lifted out of the tree for execution.
#[derive(Debug, Clone)]
pub struct FlatCase {
    /// Keys from the batch root down to and including the case key.
    pub path: Vec<String>,
    pub work: CaseWork,
    pub assertions: Vec<(String, Assertion)>,
}

impl CaseNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descends along `path`, creating nodes as needed.
    pub fn locate<S: AsRef<str>>(&mut self, path: &[S]) -> &mut CaseNode {
        path.iter().fold(self, |node, key| {
            node.children.entry(key.as_ref().to_string()).or_default()
        })
    }

    /// Read-only lookup along `path`.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&CaseNode> {
        path.iter()
            .try_fold(self, |node, key| node.children.get(key.as_ref()))
    }

    /// Mutable lookup along `path`. Never creates nodes.
    pub fn get_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut CaseNode> {
        path.iter()
            .try_fold(self, |node, key| node.children.get_mut(key.as_ref()))
    }

    /// Puts a fresh request case under `key`, replacing whatever was there.
    pub fn insert_case(&mut self, key: impl Into<String>, topic: Topic) -> &mut CaseNode {
        self.insert_work(key.into(), CaseWork::Request(topic))
    }

    /// Puts a fresh task case under `key`, replacing whatever was there.
    pub fn insert_task(&mut self, key: impl Into<String>, task: TaskFn) -> &mut CaseNode {
        self.insert_work(key.into(), CaseWork::Task(task))
    }

    fn insert_work(&mut self, key: String, work: CaseWork) -> &mut CaseNode {
        let node = CaseNode {
            work: Some(work),
            ..CaseNode::default()
        };
        if self.children.contains_key(&key) {
            tracing::debug!(case = %key, "Replaced existing case");
        }
        self.children.insert(key.clone(), node);
        self.children.entry(key).or_default()
    }

    pub fn insert_assertion(&mut self, name: impl Into<String>, assertion: Assertion) {
        self.assertions.insert(name.into(), assertion);
    }

    /// Expands `expect` and attaches the assertions to this node.
    ///
    /// Only nodes that carry work can hold assertions; anything else would
    /// never be evaluated.
    pub fn expect(&mut self, expect: impl Into<Expect>) -> Result<&mut Self, SuiteError> {
        if self.work.is_none() {
            return Err(SuiteError::NoCurrentCase);
        }
        for (name, assertion) in expect.into().into_assertions()? {
            self.insert_assertion(name, assertion);
        }
        Ok(self)
    }

    pub fn work(&self) -> Option<&CaseWork> {
        self.work.as_ref()
    }

    /// The composed request, when this case is an HTTP request.
    pub fn topic(&self) -> Option<&Topic> {
        match &self.work {
            Some(CaseWork::Request(topic)) => Some(topic),
            _ => None,
        }
    }

    pub fn assertions(&self) -> &IndexMap<String, Assertion> {
        &self.assertions
    }

    pub fn children(&self) -> &IndexMap<String, CaseNode> {
        &self.children
    }

    /// Number of direct entries: children plus assertions, plus one for the
    /// work.
    pub fn len(&self) -> usize {
        self.children.len() + self.assertions.len() + usize::from(self.work.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every case in depth-first insertion order.
    pub fn flatten(&self) -> Vec<FlatCase> {
        let mut out = Vec::new();
        self.collect_cases(&mut Vec::new(), &mut out);
        out
    }

    fn collect_cases(&self, path: &mut Vec<String>, out: &mut Vec<FlatCase>) {
        if let Some(work) = &self.work {
            out.push(FlatCase {
                path: path.clone(),
                work: work.clone(),
                assertions: self
                    .assertions
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            });
        }
        for (key, child) in &self.children {
            path.push(key.clone());
            child.collect_cases(path, out);
            path.pop();
        }
    }
}
