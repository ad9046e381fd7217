//! Stack of URL path segments for the resource under test.

/// Strips one leading and one trailing `/`.
fn normalize(segment: &str) -> &str {
    let segment = segment.strip_prefix('/').unwrap_or(segment);
    segment.strip_suffix('/').unwrap_or(segment)
}

/// Ordered path segments pushed with `path` and popped with `unpath`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathStack {
    segments: Vec<String>,
}

impl PathStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: &str) {
        self.segments.push(normalize(segment).to_string());
    }

    /// Removes the last `n` segments; popping more than exist empties the stack.
    pub fn pop(&mut self, n: usize) {
        let keep = self.segments.len().saturating_sub(n);
        self.segments.truncate(keep);
    }

    /// Replaces the whole stack with a single segment.
    pub fn set_root(&mut self, segment: &str) {
        self.segments = vec![segment.to_string()];
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Joins the stack, plus `extra` when given and non-empty, into `/a/b/c`.
    pub fn resolve(&self, extra: Option<&str>) -> String {
        let extra = extra.filter(|e| !e.is_empty());
        let joined = self
            .segments
            .iter()
            .map(String::as_str)
            .chain(extra)
            .map(normalize)
            .collect::<Vec<_>>()
            .join("/");
        format!("/{joined}")
    }
}
