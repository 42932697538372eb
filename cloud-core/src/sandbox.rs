//! Node log scanning.
//!
//! After a run, each node's log is pulled back and searched for lines that
//! indicate the worker hit an internal error even if every job "passed".

use std::fmt;

/// Markers that flag a log line by default.
pub const DEFAULT_MARKERS: &[&str] = &["ERROR", "Exception", "FATAL", "SEVERE"];

/// One suspicious log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxFinding {
    /// Node (as `host:port`) whose log contained the line.
    pub node: String,
    /// 1-based line number.
    pub line_number: usize,
    /// The line, trimmed.
    pub line: String,
}

impl fmt::Display for SandboxFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.node, self.line_number, self.line)
    }
}

/// Line matcher for node logs.
#[derive(Debug, Clone)]
pub struct SandboxScanner {
    markers: Vec<String>,
    ignore: Vec<String>,
}

impl SandboxScanner {
    /// Scanner with [`DEFAULT_MARKERS`] and no ignore list.
    pub fn new() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|s| s.to_string()).collect(),
            ignore: Vec::new(),
        }
    }

    /// Replace the marker set.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Skip lines containing `pattern` even when a marker matches
    /// (e.g. expected errors provoked by a negative test).
    pub fn ignoring(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    /// Scan one node's log text.
    pub fn scan(&self, node: &str, log: &str) -> Vec<SandboxFinding> {
        log.lines()
            .enumerate()
            .filter(|(_, line)| self.markers.iter().any(|m| line.contains(m.as_str())))
            .filter(|(_, line)| !self.ignore.iter().any(|p| line.contains(p.as_str())))
            .map(|(i, line)| SandboxFinding {
                node: node.to_string(),
                line_number: i + 1,
                line: line.trim().to_string(),
            })
            .collect()
    }
}

impl Default for SandboxScanner {
    fn default() -> Self {
        Self::new()
    }
}
