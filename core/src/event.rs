use std::collections::BTreeMap;

use serde::Serialize;

use crate::clock::VectorTimestamp;

/// A single parsed log event. Immutable after construction; the parser that
/// created it hands it to the graph builder, which indexes it by host chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// The captured `event` text.
    pub text: String,
    /// The host that emitted the event.
    pub host: String,
    /// The vector clock attached to the line; its owner is `host`.
    pub timestamp: VectorTimestamp,
    /// 1-based line of the match within the execution's text.
    pub line_number: usize,
    /// Any named capture groups beyond clock/event/host, keyed by group name.
    pub fields: BTreeMap<String, String>,
}

impl LogEvent {
    /// Look up a free-form field captured from the line.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
