use std::collections::BTreeMap;

use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::clock::VectorTimestamp;
use crate::error::{ParseError, PatternKind};
use crate::event::LogEvent;

const CLOCK_GROUP: &str = "clock";
const EVENT_GROUP: &str = "event";
const HOST_GROUP: &str = "host";
const TRACE_GROUP: &str = "trace";

/// One logical run of the distributed system: a label plus its events in
/// textual encounter order.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    /// The `trace` capture of the delimiter match that preceded this
    /// segment; empty for the unlabeled execution.
    pub label: String,
    /// Byte offset of this execution's (trimmed) text within the trimmed
    /// input, for callers that need absolute positions.
    pub offset: usize,
    pub events: Vec<LogEvent>,
}

/// The result of parsing one raw log: executions in first-encountered order
/// with lookup by label.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedLog {
    executions: Vec<Execution>,
}

impl ParsedLog {
    /// Labels in first-encountered order.
    pub fn labels(&self) -> Vec<&str> {
        self.executions
            .iter()
            .map(|execution| execution.label.as_str())
            .collect()
    }

    /// The ordered events of the execution with the given label, or `None`
    /// if the label is unknown. An unknown label is an ordinary lookup
    /// miss, not an error.
    pub fn events(&self, label: &str) -> Option<&[LogEvent]> {
        self.executions
            .iter()
            .find(|execution| execution.label == label)
            .map(|execution| execution.events.as_slice())
    }

    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    pub fn into_executions(self) -> Vec<Execution> {
        self.executions
    }
}

/// Splits raw multi-execution text on a delimiter pattern and extracts
/// events from each segment with an event pattern.
///
/// The event pattern must define named capture groups `clock`, `event` and
/// `host`; any further named groups become free-form fields on the event.
/// The delimiter pattern may define a named group `trace` whose capture
/// labels the execution that follows the match.
#[derive(Debug)]
pub struct LogParser {
    event_pattern: Regex,
    delimiter_pattern: Option<Regex>,
}

impl LogParser {
    pub fn new(event_pattern: &str, delimiter_pattern: Option<&str>) -> Result<Self, ParseError> {
        let event_pattern = compile(event_pattern, PatternKind::Event)?;
        for group in [CLOCK_GROUP, EVENT_GROUP, HOST_GROUP] {
            if !has_named_group(&event_pattern, group) {
                return Err(ParseError::MissingCaptureGroup {
                    kind: PatternKind::Event,
                    group,
                });
            }
        }

        let delimiter_pattern = delimiter_pattern
            .map(|pattern| compile(pattern, PatternKind::Delimiter))
            .transpose()?;

        Ok(Self {
            event_pattern,
            delimiter_pattern,
        })
    }

    /// Parse the raw text into labeled executions. Leading and trailing
    /// whitespace is trimmed before any pattern is applied. A malformed
    /// clock anywhere aborts the whole parse.
    pub fn parse(&self, raw: &str) -> Result<ParsedLog, ParseError> {
        let text = raw.trim();
        let mut executions: Vec<Execution> = Vec::new();

        let segments = match &self.delimiter_pattern {
            None => vec![(String::new(), 0usize, text)],
            Some(delimiter) => split_on_delimiter(delimiter, text),
        };

        for (label, offset, segment) in segments {
            let trimmed = segment.trim();
            if trimmed.is_empty() {
                debug!(label = %label, "dropping blank execution segment");
                continue;
            }

            if executions.iter().any(|execution| execution.label == label) {
                return Err(ParseError::DuplicateLabel { label });
            }

            // Re-anchor the offset to the trimmed segment start.
            let offset = offset + (segment.len() - segment.trim_start().len());
            let events = self.parse_execution(trimmed)?;
            trace!(label = %label, count = events.len(), "parsed execution");
            executions.push(Execution {
                label,
                offset,
                events,
            });
        }

        Ok(ParsedLog { executions })
    }

    /// Apply the event pattern left to right, non-overlapping, over one
    /// execution's text.
    fn parse_execution(&self, text: &str) -> Result<Vec<LogEvent>, ParseError> {
        let mut events = Vec::new();

        for caps in self.event_pattern.captures_iter(text) {
            let start = caps.get(0).map_or(0, |m| m.start());
            let line_number = 1 + text[..start].matches('\n').count();

            let clock_text = caps.name(CLOCK_GROUP).map_or("", |m| m.as_str());
            let host = caps.name(HOST_GROUP).map_or("", |m| m.as_str()).to_string();
            let text_capture = caps.name(EVENT_GROUP).map_or("", |m| m.as_str()).to_string();

            let timestamp = VectorTimestamp::parse(clock_text, &host, line_number)?;

            let mut fields = BTreeMap::new();
            for name in self.event_pattern.capture_names().flatten() {
                if name == CLOCK_GROUP || name == EVENT_GROUP || name == HOST_GROUP {
                    continue;
                }
                if let Some(capture) = caps.name(name) {
                    fields.insert(name.to_string(), capture.as_str().to_string());
                }
            }

            events.push(LogEvent {
                text: text_capture,
                host,
                timestamp,
                line_number,
                fields,
            });
        }

        Ok(events)
    }
}

/// Cut the text at every delimiter match. Each segment is labeled by the
/// `trace` capture of the match that precedes it; the segment before the
/// first match, if any, is labeled with the empty string.
fn split_on_delimiter<'t>(delimiter: &Regex, text: &'t str) -> Vec<(String, usize, &'t str)> {
    // (match start, match end, label for the following segment)
    let mut cuts: Vec<(usize, usize, String)> = delimiter
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let label = caps
                .name(TRACE_GROUP)
                .map_or(String::new(), |m| m.as_str().to_string());
            (whole.start, whole.end, label)
        })
        .collect();

    if cuts.is_empty() {
        return vec![(String::new(), 0, text)];
    }

    let mut segments = Vec::with_capacity(cuts.len() + 1);
    segments.push((String::new(), 0, &text[..cuts[0].0]));

    // Sentinel cut at end-of-text so tuple_windows yields every segment.
    cuts.push((text.len(), text.len(), String::new()));
    for ((_, end, label), (next_start, _, _)) in cuts.iter().tuple_windows() {
        segments.push((label.clone(), *end, &text[*end..*next_start]));
    }

    segments
}

fn compile(pattern: &str, kind: PatternKind) -> Result<Regex, ParseError> {
    Regex::new(pattern).map_err(|source| ParseError::InvalidPattern { kind, source })
}

fn has_named_group(pattern: &Regex, name: &str) -> bool {
    pattern.capture_names().flatten().any(|group| group == name)
}
