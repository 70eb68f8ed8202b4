use thiserror::Error;

/// Which user-supplied pattern an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Event,
    Delimiter,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Event => write!(f, "event"),
            PatternKind::Delimiter => write!(f, "delimiter"),
        }
    }
}

/// Errors raised while turning raw log text into executions and causality
/// graphs. All of these are fatal to the operation that triggered them.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid {kind} pattern: {source}")]
    InvalidPattern {
        kind: PatternKind,
        #[source]
        source: regex::Error,
    },

    #[error("{kind} pattern is missing required capture group `{group}`")]
    MissingCaptureGroup {
        kind: PatternKind,
        group: &'static str,
    },

    #[error("line {line}: malformed vector clock `{text}`")]
    MalformedClock { line: usize, text: String },

    #[error("duplicate execution label `{label}`")]
    DuplicateLabel { label: String },

    #[error("vector clocks imply a causal cycle")]
    CyclicClocks,
}

/// Structural defects in a builder (pattern) graph, reported before any
/// search begins.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern has no event nodes")]
    EmptyPattern,

    #[error("constraint endpoint references a head sentinel")]
    HeadConstraint,

    #[error("constraint references unknown pattern node {0}")]
    UnknownNode(usize),

    #[error("motif spec references host `{host}` event {index}, which is not in any chain")]
    UnknownSlot { host: String, index: usize },

    #[error("pattern edges form a cycle")]
    CyclicPattern,
}

/// Outcomes of a motif search that did not produce a witness.
#[derive(Debug, Error)]
pub enum MotifError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The search exhausted every candidate assignment. Callers should
    /// treat this as an ordinary "not found" result.
    #[error("no subgraph satisfies the pattern")]
    NoMatch,
}

/// Bound a piece of offending input text for inclusion in an error message.
pub(crate) fn excerpt(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    }
}
