//! Canned logs with known causal structure, shared by the end-to-end tests.

/// A raw log plus the patterns that parse it and the shape we expect out.
#[derive(Debug, Clone)]
pub struct LogFixture {
    pub raw: &'static str,
    pub event_pattern: &'static str,
    pub delimiter_pattern: Option<&'static str>,
    pub expected_labels: &'static [&'static str],
    pub expected_events: usize,
    pub expected_message_edges: usize,
}

pub const EVENT_PATTERN: &str = r"(?P<host>\S+) (?P<clock>\{[^}]*\}) (?P<event>.*)";
pub const DELIMITER_PATTERN: &str = r"(?m)^--- run (?P<trace>\w+) ---$";

/// Two hosts exchanging a ping and a pong in one unlabeled execution.
pub fn handshake() -> LogFixture {
    LogFixture {
        raw: "\
alice {\"alice\":1} starting request
alice {\"alice\":2} sending ping
bob {\"bob\":1,\"alice\":2} received ping
bob {\"bob\":2,\"alice\":2} sending pong
alice {\"alice\":3,\"bob\":2} received pong
alice {\"alice\":4,\"bob\":2} done
",
        event_pattern: EVENT_PATTERN,
        delimiter_pattern: None,
        expected_labels: &[""],
        expected_events: 6,
        expected_message_edges: 2,
    }
}

/// Two delimited executions: a single-host warmup run and a live run in
/// which a database host joins the web host.
pub fn delimited_runs() -> LogFixture {
    LogFixture {
        raw: "\
--- run warmup ---
web {\"web\":1} boot
web {\"web\":2} ready
--- run live ---
web {\"web\":1} boot
db {\"db\":1,\"web\":1} connect accepted
web {\"web\":2,\"db\":1} query sent
db {\"db\":2,\"web\":2} rows returned
",
        event_pattern: EVENT_PATTERN,
        delimiter_pattern: Some(DELIMITER_PATTERN),
        expected_labels: &["warmup", "live"],
        expected_events: 6,
        expected_message_edges: 3,
    }
}
