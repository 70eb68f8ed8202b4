use anyhow::Result;
use causeline_test::fixtures;

use causeline_core::{
    BuilderGraph, CausalityGraph, EventId, LogParser, MotifError, MotifFinder, MotifSpec,
};

fn graphs_for(fixture: &fixtures::LogFixture) -> Result<Vec<(String, CausalityGraph)>> {
    let parser = LogParser::new(fixture.event_pattern, fixture.delimiter_pattern)?;
    let parsed = parser.parse(fixture.raw)?;

    let mut graphs = Vec::new();
    for execution in parsed.into_executions() {
        let label = execution.label.clone();
        graphs.push((label, CausalityGraph::from_events(execution.events)?));
    }
    Ok(graphs)
}

#[test]
fn handshake_parses_into_one_unlabeled_execution() -> Result<()> {
    let fixture = fixtures::handshake();
    let parser = LogParser::new(fixture.event_pattern, fixture.delimiter_pattern)?;
    let parsed = parser.parse(fixture.raw)?;

    assert_eq!(parsed.labels(), fixture.expected_labels);
    let events = parsed.events("").expect("unlabeled execution");
    assert_eq!(events.len(), fixture.expected_events);

    // Encounter order and line numbering agree.
    for (position, event) in events.iter().enumerate() {
        assert_eq!(event.line_number, position + 1);
    }
    Ok(())
}

#[test]
fn handshake_graph_reconstructs_message_causality() -> Result<()> {
    let fixture = fixtures::handshake();
    let graphs = graphs_for(&fixture)?;
    assert_eq!(graphs.len(), 1);

    let (_, graph) = &graphs[0];
    let stats = graph.stats();
    assert_eq!(stats.hosts, 2);
    assert_eq!(stats.events, fixture.expected_events);
    assert_eq!(stats.message_edges, fixture.expected_message_edges);

    // Host chains read back in encounter order.
    let alice = graph.host_chain("alice").expect("alice chain");
    let texts: Vec<&str> = alice.iter().map(|&id| graph.event(id).text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["starting request", "sending ping", "received pong", "done"]
    );

    // The ping reaches bob, and bob's pong reaches alice.
    assert!(graph.is_ancestor(EventId(1), EventId(2)));
    assert!(graph.is_ancestor(EventId(3), EventId(4)));
    Ok(())
}

#[test]
fn delimited_runs_split_and_build_independently() -> Result<()> {
    let fixture = fixtures::delimited_runs();
    let graphs = graphs_for(&fixture)?;

    let labels: Vec<&str> = graphs.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, fixture.expected_labels);

    let total_events: usize = graphs.iter().map(|(_, graph)| graph.node_count()).sum();
    assert_eq!(total_events, fixture.expected_events);

    let total_messages: usize = graphs
        .iter()
        .map(|(_, graph)| graph.stats().message_edges)
        .sum();
    assert_eq!(total_messages, fixture.expected_message_edges);

    // The warmup run has one host and no cross-host traffic.
    let warmup = &graphs[0].1;
    assert_eq!(warmup.stats().hosts, 1);
    assert_eq!(warmup.stats().message_edges, 0);
    Ok(())
}

#[test]
fn request_response_motif_matches_handshake() -> Result<()> {
    let fixture = fixtures::handshake();
    let graphs = graphs_for(&fixture)?;
    let (_, graph) = &graphs[0];

    let spec: MotifSpec = serde_json::from_value(serde_json::json!({
        "hosts": [
            { "name": "client", "events": 2 },
            { "name": "server", "events": 1 }
        ],
        "constraints": [
            { "from": { "host": "client", "index": 0 }, "to": { "host": "server", "index": 0 } },
            { "from": { "host": "server", "index": 0 }, "to": { "host": "client", "index": 1 } }
        ]
    }))?;
    let pattern = spec.build()?;

    let motif = MotifFinder::find(graph, &pattern)?;
    assert_eq!(motif.nodes.len(), 3);
    // The server slot lands on a bob event reachable from a client event.
    assert!(motif.nodes.contains(&EventId(2)));
    Ok(())
}

#[test]
fn single_node_motif_witnesses_every_event() -> Result<()> {
    let fixture = fixtures::handshake();
    let graphs = graphs_for(&fixture)?;
    let (_, graph) = &graphs[0];

    let mut pattern = BuilderGraph::new();
    pattern.append_event("any");

    let matches = MotifFinder::find_all(graph, &pattern)?;
    assert_eq!(matches.len(), fixture.expected_events);
    Ok(())
}

#[test]
fn cross_host_motif_misses_single_host_run() -> Result<()> {
    let fixture = fixtures::delimited_runs();
    let graphs = graphs_for(&fixture)?;
    let warmup = &graphs[0].1;

    let mut pattern = BuilderGraph::new();
    let sender = pattern.append_event("x");
    let receiver = pattern.append_event("y");
    pattern.require_happens_before(sender, receiver)?;

    assert!(matches!(
        MotifFinder::find(warmup, &pattern),
        Err(MotifError::NoMatch)
    ));
    Ok(())
}
