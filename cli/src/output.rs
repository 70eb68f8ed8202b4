use causeline_core::{CausalityGraph, Execution, Motif};
use serde_json::{json, Value};

/// JSON form of one parsed execution.
pub fn execution_json(execution: &Execution) -> Value {
    json!({
        "label": execution.label,
        "event_count": execution.events.len(),
        "events": execution.events,
    })
}

pub fn print_executions(executions: &[Execution], as_json: bool) {
    if as_json {
        let value: Vec<Value> = executions.iter().map(execution_json).collect();
        println!("{}", render(&json!({ "executions": value })));
        return;
    }

    for execution in executions {
        let label = display_label(&execution.label);
        println!("execution {label}: {} events", execution.events.len());
        for event in &execution.events {
            println!("  line {:>4}  {}  {}", event.line_number, event.host, event.text);
        }
    }
}

/// JSON form of one built graph: stats plus its edge list.
pub fn graph_json(label: &str, graph: &CausalityGraph) -> Value {
    let edges: Vec<Value> = graph
        .edges()
        .into_iter()
        .map(|(from, to, kind)| json!({ "from": from, "to": to, "kind": kind }))
        .collect();

    json!({
        "label": label,
        "stats": graph.stats(),
        "edges": edges,
    })
}

pub fn print_graph(label: &str, graph: &CausalityGraph, as_json: bool) {
    if as_json {
        println!("{}", render(&graph_json(label, graph)));
        return;
    }

    let stats = graph.stats();
    println!(
        "execution {}: {} hosts, {} events, {} host-order edges, {} message edges",
        display_label(label),
        stats.hosts,
        stats.events,
        stats.host_order_edges,
        stats.message_edges
    );
    for host in graph.hosts() {
        let chain_len = graph.host_chain(host).map_or(0, <[_]>::len);
        println!("  host {host}: {chain_len} events");
    }
}

/// JSON form of a match, with the matched events inlined for context.
pub fn motif_json(label: &str, graph: &CausalityGraph, motif: &Motif) -> Value {
    let events: Vec<Value> = motif
        .nodes
        .iter()
        .map(|&id| {
            let event = graph.event(id);
            json!({
                "id": id,
                "host": event.host,
                "line": event.line_number,
                "text": event.text,
            })
        })
        .collect();

    json!({
        "label": label,
        "nodes": motif.nodes,
        "edges": motif.edges,
        "events": events,
    })
}

pub fn print_motif(label: &str, graph: &CausalityGraph, motif: &Motif, as_json: bool) {
    if as_json {
        println!("{}", render(&motif_json(label, graph, motif)));
        return;
    }

    println!(
        "match in execution {} ({} nodes, {} edges)",
        display_label(label),
        motif.nodes.len(),
        motif.edges.len()
    );
    for &id in &motif.nodes {
        let event = graph.event(id);
        println!("  line {:>4}  {}  {}", event.line_number, event.host, event.text);
    }
}

fn display_label(label: &str) -> &str {
    if label.is_empty() {
        "(unlabeled)"
    } else {
        label
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
