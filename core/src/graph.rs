use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::event::LogEvent;

/// Identifier of an event node within one causality graph. Ids are arena
/// indices in encounter order, so they are stable and deterministic for a
/// given input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EventId(pub usize);

/// Edge type representing the causal relationship between two events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CausalEdge {
    /// Succession between consecutive events of the same host.
    HostOrder,
    /// Cross-host message reception reconstructed from clock components.
    Message,
}

/// Summary counts for a built graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub hosts: usize,
    pub events: usize,
    pub host_order_edges: usize,
    pub message_edges: usize,
}

/// Per-execution DAG of events. Each host's events form a single linear
/// chain in encounter order; a cross-host edge X -> Y records that Y
/// directly received X's latest state. If X is an ancestor of Y, then
/// X.timestamp <= Y.timestamp with strict inequality in X's own component.
pub struct CausalityGraph {
    events: Vec<LogEvent>,
    graph: DiGraph<EventId, CausalEdge>,
    indices: Vec<NodeIndex>,
    host_chains: BTreeMap<String, Vec<EventId>>,
}

impl CausalityGraph {
    /// Build the graph from one execution's events in encounter order.
    ///
    /// A cross-host edge from X (host A) to Y (host B) is added iff Y's
    /// component for A equals X's own count, X is the latest event on A
    /// carrying that count, and Y is the first event on B whose knowledge
    /// of A reaches that count.
    pub fn from_events(events: Vec<LogEvent>) -> Result<Self, ParseError> {
        let mut graph = DiGraph::with_capacity(events.len(), events.len());
        let mut indices = Vec::with_capacity(events.len());
        let mut host_chains: BTreeMap<String, Vec<EventId>> = BTreeMap::new();

        for (position, event) in events.iter().enumerate() {
            let id = EventId(position);
            indices.push(graph.add_node(id));
            host_chains.entry(event.host.clone()).or_default().push(id);
        }

        // Linear chain per host, in encounter order.
        for chain in host_chains.values() {
            for (&from, &to) in chain.iter().tuple_windows() {
                graph.add_edge(indices[from.0], indices[to.0], CausalEdge::HostOrder);
            }
        }

        // Latest event per (host, own count): the sender lookup table.
        let mut senders: HashMap<(&str, u64), EventId> = HashMap::new();
        for (host, chain) in &host_chains {
            for &id in chain {
                let own = events[id.0].timestamp.own_count();
                senders.insert((host.as_str(), own), id);
            }
        }

        // Message edges: walk each receiver chain tracking what the host
        // already knew; every component that grows marks a reception.
        for (host, chain) in &host_chains {
            let mut known: BTreeMap<&str, u64> = BTreeMap::new();
            for &id in chain {
                let timestamp = &events[id.0].timestamp;
                for (sender_host, count) in timestamp.components() {
                    if sender_host == host.as_str() {
                        continue;
                    }
                    let prior = known.get(sender_host).copied().unwrap_or(0);
                    if count <= prior {
                        continue;
                    }
                    match senders.get(&(sender_host, count)) {
                        Some(&sender) => {
                            debug!(
                                from = sender.0,
                                to = id.0,
                                sender_host,
                                count,
                                "message edge"
                            );
                            graph.add_edge(indices[sender.0], indices[id.0], CausalEdge::Message);
                        }
                        None => warn!(
                            receiver = id.0,
                            sender_host,
                            count,
                            "clock references a state no event on the sender host carries"
                        ),
                    }
                }
                known = timestamp
                    .components()
                    .filter(|(component, _)| component != &host.as_str())
                    .collect();
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(ParseError::CyclicClocks);
        }

        Ok(Self {
            events,
            graph,
            indices,
            host_chains,
        })
    }

    pub fn event(&self, id: EventId) -> &LogEvent {
        &self.events[id.0]
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    /// Hosts in sorted order.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.host_chains.keys().map(String::as_str)
    }

    /// The host's events in encounter order, or `None` for an unknown host.
    pub fn host_chain(&self, host: &str) -> Option<&[EventId]> {
        self.host_chains.get(host).map(Vec::as_slice)
    }

    pub fn node_count(&self) -> usize {
        self.events.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn parents(&self, id: EventId) -> Vec<EventId> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn children(&self, id: EventId) -> Vec<EventId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: EventId, direction: Direction) -> Vec<EventId> {
        let mut ids: Vec<EventId> = self
            .graph
            .neighbors_directed(self.indices[id.0], direction)
            .map(|index| self.graph[index])
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Graph reachability: true iff a directed path leads from `ancestor`
    /// to `descendant`. This, not timestamp comparison, is the ground
    /// truth for happens-before queries against the built graph.
    pub fn is_ancestor(&self, ancestor: EventId, descendant: EventId) -> bool {
        ancestor != descendant
            && has_path_connecting(
                &self.graph,
                self.indices[ancestor.0],
                self.indices[descendant.0],
                None,
            )
    }

    /// All edges as (from, to) id pairs, sorted.
    pub fn edges(&self) -> Vec<(EventId, EventId, CausalEdge)> {
        let mut edges: Vec<(EventId, EventId, CausalEdge)> = self
            .graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()],
                    self.graph[edge.target()],
                    *edge.weight(),
                )
            })
            .collect();
        edges.sort_unstable_by_key(|&(from, to, _)| (from, to));
        edges
    }

    /// Events in a topological (causal) order.
    pub fn causal_order(&self) -> Vec<EventId> {
        // Construction rejects cyclic inputs, so this cannot fail.
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|index| self.graph[index]).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> GraphStats {
        let mut host_order_edges = 0;
        let mut message_edges = 0;
        for edge in self.graph.edge_references() {
            match edge.weight() {
                CausalEdge::HostOrder => host_order_edges += 1,
                CausalEdge::Message => message_edges += 1,
            }
        }

        GraphStats {
            hosts: self.host_chains.len(),
            events: self.events.len(),
            host_order_edges,
            message_edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogParser;

    const EVENT_PATTERN: &str = r"(?P<host>\S+) (?P<clock>\{[^}]*\}) (?P<event>.*)";

    fn build(raw: &str) -> CausalityGraph {
        let parser = LogParser::new(EVENT_PATTERN, None).unwrap();
        let parsed = parser.parse(raw).unwrap();
        let execution = parsed.into_executions().remove(0);
        CausalityGraph::from_events(execution.events).unwrap()
    }

    const HANDSHAKE: &str = "\
alice {\"alice\":1} starting request
alice {\"alice\":2} sending ping
bob {\"bob\":1,\"alice\":2} received ping
bob {\"bob\":2,\"alice\":2} sending pong
alice {\"alice\":3,\"bob\":2} received pong
alice {\"alice\":4,\"bob\":2} done
";

    #[test]
    fn host_chains_round_trip_encounter_order() {
        let graph = build(HANDSHAKE);

        let alice: Vec<&str> = graph
            .host_chain("alice")
            .unwrap()
            .iter()
            .map(|&id| graph.event(id).text.as_str())
            .collect();
        assert_eq!(
            alice,
            vec!["starting request", "sending ping", "received pong", "done"]
        );

        let bob: Vec<&str> = graph
            .host_chain("bob")
            .unwrap()
            .iter()
            .map(|&id| graph.event(id).text.as_str())
            .collect();
        assert_eq!(bob, vec!["received ping", "sending pong"]);
    }

    #[test]
    fn message_edges_link_send_to_first_knowledge() {
        let graph = build(HANDSHAKE);
        let stats = graph.stats();

        assert_eq!(stats.hosts, 2);
        assert_eq!(stats.events, 6);
        assert_eq!(stats.host_order_edges, 4);
        assert_eq!(stats.message_edges, 2);

        let edges = graph.edges();
        // alice's "sending ping" (id 1) -> bob's "received ping" (id 2)
        assert!(edges.contains(&(EventId(1), EventId(2), CausalEdge::Message)));
        // bob's "sending pong" (id 3) -> alice's "received pong" (id 4)
        assert!(edges.contains(&(EventId(3), EventId(4), CausalEdge::Message)));
    }

    #[test]
    fn repeated_knowledge_adds_no_extra_edge() {
        let graph = build(HANDSHAKE);

        // bob's second event still carries alice:2 but did not receive
        // anything new, so its only parent is bob's first event.
        assert_eq!(graph.parents(EventId(3)), vec![EventId(2)]);
        // alice's final event likewise only follows her own chain.
        assert_eq!(graph.parents(EventId(5)), vec![EventId(4)]);
    }

    #[test]
    fn reachability_spans_hosts_through_messages() {
        let graph = build(HANDSHAKE);

        assert!(graph.is_ancestor(EventId(0), EventId(5)));
        assert!(graph.is_ancestor(EventId(1), EventId(3)));
        assert!(graph.is_ancestor(EventId(3), EventId(4)));
        // An event is not its own ancestor.
        assert!(!graph.is_ancestor(EventId(2), EventId(2)));
        // bob never hears from alice after her ping.
        assert!(!graph.is_ancestor(EventId(4), EventId(3)));
    }

    #[test]
    fn ancestors_dominate_in_their_own_component() {
        let graph = build(HANDSHAKE);

        for from in 0..graph.node_count() {
            for to in 0..graph.node_count() {
                if graph.is_ancestor(EventId(from), EventId(to)) {
                    let ancestor = graph.event(EventId(from));
                    let descendant = graph.event(EventId(to));
                    assert!(
                        ancestor.timestamp.own_count()
                            <= descendant.timestamp.get(&ancestor.host),
                        "ancestor {from} not dominated by descendant {to}"
                    );
                }
            }
        }
    }

    #[test]
    fn causal_order_respects_edges() {
        let graph = build(HANDSHAKE);
        let order = graph.causal_order();
        assert_eq!(order.len(), graph.node_count());

        let position: Vec<usize> = {
            let mut position = vec![0; order.len()];
            for (rank, id) in order.iter().enumerate() {
                position[id.0] = rank;
            }
            position
        };
        for (from, to, _) in graph.edges() {
            assert!(position[from.0] < position[to.0]);
        }
    }

    #[test]
    fn mutually_dependent_clocks_are_rejected() {
        let raw = "\
a {\"a\":1,\"b\":1} impossible
b {\"b\":1,\"a\":1} impossible
";
        let parser = LogParser::new(EVENT_PATTERN, None).unwrap();
        let parsed = parser.parse(raw).unwrap();
        let execution = parsed.into_executions().remove(0);

        assert!(matches!(
            CausalityGraph::from_events(execution.events),
            Err(ParseError::CyclicClocks)
        ));
    }
}
