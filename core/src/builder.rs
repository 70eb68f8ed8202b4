use std::collections::BTreeMap;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Identifier of a node within one builder graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BuilderNodeId(pub usize);

/// What a builder node stands for. Variants are selected by this tag, never
/// by downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderNodeKind {
    /// Synthetic per-host sentinel with no predecessor; the insertion
    /// anchor for the host's chain. Heads never participate in matching.
    Head,
    /// A pattern slot to be bound to a real event.
    Event,
}

#[derive(Debug, Clone)]
pub struct BuilderNode {
    pub host: String,
    pub kind: BuilderNodeKind,
}

/// A small user-authored pattern graph with the same node/edge shape as the
/// causality graph, but whose edges state *required* happens-before
/// relationships rather than observed ones.
#[derive(Debug, Clone, Default)]
pub struct BuilderGraph {
    nodes: Vec<BuilderNode>,
    // Per-host chains; each chain starts with its head sentinel.
    chains: BTreeMap<String, Vec<BuilderNodeId>>,
    constraints: Vec<(BuilderNodeId, BuilderNodeId)>,
}

impl BuilderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure the host exists, creating its head sentinel if needed.
    /// Returns the head's id.
    pub fn add_host(&mut self, host: &str) -> BuilderNodeId {
        if let Some(chain) = self.chains.get(host) {
            return chain[0];
        }

        let head = BuilderNodeId(self.nodes.len());
        self.nodes.push(BuilderNode {
            host: host.to_string(),
            kind: BuilderNodeKind::Head,
        });
        self.chains.insert(host.to_string(), vec![head]);
        head
    }

    /// Append a pattern slot to the end of the host's chain, creating the
    /// host on demand.
    pub fn append_event(&mut self, host: &str) -> BuilderNodeId {
        self.add_host(host);

        let id = BuilderNodeId(self.nodes.len());
        self.nodes.push(BuilderNode {
            host: host.to_string(),
            kind: BuilderNodeKind::Event,
        });
        // Chain exists after add_host.
        if let Some(chain) = self.chains.get_mut(host) {
            chain.push(id);
        }
        id
    }

    /// Require that `from` happens before `to` in any match. The endpoints
    /// may live on different hosts.
    pub fn require_happens_before(
        &mut self,
        from: BuilderNodeId,
        to: BuilderNodeId,
    ) -> Result<(), PatternError> {
        for id in [from, to] {
            let node = self
                .nodes
                .get(id.0)
                .ok_or(PatternError::UnknownNode(id.0))?;
            if node.kind == BuilderNodeKind::Head {
                return Err(PatternError::HeadConstraint);
            }
        }
        if from == to {
            return Err(PatternError::CyclicPattern);
        }

        self.constraints.push((from, to));
        Ok(())
    }

    pub fn node(&self, id: BuilderNodeId) -> Option<&BuilderNode> {
        self.nodes.get(id.0)
    }

    /// Hosts in sorted order.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// The host's pattern slots in chain order, head sentinel excluded.
    pub fn event_chain(&self, host: &str) -> Vec<BuilderNodeId> {
        self.chains
            .get(host)
            .map(|chain| chain[1..].to_vec())
            .unwrap_or_default()
    }

    pub fn constraints(&self) -> &[(BuilderNodeId, BuilderNodeId)] {
        &self.constraints
    }

    pub fn event_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.kind == BuilderNodeKind::Event)
            .count()
    }

    /// Structural validation, run before any search: the pattern must have
    /// at least one event node, and chain order plus constraints together
    /// must be acyclic.
    pub fn validate(&self) -> Result<(), PatternError> {
        if self.event_count() == 0 {
            return Err(PatternError::EmptyPattern);
        }

        for &(from, to) in &self.constraints {
            for id in [from, to] {
                match self.nodes.get(id.0) {
                    None => return Err(PatternError::UnknownNode(id.0)),
                    Some(node) if node.kind == BuilderNodeKind::Head => {
                        return Err(PatternError::HeadConstraint)
                    }
                    Some(_) => {}
                }
            }
        }

        let mut graph = DiGraph::<BuilderNodeId, ()>::new();
        let indices: Vec<_> = (0..self.nodes.len())
            .map(|position| graph.add_node(BuilderNodeId(position)))
            .collect();
        for chain in self.chains.values() {
            for pair in chain.windows(2) {
                graph.add_edge(indices[pair[0].0], indices[pair[1].0], ());
            }
        }
        for &(from, to) in &self.constraints {
            graph.add_edge(indices[from.0], indices[to.0], ());
        }
        if is_cyclic_directed(&graph) {
            return Err(PatternError::CyclicPattern);
        }

        Ok(())
    }
}

/// Serde-level description of a motif, the file format the CLI reads. Hosts
/// are abstract slots; `events` is how many pattern events the host chain
/// holds, and constraints reference (host, index) positions in those
/// chains, 0-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotifSpec {
    pub hosts: Vec<MotifHostSpec>,
    #[serde(default)]
    pub constraints: Vec<MotifConstraintSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotifHostSpec {
    pub name: String,
    pub events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotifConstraintSpec {
    pub from: MotifSlotRef,
    pub to: MotifSlotRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotifSlotRef {
    pub host: String,
    pub index: usize,
}

impl MotifSpec {
    /// Lower the spec into a builder graph, resolving slot references.
    pub fn build(&self) -> Result<BuilderGraph, PatternError> {
        let mut pattern = BuilderGraph::new();
        let mut slots: BTreeMap<&str, Vec<BuilderNodeId>> = BTreeMap::new();

        for host in &self.hosts {
            let chain = slots.entry(host.name.as_str()).or_default();
            for _ in 0..host.events {
                chain.push(pattern.append_event(&host.name));
            }
        }

        for constraint in &self.constraints {
            let from = resolve(&slots, &constraint.from)?;
            let to = resolve(&slots, &constraint.to)?;
            pattern.require_happens_before(from, to)?;
        }

        pattern.validate()?;
        Ok(pattern)
    }
}

fn resolve(
    slots: &BTreeMap<&str, Vec<BuilderNodeId>>,
    slot: &MotifSlotRef,
) -> Result<BuilderNodeId, PatternError> {
    slots
        .get(slot.host.as_str())
        .and_then(|chain| chain.get(slot.index))
        .copied()
        .ok_or_else(|| PatternError::UnknownSlot {
            host: slot.host.clone(),
            index: slot.index,
        })
}
