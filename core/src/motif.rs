use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, trace};

use crate::builder::BuilderGraph;
use crate::error::MotifError;
use crate::graph::{CausalityGraph, EventId};

/// A witness match: the real nodes the pattern's slots were bound to, and
/// the images of the pattern's chain and constraint edges as (from, to)
/// pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Motif {
    pub nodes: BTreeSet<EventId>,
    pub edges: BTreeSet<(EventId, EventId)>,
}

/// Searches a causality graph for subgraphs structurally and causally
/// consistent with a builder pattern.
///
/// Pattern hosts are abstract slots bound injectively to graph hosts.
/// Within a bound host, consecutive pattern events must map to strictly
/// increasing chain positions; a constraint edge is satisfied only by graph
/// reachability in the same direction, never by timestamp comparison alone.
pub struct MotifFinder;

impl MotifFinder {
    /// Return the first witness under the deterministic search order, or
    /// `MotifError::NoMatch` once every candidate assignment is exhausted.
    pub fn find(graph: &CausalityGraph, pattern: &BuilderGraph) -> Result<Motif, MotifError> {
        pattern.validate()?;
        let mut search = Search::new(graph, pattern);
        search.run(Some(1));
        search.matches.into_iter().next().ok_or(MotifError::NoMatch)
    }

    /// Enumerate every witness in deterministic order. An empty vector
    /// means the pattern has no occurrence.
    pub fn find_all(
        graph: &CausalityGraph,
        pattern: &BuilderGraph,
    ) -> Result<Vec<Motif>, MotifError> {
        pattern.validate()?;
        let mut search = Search::new(graph, pattern);
        search.run(None);
        Ok(search.matches)
    }
}

/// One pattern event node, flattened in host-major chain order.
#[derive(Debug, Clone, Copy)]
struct Slot {
    pattern_host: usize,
    chain_position: usize,
}

/// Candidate cursor for one slot. The frame stack owns these; a frame is
/// pushed on tentative commit and popped on backtrack.
#[derive(Debug)]
enum Cursor {
    /// First slot of its pattern host: sweeps (graph host, position) pairs
    /// over all unbound hosts.
    HostScan { host: usize, position: usize },
    /// Later slot of an already-bound host: sweeps positions after its
    /// predecessor's.
    ChainScan { position: usize },
}

#[derive(Debug)]
struct Frame {
    slot: usize,
    cursor: Cursor,
    committed: bool,
}

struct Search<'g> {
    graph: &'g CausalityGraph,
    graph_chains: Vec<Vec<EventId>>,
    slots: Vec<Slot>,
    /// Constraint edges as (slot, slot) pairs.
    constraints: Vec<(usize, usize)>,
    /// Consecutive same-host slot pairs; their images become witness edges.
    chain_edges: Vec<(usize, usize)>,
    /// pattern host -> bound graph host.
    host_binding: Vec<Option<usize>>,
    host_used: Vec<bool>,
    /// slot -> (event, position in the bound host's chain).
    assignment: Vec<Option<(EventId, usize)>>,
    matches: Vec<Motif>,
}

impl<'g> Search<'g> {
    fn new(graph: &'g CausalityGraph, pattern: &BuilderGraph) -> Self {
        let graph_chains: Vec<Vec<EventId>> = graph
            .hosts()
            .map(|host| graph.host_chain(host).map(<[_]>::to_vec).unwrap_or_default())
            .collect();

        // Hosts with only a head sentinel contribute nothing to the search.
        let pattern_hosts: Vec<String> = pattern
            .hosts()
            .filter(|host| !pattern.event_chain(host).is_empty())
            .map(str::to_string)
            .collect();

        let mut slots = Vec::new();
        let mut chain_edges = Vec::new();
        let mut slot_of_node = BTreeMap::new();
        for (pattern_host, host) in pattern_hosts.iter().enumerate() {
            for (chain_position, node) in pattern.event_chain(host).into_iter().enumerate() {
                if chain_position > 0 {
                    chain_edges.push((slots.len() - 1, slots.len()));
                }
                slot_of_node.insert(node, slots.len());
                slots.push(Slot {
                    pattern_host,
                    chain_position,
                });
            }
        }

        let constraints: Vec<(usize, usize)> = pattern
            .constraints()
            .iter()
            .filter_map(|&(from, to)| {
                Some((*slot_of_node.get(&from)?, *slot_of_node.get(&to)?))
            })
            .collect();

        Self {
            graph,
            host_used: vec![false; graph_chains.len()],
            graph_chains,
            constraints,
            chain_edges,
            host_binding: vec![None; pattern_hosts.len()],
            assignment: vec![None; slots.len()],
            slots,
            matches: Vec::new(),
        }
    }

    /// Drive the frame stack until `limit` matches are found or the search
    /// space is exhausted.
    fn run(&mut self, limit: Option<usize>) {
        if self.slots.is_empty() {
            return;
        }

        let mut frames = vec![self.new_frame(0)];
        while let Some(mut frame) = frames.pop() {
            // Undo the frame's previous commitment, then advance it to its
            // next valid candidate; a frame that cannot advance is dropped
            // and control falls back to its parent.
            self.retract(&mut frame);
            if !self.advance(&mut frame) {
                continue;
            }

            let slot = frame.slot;
            frames.push(frame);
            if slot + 1 == self.slots.len() {
                let motif = self.witness();
                trace!(nodes = motif.nodes.len(), "match found");
                self.matches.push(motif);
                if limit.is_some_and(|n| self.matches.len() >= n) {
                    return;
                }
                // The frame stays committed; the next iteration retracts
                // and advances it to enumerate further witnesses.
            } else {
                frames.push(self.new_frame(slot + 1));
            }
        }
        debug!(matches = self.matches.len(), "search exhausted");
    }

    fn new_frame(&self, slot: usize) -> Frame {
        let cursor = if self.slots[slot].chain_position == 0 {
            Cursor::HostScan {
                host: 0,
                position: 0,
            }
        } else {
            // Slots are flattened host-major, so the predecessor on the
            // same pattern host is the previous slot.
            let resume = self.assignment[slot - 1].map_or(0, |(_, position)| position + 1);
            Cursor::ChainScan { position: resume }
        };

        Frame {
            slot,
            cursor,
            committed: false,
        }
    }

    /// Undo a frame's tentative commitment, restoring assignment and host
    /// binding state.
    fn retract(&mut self, frame: &mut Frame) {
        if !frame.committed {
            return;
        }
        frame.committed = false;
        self.assignment[frame.slot] = None;

        let slot = self.slots[frame.slot];
        if slot.chain_position == 0 {
            if let Some(host) = self.host_binding[slot.pattern_host].take() {
                self.host_used[host] = false;
            }
        }
    }

    /// Move the frame's cursor to the next candidate that satisfies every
    /// constraint whose partner is already assigned, committing it.
    fn advance(&mut self, frame: &mut Frame) -> bool {
        let slot_index = frame.slot;
        let slot = self.slots[slot_index];

        match &mut frame.cursor {
            Cursor::HostScan { host, position } => loop {
                if *host >= self.graph_chains.len() {
                    return false;
                }
                if self.host_used[*host] {
                    *host += 1;
                    *position = 0;
                    continue;
                }
                match self.graph_chains[*host].get(*position).copied() {
                    None => {
                        *host += 1;
                        *position = 0;
                    }
                    Some(candidate) => {
                        let bound_host = *host;
                        let bound_position = *position;
                        *position += 1;
                        if self.satisfies(slot_index, candidate) {
                            self.assignment[slot_index] = Some((candidate, bound_position));
                            self.host_binding[slot.pattern_host] = Some(bound_host);
                            self.host_used[bound_host] = true;
                            frame.committed = true;
                            return true;
                        }
                    }
                }
            },
            Cursor::ChainScan { position } => {
                let Some(bound_host) = self.host_binding[slot.pattern_host] else {
                    return false;
                };
                loop {
                    match self.graph_chains[bound_host].get(*position).copied() {
                        None => return false,
                        Some(candidate) => {
                            let bound_position = *position;
                            *position += 1;
                            if self.satisfies(slot_index, candidate) {
                                self.assignment[slot_index] = Some((candidate, bound_position));
                                frame.committed = true;
                                return true;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Constraint check against already-assigned partners. Reachability in
    /// the causality graph is the ground truth here; two events with
    /// comparable timestamps but no connecting path do not satisfy a
    /// constraint.
    fn satisfies(&self, slot: usize, candidate: EventId) -> bool {
        for &(from, to) in &self.constraints {
            if from == slot {
                if let Some((partner, _)) = self.assignment[to] {
                    if !self.graph.is_ancestor(candidate, partner) {
                        return false;
                    }
                }
            } else if to == slot {
                if let Some((partner, _)) = self.assignment[from] {
                    if !self.graph.is_ancestor(partner, candidate) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn witness(&self) -> Motif {
        let mut nodes = BTreeSet::new();
        for assigned in self.assignment.iter().flatten() {
            nodes.insert(assigned.0);
        }

        let mut edges = BTreeSet::new();
        for &(a, b) in self.chain_edges.iter().chain(&self.constraints) {
            if let (Some((from, _)), Some((to, _))) = (self.assignment[a], self.assignment[b]) {
                edges.insert((from, to));
            }
        }

        Motif { nodes, edges }
    }
}
