//! The coloured de Bruijn graph: an arena of nodes keyed by 64-bit id, with
//! two reserved "mock" ids (`SOURCE_ID`/`SINK_ID`) anchoring path
//! enumeration. Mutation always goes through the arena; nothing holds a
//! direct reference to a `Node` across a mutating call.

pub mod builder;
pub mod label;
pub mod edge;
pub mod node;
pub mod path;
pub mod pathenum;
pub mod pruner;

use std::collections::HashMap;

use crate::graph::edge::Edge;
use crate::graph::node::Node;
use crate::kmer::{Kmer, NodeId};
use crate::graph::label::Label;

/// Reserved id for the synthetic source anchor. Real k-mer identifiers are a
/// 64-bit hash of their sequence; collision against these two reserved
/// values is astronomically unlikely and not specially guarded against,
/// matching the C++ original's plain `u64` mock ids.
pub const SOURCE_ID: NodeId = u64::MAX;
pub const SINK_ID: NodeId = u64::MAX - 1;

pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    k: usize,
    /// Node ids in reference-window order, deduplicated by first occurrence.
    /// Used to find the source/sink anchors: graph-order iteration
    /// over a `HashMap` carries no positional meaning.
    ref_order: Vec<NodeId>,
}

impl Graph {
    pub fn new(k: usize) -> Self {
        Graph { nodes: HashMap::new(), k, ref_order: Vec::new() }
    }

    pub fn set_ref_order(&mut self, order: Vec<NodeId>) {
        self.ref_order = order;
    }

    pub fn ref_order(&self) -> &[NodeId] {
        &self.ref_order
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get-or-insert the node for `kmer`'s canonical form, tagging it with
    /// `label`. Returns the node's id.
    pub fn upsert(&mut self, kmer: Kmer, label: Label) -> NodeId {
        let id = kmer.identifier();
        match self.nodes.get_mut(&id) {
            Some(existing) => existing.add_label(label),
            None => {
                self.nodes.insert(id, Node::new(kmer, label));
            }
        }
        id
    }

    /// Get-or-insert the mock anchor node at `id` (`SOURCE_ID`/`SINK_ID`).
    pub fn upsert_mock(&mut self, id: NodeId) -> NodeId {
        self.nodes.entry(id).or_insert_with(|| Node::new_mock(id));
        id
    }

    /// Insert a fully-formed node (e.g. the result of a chain-compression
    /// merge) directly under `id`, overwriting whatever was there.
    pub fn insert_node(&mut self, id: NodeId, node: Node) {
        self.nodes.insert(id, node);
    }

    /// Add a directed edge `src -> dst` and its mirror `dst -> src`, unless
    /// the edge is a self-mirroring self-loop (stored once, see
    /// [`crate::kmer::EdgeKind::is_self_mirroring`]).
    pub fn add_edge(&mut self, src_id: NodeId, edge: Edge) {
        let is_self_mirror = src_id == edge.dst_id && edge.kind.is_self_mirroring();
        if let Some(src) = self.nodes.get_mut(&src_id) {
            src.insert_edge(edge);
        }
        if is_self_mirror {
            return;
        }
        let mirror = edge.mirror(src_id);
        if let Some(dst) = self.nodes.get_mut(&edge.dst_id) {
            dst.insert_edge(mirror);
        }
    }

    /// Remove a node and every edge referencing it (both the forward edges
    /// it owned and the mirrors held by its neighbours).
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else { return };
        for e in node.edges() {
            if let Some(neighbour) = self.nodes.get_mut(&e.dst_id) {
                neighbour.remove_edge(&e.mirror(id));
            }
        }
        self.ref_order.retain(|&n| n != id);
    }

    pub fn remove_nodes(&mut self, ids: &[NodeId]) {
        for &id in ids {
            self.remove_node(id);
        }
    }

    /// Verify the mirrored-edge invariant holds for every node: for every
    /// `(u, kind) -> v` held by `u`, `v` holds `(v, rev(kind)) -> u`, except
    /// self-mirroring self-loops which are stored once. Used in tests and as
    /// a cheap consistency check after compression.
    pub fn check_mirror_invariant(&self) -> bool {
        for (&uid, u) in self.nodes.iter() {
            for e in u.edges() {
                if uid == e.dst_id && e.kind.is_self_mirroring() {
                    continue;
                }
                let Some(v) = self.nodes.get(&e.dst_id) else { return false };
                let expected = e.mirror(uid);
                if !v.edges().any(|ve| *ve == expected) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::label::{Label, Sample};
    use crate::kmer::{EdgeKind, Kmer};

    #[test]
    fn mirrored_edges_are_added_on_both_endpoints() {
        let mut g = Graph::new(4);
        let a = Kmer::new(b"ACGT");
        let b = Kmer::new(b"CGTT");
        let aid = g.upsert(a, Label::for_sample(Sample::Tumor));
        let bid = g.upsert(b, Label::for_sample(Sample::Tumor));
        g.add_edge(aid, Edge::new(bid, EdgeKind::PlusPlus));
        assert!(g.check_mirror_invariant());
        assert_eq!(g.get(bid).unwrap().num_edges(), 1);
    }

    #[test]
    fn self_mirroring_self_loop_stored_once() {
        let mut g = Graph::new(4);
        let a = Kmer::new(b"ACGT");
        let aid = g.upsert(a, Label::reference());
        g.add_edge(aid, Edge::new(aid, EdgeKind::PlusMinus));
        assert_eq!(g.get(aid).unwrap().num_edges(), 1);
        assert!(g.check_mirror_invariant());
    }

    #[test]
    fn removing_a_node_drops_neighbour_mirrors() {
        let mut g = Graph::new(4);
        let a = Kmer::new(b"ACGT");
        let b = Kmer::new(b"CGTT");
        let aid = g.upsert(a, Label::reference());
        let bid = g.upsert(b, Label::reference());
        g.add_edge(aid, Edge::new(bid, EdgeKind::PlusPlus));
        g.remove_node(aid);
        assert_eq!(g.get(bid).unwrap().num_edges(), 0);
        assert!(g.check_mirror_invariant());
    }
}
