//! Pruning & compression, and anchor discovery: the
//! fixed sequence run after every graph build, and again after each `k`
//! bump.

use std::collections::{HashSet, VecDeque};

use crate::graph::edge::Edge;
use crate::graph::label::Label;
use crate::graph::node::Node;
use crate::graph::{Graph, SINK_ID, SOURCE_ID};
use crate::kmer::{EdgeKind, Kmer, NodeId, Sign};
use crate::params::Params;

pub struct Anchors {
    pub source: NodeId,
    pub sink: NodeId,
}

/// Run the full prune → tip-removal → component-filter → compress sequence,
/// returning the discovered anchors. `Ok(None)` means no viable anchor pair
/// was found and the window (at this `k`) should be skipped or retried at a
/// larger `k`.
pub fn prune_and_compress(g: &mut Graph, params: &Params, avg_window_cov: f64) -> Option<Anchors> {
    remove_low_coverage(g, params, avg_window_cov);
    remove_tips(g, params.min_graph_tip_length);

    let source = find_source_anchor(g, params.min_anchor_cov)?;
    keep_only_component_of(g, source);
    let sink = find_sink_anchor(g, params.min_anchor_cov)?;

    link_mock_anchors(g, source, sink);
    compress_linear_chains(g);

    Some(Anchors { source, sink })
}

fn remove_low_coverage(g: &mut Graph, params: &Params, avg_window_cov: f64) {
    let doomed: Vec<NodeId> = g
        .nodes()
        .filter(|n| n.id() != SOURCE_ID && n.id() != SINK_ID)
        .filter(|n| !n.label().has_reference())
        .filter(|n| {
            let total = n.counts().total();
            let ratio = if avg_window_cov > 0.0 { total as f64 / avg_window_cov } else { 0.0 };
            total < params.min_node_cov || ratio < params.min_cov_ratio
        })
        .map(|n| n.id())
        .collect();
    g.remove_nodes(&doomed);
}

fn remove_tips(g: &mut Graph, min_tip_len: usize) {
    loop {
        let candidates: Vec<NodeId> = g
            .nodes()
            .filter(|n| n.id() != SOURCE_ID && n.id() != SINK_ID)
            .filter(|n| !n.label().has_reference())
            .filter(|n| n.num_edges() <= 1)
            .map(|n| n.id())
            .collect();

        let mut removed_any = false;
        for start in candidates {
            if !g.contains(start) {
                continue;
            }
            let chain = tip_chain(g, start);
            if chain.len() <= min_tip_len {
                g.remove_nodes(&chain);
                removed_any = true;
            }
        }
        if !removed_any {
            break;
        }
    }
}

/// Walk forward from a dead-end node through single-successor, non-reference
/// nodes, stopping at a branch point (degree > 2), a reference node, or a
/// mock anchor. The returned chain never includes the stopping node.
fn tip_chain(g: &Graph, start: NodeId) -> Vec<NodeId> {
    let mut chain = vec![start];
    let mut current = start;
    loop {
        let node = g.get(current).expect("chain node must exist");
        if node.num_edges() != 1 {
            break;
        }
        let next_id = node.edges().next().unwrap().dst_id;
        if next_id == SOURCE_ID || next_id == SINK_ID {
            break;
        }
        let Some(next_node) = g.get(next_id) else { break };
        if next_node.label().has_reference() {
            break;
        }
        match next_node.num_edges() {
            0 | 1 => {
                chain.push(next_id);
                break;
            }
            2 => {
                chain.push(next_id);
                current = next_id;
            }
            _ => break,
        }
    }
    chain
}

/// The first reference-labelled node in window order with enough combined
/// sample support to anchor the reference walk.
fn find_source_anchor(g: &Graph, min_anchor_cov: u32) -> Option<NodeId> {
    g.ref_order()
        .iter()
        .copied()
        .find(|&id| is_viable_anchor(g, id, min_anchor_cov))
}

/// The last reference-labelled node in window order with enough combined
/// sample support, restricted to whatever is still present in `g` (i.e. the
/// surviving component, see [`keep_only_component_of`]).
fn find_sink_anchor(g: &Graph, min_anchor_cov: u32) -> Option<NodeId> {
    g.ref_order()
        .iter()
        .rev()
        .copied()
        .find(|&id| is_viable_anchor(g, id, min_anchor_cov))
}

fn is_viable_anchor(g: &Graph, id: NodeId, min_anchor_cov: u32) -> bool {
    match g.get(id) {
        Some(n) => n.label().has_reference() && n.counts().total() >= min_anchor_cov,
        None => false,
    }
}

/// BFS over the mirrored-edge adjacency (direction-agnostic) starting from
/// `root`; drop every node not reached.
fn keep_only_component_of(g: &mut Graph, root: NodeId) {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(root);
    queue.push_back(root);
    while let Some(id) = queue.pop_front() {
        let Some(node) = g.get(id) else { continue };
        for e in node.edges() {
            if e.dst_id != SOURCE_ID && e.dst_id != SINK_ID && seen.insert(e.dst_id) {
                queue.push_back(e.dst_id);
            }
        }
    }
    for &id in seen.iter() {
        if let Some(n) = g.get_mut(id) {
            n.set_component_id(0);
        }
    }
    let doomed: Vec<NodeId> = g
        .ids()
        .filter(|&id| id != SOURCE_ID && id != SINK_ID && !seen.contains(&id))
        .collect();
    g.remove_nodes(&doomed);
}

fn link_mock_anchors(g: &mut Graph, source: NodeId, sink: NodeId) {
    let source_sign = g.get(source).unwrap().kmer().sign();
    g.add_edge(SOURCE_ID, Edge::new(source, EdgeKind::from_sign_pair(Sign::Plus, source_sign)));
    let sink_sign = g.get(sink).unwrap().kmer().sign();
    g.add_edge(sink, Edge::new(SINK_ID, EdgeKind::from_sign_pair(sink_sign, Sign::Plus)));
}

/// A node is a simple chain link if it has exactly one edge leaving in each
/// of the two canonical orientations: one way in, one way out, nothing
/// ambiguous. Returns the outgoing edge (in the node's own orientation) when
/// that holds.
fn chain_successor(g: &Graph, id: NodeId) -> Option<Edge> {
    let node = g.get(id)?;
    if node.is_mock() {
        return None;
    }
    let own_sign = node.kmer().sign();
    let mut forward: Vec<&Edge> = node.edges_in_direction(own_sign).collect();
    let backward_count = node.edges_in_direction(own_sign.rev()).count();
    if forward.len() == 1 && backward_count == 1 {
        forward.pop().copied()
    } else {
        None
    }
}

fn merge_pair(g: &mut Graph, u_id: NodeId, e: Edge) -> NodeId {
    let v_id = e.dst_id;
    let (u_sign, v_sign) = e.kind.signs();
    let k = g.k();

    let u_node = g.get(u_id).unwrap().clone();
    let v_node = g.get(v_id).unwrap().clone();

    let u_seq = u_node.kmer().sequence_for(u_sign);
    let v_seq = v_node.kmer().sequence_for(v_sign);
    let overlap = (k.saturating_sub(1)).min(v_seq.len());
    let mut merged_seq = u_seq;
    merged_seq.extend_from_slice(&v_seq[overlap..]);

    let merged_kmer = Kmer::new(&merged_seq);
    let new_id = merged_kmer.identifier();
    let mut merged = Node::new(merged_kmer, Label::empty());
    merged.merge_annotations(&u_node);
    merged.merge_annotations(&v_node);

    // Re-home every edge that pointed somewhere other than u/v: u's edges
    // not equal to `e`, and v's edges not equal to `e`'s mirror.
    let e_mirror = e.mirror(u_id);
    let mut outward = Vec::new();
    for edge in u_node.edges() {
        if *edge != e {
            outward.push(*edge);
        }
    }
    for edge in v_node.edges() {
        if *edge != e_mirror {
            outward.push(*edge);
        }
    }

    g.remove_node(u_id);
    g.remove_node(v_id);
    g.insert_node(new_id, merged);
    for edge in outward {
        g.add_edge(new_id, edge);
    }
    new_id
}

fn compress_linear_chains(g: &mut Graph) {
    loop {
        let ids: Vec<NodeId> = g.ids().collect();
        let mut merged_any = false;
        for id in ids {
            if !g.contains(id) {
                continue;
            }
            let Some(e) = chain_successor(g, id) else { continue };
            if e.dst_id == id || e.dst_id == SOURCE_ID || e.dst_id == SINK_ID {
                continue;
            }
            // Require the successor to be a mirror-symmetric partner, not a
            // node that merely happens to be reachable: its own backward
            // link must point straight back at `id`.
            if g.get(e.dst_id).map_or(false, |n| n.is_mock()) {
                continue;
            }
            merge_pair(g, id, e);
            merged_any = true;
            break; // node ids shifted; restart the scan
        }
        if !merged_any {
            break;
        }
    }
}

/// `true` if the reference-reachable component still contains a cycle after
/// compression (detected via DFS over the mirrored adjacency, ignoring the
/// edge just arrived on).
pub fn has_cycle(g: &Graph) -> bool {
    let mut visited: HashSet<NodeId> = HashSet::new();
    for start in g.ids() {
        if visited.contains(&start) {
            continue;
        }
        let mut stack = vec![(start, SOURCE_ID)]; // sentinel "came from"
        let mut local: HashSet<NodeId> = HashSet::new();
        while let Some((id, came_from)) = stack.pop() {
            if !local.insert(id) {
                return true;
            }
            visited.insert(id);
            let Some(node) = g.get(id) else { continue };
            for e in node.edges() {
                if e.dst_id == came_from {
                    continue;
                }
                stack.push((e.dst_id, id));
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::label::Sample;

    fn anchor_node(g: &mut Graph, seq: &[u8], sample: Sample, support: u32) -> NodeId {
        let id = g.upsert(Kmer::new(seq), Label::for_sample(sample));
        g.get_mut(id).unwrap().add_label(Label::reference());
        for _ in 0..support {
            g.get_mut(id).unwrap().increment_support(sample, crate::graph::node::Strand::Fwd);
        }
        id
    }

    #[test]
    fn finds_source_and_sink_anchors_in_window_order() {
        let mut g = Graph::new(4);
        let a = anchor_node(&mut g, b"ACGT", Sample::Normal, 5);
        let b = anchor_node(&mut g, b"CGTT", Sample::Normal, 5);
        g.add_edge(a, Edge::new(b, EdgeKind::PlusPlus));
        g.set_ref_order(vec![a, b]);

        let params = Params::default();
        let anchors = prune_and_compress(&mut g, &params, 5.0).expect("anchors expected");
        assert_eq!(anchors.source, a);
        assert_eq!(anchors.sink, b);
        assert!(g.check_mirror_invariant());
    }

    #[test]
    fn low_coverage_non_reference_node_is_pruned() {
        let mut g = Graph::new(4);
        let a = anchor_node(&mut g, b"ACGT", Sample::Normal, 10);
        let weak = g.upsert(Kmer::new(b"TTTT"), Label::for_sample(Sample::Tumor));
        g.add_edge(a, Edge::new(weak, EdgeKind::PlusPlus));
        g.set_ref_order(vec![a]);

        let params = Params::default();
        remove_low_coverage(&mut g, &params, 10.0);
        assert!(!g.contains(weak));
        assert!(g.contains(a));
    }

    #[test]
    fn no_cycle_in_a_simple_linear_graph() {
        let mut g = Graph::new(4);
        let a = g.upsert(Kmer::new(b"ACGT"), Label::reference());
        let b = g.upsert(Kmer::new(b"CGTT"), Label::reference());
        g.add_edge(a, Edge::new(b, EdgeKind::PlusPlus));
        assert!(!has_cycle(&g));
    }
}
