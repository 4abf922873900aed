//! Anchored source→sink path enumeration: a bounded BFS that,
//! on each call, returns the highest-scoring new path through the graph, or
//! `None` once every reachable path has already been reported.

use std::collections::{HashSet, VecDeque};

use crate::graph::edge::Edge;
use crate::graph::path::Path;
use crate::graph::{Graph, SINK_ID, SOURCE_ID};
use crate::kmer::NodeId;

pub struct PathEnumerator {
    returned: HashSet<(NodeId, Edge)>,
}

impl PathEnumerator {
    pub fn new() -> Self {
        PathEnumerator { returned: HashSet::new() }
    }

    /// Run one bounded BFS over `g` and return the best new path, or `None`
    /// if nothing new remains. `bfs_limit` caps the number of builders
    /// popped; `max_path_len` discards any builder whose sequence has grown
    /// too long to be a useful haplotype candidate.
    pub fn next_path(&mut self, g: &Graph, max_path_len: usize, bfs_limit: u32) -> Option<Path> {
        let mut queue: VecDeque<Path> = VecDeque::new();
        queue.push_back(Path::at_source());
        let mut best: Option<Path> = None;
        let mut visits = 0u32;

        while let Some(b) = queue.pop_front() {
            if visits >= bfs_limit {
                break;
            }
            visits += 1;

            if b.seq.len() > max_path_len {
                continue;
            }
            if b.touched_sink && b.score > 0 {
                best = Some(b);
                break;
            }

            let Some(node) = g.get(b.current_id) else { continue };
            let out_edges: Vec<Edge> = node.edges_in_direction(b.current_sign).copied().collect();
            for e in out_edges {
                if e.dst_id == SINK_ID {
                    let best_score = best.as_ref().map(|p| p.score).unwrap_or(0);
                    if b.score > best_score {
                        queue.push_back(b.mark_sink_touched());
                    }
                    continue;
                }
                if e.dst_id == SOURCE_ID {
                    continue;
                }
                let novel = !self.returned.contains(&(b.current_id, e));
                queue.push_back(b.extend(g, e, novel));
            }
        }

        if let Some(ref p) = best {
            for &(src, e) in &p.traversed {
                self.returned.insert((src, e));
            }
        }
        best
    }
}

impl Default for PathEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk from SOURCE to SINK, at each branch preferring the edge into a
/// REFERENCE-labelled node, to recover "the sequence obtained by walking
/// reference-labelled nodes from source to sink" even though chain
/// compression may have merged the original anchor nodes into new ones
/// with different ids.
pub fn reference_haplotype(g: &Graph) -> Vec<u8> {
    let mut path = Path::at_source();
    let mut current_id = SOURCE_ID;
    let mut steps = 0usize;
    while steps <= g.len() {
        steps += 1;
        let Some(node) = g.get(current_id) else { break };
        let candidates: Vec<Edge> = node.edges_in_direction(path.current_sign).copied().filter(|e| e.dst_id != SOURCE_ID).collect();
        let chosen = candidates.iter().max_by_key(|e| {
            let is_ref_or_sink = e.dst_id == SINK_ID || g.get(e.dst_id).is_some_and(|n| n.label().has_reference());
            (is_ref_or_sink, std::cmp::Reverse(e.dst_id))
        });
        let Some(&e) = chosen else { break };
        if e.dst_id == SINK_ID {
            break;
        }
        path = path.extend(g, e, false);
        current_id = e.dst_id;
    }
    path.seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::label::Label;
    use crate::kmer::{EdgeKind, Kmer};

    fn linear_graph() -> (Graph, NodeId, NodeId) {
        let mut g = Graph::new(4);
        let a = Kmer::new(b"ACGT");
        let b = Kmer::new(b"CGTT");
        let aid = g.upsert(a, Label::reference());
        let bid = g.upsert(b, Label::reference());
        g.add_edge(aid, Edge::new(bid, EdgeKind::PlusPlus));
        g.upsert_mock(SOURCE_ID);
        g.upsert_mock(SINK_ID);
        g.add_edge(SOURCE_ID, Edge::new(aid, EdgeKind::PlusPlus));
        g.add_edge(bid, Edge::new(SINK_ID, EdgeKind::PlusPlus));
        (g, aid, bid)
    }

    #[test]
    fn enumerates_the_single_reference_path_once() {
        let (g, _aid, _bid) = linear_graph();
        let mut pe = PathEnumerator::new();
        let p1 = pe.next_path(&g, 1000, 10_000).expect("a path should be found");
        assert_eq!(p1.seq, b"ACGTT");
        let p2 = pe.next_path(&g, 1000, 10_000);
        assert!(p2.is_none(), "every edge was already returned, so a second call must yield nothing");
    }

    #[test]
    fn bfs_limit_of_zero_yields_nothing() {
        let (g, _aid, _bid) = linear_graph();
        let mut pe = PathEnumerator::new();
        assert!(pe.next_path(&g, 1000, 0).is_none());
    }

    #[test]
    fn reference_haplotype_walks_the_reference_backbone() {
        let (g, _aid, _bid) = linear_graph();
        assert_eq!(reference_haplotype(&g), b"ACGTT");
    }
}
