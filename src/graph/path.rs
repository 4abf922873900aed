//! A path-builder: the state carried by one candidate haplotype walk through
//! the graph.

use crate::graph::edge::Edge;
use crate::graph::Graph;
use crate::kmer::{NodeId, Sign};

use super::SOURCE_ID;

#[derive(Debug, Clone)]
pub struct Path {
    pub current_id: NodeId,
    pub current_sign: Sign,
    pub traversed: Vec<(NodeId, Edge)>,
    pub seq: Vec<u8>,
    pub score: u32,
    pub touched_sink: bool,
}

impl Path {
    pub fn at_source() -> Self {
        Path {
            current_id: SOURCE_ID,
            current_sign: Sign::Plus,
            traversed: Vec::new(),
            seq: Vec::new(),
            score: 0,
            touched_sink: false,
        }
    }

    /// Extend this path by walking edge `e` out of `self.current_id`. `novel`
    /// marks whether `e` has never been returned by a previous call, which
    /// bumps the novelty score.
    pub fn extend(&self, g: &Graph, e: Edge, novel: bool) -> Path {
        let (_, dst_sign) = e.kind.signs();
        let dst_seq = g
            .get(e.dst_id)
            .map(|n| n.kmer().sequence_for(dst_sign))
            .unwrap_or_default();

        let mut seq = self.seq.clone();
        if self.current_id == SOURCE_ID {
            seq = dst_seq;
        } else if !dst_seq.is_empty() {
            // Two adjacent unitigs always overlap by exactly k-1 bases,
            // however long either one has grown through chain compression.
            let overlap = (g.k().saturating_sub(1)).min(dst_seq.len());
            seq.extend_from_slice(&dst_seq[overlap..]);
        }

        let mut traversed = self.traversed.clone();
        traversed.push((self.current_id, e));

        Path {
            current_id: e.dst_id,
            current_sign: dst_sign,
            traversed,
            seq,
            score: self.score + if novel { 1 } else { 0 },
            touched_sink: self.touched_sink,
        }
    }

    pub fn mark_sink_touched(&self) -> Path {
        let mut p = self.clone();
        p.touched_sink = true;
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::label::Label;
    use crate::kmer::{EdgeKind, Kmer};

    #[test]
    fn extending_from_source_takes_the_whole_destination_sequence() {
        let mut g = Graph::new(4);
        let a = Kmer::new(b"ACGT");
        let aid = g.upsert(a, Label::reference());
        let p = Path::at_source();
        let e = Edge::new(aid, EdgeKind::PlusPlus);
        let p2 = p.extend(&g, e, true);
        assert_eq!(p2.seq, b"ACGT");
        assert_eq!(p2.score, 1);
    }

    #[test]
    fn extending_between_real_nodes_appends_one_base_of_overlap() {
        let mut g = Graph::new(4);
        let a = Kmer::new(b"ACGT");
        let b = Kmer::new(b"CGTT");
        let aid = g.upsert(a, Label::reference());
        let bid = g.upsert(b, Label::reference());
        g.add_edge(aid, Edge::new(bid, EdgeKind::PlusPlus));

        let p = Path::at_source().extend(&g, Edge::new(aid, EdgeKind::PlusPlus), true);
        let p2 = p.extend(&g, Edge::new(bid, EdgeKind::PlusPlus), false);
        assert_eq!(p2.seq, b"ACGTT");
        assert_eq!(p2.score, 1);
    }
}
