use crate::kmer::{EdgeKind, NodeId};

/// A directed adjacency between two nodes. Every non-self edge is stored
/// twice, once on each endpoint, with the destination endpoint holding the
/// mirrored (reversed) edge kind — see [`Edge::mirror`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub dst_id: NodeId,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(dst_id: NodeId, kind: EdgeKind) -> Self {
        Edge { dst_id, kind }
    }

    /// The mirror of this edge as seen from `dst_id`'s side: it points back
    /// at `src_id` with the reversed edge kind.
    pub fn mirror(&self, src_id: NodeId) -> Edge {
        Edge { dst_id: src_id, kind: self.kind.rev() }
    }
}
