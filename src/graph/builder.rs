//! Graph construction: choose the smallest viable k, thread
//! every read through the graph, then mark reference-backed nodes/edges.

use std::collections::HashSet;

use crate::graph::edge::Edge;
use crate::graph::label::{Label, Sample};
use crate::graph::node::Strand as NodeStrand;
use crate::graph::{Graph, SINK_ID, SOURCE_ID};
use crate::kmer::{has_exact_or_approx_repeat, EdgeKind, Kmer, Sign};
use crate::params::Params;
use crate::reads::{ReadRecord, ReadStrand};

/// Smallest k in `[min_k, max_k]` (stepping by 2) for which the reference
/// window has no exact or approximate repeated k-mer. `None` if every
/// candidate is repeat-heavy (no k could be chosen).
pub fn choose_k(ref_seq: &[u8], min_k: usize, max_k: usize, max_rpt_mismatch: usize) -> Option<usize> {
    let mut k = min_k;
    while k <= max_k {
        if !has_exact_or_approx_repeat(ref_seq, k, max_rpt_mismatch) {
            return Some(k);
        }
        k += 2;
    }
    None
}

fn node_strand(sign: Sign, read_strand: ReadStrand) -> NodeStrand {
    // The node's own strand counters track the *sample's* forward/reverse
    // contribution; a read's reported strand combines with whether its
    // k-mer landed in the node's canonical (Plus) or flipped (Minus)
    // orientation.
    match (read_strand, sign) {
        (ReadStrand::Fwd, Sign::Plus) | (ReadStrand::Rev, Sign::Minus) => NodeStrand::Fwd,
        (ReadStrand::Fwd, Sign::Minus) | (ReadStrand::Rev, Sign::Plus) => NodeStrand::Rev,
    }
}

/// Thread every read's consecutive k-mer pairs into the graph, then mark
/// which existing nodes/edges are also present in the reference.
pub fn build_graph(k: usize, ref_seq: &[u8], reads: &[ReadRecord], _params: &Params) -> Graph {
    let mut g = Graph::new(k);
    add_sample_nodes(&mut g, reads);
    mark_reference(&mut g, ref_seq, k);
    // Mock anchors: created empty here: anchor-finding (post prune/compress)
    // wires their edges to the surviving reference anchors (graph::pruner).
    g.upsert_mock(SOURCE_ID);
    g.upsert_mock(SINK_ID);
    g
}

fn add_sample_nodes(g: &mut Graph, reads: &[ReadRecord]) {
    let mut seen_mate_mers: HashSet<(String, Sample, u64)> = HashSet::new();

    for read in reads {
        let k = g.k();
        if read.sequence.len() < k {
            continue;
        }
        let kmers: Vec<Kmer> = read.sequence.windows(k).map(Kmer::new).collect();
        let ids: Vec<u64> = kmers.iter().map(|m| m.identifier()).collect();
        let qual_windows: Vec<&[u8]> = read.base_quals.windows(k).collect();

        for kmer in kmers.into_iter() {
            g.upsert(kmer, Label::for_sample(read.sample));
        }

        if ids.len() < 2 {
            continue;
        }

        for idx in 0..ids.len() - 1 {
            let (id0, id1) = (ids[idx], ids[idx + 1]);
            let (sign0, sign1) = {
                let n0 = g.get(id0).expect("node just inserted");
                let n1 = g.get(id1).expect("node just inserted");
                (n0.kmer().sign(), n1.kmer().sign())
            };
            let kind = EdgeKind::from_sign_pair(sign0, sign1);
            g.add_edge(id0, Edge::new(id1, kind));

            // Credit read support to exactly one of the pair's two nodes:
            // the leading kmer on the first pair, the trailing kmer on
            // every subsequent pair, so each read contributes once per
            // distinct node along its walk.
            let curr_id = if idx == 0 { id0 } else { id1 };
            let curr_qual_idx = if idx == 0 { idx } else { idx + 1 };

            let curr_sign = g.get(curr_id).unwrap().kmer().sign();
            let node_strand = node_strand(curr_sign, read.strand);

            let mm_key = (read.name.clone(), read.sample, curr_id);
            let is_new = seen_mate_mers.insert(mm_key);

            let node = g.get_mut(curr_id).unwrap();
            node.add_qualities(qual_windows[curr_qual_idx], curr_sign);
            if is_new {
                node.increment_support(read.sample, node_strand);
            }
        }
    }
}

fn mark_reference(g: &mut Graph, ref_seq: &[u8], k: usize) {
    let mut ref_order = Vec::new();
    let mut push_if_present = |g: &Graph, id: u64, order: &mut Vec<u64>| {
        if g.contains(id) && order.last() != Some(&id) {
            order.push(id);
        }
    };

    if ref_seq.len() < k {
        g.set_ref_order(ref_order);
        return;
    }
    let ref_kmers: Vec<Kmer> = ref_seq.windows(k).map(Kmer::new).collect();
    let ref_ids: Vec<u64> = ref_kmers.iter().map(|m| m.identifier()).collect();

    if ref_ids.len() < 2 {
        if let Some(&only) = ref_ids.first() {
            if let Some(n) = g.get_mut(only) {
                n.add_label(Label::reference());
            }
            push_if_present(g, only, &mut ref_order);
        }
        g.set_ref_order(ref_order);
        return;
    }

    for idx in 0..ref_ids.len() - 1 {
        let (id0, id1) = (ref_ids[idx], ref_ids[idx + 1]);
        let found0 = g.contains(id0);
        let found1 = g.contains(id1);

        if found0 {
            g.get_mut(id0).unwrap().add_label(Label::reference());
        }
        if found1 {
            g.get_mut(id1).unwrap().add_label(Label::reference());
        }
        if found0 && found1 {
            let (sign0, sign1) = (g.get(id0).unwrap().kmer().sign(), g.get(id1).unwrap().kmer().sign());
            let kind = EdgeKind::from_sign_pair(sign0, sign1);
            g.add_edge(id0, Edge::new(id1, kind));
        }
        push_if_present(g, id0, &mut ref_order);
        if idx == ref_ids.len() - 2 {
            push_if_present(g, id1, &mut ref_order);
        }
    }
    g.set_ref_order(ref_order);
}
