use indexmap::IndexSet;

use crate::graph::edge::Edge;
use crate::graph::label::{Label, Sample};
use crate::kmer::{Kmer, NodeId, Sign};
use crate::stats::{harmonic_mean_weighted, OnlineStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Fwd,
    Rev,
}

/// Per-sample, per-strand read-support counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counts {
    normal_fwd: u32,
    normal_rev: u32,
    tumor_fwd: u32,
    tumor_rev: u32,
}

impl Counts {
    pub fn increment(&mut self, sample: Sample, strand: Strand) {
        match (sample, strand) {
            (Sample::Normal, Strand::Fwd) => self.normal_fwd += 1,
            (Sample::Normal, Strand::Rev) => self.normal_rev += 1,
            (Sample::Tumor, Strand::Fwd) => self.tumor_fwd += 1,
            (Sample::Tumor, Strand::Rev) => self.tumor_rev += 1,
        }
    }

    pub fn normal_total(&self) -> u32 {
        self.normal_fwd + self.normal_rev
    }

    pub fn tumor_total(&self) -> u32 {
        self.tumor_fwd + self.tumor_rev
    }

    pub fn total(&self) -> u32 {
        self.normal_total() + self.tumor_total()
    }

    /// Length-weighted harmonic-mean merge of two count sets, used when two
    /// nodes of (possibly different) k-length are compressed into a chain.
    pub fn merge_weighted(&self, self_len: usize, other: &Self, other_len: usize) -> Self {
        let (sw, ow) = (self_len as f64, other_len as f64);
        let hm = |a: u32, b: u32| harmonic_mean_weighted(a as f64, sw, b as f64, ow).round() as u32;
        Counts {
            normal_fwd: hm(self.normal_fwd, other.normal_fwd),
            normal_rev: hm(self.normal_rev, other.normal_rev),
            tumor_fwd: hm(self.tumor_fwd, other.tumor_fwd),
            tumor_rev: hm(self.tumor_rev, other.tumor_rev),
        }
    }
}

/// One vertex per distinct canonical k-mer encountered while threading reads
/// through the window.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kmer: Option<Kmer>,
    label: Label,
    edges: IndexSet<Edge>,
    counts: Counts,
    quality_profile: Vec<OnlineStats>,
    component_id: usize,
}

impl Node {
    pub fn new(kmer: Kmer, label: Label) -> Self {
        let k = kmer.len();
        let id = kmer.identifier();
        Node {
            id,
            kmer: Some(kmer),
            label,
            edges: IndexSet::new(),
            counts: Counts::default(),
            quality_profile: vec![OnlineStats::new(); k],
            component_id: 0,
        }
    }

    /// A mock anchor node (`SOURCE_ID`/`SINK_ID`): no sequence of its own,
    /// never contributes bases or quality to an assembled haplotype.
    pub fn new_mock(id: NodeId) -> Self {
        Node {
            id,
            kmer: None,
            label: Label::empty(),
            edges: IndexSet::new(),
            counts: Counts::default(),
            quality_profile: Vec::new(),
            component_id: 0,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.kmer.is_none()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kmer(&self) -> &Kmer {
        self.kmer.as_ref().expect("mock nodes have no kmer")
    }

    pub fn len(&self) -> usize {
        self.kmer.as_ref().map_or(0, Kmer::len)
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn add_label(&mut self, label: Label) {
        self.label |= label;
    }

    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    pub fn increment_support(&mut self, sample: Sample, strand: Strand) {
        self.counts.increment(sample, strand);
    }

    pub fn add_qualities(&mut self, quals: &[u8], ord: Sign) {
        debug_assert_eq!(quals.len(), self.quality_profile.len());
        match ord {
            Sign::Plus => {
                for (slot, &q) in self.quality_profile.iter_mut().zip(quals.iter()) {
                    slot.push(q as f64);
                }
            }
            Sign::Minus => {
                for (slot, &q) in self.quality_profile.iter_mut().zip(quals.iter().rev()) {
                    slot.push(q as f64);
                }
            }
        }
    }

    pub fn quality_profile(&self) -> &[OnlineStats] {
        &self.quality_profile
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn insert_edge(&mut self, edge: Edge) {
        self.edges.insert(edge);
    }

    pub fn remove_edge(&mut self, edge: &Edge) {
        self.edges.shift_remove(edge);
    }

    pub fn remove_all_edges(&mut self) {
        self.edges.clear();
    }

    /// Edges whose source sign equals `ord`: these are the edges usable when
    /// walking *out of* this node in orientation `ord`.
    pub fn edges_in_direction(&self, ord: Sign) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind.signs().0 == ord)
    }

    pub fn set_component_id(&mut self, id: usize) {
        self.component_id = id;
    }

    pub fn component_id(&self) -> usize {
        self.component_id
    }

    /// Merge `other` into `self` during linear chain compression: sequence
    /// concatenation is handled by the caller (it needs the connecting edge
    /// kind), this only folds labels/counts/quality profile.
    pub fn merge_annotations(&mut self, other: &Node) {
        self.label |= other.label;
        self.counts = self.counts.merge_weighted(self.len(), &other.counts, other.len());
        self.quality_profile.extend(other.quality_profile.iter().cloned());
    }
}
