//! Canonical k-mers: a k-mer is represented by whichever of `seq` and its
//! reverse complement is lexicographically smaller, tagged with a sign that
//! records which orientation that was. Two reads that cross the same genomic
//! position from opposite strands therefore land on the same graph node.

use std::hash::{Hash, Hasher};

use fxhash::FxHasher;

/// Which of the two k-mer orientations a node/edge refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    /// The default (canonical) sequence equals the sequence as seen in the
    /// source read's original orientation.
    Plus,
    /// The default sequence is the reverse complement of the source read's
    /// orientation.
    Minus,
}

impl Sign {
    pub fn rev(self) -> Sign {
        match self {
            Sign::Plus => Sign::Minus,
            Sign::Minus => Sign::Plus,
        }
    }
}

/// The four ways two canonical k-mers can be connected by an observed
/// adjacency in a read or the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    PlusPlus,
    PlusMinus,
    MinusPlus,
    MinusMinus,
}

impl EdgeKind {
    /// `rev(++) = --, rev(--) = ++, rev(+-) = +-, rev(-+) = -+`.
    pub fn rev(self) -> EdgeKind {
        match self {
            EdgeKind::PlusPlus => EdgeKind::MinusMinus,
            EdgeKind::MinusMinus => EdgeKind::PlusPlus,
            EdgeKind::PlusMinus => EdgeKind::PlusMinus,
            EdgeKind::MinusPlus => EdgeKind::MinusPlus,
        }
    }

    pub fn from_sign_pair(src: Sign, dst: Sign) -> EdgeKind {
        match (src, dst) {
            (Sign::Plus, Sign::Plus) => EdgeKind::PlusPlus,
            (Sign::Plus, Sign::Minus) => EdgeKind::PlusMinus,
            (Sign::Minus, Sign::Plus) => EdgeKind::MinusPlus,
            (Sign::Minus, Sign::Minus) => EdgeKind::MinusMinus,
        }
    }

    pub fn signs(self) -> (Sign, Sign) {
        match self {
            EdgeKind::PlusPlus => (Sign::Plus, Sign::Plus),
            EdgeKind::PlusMinus => (Sign::Plus, Sign::Minus),
            EdgeKind::MinusPlus => (Sign::Minus, Sign::Plus),
            EdgeKind::MinusMinus => (Sign::Minus, Sign::Minus),
        }
    }

    /// A self-loop using `+-` or `-+` mirrors onto itself: the mirror edge
    /// computed from `rev(kind)` with src/dst swapped is identical to the
    /// original, so it must be stored only once.
    pub fn is_self_mirroring(self) -> bool {
        matches!(self, EdgeKind::PlusMinus | EdgeKind::MinusPlus)
    }
}

pub type NodeId = u64;

/// A canonicalised, fixed-length sequence window.
#[derive(Debug, Clone)]
pub struct Kmer {
    default_seq: Vec<u8>,
    sign: Sign,
    identifier: NodeId,
}

fn complement_base(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => b'N',
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

fn hash_seq(seq: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    seq.hash(&mut hasher);
    hasher.finish()
}

impl Kmer {
    /// Build the canonical representation of `seq`: whichever of `seq` and
    /// its reverse complement sorts first becomes `default_seq`, and `sign`
    /// records whether that was the sequence as given (`Plus`) or its
    /// reverse complement (`Minus`).
    pub fn new(seq: &[u8]) -> Self {
        let rc = reverse_complement(seq);
        let (default_seq, sign) = if seq <= rc.as_slice() {
            (seq.to_vec(), Sign::Plus)
        } else {
            (rc, Sign::Minus)
        };
        let identifier = hash_seq(&default_seq);
        Kmer { default_seq, sign, identifier }
    }

    pub fn len(&self) -> usize {
        self.default_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.default_seq.is_empty()
    }

    pub fn default_seq(&self) -> &[u8] {
        &self.default_seq
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn identifier(&self) -> NodeId {
        self.identifier
    }

    /// Sequence as it should be read when walking an edge whose source/dest
    /// sign is `ord`: `Plus` reproduces `default_seq` as-is, `Minus` returns
    /// its reverse complement.
    pub fn sequence_for(&self, ord: Sign) -> Vec<u8> {
        match ord {
            Sign::Plus => self.default_seq.clone(),
            Sign::Minus => reverse_complement(&self.default_seq),
        }
    }
}

impl PartialEq for Kmer {
    fn eq(&self, other: &Self) -> bool {
        self.default_seq == other.default_seq
    }
}
impl Eq for Kmer {}

impl Hash for Kmer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.default_seq.hash(state);
    }
}

/// Hamming distance between `a` and `b` of equal length, capped at
/// `max_distance + 1` for an early return (`None` once the cap is exceeded).
pub fn hamming_distance_capped(a: &[u8], b: &[u8], max_distance: usize) -> Option<usize> {
    debug_assert_eq!(a.len(), b.len());
    let mut dist = 0usize;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if x != y {
            dist += 1;
            if dist > max_distance {
                return None;
            }
        }
    }
    Some(dist)
}

/// Scan `seq` for an exact repeated k-mer, or two k-mers within Hamming
/// distance `max_mismatch`, at window length `k`. Used to decide whether a
/// candidate k is viable for a reference window.
pub fn has_exact_or_approx_repeat(seq: &[u8], k: usize, max_mismatch: usize) -> bool {
    if seq.len() < k {
        return false;
    }
    let windows: Vec<&[u8]> = seq.windows(k).collect();
    for i in 0..windows.len() {
        for j in (i + 1)..windows.len() {
            if max_mismatch == 0 {
                if windows[i] == windows[j] {
                    return true;
                }
            } else if hamming_distance_capped(windows[i], windows[j], max_mismatch).is_some() {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalisation_is_orientation_invariant() {
        let s = b"ACGTACGT";
        let rc = reverse_complement(s);
        let k1 = Kmer::new(s);
        let k2 = Kmer::new(&rc);
        assert_eq!(k1.identifier(), k2.identifier());
        assert_eq!(k1.default_seq(), k2.default_seq());

        let expected_default = std::cmp::min(s.to_vec(), rc.clone());
        assert_eq!(k1.default_seq(), expected_default.as_slice());
    }

    #[test]
    fn palindromic_kmer_is_its_own_complement() {
        let s = b"ACGT";
        assert_eq!(reverse_complement(s), s);
        let k = Kmer::new(s);
        assert_eq!(k.sign(), Sign::Plus);
    }

    #[test]
    fn edge_kind_reversal_matches_spec_table() {
        assert_eq!(EdgeKind::PlusPlus.rev(), EdgeKind::MinusMinus);
        assert_eq!(EdgeKind::MinusMinus.rev(), EdgeKind::PlusPlus);
        assert_eq!(EdgeKind::PlusMinus.rev(), EdgeKind::PlusMinus);
        assert_eq!(EdgeKind::MinusPlus.rev(), EdgeKind::MinusPlus);
    }

    #[test]
    fn self_mirroring_only_for_mixed_sign_kinds() {
        assert!(EdgeKind::PlusMinus.is_self_mirroring());
        assert!(EdgeKind::MinusPlus.is_self_mirroring());
        assert!(!EdgeKind::PlusPlus.is_self_mirroring());
        assert!(!EdgeKind::MinusMinus.is_self_mirroring());
    }

    #[test]
    fn exact_repeat_detection() {
        assert!(has_exact_or_approx_repeat(b"AAAAAAAAAA", 4, 0));
        assert!(!has_exact_or_approx_repeat(b"ACGTACGTAC", 8, 0));
    }

    #[test]
    fn approx_repeat_within_mismatch_budget() {
        // "AAAA" and "AAAG" differ by 1 base.
        assert!(has_exact_or_approx_repeat(b"AAAAGAAAG", 4, 1));
        assert!(!has_exact_or_approx_repeat(b"AAAAGAAAG", 4, 0));
    }
}
