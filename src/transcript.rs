//! Transcript extraction: align each candidate haplotype
//! against the window's reference haplotype and walk the alignment into a
//! list of variant transcripts, annotated with any nearby short tandem
//! repeat.

use std::hash::{Hash, Hasher};

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use fxhash::FxHasher;

use crate::params::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Snv,
    Mnp,
    Ins,
    Del,
    Complex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrAnnotation {
    pub unit: Vec<u8>,
    pub copies: usize,
}

impl StrAnnotation {
    pub fn total_len(&self) -> usize {
        self.unit.len() * self.copies
    }
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub contig_idx: usize,
    /// 0-based position of the first reference base the transcript touches.
    pub pos0: u64,
    pub ref_allele: Vec<u8>,
    pub alt_allele: Vec<u8>,
    pub kind: VariantKind,
    /// The reference base immediately before the transcript, carried for
    /// VCF anchor-base emission on non-SNV records.
    pub anchor_base: Option<u8>,
    pub str_annotation: Option<StrAnnotation>,
    /// `[start, end)` span of the alt allele within the alt haplotype this
    /// transcript was extracted from. Used by the genotyper to locate the
    /// allele inside that specific haplotype's own coordinates; the span
    /// within the *reference* haplotype is `pos0 - window_start0 ..
    /// + ref_allele.len()` and doesn't need separate bookkeeping.
    pub alt_span: (usize, usize),
}

impl Variant {
    /// Fixed-seed, non-cryptographic identity hash used for deduplication in
    /// the variant store.
    pub fn identity_hash(&self) -> u64 {
        let mut h = FxHasher::default();
        self.contig_idx.hash(&mut h);
        self.pos0.hash(&mut h);
        self.ref_allele.hash(&mut h);
        self.alt_allele.hash(&mut h);
        h.finish()
    }

    /// `[start, end)` span of the ref allele within the reference haplotype,
    /// given the window's genome start offset.
    pub fn ref_span(&self, window_start0: u64) -> (usize, usize) {
        let start = (self.pos0 - window_start0) as usize;
        (start, start + self.ref_allele.len())
    }
}

struct OpenTranscript {
    start_ref_idx: usize,
    start_alt_idx: usize,
    ref_bytes: Vec<u8>,
    alt_bytes: Vec<u8>,
    kind: VariantKind,
    anchor_base: Option<u8>,
}

pub struct TranscriptExtractor;

impl TranscriptExtractor {
    /// Align `alt_hap` against `ref_hap` and return the variant transcripts
    /// implied by the alignment, with `genome_pos` anchored at
    /// `window_start0` on contig `contig_idx`.
    pub fn extract(
        ref_hap: &[u8],
        alt_hap: &[u8],
        contig_idx: usize,
        window_start0: u64,
        params: &Params,
    ) -> Vec<Variant> {
        if ref_hap == alt_hap {
            return Vec::new();
        }
        let score = |a: u8, b: u8| if a == b { 2i32 } else { -4i32 };
        let mut aligner = Aligner::new(-8, -1, &score);
        let alignment = aligner.semiglobal(ref_hap, alt_hap);

        let mut ref_idx = alignment.xstart;
        let mut alt_idx = alignment.ystart;
        let mut open: Option<OpenTranscript> = None;
        let mut variants = Vec::new();

        let prev_ref_base = |idx: usize| if idx > 0 { Some(ref_hap[idx - 1]) } else { None };

        for op in &alignment.operations {
            match op {
                AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => {}
                AlignmentOperation::Match => {
                    if let Some(t) = open.take() {
                        close_transcript(t, contig_idx, window_start0, params, &mut variants);
                    }
                    ref_idx += 1;
                    alt_idx += 1;
                }
                AlignmentOperation::Subst => {
                    let rb = ref_hap[ref_idx];
                    let ab = alt_hap[alt_idx];
                    match open.as_mut() {
                        Some(t) if t.kind == VariantKind::Snv && t.ref_bytes.len() == t.alt_bytes.len() => {
                            t.kind = VariantKind::Mnp;
                            t.ref_bytes.push(rb);
                            t.alt_bytes.push(ab);
                        }
                        Some(t) if t.kind == VariantKind::Mnp => {
                            t.ref_bytes.push(rb);
                            t.alt_bytes.push(ab);
                        }
                        Some(t) => {
                            t.kind = VariantKind::Complex;
                            t.ref_bytes.push(rb);
                            t.alt_bytes.push(ab);
                        }
                        None => {
                            open = Some(OpenTranscript {
                                start_ref_idx: ref_idx,
                                start_alt_idx: alt_idx,
                                ref_bytes: vec![rb],
                                alt_bytes: vec![ab],
                                kind: VariantKind::Snv,
                                anchor_base: prev_ref_base(ref_idx),
                            });
                        }
                    }
                    ref_idx += 1;
                    alt_idx += 1;
                }
                AlignmentOperation::Ins => {
                    let ab = alt_hap[alt_idx];
                    match open.as_mut() {
                        Some(t) if t.kind == VariantKind::Ins => t.alt_bytes.push(ab),
                        Some(t) => {
                            t.kind = VariantKind::Complex;
                            t.alt_bytes.push(ab);
                        }
                        None => {
                            open = Some(OpenTranscript {
                                start_ref_idx: ref_idx,
                                start_alt_idx: alt_idx,
                                ref_bytes: Vec::new(),
                                alt_bytes: vec![ab],
                                kind: VariantKind::Ins,
                                anchor_base: prev_ref_base(ref_idx),
                            });
                        }
                    }
                    alt_idx += 1;
                }
                AlignmentOperation::Del => {
                    let rb = ref_hap[ref_idx];
                    match open.as_mut() {
                        Some(t) if t.kind == VariantKind::Del => t.ref_bytes.push(rb),
                        Some(t) => {
                            t.kind = VariantKind::Complex;
                            t.ref_bytes.push(rb);
                        }
                        None => {
                            open = Some(OpenTranscript {
                                start_ref_idx: ref_idx,
                                start_alt_idx: alt_idx,
                                ref_bytes: vec![rb],
                                alt_bytes: Vec::new(),
                                kind: VariantKind::Del,
                                anchor_base: prev_ref_base(ref_idx),
                            });
                        }
                    }
                    ref_idx += 1;
                }
            }
        }
        if let Some(t) = open.take() {
            close_transcript(t, contig_idx, window_start0, params, &mut variants);
        }

        for v in variants.iter_mut() {
            let lo = (v.pos0 as usize).saturating_sub(window_start0 as usize);
            let hi = lo + v.ref_allele.len().max(1);
            v.str_annotation = find_str_annotation(ref_hap, lo, hi, params);
        }

        variants
    }
}

fn close_transcript(
    t: OpenTranscript,
    contig_idx: usize,
    window_start0: u64,
    params: &Params,
    out: &mut Vec<Variant>,
) {
    let len_diff = (t.alt_bytes.len() as i64 - t.ref_bytes.len() as i64).unsigned_abs() as usize;
    if len_diff > params.max_indel_length {
        return;
    }
    let alt_span = (t.start_alt_idx, t.start_alt_idx + t.alt_bytes.len());
    out.push(Variant {
        contig_idx,
        pos0: window_start0 + t.start_ref_idx as u64,
        ref_allele: t.ref_bytes,
        alt_allele: t.alt_bytes,
        kind: t.kind,
        anchor_base: t.anchor_base,
        str_annotation: None,
        alt_span,
    });
}

/// Scan `±max_str_dist` bases around `[lo, hi)` in `ref_hap` for a tandem
/// repeat with unit length in `1..=max_str_unit_length`, at least
/// `min_str_units` copies, and total length at least `min_str_length`.
fn find_str_annotation(ref_hap: &[u8], lo: usize, hi: usize, params: &Params) -> Option<StrAnnotation> {
    let search_lo = lo.saturating_sub(params.max_str_dist);
    let search_hi = (hi + params.max_str_dist).min(ref_hap.len());
    let mut best: Option<StrAnnotation> = None;

    for unit_len in 1..=params.max_str_unit_length {
        if unit_len == 0 || search_lo + unit_len > search_hi {
            continue;
        }
        let mut pos = search_lo;
        while pos + unit_len <= search_hi {
            let unit = &ref_hap[pos..pos + unit_len];
            let mut copies = 1usize;
            let mut p = pos + unit_len;
            while p + unit_len <= search_hi && &ref_hap[p..p + unit_len] == unit {
                copies += 1;
                p += unit_len;
            }
            let total_len = copies * unit_len;
            if copies >= params.min_str_units && total_len >= params.min_str_length {
                let is_better = best.as_ref().map_or(true, |b| total_len > b.total_len());
                if is_better {
                    best = Some(StrAnnotation { unit: unit.to_vec(), copies });
                }
            }
            pos += 1;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_base_substitution_is_an_snv() {
        let params = Params::default();
        let ref_hap = b"ACGTACGTACGT";
        let alt_hap = b"ACGTAGGTACGT"; // position 5 C->G
        let variants = TranscriptExtractor::extract(ref_hap, alt_hap, 0, 1000, &params);
        assert_eq!(variants.len(), 1);
        let v = &variants[0];
        assert_eq!(v.kind, VariantKind::Snv);
        assert_eq!(v.ref_allele, b"C");
        assert_eq!(v.alt_allele, b"G");
        assert_eq!(v.pos0, 1005);
    }

    #[test]
    fn identical_haplotypes_yield_no_variants() {
        let params = Params::default();
        let seq = b"ACGTACGTACGT";
        assert!(TranscriptExtractor::extract(seq, seq, 0, 0, &params).is_empty());
    }

    #[test]
    fn single_base_deletion_is_del() {
        let params = Params::default();
        let ref_hap = b"ACGTACGTACGTACGT";
        let alt_hap = b"ACGTACGTCGTACGT"; // drop one base around the middle
        let variants = TranscriptExtractor::extract(ref_hap, alt_hap, 0, 0, &params);
        assert!(!variants.is_empty());
        assert!(variants.iter().any(|v| v.kind == VariantKind::Del || v.kind == VariantKind::Complex));
    }

    #[test]
    fn str_annotation_finds_dinucleotide_repeat() {
        let params = Params::default();
        let ref_hap = b"GGGGATATATATATGGGG";
        let ann = find_str_annotation(ref_hap, 4, 14, &params).expect("repeat expected");
        assert_eq!(ann.unit.len(), 2);
        assert!(ann.copies >= 3);
    }
}
