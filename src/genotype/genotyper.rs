//! Read-vs-haplotype genotyping: align every read against
//! every candidate haplotype, attribute each read to its single best
//! haplotype, and tally ref/alt support per sample and strand. Identity
//! ranges come directly off `bio::alignment::pairwise`'s alignment
//! operations rather than a second aligner's CIGAR/CS-tag output.

use std::collections::HashMap;

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;

use crate::genotype::support::{Allele, VariantSupport};
use crate::graph::label::Sample;
use crate::graph::node::Strand;
use crate::reads::{ReadRecord, ReadStrand};
use crate::transcript::Variant;

/// A located candidate variant: its identity (contig, pos, alleles) plus, for
/// every haplotype it is present in, the `[start, end)` span of its allele
/// within that haplotype's own coordinates. Haplotype index 0 is always the
/// reference haplotype and uses `ref_span`; any other index is an alt
/// haplotype and uses the matching entry in `alt_spans`.
#[derive(Debug, Clone)]
pub struct LocatedVariant {
    pub variant: Variant,
    pub ref_span: (usize, usize),
    /// `hap_idx -> [start, end)` within that alt haplotype's sequence.
    pub alt_spans: HashMap<usize, (usize, usize)>,
}

/// One read's alignment against one haplotype.
#[derive(Debug, Clone)]
struct AlnInfo {
    hap_idx: usize,
    ref_start: usize,
    ref_end: usize,
    qry_start: usize,
    qry_end: usize,
    score: i32,
    identity: f64,
    /// Ranges, in lockstep, of exactly-matching bases: `(ref_range, qry_range)`.
    identity_ranges: Vec<((usize, usize), (usize, usize))>,
}

impl AlnInfo {
    fn covers_ref_span(&self, span: (usize, usize)) -> bool {
        self.identity_ranges.iter().any(|&(rref, _)| rref.0 <= span.0 && span.1 <= rref.1)
    }
}

fn score_fn(a: u8, b: u8) -> i32 {
    if a == b {
        1
    } else {
        -1
    }
}

/// Align `read` against `hap_seq` (haplotype `hap_idx`) with a short-read
/// tuned semi-global alignment (small gap penalties, since indels against a
/// locally-assembled haplotype should be rare and cheap to open).
fn align_read_to_haplotype(read_seq: &[u8], hap_idx: usize, hap_seq: &[u8]) -> AlnInfo {
    let mut aligner = Aligner::new(-5, -1, score_fn);
    let alignment = aligner.semiglobal(hap_seq, read_seq);

    let mut ref_idx = alignment.xstart;
    let mut qry_idx = alignment.ystart;
    let mut matched = 0usize;
    let mut aligned_cols = 0usize;
    let mut identity_ranges = Vec::new();
    let mut run: Option<(usize, usize)> = None; // (ref_start, qry_start) of current match run

    for op in &alignment.operations {
        match op {
            AlignmentOperation::Match => {
                if run.is_none() {
                    run = Some((ref_idx, qry_idx));
                }
                matched += 1;
                aligned_cols += 1;
                ref_idx += 1;
                qry_idx += 1;
            }
            AlignmentOperation::Subst => {
                if let Some((rstart, qstart)) = run.take() {
                    identity_ranges.push(((rstart, ref_idx), (qstart, qry_idx)));
                }
                aligned_cols += 1;
                ref_idx += 1;
                qry_idx += 1;
            }
            AlignmentOperation::Ins => {
                if let Some((rstart, qstart)) = run.take() {
                    identity_ranges.push(((rstart, ref_idx), (qstart, qry_idx)));
                }
                aligned_cols += 1;
                qry_idx += 1;
            }
            AlignmentOperation::Del => {
                if let Some((rstart, qstart)) = run.take() {
                    identity_ranges.push(((rstart, ref_idx), (qstart, qry_idx)));
                }
                aligned_cols += 1;
                ref_idx += 1;
            }
            AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => {}
        }
    }
    if let Some((rstart, qstart)) = run.take() {
        identity_ranges.push(((rstart, ref_idx), (qstart, qry_idx)));
    }

    let identity = if aligned_cols == 0 { 0.0 } else { matched as f64 / aligned_cols as f64 };
    AlnInfo {
        hap_idx,
        ref_start: alignment.xstart,
        ref_end: ref_idx,
        qry_start: alignment.ystart,
        qry_end: qry_idx,
        score: alignment.score,
        identity,
        identity_ranges,
    }
}

fn read_strand(read: &ReadRecord) -> Strand {
    match read.strand {
        ReadStrand::Fwd => Strand::Fwd,
        ReadStrand::Rev => Strand::Rev,
    }
}

/// `(sample, variant identity hash) -> VariantSupport`.
pub type SupportTable = HashMap<(Sample, u64), VariantSupport>;

/// One variant resolved for one read: which variant (by index into the
/// caller's `variants` slice), which allele, and the mean base quality over
/// the allele's aligned span.
struct Attribution {
    variant_idx: usize,
    allele: Allele,
    strand: Strand,
    qual: u8,
}

/// Align `read` against every haplotype, rank the alignments, and resolve
/// each variant to at most one allele call. Shared by [`genotype`] (ordinary
/// per-sample tally) and [`tenx_alt_tally`] (10X haplotype-tag tally), so
/// both see identical allele attribution.
fn attribute_read(read: &ReadRecord, haplotypes: &[Vec<u8>], variants: &[LocatedVariant]) -> Vec<Attribution> {
    let mut alns: Vec<AlnInfo> =
        haplotypes.iter().enumerate().map(|(idx, hap)| align_read_to_haplotype(&read.sequence, idx, hap)).collect();

    // identity desc, score desc, haplotype index desc (ties prefer ALT
    // over REF, since REF is always index 0).
    alns.sort_by(|a, b| {
        b.identity.partial_cmp(&a.identity).unwrap().then(b.score.cmp(&a.score)).then(b.hap_idx.cmp(&a.hap_idx))
    });

    let mut resolved: Vec<bool> = vec![false; variants.len()];
    let strand = read_strand(read);
    let mut out = Vec::new();

    for aln in &alns {
        for (vi, lv) in variants.iter().enumerate() {
            if resolved[vi] {
                continue;
            }
            let (span, allele) = if aln.hap_idx == 0 {
                (lv.ref_span, Allele::Ref)
            } else if let Some(&span) = lv.alt_spans.get(&aln.hap_idx) {
                (span, Allele::Alt)
            } else {
                continue;
            };
            if span.0 < aln.ref_start || span.1 > aln.ref_end {
                continue;
            }
            let confirmed = aln.covers_ref_span(span)
                || (span.1 - span.0 > read.sequence.len() && aln.qry_start == 0 && aln.qry_end == read.sequence.len());
            if !confirmed {
                continue;
            }
            let qual_span = allele_quality_span(aln, span);
            let qual = mean_quality(&read.base_quals, qual_span);
            out.push(Attribution { variant_idx: vi, allele, strand, qual });
            resolved[vi] = true;
        }
    }
    out
}

/// Genotype every read against every haplotype, returning per-(sample,
/// variant) evidence. `haplotypes[0]` must be the reference haplotype.
pub fn genotype(reads: &[ReadRecord], haplotypes: &[Vec<u8>], variants: &[LocatedVariant]) -> SupportTable {
    let mut table: SupportTable = HashMap::new();
    for read in reads {
        for a in attribute_read(read, haplotypes, variants) {
            let id = variants[a.variant_idx].variant.identity_hash();
            let entry = table.entry((read.sample, id)).or_insert_with(VariantSupport::new);
            entry.add_evidence(&read.name, a.allele, a.strand, a.qual);
        }
    }
    table
}

/// `variant identity hash -> (HP1 alt count, HP2 alt count)`, tallied over
/// tumor reads carrying a `HP` tag of `1` or `2`. Reads with no `HP` tag, or
/// a tag outside `{1, 2}`, don't contribute (they fall under "unassigned",
/// which the VCF writer reports as a fixed `0` column rather than folding
/// it in here).
pub type HpTally = HashMap<u64, (u32, u32)>;

/// 10X linked-read mode (only meaningful when both inputs carry `HP`/`BX`
/// tags): tally tumor reads by their sequencing-phase `HP` tag, independent
/// of which graph haplotype the read aligned to, restricted to `allele`.
fn tenx_tally(tumor_reads: &[(ReadRecord, Option<i64>)], haplotypes: &[Vec<u8>], variants: &[LocatedVariant], allele: Allele) -> HpTally {
    let mut tally: HpTally = HashMap::new();
    for (read, hp) in tumor_reads {
        let Some(hp) = hp else { continue };
        if *hp != 1 && *hp != 2 {
            continue;
        }
        for a in attribute_read(read, haplotypes, variants) {
            if a.allele != allele {
                continue;
            }
            let id = variants[a.variant_idx].variant.identity_hash();
            let entry = tally.entry(id).or_insert((0, 0));
            if *hp == 1 {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }
    tally
}

/// ALT-supporting tumor reads by haplotype tag (VCF `HPA`).
pub fn tenx_alt_tally(tumor_reads: &[(ReadRecord, Option<i64>)], haplotypes: &[Vec<u8>], variants: &[LocatedVariant]) -> HpTally {
    tenx_tally(tumor_reads, haplotypes, variants, Allele::Alt)
}

/// REF-supporting tumor reads by haplotype tag (VCF `HPR`).
pub fn tenx_ref_tally(tumor_reads: &[(ReadRecord, Option<i64>)], haplotypes: &[Vec<u8>], variants: &[LocatedVariant]) -> HpTally {
    tenx_tally(tumor_reads, haplotypes, variants, Allele::Ref)
}

/// Map a `[ref_start, ref_end)` allele span to the read's query coordinates
/// via the covering identity range's offset, so the mean base quality is
/// taken over the actually-aligned bases.
fn allele_quality_span(aln: &AlnInfo, ref_span: (usize, usize)) -> (usize, usize) {
    for &(rref, qry) in &aln.identity_ranges {
        if rref.0 <= ref_span.0 && ref_span.1 <= rref.1 {
            let offset_start = ref_span.0 - rref.0;
            let offset_end = ref_span.1 - rref.0;
            return (qry.0 + offset_start, qry.0 + offset_end);
        }
    }
    (aln.qry_start, aln.qry_end)
}

fn mean_quality(quals: &[u8], span: (usize, usize)) -> u8 {
    let (lo, hi) = (span.0.min(quals.len()), span.1.min(quals.len()));
    if hi <= lo {
        return 0;
    }
    let sum: u64 = quals[lo..hi].iter().map(|&q| q as u64).sum();
    (sum as f64 / (hi - lo) as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::VariantKind;

    fn read(sample: Sample, name: &str, seq: &[u8]) -> ReadRecord {
        ReadRecord {
            sample,
            name: name.to_string(),
            contig_idx: 0,
            start0: 0,
            strand: ReadStrand::Fwd,
            map_qual: 60,
            sequence: seq.to_vec(),
            base_quals: vec![30; seq.len()],
        }
    }

    fn snv_variant(pos0: u64, alt_span: (usize, usize)) -> Variant {
        Variant {
            contig_idx: 0,
            pos0,
            ref_allele: vec![b'A'],
            alt_allele: vec![b'G'],
            kind: VariantKind::Snv,
            anchor_base: None,
            str_annotation: None,
            alt_span,
        }
    }

    #[test]
    fn ref_read_supports_ref_allele() {
        let ref_hap = b"ACGTACGTACGTACGTACGT".to_vec();
        let mut alt_hap = ref_hap.clone();
        alt_hap[10] = b'G';
        let variant = snv_variant(10, (10, 11));
        let located = LocatedVariant { variant, ref_span: (10, 11), alt_spans: [(1, (10, 11))].into_iter().collect() };

        let reads = vec![read(Sample::Normal, "r1", &ref_hap)];
        let table = genotype(&reads, &[ref_hap.clone(), alt_hap], &[located]);
        let support = table.values().next().expect("one variant tracked");
        assert_eq!(support.total_ref(), 1);
        assert_eq!(support.total_alt(), 0);
    }

    #[test]
    fn alt_read_supports_alt_allele() {
        let ref_hap = b"ACGTACGTACGTACGTACGT".to_vec();
        let mut alt_hap = ref_hap.clone();
        alt_hap[10] = b'G';
        let variant = snv_variant(10, (10, 11));
        let located = LocatedVariant { variant, ref_span: (10, 11), alt_spans: [(1, (10, 11))].into_iter().collect() };

        let reads = vec![read(Sample::Tumor, "t1", &alt_hap)];
        let table = genotype(&reads, &[ref_hap, alt_hap], &[located]);
        let support = table.values().next().expect("one variant tracked");
        assert_eq!(support.total_alt(), 1);
        assert_eq!(support.total_ref(), 0);
    }

    #[test]
    fn genotyping_is_idempotent() {
        let ref_hap = b"ACGTACGTACGTACGTACGT".to_vec();
        let mut alt_hap = ref_hap.clone();
        alt_hap[10] = b'G';
        let variant = snv_variant(10, (10, 11));
        let located = LocatedVariant { variant, ref_span: (10, 11), alt_spans: [(1, (10, 11))].into_iter().collect() };
        let reads = vec![read(Sample::Tumor, "t1", &alt_hap), read(Sample::Normal, "n1", &ref_hap)];

        let haps = vec![ref_hap, alt_hap];
        let t1 = genotype(&reads, &haps, &[located.clone()]);
        let t2 = genotype(&reads, &haps, &[located]);
        for ((sample, vid), s1) in &t1 {
            let s2 = t2.get(&(*sample, *vid)).unwrap();
            assert_eq!(s1.total_ref(), s2.total_ref());
            assert_eq!(s1.total_alt(), s2.total_alt());
        }
    }
}
