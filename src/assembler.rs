//! Per-window orchestration: fetch reference and reads, assemble the
//! coloured de Bruijn graph, enumerate candidate haplotypes, extract
//! transcripts, genotype both samples against them, and assemble the
//! resulting variant calls. One call to [`assemble_window`] is the unit of
//! work a scheduler worker hands off per window.

use std::collections::HashMap;

use crate::bam::ReadTags;
use crate::call::variant_call::{self, VariantCall};
use crate::genotype::genotyper::{self, LocatedVariant};
use crate::graph::builder::build_graph;
use crate::graph::label::Sample;
use crate::graph::pathenum::{reference_haplotype, PathEnumerator};
use crate::graph::pruner::{has_cycle, prune_and_compress};
use crate::kmer::has_exact_or_approx_repeat;
use crate::params::Params;
use crate::reads::ReadRecord;
use crate::transcript::TranscriptExtractor;
use crate::windowing::Window;

/// Bound on the number of distinct alt haplotypes pulled out of one window,
/// the "small constant to bound CPU" the path enumerator is allowed.
const MAX_HAPLOTYPES: usize = 8;

/// Everything a worker needs to assemble one window, borrowed for the
/// duration of the call.
pub struct WindowInput<'a> {
    pub window: &'a Window,
    pub ref_seq: &'a [u8],
    pub normal_reads: &'a [(ReadRecord, ReadTags)],
    pub tumor_reads: &'a [(ReadRecord, ReadTags)],
}

/// Run the full window pipeline, returning `(variant identity hash,
/// VariantCall)` pairs ready for the variant store. An inactive window (no
/// evidence of mismatch/indel activity), a window with no repeat-free `k`,
/// or one with no viable source/sink anchor all return an empty vector
/// rather than an error: these are expected outcomes, not failures.
pub fn assemble_window(input: &WindowInput, params: &Params) -> Vec<(u64, VariantCall)> {
    if !params.active_region_off && !window_is_active(&input.normal_reads, &input.tumor_reads, params) {
        return Vec::new();
    }

    let all_reads: Vec<ReadRecord> = input
        .normal_reads
        .iter()
        .chain(input.tumor_reads.iter())
        .map(|(r, _)| r.clone())
        .collect();

    let Some((g, k)) = build_best_graph(input.ref_seq, &all_reads, params) else {
        return Vec::new();
    };

    let ref_hap = reference_haplotype(&g);
    let alt_haps = enumerate_alt_haplotypes(&g, ref_hap.len(), params);

    let mut haplotypes = vec![ref_hap];
    haplotypes.extend(alt_haps);

    let located = locate_variants(&haplotypes, input.window, params);
    if located.is_empty() {
        return Vec::new();
    }

    let support = genotyper::genotype(&all_reads, &haplotypes, &located);

    let (hp_alt_tally, hp_ref_tally) = if params.tenx_mode && tenx_tags_present(input.tumor_reads) {
        let tagged: Vec<(ReadRecord, Option<i64>)> =
            input.tumor_reads.iter().map(|(r, t)| (r.clone(), t.haplotype)).collect();
        (Some(genotyper::tenx_alt_tally(&tagged, &haplotypes, &located)), Some(genotyper::tenx_ref_tally(&tagged, &haplotypes, &located)))
    } else {
        (None, None)
    };

    let mut out = Vec::new();
    for lv in &located {
        let id = lv.variant.identity_hash();
        let normal = support.get(&(Sample::Normal, id)).cloned().unwrap_or_default();
        let tumor = support.get(&(Sample::Tumor, id)).cloned().unwrap_or_default();
        let hp_alt = hp_alt_tally.as_ref().and_then(|t| t.get(&id).copied());
        let hp_ref = hp_ref_tally.as_ref().and_then(|t| t.get(&id).copied());
        let multi_hp = hp_alt.is_some_and(|(hp1, hp2)| hp1 > 0 && hp2 > 0);

        if let Some(call) = variant_call::build_call(&lv.variant, k, &normal, &tumor, params, multi_hp, hp_alt, hp_ref) {
            out.push((id, call));
        }
    }
    out
}

/// Choose the smallest viable `k`, rebuilding and re-pruning as needed until
/// pruning finds anchors and the surviving component has no cycle, per
/// retrying at the next odd k when pruning fails.
fn build_best_graph(ref_seq: &[u8], reads: &[ReadRecord], params: &Params) -> Option<(crate::graph::Graph, usize)> {
    let avg_cov = average_window_coverage(reads, ref_seq.len() as u64);
    let mut k = params.min_kmer_size;
    while k <= params.max_kmer_size {
        if has_exact_or_approx_repeat(ref_seq, k, params.max_rpt_mismatch) {
            k += 2;
            continue;
        }
        let mut g = build_graph(k, ref_seq, reads, params);
        match prune_and_compress(&mut g, params, avg_cov) {
            Some(_anchors) if !has_cycle(&g) => return Some((g, k)),
            _ => {
                k += 2;
                continue;
            }
        }
    }
    None
}

fn average_window_coverage(reads: &[ReadRecord], window_len: u64) -> f64 {
    if window_len == 0 {
        return 0.0;
    }
    let total_bases: usize = reads.iter().map(ReadRecord::len).sum();
    total_bases as f64 / window_len as f64
}

/// Pull up to [`MAX_HAPLOTYPES`] distinct, non-empty alt sequences out of
/// the path enumerator.
fn enumerate_alt_haplotypes(g: &crate::graph::Graph, ref_len: usize, params: &Params) -> Vec<Vec<u8>> {
    let max_path_len = ref_len + 2 * params.max_indel_length + 1;
    let mut enumerator = PathEnumerator::new();
    let mut haps = Vec::new();
    let mut seen = std::collections::HashSet::new();

    while haps.len() < MAX_HAPLOTYPES {
        let Some(path) = enumerator.next_path(g, max_path_len, params.graph_traversal_limit) else { break };
        if path.seq.is_empty() || !seen.insert(path.seq.clone()) {
            continue;
        }
        haps.push(path.seq);
    }
    haps
}

/// Extract transcripts from every alt haplotype against the reference
/// haplotype, merging variants that appear in more than one alt haplotype
/// into a single [`LocatedVariant`] with one `alt_spans` entry per
/// haplotype it was found in.
fn locate_variants(haplotypes: &[Vec<u8>], window: &Window, params: &Params) -> Vec<LocatedVariant> {
    let ref_hap = &haplotypes[0];
    let mut located: HashMap<u64, LocatedVariant> = HashMap::new();

    for (hap_idx, hap_seq) in haplotypes.iter().enumerate().skip(1) {
        let variants = TranscriptExtractor::extract(ref_hap, hap_seq, window.region.contig_idx, window.region.start0, params);
        for v in variants {
            let id = v.identity_hash();
            let ref_span = v.ref_span(window.region.start0);
            let alt_span = v.alt_span;
            located
                .entry(id)
                .or_insert_with(|| LocatedVariant { variant: v, ref_span, alt_spans: HashMap::new() })
                .alt_spans
                .insert(hap_idx, alt_span);
        }
    }
    located.into_values().collect()
}

/// Whether the window shows enough mismatch/indel evidence to bother
/// assembling it. Disabled unless both samples carry at least one read with
/// an `MD` tag; when disabled, every window
/// is treated as active.
fn window_is_active(normal: &[(ReadRecord, ReadTags)], tumor: &[(ReadRecord, ReadTags)], params: &Params) -> bool {
    let normal_has_md = normal.iter().any(|(_, t)| t.md.is_some());
    let tumor_has_md = tumor.iter().any(|(_, t)| t.md.is_some());
    if !normal_has_md || !tumor_has_md {
        return true;
    }
    let mismatch_or_indel = |reads: &[(ReadRecord, ReadTags)]| {
        reads.iter().any(|(_, t)| t.has_indel || t.md.as_deref().is_some_and(|md| crate::bam::md_mismatch_count(md) > 0))
    };
    let _ = params;
    mismatch_or_indel(normal) || mismatch_or_indel(tumor)
}

fn tenx_tags_present(tumor: &[(ReadRecord, ReadTags)]) -> bool {
    tumor.iter().any(|(_, t)| t.haplotype.is_some() && t.barcode.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::label::Sample;
    use crate::reads::ReadStrand;

    fn read(sample: Sample, name: &str, seq: &[u8]) -> (ReadRecord, ReadTags) {
        (
            ReadRecord {
                sample,
                name: name.to_string(),
                contig_idx: 0,
                start0: 0,
                strand: ReadStrand::Fwd,
                map_qual: 60,
                sequence: seq.to_vec(),
                base_quals: vec![30; seq.len()],
            },
            ReadTags::default(),
        )
    }

    #[test]
    fn window_with_no_md_tags_is_treated_as_active() {
        let normal = vec![read(Sample::Normal, "n1", b"ACGT")];
        let tumor = vec![read(Sample::Tumor, "t1", b"ACGT")];
        let params = Params::default();
        assert!(window_is_active(&normal, &tumor, &params));
    }

    #[test]
    fn matching_md_tags_with_no_mismatch_is_inactive() {
        let mut normal = vec![read(Sample::Normal, "n1", b"ACGT")];
        normal[0].1.md = Some("4".to_string());
        let mut tumor = vec![read(Sample::Tumor, "t1", b"ACGT")];
        tumor[0].1.md = Some("4".to_string());
        let params = Params::default();
        assert!(!window_is_active(&normal, &tumor, &params));
    }

    #[test]
    fn assembling_an_identical_tumor_normal_window_yields_no_calls() {
        let ref_seq = b"ACGTACGTACGTACGTACGTACGTACGTACGT".to_vec();
        let normal = vec![read(Sample::Normal, "n1", &ref_seq)];
        let tumor = vec![read(Sample::Tumor, "t1", &ref_seq)];
        let window = Window { region: crate::windowing::Region { contig_idx: 0, start0: 0, end0: ref_seq.len() as u64 }, index: 0 };
        let params = Params::default();
        let input = WindowInput { window: &window, ref_seq: &ref_seq, normal_reads: &normal, tumor_reads: &tumor };
        let calls = assemble_window(&input, &params);
        assert!(calls.is_empty());
    }
}
