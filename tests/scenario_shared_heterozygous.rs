//! A variant present at roughly 50% allele fraction in both normal and
//! tumor: both samples should genotype heterozygous and the somatic score
//! should show no tumor/normal association.

use lancet::call::variant_call::{build_call, SomaticState};
use lancet::genotype::genotyper::{genotype, LocatedVariant};
use lancet::graph::label::Sample;
use lancet::params::Params;
use lancet::reads::{ReadRecord, ReadStrand};
use lancet::transcript::TranscriptExtractor;

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

const REF_HAP: &[u8] = b"ACGTACGTACGT";
// Position 5: C -> G
const ALT_HAP: &[u8] = b"ACGTAGGTACGT";

#[test]
fn fifty_fifty_variant_in_both_samples_is_shared_and_het_with_no_tumor_normal_association() {
    let params = Params::default();
    let variants = TranscriptExtractor::extract(REF_HAP, ALT_HAP, 0, 0, &params);
    assert_eq!(variants.len(), 1);
    let variant = variants.into_iter().next().unwrap();

    let ref_span = variant.ref_span(0);
    let alt_span = variant.alt_span;
    let located = LocatedVariant { variant, ref_span, alt_spans: [(1, alt_span)].into_iter().collect() };

    let mut reads = Vec::new();
    for i in 0..5 {
        reads.push(read(Sample::Normal, &format!("nr{i}"), REF_HAP));
    }
    for i in 0..5 {
        reads.push(read(Sample::Normal, &format!("na{i}"), ALT_HAP));
    }
    for i in 0..5 {
        reads.push(read(Sample::Tumor, &format!("tr{i}"), REF_HAP));
    }
    for i in 0..5 {
        reads.push(read(Sample::Tumor, &format!("ta{i}"), ALT_HAP));
    }

    let haplotypes = vec![REF_HAP.to_vec(), ALT_HAP.to_vec()];
    let support = genotype(&reads, &haplotypes, &[located.clone()]);
    let id = located.variant.identity_hash();
    let normal = support.get(&(Sample::Normal, id)).cloned().unwrap_or_default();
    let tumor = support.get(&(Sample::Tumor, id)).cloned().unwrap_or_default();

    assert_eq!(normal.total_ref(), 5);
    assert_eq!(normal.total_alt(), 5);
    assert_eq!(tumor.total_ref(), 5);
    assert_eq!(tumor.total_alt(), 5);

    let call = build_call(&located.variant, 21, &normal, &tumor, &params, false, None, None).expect("alt present in both samples");

    assert_eq!(call.somatic_state, SomaticState::Shared);
    assert_eq!(call.normal.gt, "0/1");
    assert_eq!(call.tumor.gt, "0/1");
    // (5,5) vs (5,5) is the hypergeometric table's own mode: p == 1.0 exactly,
    // so the phred-scaled qual is 0.
    assert_eq!(call.qual, 0);
}
