//! Two adjacent substitutions in an alt haplotype collapse into a single
//! MNP transcript rather than two separate SNVs.

use lancet::call::variant_call::build_call;
use lancet::genotype::genotyper::{genotype, LocatedVariant};
use lancet::graph::label::Sample;
use lancet::params::Params;
use lancet::reads::{ReadRecord, ReadStrand};
use lancet::transcript::{TranscriptExtractor, VariantKind};

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
// Positions 5,6: C,G -> G,C (both mismatched, adjacent)
const ALT_HAP: &[u8] = b"ACGTAGCTACGT";

#[test]
fn two_adjacent_mismatches_are_a_single_mnp_record() {
    let params = Params::default();
    let variants = TranscriptExtractor::extract(REF_HAP, ALT_HAP, 0, 0, &params);
    assert_eq!(variants.len(), 1, "expected one merged MNP transcript, got {variants:?}");
    let variant = variants.into_iter().next().unwrap();

    assert_eq!(variant.kind, VariantKind::Mnp);
    assert_eq!(variant.ref_allele, b"CG");
    assert_eq!(variant.alt_allele, b"GC");
    assert_eq!(variant.ref_allele.len(), 2);
    assert_eq!(variant.alt_allele.len(), 2);

    let ref_span = variant.ref_span(0);
    let alt_span = variant.alt_span;
    let located = LocatedVariant { variant, ref_span, alt_spans: [(1, alt_span)].into_iter().collect() };

    let mut reads = Vec::new();
    for i in 0..10 {
        reads.push(read(Sample::Normal, &format!("n{i}"), REF_HAP));
    }
    for i in 0..10 {
        reads.push(read(Sample::Tumor, &format!("t{i}"), ALT_HAP));
    }

    let haplotypes = vec![REF_HAP.to_vec(), ALT_HAP.to_vec()];
    let support = genotype(&reads, &haplotypes, &[located.clone()]);
    let id = located.variant.identity_hash();
    let normal = support.get(&(Sample::Normal, id)).cloned().unwrap_or_default();
    let tumor = support.get(&(Sample::Tumor, id)).cloned().unwrap_or_default();

    assert_eq!(tumor.total_alt(), 10);

    let call = build_call(&located.variant, 21, &normal, &tumor, &params, false, None, None).expect("alt present in tumor");
    assert_eq!(call.kind, VariantKind::Mnp);
    assert_eq!(call.len, 2);
    assert_eq!(call.ref_allele.len(), 2);
    assert_eq!(call.alt_allele.len(), 2);
}
