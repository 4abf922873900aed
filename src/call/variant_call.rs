//! Assembles one VCF record from a transcript plus its per-sample support:
//! somatic-state classification, Fisher-score and coverage/VAF filters, and
//! the FORMAT/INFO field taxonomy this crate emits.

use crate::call::fisher::{self, ContingencyTable};
use crate::genotype::support::{Genotype, VariantSupport};
use crate::params::Params;
use crate::transcript::{Variant, VariantKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SomaticState {
    Somatic,
    Normal,
    Shared,
    None,
}

impl SomaticState {
    fn classify(normal_alt: u32, tumor_alt: u32) -> Self {
        match (normal_alt > 0, tumor_alt > 0) {
            (false, true) => SomaticState::Somatic,
            (true, false) => SomaticState::Normal,
            (true, true) => SomaticState::Shared,
            (false, false) => SomaticState::None,
        }
    }

    fn as_info_str(self) -> &'static str {
        match self {
            SomaticState::Somatic => "SOMATIC",
            SomaticState::Normal => "NORMAL",
            SomaticState::Shared => "SHARED",
            SomaticState::None => "NONE",
        }
    }
}

impl VariantKind {
    fn as_vcf_str(self) -> &'static str {
        match self {
            VariantKind::Snv => "SNV",
            VariantKind::Mnp => "MNP",
            VariantKind::Ins => "INS",
            VariantKind::Del => "DEL",
            VariantKind::Complex => "COMPLEX",
        }
    }
}

/// Per-sample FORMAT fields: `GT:AD:SR:SA:DP`, `:HPR:HPA` appended when
/// 10X linked-read mode is active.
#[derive(Debug, Clone)]
pub struct SampleFields {
    pub gt: &'static str,
    pub gq: u32,
    pub ad: (u32, u32),
    pub sr: (u32, u32),
    pub sa: (u32, u32),
    pub dp: u32,
    /// `(hp1, hp2)` alt-read counts by haplotype tag, 10X mode only.
    pub hp_alt: Option<(u32, u32)>,
    /// `(hp1, hp2)` ref-read counts by haplotype tag, 10X mode only.
    pub hp_ref: Option<(u32, u32)>,
}

fn sample_fields(support: &VariantSupport, hp_alt: Option<(u32, u32)>, hp_ref: Option<(u32, u32)>) -> SampleFields {
    let (genotype, gq) = support.call_genotype();
    SampleFields {
        gt: genotype.vcf_gt(),
        gq,
        ad: (support.total_ref(), support.total_alt()),
        sr: (support.ref_fwd_count(), support.ref_rev_count()),
        sa: (support.alt_fwd_count(), support.alt_rev_count()),
        dp: support.depth(),
        hp_alt,
        hp_ref,
    }
}

#[derive(Debug, Clone)]
pub struct VariantCall {
    pub contig_idx: usize,
    /// 1-based POS, already decremented and anchor-prefixed for non-SNVs.
    pub pos1: u64,
    pub ref_allele: String,
    pub alt_allele: String,
    pub qual: u8,
    pub filters: Vec<&'static str>,
    pub somatic_state: SomaticState,
    pub fets: u8,
    pub kind: VariantKind,
    pub len: usize,
    pub kmer_size: usize,
    pub sb: u8,
    pub str_info: Option<(usize, String)>,
    pub normal: SampleFields,
    pub tumor: SampleFields,
}

impl VariantCall {
    pub fn is_pass(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filter_string(&self) -> String {
        if self.filters.is_empty() {
            "PASS".to_string()
        } else {
            self.filters.join(";")
        }
    }

    pub fn info_string(&self) -> String {
        let mut parts = vec![
            self.somatic_state.as_info_str().to_string(),
            format!("FETS={}", self.fets),
            format!("TYPE={}", self.kind.as_vcf_str()),
            format!("LEN={}", self.len),
            format!("KMERSIZE={}", self.kmer_size),
            format!("SB={}", self.sb),
        ];
        if let Some((len, unit)) = &self.str_info {
            parts.push(format!("MS={len}:{unit}"));
        }
        parts.join(";")
    }
}

fn variant_len(ref_len: usize, alt_len: usize) -> usize {
    let diff = (ref_len as i64 - alt_len as i64).unsigned_abs() as usize;
    if diff == 0 {
        ref_len
    } else {
        diff
    }
}

fn combined_strand_bias(normal: &VariantSupport, tumor: &VariantSupport) -> u8 {
    let table = ContingencyTable {
        row1: ((normal.ref_fwd_count() + tumor.ref_fwd_count()) as i64, (normal.alt_fwd_count() + tumor.alt_fwd_count()) as i64),
        row2: ((normal.ref_rev_count() + tumor.ref_rev_count()) as i64, (normal.alt_rev_count() + tumor.alt_rev_count()) as i64),
    };
    fisher::phred_from_p(fisher::two_sided_p_value(&table))
}

fn somatic_qual(normal: &VariantSupport, tumor: &VariantSupport) -> u8 {
    let table = ContingencyTable {
        row1: (normal.total_ref() as i64, normal.total_alt() as i64),
        row2: (tumor.total_ref() as i64, tumor.total_alt() as i64),
    };
    fisher::phred_from_p(fisher::two_sided_p_value(&table))
}

fn evaluate_filters(
    qual: u8,
    is_str: bool,
    normal: &VariantSupport,
    tumor: &VariantSupport,
    sb: u8,
    multi_hp: bool,
    params: &Params,
) -> Vec<&'static str> {
    let mut filters = Vec::new();
    let fisher_threshold = if is_str { params.min_str_fisher } else { params.min_fisher };
    if (qual as f64) < fisher_threshold {
        filters.push(if is_str { "LowFisherSTR" } else { "LowFisherScore" });
    }
    if normal.depth() < params.min_nml_cov {
        filters.push("LowCovNormal");
    }
    if normal.depth() > params.max_nml_cov {
        filters.push("HighCovNormal");
    }
    if tumor.depth() < params.min_tmr_cov {
        filters.push("LowCovTumor");
    }
    if tumor.depth() > params.max_tmr_cov {
        filters.push("HighCovTumor");
    }
    if tumor.vaf() < params.min_tmr_vaf {
        filters.push("LowVafTumor");
    }
    if normal.vaf() > params.max_nml_vaf {
        filters.push("HighVafNormal");
    }
    if tumor.total_alt() < params.min_tmr_alt_cnt {
        filters.push("LowAltCntTumor");
    }
    if normal.total_alt() > params.max_nml_alt_cnt {
        filters.push("HighAltCntNormal");
    }
    if tumor.total_alt() > 0 && (tumor.alt_fwd_count() < params.min_strand_cnt || tumor.alt_rev_count() < params.min_strand_cnt) {
        filters.push("StrandBias");
    }
    if multi_hp {
        filters.push("MultiHP");
    }
    filters
}

/// Build a VCF record for `variant`, or `None` if neither sample carries the
/// alt allele (the `NONE` somatic state is dropped before emission).
pub fn build_call(
    variant: &Variant,
    kmer_size: usize,
    normal: &VariantSupport,
    tumor: &VariantSupport,
    params: &Params,
    multi_hp: bool,
    hp_alt: Option<(u32, u32)>,
    hp_ref: Option<(u32, u32)>,
) -> Option<VariantCall> {
    let somatic_state = SomaticState::classify(normal.total_alt(), tumor.total_alt());
    if somatic_state == SomaticState::None {
        return None;
    }

    let is_snv = variant.kind == VariantKind::Snv;
    let (pos1, ref_allele, alt_allele) = if !is_snv {
        let anchor = variant.anchor_base.unwrap_or(b'N');
        let mut r = vec![anchor];
        r.extend_from_slice(&variant.ref_allele);
        let mut a = vec![anchor];
        a.extend_from_slice(&variant.alt_allele);
        (variant.pos0, String::from_utf8_lossy(&r).into_owned(), String::from_utf8_lossy(&a).into_owned())
    } else {
        (
            variant.pos0 + 1,
            String::from_utf8_lossy(&variant.ref_allele).into_owned(),
            String::from_utf8_lossy(&variant.alt_allele).into_owned(),
        )
    };

    let qual = somatic_qual(normal, tumor);
    let sb = combined_strand_bias(normal, tumor);
    let is_str = variant.str_annotation.is_some();
    let filters = evaluate_filters(qual, is_str, normal, tumor, sb, multi_hp, params);

    let str_info = variant
        .str_annotation
        .as_ref()
        .map(|ann| (ann.total_len(), String::from_utf8_lossy(&ann.unit).into_owned()));

    Some(VariantCall {
        contig_idx: variant.contig_idx,
        pos1,
        ref_allele,
        alt_allele,
        qual,
        filters,
        somatic_state,
        fets: qual,
        kind: variant.kind,
        len: variant_len(variant.ref_allele.len(), variant.alt_allele.len()),
        kmer_size,
        sb,
        str_info,
        normal: sample_fields(normal, None, None),
        tumor: sample_fields(tumor, hp_alt, hp_ref),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub contig_idx: usize,
    pub pos1: u64,
    pub ref_allele: String,
    pub alt_allele: String,
}

impl VariantCall {
    pub fn sort_key(&self) -> SortKey {
        SortKey {
            contig_idx: self.contig_idx,
            pos1: self.pos1,
            ref_allele: self.ref_allele.clone(),
            alt_allele: self.alt_allele.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::Strand;
    use crate::genotype::support::Allele;

    fn variant(ref_allele: &[u8], alt_allele: &[u8], kind: VariantKind) -> Variant {
        Variant {
            contig_idx: 0,
            pos0: 100,
            ref_allele: ref_allele.to_vec(),
            alt_allele: alt_allele.to_vec(),
            kind,
            anchor_base: Some(b'A'),
            str_annotation: None,
            alt_span: (0, alt_allele.len()),
        }
    }

    fn support_with(ref_count: u32, alt_count: u32) -> VariantSupport {
        let mut s = VariantSupport::new();
        for i in 0..ref_count {
            s.add_evidence(&format!("r{i}"), Allele::Ref, Strand::Fwd, 30);
        }
        for i in 0..alt_count {
            s.add_evidence(&format!("a{i}"), Allele::Alt, Strand::Fwd, 30);
        }
        s
    }

    #[test]
    fn somatic_snv_with_no_normal_support_is_called_somatic() {
        let v = variant(b"C", b"G", VariantKind::Snv);
        let normal = support_with(20, 0);
        let tumor = support_with(12, 8);
        let params = Params::default();
        let call = build_call(&v, 21, &normal, &tumor, &params, false, None, None).expect("alt present in tumor");
        assert_eq!(call.somatic_state, SomaticState::Somatic);
        assert_eq!(call.pos1, 101);
        assert_eq!(call.tumor.ad, (12, 8));
        assert_eq!(call.normal.ad, (20, 0));
    }

    #[test]
    fn no_alt_anywhere_drops_the_record() {
        let v = variant(b"C", b"G", VariantKind::Snv);
        let normal = support_with(20, 0);
        let tumor = support_with(20, 0);
        let params = Params::default();
        assert!(build_call(&v, 21, &normal, &tumor, &params, false, None, None).is_none());
    }

    #[test]
    fn deletion_len_is_ref_alt_length_difference() {
        let v = variant(b"CAG", b"", VariantKind::Del);
        assert_eq!(variant_len(v.ref_allele.len(), v.alt_allele.len()), 3);
    }

    #[test]
    fn filter_string_is_pass_when_empty() {
        let v = variant(b"C", b"G", VariantKind::Snv);
        let normal = support_with(20, 0);
        let tumor = support_with(5, 15);
        let mut params = Params::default();
        params.min_fisher = 0.0;
        params.min_tmr_cov = 0;
        params.max_tmr_cov = 1000;
        params.min_nml_cov = 0;
        params.max_nml_cov = 1000;
        params.min_tmr_vaf = 0.0;
        params.max_nml_vaf = 1.0;
        params.min_tmr_alt_cnt = 0;
        params.max_nml_alt_cnt = 1000;
        params.min_strand_cnt = 0;
        let call = build_call(&v, 21, &normal, &tumor, &params, false, None, None).unwrap();
        assert_eq!(call.filter_string(), "PASS");
    }
}
