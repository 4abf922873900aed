//! BGZF VCF output: header construction, record assembly
//! from a [`VariantCall`], and tabix-style index rebuild at close.

use std::path::Path;

use rust_htslib::bcf::record::GenotypeAllele;
use rust_htslib::bcf::{self, Header, Read as BcfRead};

use crate::call::variant_call::{SampleFields, VariantCall};
use crate::errors::Result;
use crate::params::Params;
use crate::windowing::ContigTable;

pub struct VcfWriter {
    inner: bcf::Writer,
    path: std::path::PathBuf,
}

impl VcfWriter {
    pub fn create(path: impl AsRef<Path>, contig_table: &ContigTable, params: &Params) -> Result<Self> {
        let header = build_header(contig_table, params);
        let inner = bcf::Writer::from_path(path.as_ref(), &header, false, bcf::Format::Vcf)?;
        Ok(Self { inner, path: path.as_ref().to_path_buf() })
    }

    pub fn write(&mut self, call: &VariantCall, contig_name: &str) -> Result<()> {
        let mut record = self.inner.empty_record();
        let rid = self.inner.header().name2rid(contig_name.as_bytes())?;
        record.set_rid(Some(rid));
        record.set_pos(call.pos1 as i64 - 1);
        record.set_alleles(&[call.ref_allele.as_bytes(), call.alt_allele.as_bytes()])?;
        record.set_qual(call.qual as f32);
        record.set_filters(&call.filters.iter().map(|f| f.as_bytes()).collect::<Vec<_>>())?;

        record.push_info_flag(call.somatic_state.as_info_str().as_bytes())?;
        record.push_info_float(b"FETS", &[call.fets as f32])?;
        record.push_info_string(b"TYPE", &[type_name(call).as_bytes()])?;
        record.push_info_integer(b"LEN", &[call.len as i32])?;
        record.push_info_integer(b"KMERSIZE", &[call.kmer_size as i32])?;
        record.push_info_float(b"SB", &[call.sb as f32])?;
        if let Some((len, unit)) = &call.str_info {
            record.push_info_string(b"MS", &[format!("{len}:{unit}").as_bytes()])?;
        }

        push_format_fields(&mut record, &call.normal, &call.tumor)?;

        self.inner.write(&record)?;
        Ok(())
    }

    /// Drop the writer (flushing its BGZF stream) and rebuild the index.
    pub fn close(self) -> Result<()> {
        let path = self.path.clone();
        drop(self.inner);
        bcf::index::build(&path, None, 14, bcf::index::Type::Tbx)?;
        Ok(())
    }
}

fn type_name(call: &VariantCall) -> &'static str {
    match call.kind {
        crate::transcript::VariantKind::Snv => "SNV",
        crate::transcript::VariantKind::Mnp => "MNP",
        crate::transcript::VariantKind::Ins => "INS",
        crate::transcript::VariantKind::Del => "DEL",
        crate::transcript::VariantKind::Complex => "COMPLEX",
    }
}

fn genotype_alleles(gt: &str) -> [GenotypeAllele; 2] {
    match gt {
        "0/0" => [GenotypeAllele::Unphased(0), GenotypeAllele::Unphased(0)],
        "0/1" => [GenotypeAllele::Unphased(0), GenotypeAllele::Unphased(1)],
        _ => [GenotypeAllele::Unphased(1), GenotypeAllele::Unphased(1)],
    }
}

/// Every FORMAT field is a matrix over samples: each `push_format_*` call
/// sets the whole column, so NORMAL and TUMOR values must be flattened into
/// one call per tag, in `NORMAL, TUMOR` order to match the header's sample
/// list.
fn push_format_fields(record: &mut bcf::Record, normal: &SampleFields, tumor: &SampleFields) -> Result<()> {
    let gts: Vec<GenotypeAllele> = genotype_alleles(normal.gt).into_iter().chain(genotype_alleles(tumor.gt)).collect();
    record.push_genotypes(&gts)?;

    record.push_format_integer(b"AD", &[normal.ad.0 as i32, normal.ad.1 as i32, tumor.ad.0 as i32, tumor.ad.1 as i32])?;
    record.push_format_integer(b"SR", &[normal.sr.0 as i32, normal.sr.1 as i32, tumor.sr.0 as i32, tumor.sr.1 as i32])?;
    record.push_format_integer(b"SA", &[normal.sa.0 as i32, normal.sa.1 as i32, tumor.sa.0 as i32, tumor.sa.1 as i32])?;
    record.push_format_integer(b"DP", &[normal.dp as i32, tumor.dp as i32])?;

    if normal.hp_ref.is_some() || tumor.hp_ref.is_some() {
        let (n1, n2) = normal.hp_ref.unwrap_or((0, 0));
        let (t1, t2) = tumor.hp_ref.unwrap_or((0, 0));
        record.push_format_integer(b"HPR", &[n1 as i32, n2 as i32, 0, t1 as i32, t2 as i32, 0])?;
    }
    if normal.hp_alt.is_some() || tumor.hp_alt.is_some() {
        let (n1, n2) = normal.hp_alt.unwrap_or((0, 0));
        let (t1, t2) = tumor.hp_alt.unwrap_or((0, 0));
        record.push_format_integer(b"HPA", &[n1 as i32, n2 as i32, 0, t1 as i32, t2 as i32, 0])?;
    }
    Ok(())
}

fn build_header(contig_table: &ContigTable, params: &Params) -> Header {
    let mut header = Header::new();
    header.push_record(br#"##fileformat=VCFv4.3"#);
    header.push_record(br#"##source=lancet"#);

    header.push_record(
        format!(r#"##FILTER=<ID=LowFisherSTR,Description="Fisher exact test score for tumor/normal STR allele counts less than {}">"#, params.min_str_fisher)
            .as_bytes(),
    );
    header.push_record(
        format!(r#"##FILTER=<ID=LowFisherScore,Description="Fisher exact test score for tumor/normal allele counts less than {}">"#, params.min_fisher)
            .as_bytes(),
    );
    header.push_record(format!(r#"##FILTER=<ID=LowCovNormal,Description="Allele coverage in normal less than {}">"#, params.min_nml_cov).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=HighCovNormal,Description="Allele coverage in normal greater than {}">"#, params.max_nml_cov).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=LowCovTumor,Description="Allele coverage in tumor less than {}">"#, params.min_tmr_cov).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=HighCovTumor,Description="Allele coverage in tumor greater than {}">"#, params.max_tmr_cov).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=LowVafTumor,Description="Variant allele frequency in tumor less than {}">"#, params.min_tmr_vaf).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=HighVafNormal,Description="Variant allele frequency in normal greater than {}">"#, params.max_nml_vaf).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=LowAltCntTumor,Description="Alternate allele count in tumor less than {}">"#, params.min_tmr_alt_cnt).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=HighAltCntNormal,Description="Alternate allele count in normal greater than {}">"#, params.max_nml_alt_cnt).as_bytes());
    header.push_record(format!(r#"##FILTER=<ID=StrandBias,Description="Non-reference reads on either strand below {}">"#, params.min_strand_cnt).as_bytes());
    if params.tenx_mode {
        header.push_record(br#"##FILTER=<ID=MultiHP,Description="Alt reads found in multiple haplotypes">"#);
    }

    header.push_record(br#"##INFO=<ID=SOMATIC,Number=0,Type=Flag,Description="Present only in tumor">"#);
    header.push_record(br#"##INFO=<ID=NORMAL,Number=0,Type=Flag,Description="Present only in normal">"#);
    header.push_record(br#"##INFO=<ID=SHARED,Number=0,Type=Flag,Description="Present in both tumor and normal">"#);
    header.push_record(br#"##INFO=<ID=NONE,Number=0,Type=Flag,Description="Not supported by data">"#);
    header.push_record(br#"##INFO=<ID=FETS,Number=1,Type=Float,Description="Phred-scaled Fisher exact test of ref/alt counts in tumor and normal">"#);
    header.push_record(br#"##INFO=<ID=TYPE,Number=1,Type=String,Description="Variant type">"#);
    header.push_record(br#"##INFO=<ID=LEN,Number=1,Type=Integer,Description="Variant length in base pairs">"#);
    header.push_record(br#"##INFO=<ID=KMERSIZE,Number=1,Type=Integer,Description="K-mer length used to assemble the locus">"#);
    header.push_record(br#"##INFO=<ID=SB,Number=1,Type=Float,Description="Phred-scaled Fisher exact test of fwd/rev read counts (strand bias)">"#);
    header.push_record(br#"##INFO=<ID=MS,Number=1,Type=String,Description="Microsatellite length and motif, format LENGTH:MOTIF">"#);

    header.push_record(br#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#);
    header.push_record(br#"##FORMAT=<ID=AD,Number=2,Type=Integer,Description="Reads supporting ref and alt alleles">"#);
    header.push_record(br#"##FORMAT=<ID=SR,Number=2,Type=Integer,Description="Fwd/rev reads supporting the reference allele">"#);
    header.push_record(br#"##FORMAT=<ID=SA,Number=2,Type=Integer,Description="Fwd/rev reads supporting the alternate allele">"#);
    header.push_record(br#"##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Read depth">"#);
    if params.tenx_mode {
        header.push_record(br#"##FORMAT=<ID=HPR,Number=3,Type=Integer,Description="Ref-supporting reads per haplotype (HP1, HP2, unassigned)">"#);
        header.push_record(br#"##FORMAT=<ID=HPA,Number=3,Type=Integer,Description="Alt-supporting reads per haplotype (HP1, HP2, unassigned)">"#);
    }

    let mut ordered: Vec<(&String, &(usize, u64))> = contig_table.iter().collect();
    ordered.sort_by_key(|(_, (idx, _))| *idx);
    for (name, (_, length)) in ordered {
        header.push_record(format!(r#"##contig=<ID={name},length={length}>"#).as_bytes());
    }

    header.push_sample(b"NORMAL");
    header.push_sample(b"TUMOR");
    header
}
