//! BAM/CRAM read extraction: sequential iteration over a
//! window's region, building trimmed [`ReadRecord`]s and exposing the
//! optional tags that gate the active-region pre-filter and 10X mode.

use rust_htslib::bam::record::Aux;
use rust_htslib::bam::{self, Read as BamRead};

use crate::errors::Result;
use crate::graph::label::Sample;
use crate::params::Params;
use crate::reads::{build_read_record, ReadRecord};
use crate::windowing::Region;

/// Per-read tag info beyond what [`ReadRecord`] carries, used to gate the
/// active-region pre-filter and 10X linked-read mode.
#[derive(Debug, Clone, Default)]
pub struct ReadTags {
    pub md: Option<String>,
    pub haplotype: Option<i64>,
    pub barcode: Option<String>,
    /// Whether this read's CIGAR contains an insertion or deletion op,
    /// folded together with `md` mismatch counts for the active-region
    /// pre-filter's cheap activity estimate.
    pub has_indel: bool,
}

/// Count mismatches encoded in an `MD` tag string (the numeric runs are
/// matches; any other base is a mismatch; a `^`-prefixed run is a deletion,
/// already reflected in `has_indel` via the CIGAR).
pub fn md_mismatch_count(md: &str) -> usize {
    let mut count = 0;
    let mut chars = md.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            continue;
        }
        if c == '^' {
            while chars.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                chars.next();
            }
            continue;
        }
        count += 1;
    }
    count
}

pub struct SampleReader {
    inner: bam::IndexedReader,
    sample: Sample,
}

impl SampleReader {
    pub fn from_path(path: impl AsRef<std::path::Path>, sample: Sample) -> Result<Self> {
        let inner = bam::IndexedReader::from_path(path)?;
        Ok(Self { inner, sample })
    }

    pub fn set_threads(&mut self, n: usize) -> Result<()> {
        self.inner.set_threads(n)?;
        Ok(())
    }

    /// Every contig name present in this file's header, in header order.
    pub fn contig_names(&self) -> Vec<String> {
        let header = self.inner.header();
        (0..header.target_count())
            .map(|tid| String::from_utf8_lossy(header.tid2name(tid)).into_owned())
            .collect()
    }

    /// Iterate trimmed reads overlapping `region`, paired with their raw
    /// tags. Reads that fail trimming (too short, too low quality) are
    /// dropped silently, matching [`crate::reads::build_read_record`].
    pub fn fetch_reads(&mut self, region: &Region, contig_name: &str, params: &Params) -> Result<Vec<(ReadRecord, ReadTags)>> {
        let tid = self
            .inner
            .header()
            .tid(contig_name.as_bytes())
            .ok_or_else(|| crate::errors::LancetError::UnknownContig {
                region: format!("{contig_name}:{}-{}", region.start0, region.end0),
                contig: contig_name.to_string(),
            })?;
        self.inner.fetch((tid, region.start0 as i64, region.end0 as i64))?;

        let mut out = Vec::new();
        for record in self.inner.records() {
            let record = record?;
            if record.is_unmapped() || record.is_duplicate() || record.is_secondary() || record.is_supplementary() {
                continue;
            }
            if record.mapq() < params.min_read_mapping_qual {
                continue;
            }

            let name = String::from_utf8_lossy(record.qname()).into_owned();
            let strand = if record.is_reverse() { crate::reads::ReadStrand::Rev } else { crate::reads::ReadStrand::Fwd };
            let sequence = record.seq().as_bytes();
            let base_quals = record.qual();

            let Some(read) = build_read_record(
                self.sample,
                name,
                region.contig_idx,
                record.pos(),
                strand,
                record.mapq(),
                &sequence,
                base_quals,
                params.min_base_qual,
                params.max_kmer_size,
            ) else {
                continue;
            };

            let has_indel = record
                .cigar()
                .iter()
                .any(|op| matches!(op, rust_htslib::bam::record::Cigar::Ins(_) | rust_htslib::bam::record::Cigar::Del(_)));
            let tags = ReadTags {
                md: read_string_tag(&record, b"MD"),
                haplotype: read_int_tag(&record, b"HP"),
                barcode: read_string_tag(&record, b"BX"),
                has_indel,
            };
            out.push((read, tags));
        }
        Ok(out)
    }
}

fn read_string_tag(record: &bam::Record, tag: &[u8]) -> Option<String> {
    match record.aux(tag) {
        Ok(Aux::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

fn read_int_tag(record: &bam::Record, tag: &[u8]) -> Option<i64> {
    match record.aux(tag) {
        Ok(Aux::I8(v)) => Some(v as i64),
        Ok(Aux::U8(v)) => Some(v as i64),
        Ok(Aux::I16(v)) => Some(v as i64),
        Ok(Aux::U16(v)) => Some(v as i64),
        Ok(Aux::I32(v)) => Some(v as i64),
        Ok(Aux::U32(v)) => Some(v as i64),
        _ => None,
    }
}
