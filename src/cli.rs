//! Command-line argument parsing and validation. Translates the flags into a
//! [`Params`] value via `Params::validate`; help text is grouped under
//! headings, and a `resolve_*` helper untangles the mutually exclusive
//! output/region flag pairs.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::errors::{LancetError, Result};
use crate::params::Params;

#[derive(Parser, Debug)]
#[command(
    name = "lancet",
    about = "Local micro-assembly somatic variant caller",
    long_about = "Assembles a coloured de Bruijn graph per genomic window from a tumor/normal \
                  BAM pair and a reference FASTA, enumerates candidate haplotypes, and emits \
                  somatic/germline/shared calls as VCF.",
    version
)]
#[command(group(ArgGroup::new("regions").args(["region", "bed_file"]).multiple(false)))]
pub struct Cli {
    /// Reference FASTA, must have a `.fai` index alongside it.
    #[arg(long = "reference", value_name = "FASTA", help_heading = "Input")]
    pub reference: PathBuf,

    /// Normal (germline control) BAM/CRAM, coordinate-sorted and indexed.
    #[arg(long = "normal", value_name = "BAM", help_heading = "Input")]
    pub normal: PathBuf,

    /// Tumor BAM/CRAM, coordinate-sorted and indexed.
    #[arg(long = "tumor", value_name = "BAM", help_heading = "Input")]
    pub tumor: PathBuf,

    /// Output VCF path (`.vcf.gz`). Mutually exclusive with `--out-prefix`.
    #[arg(long = "out-vcf", value_name = "PATH", help_heading = "Output")]
    pub out_vcf: Option<PathBuf>,

    /// Output prefix; the VCF is written to `<prefix>.vcf.gz`.
    #[arg(long = "out-prefix", value_name = "PREFIX", help_heading = "Output")]
    pub out_prefix: Option<PathBuf>,

    /// Directory to dump one DOT graph per window for debugging.
    #[arg(long = "out-graphs-dir", value_name = "DIR", help_heading = "Output")]
    pub out_graphs_dir: Option<PathBuf>,

    /// Samtools-style region, e.g. `chr1:1000-2000`. Mutually exclusive with `--bed-file`.
    #[arg(long = "region", value_name = "CHROM:START-END", help_heading = "Region selection")]
    pub region: Option<String>,

    /// BED file of regions to call. Mutually exclusive with `--region`.
    #[arg(long = "bed-file", value_name = "PATH", help_heading = "Region selection")]
    pub bed_file: Option<PathBuf>,

    /// Bases of padding added to each side of a region before windowing.
    #[arg(long = "padding", value_name = "N", default_value_t = Params::default().region_pad_length, help_heading = "Windowing")]
    pub padding: u32,

    /// Window length in bases.
    #[arg(long = "window-length", value_name = "N", default_value_t = Params::default().window_length, help_heading = "Windowing")]
    pub window_length: u32,

    /// Percent overlap between consecutive windows, in `[5, 95]`.
    #[arg(long = "pct-overlap", value_name = "PCT", default_value_t = Params::default().pct_overlap, help_heading = "Windowing")]
    pub pct_overlap: u32,

    /// Worker thread count.
    #[arg(long = "num-threads", value_name = "N", default_value_t = Params::default().num_worker_threads, help_heading = "Concurrency")]
    pub num_threads: u32,

    /// Smallest k-mer length tried during assembly.
    #[arg(long = "min-kmer-length", value_name = "K", default_value_t = Params::default().min_kmer_size, help_heading = "Graph")]
    pub min_kmer_length: usize,

    /// Largest k-mer length tried during assembly.
    #[arg(long = "max-kmer-length", value_name = "K", default_value_t = Params::default().max_kmer_size, help_heading = "Graph")]
    pub max_kmer_length: usize,

    /// Max mismatches tolerated when checking a window for an exact/approximate repeat at a given k.
    #[arg(long = "max-rpt-mismatch", value_name = "N", default_value_t = Params::default().max_rpt_mismatch, help_heading = "Graph")]
    pub max_rpt_mismatch: usize,

    /// Minimum surviving tip length; shorter tips are pruned.
    #[arg(long = "min-graph-tip-length", value_name = "N", default_value_t = Params::default().min_graph_tip_length, help_heading = "Graph")]
    pub min_graph_tip_length: usize,

    /// Minimum coverage for a node to anchor the reference walk.
    #[arg(long = "min-anchor-cov", value_name = "N", default_value_t = Params::default().min_anchor_cov, help_heading = "Graph")]
    pub min_anchor_cov: u32,

    /// Minimum coverage for any node to survive pruning.
    #[arg(long = "min-node-cov", value_name = "N", default_value_t = Params::default().min_node_cov, help_heading = "Graph")]
    pub min_node_cov: u32,

    /// Minimum node-coverage-to-window-average ratio to survive pruning.
    #[arg(long = "min-cov-ratio", value_name = "F", default_value_t = Params::default().min_cov_ratio, help_heading = "Graph")]
    pub min_cov_ratio: f64,

    /// Window average coverage above which the window is skipped as too dense to assemble usefully.
    #[arg(long = "max-window-cov", value_name = "F", default_value_t = Params::default().max_window_cov, help_heading = "Graph")]
    pub max_window_cov: f64,

    /// Max de Bruijn graph nodes visited enumerating haplotypes for one window.
    #[arg(long = "graph-traversal-limit", value_name = "N", default_value_t = Params::default().graph_traversal_limit, help_heading = "Graph")]
    pub graph_traversal_limit: u32,

    /// Max indel length a transcript/path search allows.
    #[arg(long = "max-indel-length", value_name = "N", default_value_t = Params::default().max_indel_length, help_heading = "Graph")]
    pub max_indel_length: usize,

    /// Minimum base quality; lower-quality 3' read tails are trimmed.
    #[arg(long = "min-base-qual", value_name = "Q", default_value_t = Params::default().min_base_qual, help_heading = "Quality filters")]
    pub min_base_qual: u8,

    /// Minimum read mapping quality to consider a read at all.
    #[arg(long = "min-mapping-qual", value_name = "Q", default_value_t = Params::default().min_read_mapping_qual, help_heading = "Quality filters")]
    pub min_mapping_qual: u8,

    /// Minimum phred-scaled Fisher exact test score to PASS a non-STR variant.
    #[arg(long = "min-fisher", value_name = "F", default_value_t = Params::default().min_fisher, help_heading = "Somatic filters")]
    pub min_fisher: f64,

    /// Minimum phred-scaled Fisher exact test score to PASS an STR variant.
    #[arg(long = "min-str-fisher", value_name = "F", default_value_t = Params::default().min_str_fisher, help_heading = "Somatic filters")]
    pub min_str_fisher: f64,

    /// Minimum tumor variant allele frequency to PASS.
    #[arg(long = "min-tmr-vaf", value_name = "F", default_value_t = Params::default().min_tmr_vaf, help_heading = "Somatic filters")]
    pub min_tmr_vaf: f64,

    /// Maximum normal variant allele frequency to still call a variant somatic.
    #[arg(long = "max-nml-vaf", value_name = "F", default_value_t = Params::default().max_nml_vaf, help_heading = "Somatic filters")]
    pub max_nml_vaf: f64,

    /// Minimum normal coverage at the variant site to PASS.
    #[arg(long = "min-nml-cov", value_name = "N", default_value_t = Params::default().min_nml_cov, help_heading = "Somatic filters")]
    pub min_nml_cov: u32,

    /// Minimum tumor coverage at the variant site to PASS.
    #[arg(long = "min-tmr-cov", value_name = "N", default_value_t = Params::default().min_tmr_cov, help_heading = "Somatic filters")]
    pub min_tmr_cov: u32,

    /// Maximum normal coverage at the variant site to PASS.
    #[arg(long = "max-nml-cov", value_name = "N", default_value_t = Params::default().max_nml_cov, help_heading = "Somatic filters")]
    pub max_nml_cov: u32,

    /// Maximum tumor coverage at the variant site to PASS.
    #[arg(long = "max-tmr-cov", value_name = "N", default_value_t = Params::default().max_tmr_cov, help_heading = "Somatic filters")]
    pub max_tmr_cov: u32,

    /// Minimum alt-supporting reads required on each strand.
    #[arg(long = "min-strand-cnt", value_name = "N", default_value_t = Params::default().min_strand_cnt, help_heading = "Somatic filters")]
    pub min_strand_cnt: u32,

    /// Minimum tumor alt allele count to PASS.
    #[arg(long = "min-tmr-alt-cnt", value_name = "N", default_value_t = Params::default().min_tmr_alt_cnt, help_heading = "Somatic filters")]
    pub min_tmr_alt_cnt: u32,

    /// Maximum normal alt allele count to still call a variant somatic.
    #[arg(long = "max-nml-alt-cnt", value_name = "N", default_value_t = Params::default().max_nml_alt_cnt, help_heading = "Somatic filters")]
    pub max_nml_alt_cnt: u32,

    /// Longest repeat unit considered when scanning for a microsatellite.
    #[arg(long = "max-str-unit-length", value_name = "N", default_value_t = Params::default().max_str_unit_length, help_heading = "STR detection")]
    pub max_str_unit_length: usize,

    /// Minimum repeat unit count for a run to count as a microsatellite.
    #[arg(long = "min-str-units", value_name = "N", default_value_t = Params::default().min_str_units, help_heading = "STR detection")]
    pub min_str_units: usize,

    /// Minimum total run length for a run to count as a microsatellite.
    #[arg(long = "min-str-length", value_name = "N", default_value_t = Params::default().min_str_length, help_heading = "STR detection")]
    pub min_str_length: usize,

    /// Max distance from a variant to a microsatellite run for the run to be attributed to it.
    #[arg(long = "max-str-dist", value_name = "N", default_value_t = Params::default().max_str_dist, help_heading = "STR detection")]
    pub max_str_dist: usize,

    /// Tally alt-supporting tumor reads by 10X `HP` haplotype tag and flag calls split across both haplotypes.
    #[arg(long = "tenx-mode", help_heading = "Mode")]
    pub tenx_mode: bool,

    /// Disable the cheap MD/CIGAR activity pre-filter; assemble every window regardless of evidence.
    #[arg(long = "active-region-off", help_heading = "Mode")]
    pub active_region_off: bool,

    /// Skip the reference/BAM contig table agreement check at startup.
    #[arg(long = "no-contig-check", help_heading = "Mode")]
    pub no_contig_check: bool,

    /// Increase log verbosity (`-v` debug, `-vv` trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Logging")]
    pub verbose: u8,
}

impl Cli {
    /// Resolve `--out-vcf`/`--out-prefix` into a concrete VCF path, required
    /// since neither flag is individually mandatory (either may supply it).
    pub fn resolve_out_vcf(&self) -> Result<PathBuf> {
        match (&self.out_vcf, &self.out_prefix) {
            (Some(p), _) => Ok(p.clone()),
            (None, Some(prefix)) => Ok(prefix.with_extension("vcf.gz")),
            (None, None) => Err(LancetError::MissingInput("one of --out-vcf or --out-prefix is required")),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Build the immutable [`Params`] bundle the scheduler and every worker
    /// thread share, running `Params::validate` before returning it.
    pub fn to_params(&self) -> Result<Params> {
        let params = Params {
            num_worker_threads: self.num_threads,
            region_pad_length: self.padding,
            window_length: self.window_length,
            pct_overlap: self.pct_overlap,

            min_kmer_size: self.min_kmer_length,
            max_kmer_size: self.max_kmer_length,
            trim_below_qual: Params::default().trim_below_qual,
            min_graph_tip_length: self.min_graph_tip_length,
            min_anchor_cov: self.min_anchor_cov,
            min_node_cov: self.min_node_cov,
            min_cov_ratio: self.min_cov_ratio,
            max_window_cov: self.max_window_cov,
            graph_traversal_limit: self.graph_traversal_limit,
            max_indel_length: self.max_indel_length,
            max_rpt_mismatch: self.max_rpt_mismatch,

            min_base_qual: self.min_base_qual,
            min_read_mapping_qual: self.min_mapping_qual,

            min_fisher: self.min_fisher,
            min_str_fisher: self.min_str_fisher,
            min_tmr_vaf: self.min_tmr_vaf,
            max_nml_vaf: self.max_nml_vaf,
            min_tmr_cov: self.min_tmr_cov,
            min_nml_cov: self.min_nml_cov,
            max_tmr_cov: self.max_tmr_cov,
            max_nml_cov: self.max_nml_cov,
            min_strand_cnt: self.min_strand_cnt,
            min_tmr_alt_cnt: self.min_tmr_alt_cnt,
            max_nml_alt_cnt: self.max_nml_alt_cnt,

            max_str_unit_length: self.max_str_unit_length,
            min_str_units: self.min_str_units,
            min_str_length: self.min_str_length,
            max_str_dist: self.max_str_dist,

            tenx_mode: self.tenx_mode,
            active_region_off: self.active_region_off,
            no_contig_check: self.no_contig_check,

            out_graphs_dir: self.out_graphs_dir.clone(),
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec!["lancet", "--reference", "ref.fa", "--normal", "n.bam", "--tumor", "t.bam"]
    }

    #[test]
    fn out_vcf_takes_priority_over_out_prefix() {
        let mut args = base_args();
        args.extend(["--out-vcf", "a.vcf.gz", "--out-prefix", "b"]);
        let cli = Cli::parse_from(args);
        assert_eq!(cli.resolve_out_vcf().unwrap(), PathBuf::from("a.vcf.gz"));
    }

    #[test]
    fn out_prefix_gains_vcf_gz_extension() {
        let mut args = base_args();
        args.extend(["--out-prefix", "sample"]);
        let cli = Cli::parse_from(args);
        assert_eq!(cli.resolve_out_vcf().unwrap(), PathBuf::from("sample.vcf.gz"));
    }

    #[test]
    fn neither_output_flag_is_a_missing_input_error() {
        let cli = Cli::parse_from(base_args());
        assert!(cli.resolve_out_vcf().is_err());
    }

    #[test]
    fn defaults_match_params_default() {
        let cli = Cli::parse_from(base_args());
        let params = cli.to_params().unwrap();
        let default = Params::default();
        assert_eq!(params.window_length, default.window_length);
        assert_eq!(params.min_kmer_size, default.min_kmer_size);
        assert_eq!(params.min_tmr_vaf, default.min_tmr_vaf);
    }

    #[test]
    fn verbosity_count_maps_to_log_level() {
        let mut args = base_args();
        args.extend(["-vv"]);
        let cli = Cli::parse_from(args);
        assert_eq!(cli.log_level(), log::LevelFilter::Trace);
    }

    #[test]
    fn invalid_kmer_range_is_rejected_at_validation() {
        let mut args = base_args();
        args.extend(["--min-kmer-length", "101", "--max-kmer-length", "11"]);
        let cli = Cli::parse_from(args);
        assert!(cli.to_params().is_err());
    }
}
