//! The immutable parameter bundle shared by every worker thread: parsed from
//! the CLI once, validated, then handed to every window worker by reference.

#[derive(Debug, Clone)]
pub struct Params {
    pub num_worker_threads: u32,
    pub region_pad_length: u32,
    pub window_length: u32,
    pub pct_overlap: u32,

    pub min_kmer_size: usize,
    pub max_kmer_size: usize,
    pub trim_below_qual: u8,
    pub min_graph_tip_length: usize,
    pub min_anchor_cov: u32,
    pub min_node_cov: u32,
    pub min_cov_ratio: f64,
    pub max_window_cov: f64,
    pub graph_traversal_limit: u32,
    pub max_indel_length: usize,
    pub max_rpt_mismatch: usize,

    pub min_base_qual: u8,
    pub min_read_mapping_qual: u8,

    pub min_fisher: f64,
    pub min_str_fisher: f64,
    pub min_tmr_vaf: f64,
    pub max_nml_vaf: f64,
    pub min_tmr_cov: u32,
    pub min_nml_cov: u32,
    pub max_tmr_cov: u32,
    pub max_nml_cov: u32,
    pub min_strand_cnt: u32,
    pub min_tmr_alt_cnt: u32,
    pub max_nml_alt_cnt: u32,

    pub max_str_unit_length: usize,
    pub min_str_units: usize,
    pub min_str_length: usize,
    pub max_str_dist: usize,

    pub tenx_mode: bool,
    pub active_region_off: bool,
    pub no_contig_check: bool,

    pub out_graphs_dir: Option<std::path::PathBuf>,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            num_worker_threads: 1,
            region_pad_length: 250,
            window_length: 600,
            pct_overlap: 50,

            min_kmer_size: 11,
            max_kmer_size: 101,
            trim_below_qual: 10,
            min_graph_tip_length: 11,
            min_anchor_cov: 5,
            min_node_cov: 1,
            min_cov_ratio: 0.01,
            max_window_cov: 1000.0,
            graph_traversal_limit: 100_000,
            max_indel_length: 500,
            max_rpt_mismatch: 2,

            min_base_qual: 17,
            min_read_mapping_qual: 15,

            min_fisher: 5.0,
            min_str_fisher: 25.0,
            min_tmr_vaf: 0.01,
            max_nml_vaf: 0.0,
            min_tmr_cov: 4,
            min_nml_cov: 10,
            max_tmr_cov: 1000,
            max_nml_cov: 1000,
            min_strand_cnt: 1,
            min_tmr_alt_cnt: 3,
            max_nml_alt_cnt: 0,

            max_str_unit_length: 4,
            min_str_units: 3,
            min_str_length: 7,
            max_str_dist: 1,

            tenx_mode: false,
            active_region_off: false,
            no_contig_check: false,

            out_graphs_dir: None,
        }
    }
}

impl Params {
    pub fn validate(&self) -> crate::errors::Result<()> {
        use crate::errors::LancetError;
        if self.min_kmer_size > self.max_kmer_size {
            return Err(LancetError::InvalidKmerRange { min: self.min_kmer_size, max: self.max_kmer_size });
        }
        if !(5..=95).contains(&self.pct_overlap) {
            return Err(LancetError::InvalidPctOverlap(self.pct_overlap));
        }
        Ok(())
    }
}
