use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the pipeline, matching the kinds described in the
/// error-handling design: configuration errors and I/O errors are fatal at
/// startup or during a flush; truncated-reference and window-local failures
/// are recovered by skipping the offending window; invariant violations are
/// programming errors and abort the process.
#[derive(Error, Debug)]
pub enum LancetError {
    #[error("region '{region}' refers to unknown contig '{contig}'")]
    UnknownContig { region: String, contig: String },

    #[error("reference and {sample} BAM/CRAM disagree on contig table (use --no-contig-check to override)")]
    ContigTableMismatch { sample: String },

    #[error("invalid region string '{0}', expected CHROM:START-END")]
    InvalidRegion(String),

    #[error("--pct-overlap must be between 5 and 95, got {0}")]
    InvalidPctOverlap(u32),

    #[error("--min-kmer-length ({min}) must be <= --max-kmer-length ({max})")]
    InvalidKmerRange { min: usize, max: usize },

    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    #[error("failed to read BED file {path}: {source}")]
    BedFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("reference fetch for {contig}:{start}-{end} returned a truncated sequence ({got} < {expected} bases)")]
    TruncatedReference {
        contig: String,
        start: u64,
        end: u64,
        got: usize,
        expected: usize,
    },

    #[error("window {window_idx} failed during {stage}: {reason}")]
    WindowLocal {
        window_idx: usize,
        stage: &'static str,
        reason: String,
    },

    #[error("no repeat-free k in [{min_k}, {max_k}] for window {window_idx}")]
    NoKChosen { window_idx: usize, min_k: usize, max_k: usize },

    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, LancetError>;
