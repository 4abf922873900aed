//! Local micro-assembly somatic variant calling library. A
//! [`scheduler`] fans genomic windows out to a thread pool; each window goes
//! through [`assembler`]'s per-window pipeline (graph build, haplotype
//! enumeration, genotyping, call assembly) and the results are merged and
//! flushed in reference order by [`store`] into a [`vcf::VcfWriter`].

pub mod assembler;
pub mod bam;
pub mod call;
pub mod cli;
pub mod errors;
pub mod fasta;
pub mod genotype;
pub mod graph;
pub mod kmer;
pub mod params;
pub mod reads;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod transcript;
pub mod vcf;
pub mod windowing;
