use std::collections::HashMap;

use clap::Parser;
use lancet::bam::SampleReader;
use lancet::cli::Cli;
use lancet::errors::LancetError;
use lancet::fasta::ReferenceReader;
use lancet::graph::label::Sample;
use lancet::scheduler::{self, Inputs};
use lancet::vcf::VcfWriter;
use lancet::windowing::WindowBuilder;
use log::info;

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new().filter_level(cli.log_level()).init();

    if let Err(e) = run(&cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let params = cli.to_params()?;
    let out_vcf = cli.resolve_out_vcf()?;

    let ref_reader = ReferenceReader::from_path(&cli.reference)?;
    let contig_table = ref_reader.contig_table().clone();

    if !params.no_contig_check {
        check_contig_table(&contig_table, &cli.normal, Sample::Normal)?;
        check_contig_table(&contig_table, &cli.tumor, Sample::Tumor)?;
    }

    let mut builder = WindowBuilder::new(params.region_pad_length, params.window_length, params.pct_overlap)?;
    match (&cli.region, &cli.bed_file) {
        (Some(region), _) => builder.add_samtools_region(region, &contig_table)?,
        (None, Some(bed)) => builder.add_bed_file(bed, &contig_table)?,
        (None, None) => builder.add_all_contigs(&contig_table),
    }

    let contig_lengths: HashMap<usize, u64> = contig_table.values().map(|&(idx, len)| (idx, len)).collect();
    let windows = builder.build_windows(&contig_lengths)?;
    info!("assembling {} windows across {} contigs", windows.len(), contig_table.len());

    let contig_names: Vec<String> = (0..ref_reader.contig_count())
        .map(|idx| ref_reader.contig_name(idx).unwrap_or_default().to_string())
        .collect();

    let mut writer = VcfWriter::create(&out_vcf, &contig_table, &params)?;
    let inputs = Inputs { ref_path: cli.reference.clone(), normal_bam: cli.normal.clone(), tumor_bam: cli.tumor.clone() };

    scheduler::run(windows, &inputs, &contig_names, &params, &mut writer)?;
    writer.close()?;
    Ok(())
}

/// Fail fast at startup if `bam_path`'s contig set doesn't match the
/// reference's, rather than discovering the mismatch window by window.
fn check_contig_table(contig_table: &lancet::windowing::ContigTable, bam_path: &std::path::Path, sample: Sample) -> anyhow::Result<()> {
    let reader = SampleReader::from_path(bam_path, sample)?;
    let bam_contigs = reader.contig_names();
    for name in &bam_contigs {
        if !contig_table.contains_key(name) {
            return Err(LancetError::ContigTableMismatch { sample: format!("{sample:?}") }.into());
        }
    }
    Ok(())
}
