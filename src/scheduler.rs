//! Window fan-out and ordered output flush. A fixed pool of OS
//! threads pulls windows off a bounded `crossbeam-channel` queue, each
//! opening its own FASTA/BAM handles (`rust_htslib` readers are not `Sync`);
//! results flow back through a second bounded channel to the main thread,
//! which owns the [`VariantStore`] and writer and flushes in reference order
//! once enough later windows have completed to guarantee nothing earlier
//! can still change.

use std::panic;
use std::path::PathBuf;

use crossbeam_channel::bounded;
use log::{error, warn};

use crate::assembler::{assemble_window, WindowInput};
use crate::bam::SampleReader;
use crate::call::variant_call::VariantCall;
use crate::errors::Result;
use crate::fasta::ReferenceReader;
use crate::graph::label::Sample;
use crate::params::Params;
use crate::store::VariantStore;
use crate::vcf::VcfWriter;
use crate::windowing::{step_size, Window};

#[derive(Debug, Clone)]
pub struct Inputs {
    pub ref_path: PathBuf,
    pub normal_bam: PathBuf,
    pub tumor_bam: PathBuf,
}

/// `⌈4 * max(max_indel_length, window_length) / step⌉`: how many completed
/// windows of slack the ordered flush keeps behind the highest window index
/// seen so far, the margin within which an indel can still be merged into
/// every overlapping window before that window's turn to flush.
fn flush_buffer(params: &Params) -> usize {
    let step = step_size(params.window_length, params.pct_overlap).max(1);
    let span = params.max_indel_length.max(params.window_length as usize) as u64;
    ((4 * span) as f64 / step as f64).ceil() as usize
}

/// Run every window through the worker pool and write PASS/filtered calls to
/// `writer` in reference order. Blocks until every window has completed (or
/// panicked, in which case it contributes no calls) and the store is fully
/// drained.
pub fn run(windows: Vec<Window>, inputs: &Inputs, contig_names: &[String], params: &Params, writer: &mut VcfWriter) -> Result<()> {
    if windows.is_empty() {
        return Ok(());
    }
    let buffer = flush_buffer(params);
    let total = windows.len();
    let num_workers = params.num_worker_threads.max(1);

    // Both queues hold the full window count: the send loop below pushes
    // every window before the main thread starts draining results, so a
    // smaller result queue lets workers fill it and block on `send`, which
    // stops them from ever calling `work_rx.recv()` again and deadlocks the
    // still-unfinished send loop.
    let (work_tx, work_rx) = bounded::<Window>(total);
    let (result_tx, result_rx) = bounded::<(usize, Vec<(u64, VariantCall)>)>(total);

    let store = VariantStore::new();
    let mut write_err: Option<crate::errors::LancetError> = None;

    let mut pool = scoped_threadpool::Pool::new(num_workers);
    pool.scoped(|scope| {
        for _ in 0..num_workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let inputs = inputs.clone();
            let contig_names = contig_names.to_vec();
            let params = params.clone();
            scope.execute(move || worker_loop(work_rx, result_tx, &inputs, &contig_names, &params));
        }
        drop(work_rx);
        drop(result_tx);

        for &w in &windows {
            if work_tx.send(w).is_err() {
                break;
            }
        }
        drop(work_tx);

        let mut max_seen: Option<usize> = None;
        for _ in 0..total {
            let Ok((idx, batch)) = result_rx.recv() else { break };
            store.force_add(batch);
            max_seen = Some(max_seen.map_or(idx, |m| m.max(idx)));

            if let Some(m) = max_seen {
                if m >= buffer {
                    let boundary = &windows[m - buffer];
                    for call in store.flush_window(boundary) {
                        if let Err(e) = writer.write(&call, &contig_names[call.contig_idx]) {
                            write_err.get_or_insert(e);
                        }
                    }
                }
            }
        }
    });

    for call in store.flush_all() {
        if let Err(e) = writer.write(&call, &contig_names[call.contig_idx]) {
            write_err.get_or_insert(e);
        }
    }
    match write_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn worker_loop(
    work_rx: crossbeam_channel::Receiver<Window>,
    result_tx: crossbeam_channel::Sender<(usize, Vec<(u64, VariantCall)>)>,
    inputs: &Inputs,
    contig_names: &[String],
    params: &Params,
) {
    let ref_reader = match ReferenceReader::from_path(&inputs.ref_path) {
        Ok(r) => r,
        Err(e) => {
            error!("worker failed to open reference {:?}: {e}", inputs.ref_path);
            return;
        }
    };
    let mut normal_reader = match SampleReader::from_path(&inputs.normal_bam, Sample::Normal) {
        Ok(r) => r,
        Err(e) => {
            error!("worker failed to open normal BAM {:?}: {e}", inputs.normal_bam);
            return;
        }
    };
    let mut tumor_reader = match SampleReader::from_path(&inputs.tumor_bam, Sample::Tumor) {
        Ok(r) => r,
        Err(e) => {
            error!("worker failed to open tumor BAM {:?}: {e}", inputs.tumor_bam);
            return;
        }
    };

    while let Ok(window) = work_rx.recv() {
        let idx = window.index;
        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            process_window(&window, &ref_reader, &mut normal_reader, &mut tumor_reader, contig_names, params)
        }));
        let batch = match outcome {
            Ok(Ok(batch)) => batch,
            Ok(Err(e)) => {
                warn!("window {idx} skipped: {e}");
                Vec::new()
            }
            Err(_) => {
                error!("window {idx} panicked during assembly, skipping");
                Vec::new()
            }
        };
        if result_tx.send((idx, batch)).is_err() {
            break;
        }
    }
}

fn process_window(
    window: &Window,
    ref_reader: &ReferenceReader,
    normal_reader: &mut SampleReader,
    tumor_reader: &mut SampleReader,
    contig_names: &[String],
    params: &Params,
) -> Result<Vec<(u64, VariantCall)>> {
    let contig_name = contig_names
        .get(window.region.contig_idx)
        .ok_or_else(|| crate::errors::LancetError::Invariant(format!("no contig name for index {}", window.region.contig_idx)))?;
    let ref_seq = ref_reader.fetch(window.region.contig_idx, window.region.start0, window.region.end0)?;
    let normal_reads = normal_reader.fetch_reads(&window.region, contig_name, params)?;
    let tumor_reads = tumor_reader.fetch_reads(&window.region, contig_name, params)?;
    let input = WindowInput { window, ref_seq: &ref_seq, normal_reads: &normal_reads, tumor_reads: &tumor_reads };
    Ok(assemble_window(&input, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_buffer_is_at_least_one_for_default_params() {
        let params = Params::default();
        assert!(flush_buffer(&params) >= 1);
    }

    #[test]
    fn flush_buffer_grows_with_max_indel_length() {
        let mut params = Params::default();
        let small = flush_buffer(&params);
        params.max_indel_length *= 10;
        let large = flush_buffer(&params);
        assert!(large >= small);
    }

    #[test]
    fn empty_window_list_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = Inputs {
            ref_path: dir.path().join("ref.fa"),
            normal_bam: dir.path().join("normal.bam"),
            tumor_bam: dir.path().join("tumor.bam"),
        };
        let params = Params::default();
        // writer is never touched for an empty window list, so a bogus path is fine.
        let contig_table = crate::windowing::ContigTable::new();
        let writer_path = dir.path().join("out.vcf.gz");
        let mut writer = VcfWriter::create(&writer_path, &contig_table, &params).unwrap();
        assert!(run(Vec::new(), &inputs, &[], &params, &mut writer).is_ok());
    }
}
