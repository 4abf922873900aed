//! Region/window expansion: turn samtools-style region
//! strings and/or a BED file into a sorted, padded list of fixed-length,
//! overlapping windows.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::{LancetError, Result};

/// A half-open, 0-based genomic interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub contig_idx: usize,
    pub start0: u64,
    pub end0: u64,
}

impl Region {
    pub fn len(&self) -> u64 {
        self.end0.saturating_sub(self.start0)
    }

    pub fn contains(&self, pos0: u64) -> bool {
        pos0 >= self.start0 && pos0 < self.end0
    }
}

/// A region plus the monotonic index assigned in sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub region: Region,
    pub index: usize,
}

/// Name -> (0-based index, length) contig table, as exposed by the
/// reference FASTA collaborator.
pub type ContigTable = HashMap<String, (usize, u64)>;

/// `step = round(W * (100-O) / 100 / 100) * 100`, rounded to the nearest 100bp.
pub fn step_size(window_length: u32, pct_overlap: u32) -> u64 {
    let raw = window_length as f64 * (100 - pct_overlap) as f64 / 100.0;
    let rounded_to_100 = (raw / 100.0).round() * 100.0;
    rounded_to_100.max(1.0) as u64
}

fn parse_samtools_region(region_str: &str, contigs: &ContigTable) -> Result<Region> {
    let (contig, rest) = region_str
        .split_once(':')
        .ok_or_else(|| LancetError::InvalidRegion(region_str.to_string()))?;
    let (start_str, end_str) = rest
        .split_once('-')
        .ok_or_else(|| LancetError::InvalidRegion(region_str.to_string()))?;
    let start1: u64 = start_str
        .replace(',', "")
        .parse()
        .map_err(|_| LancetError::InvalidRegion(region_str.to_string()))?;
    let end1: u64 = end_str
        .replace(',', "")
        .parse()
        .map_err(|_| LancetError::InvalidRegion(region_str.to_string()))?;
    let (contig_idx, contig_len) = contigs
        .get(contig)
        .copied()
        .ok_or_else(|| LancetError::UnknownContig { region: region_str.to_string(), contig: contig.to_string() })?;
    if start1 == 0 || start1 > end1 {
        return Err(LancetError::InvalidRegion(region_str.to_string()));
    }
    let start0 = start1 - 1;
    let end0 = end1.min(contig_len);
    Ok(Region { contig_idx, start0, end0 })
}

fn parse_bed_file(path: &Path, contigs: &ContigTable) -> Result<Vec<Region>> {
    let file = File::open(path).map_err(|e| LancetError::BedFile { path: path.to_path_buf(), source: e })?;
    let reader = BufReader::new(file);
    let mut regions = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| LancetError::BedFile { path: path.to_path_buf(), source: e })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("track") || line.starts_with("browser") {
            continue;
        }
        let mut fields = line.split('\t');
        let contig = fields.next().ok_or_else(|| LancetError::InvalidRegion(line.to_string()))?;
        let start0: u64 = fields
            .next()
            .ok_or_else(|| LancetError::InvalidRegion(line.to_string()))?
            .parse()
            .map_err(|_| LancetError::InvalidRegion(line.to_string()))?;
        let end0: u64 = fields
            .next()
            .ok_or_else(|| LancetError::InvalidRegion(line.to_string()))?
            .parse()
            .map_err(|_| LancetError::InvalidRegion(line.to_string()))?;
        let (contig_idx, contig_len) = contigs
            .get(contig)
            .copied()
            .ok_or_else(|| LancetError::UnknownContig { region: line.to_string(), contig: contig.to_string() })?;
        regions.push(Region { contig_idx, start0, end0: end0.min(contig_len) });
    }
    Ok(regions)
}

pub struct WindowBuilder {
    padding: u64,
    window_length: u64,
    pct_overlap: u32,
    raw_regions: Vec<Region>,
}

impl WindowBuilder {
    pub fn new(padding: u32, window_length: u32, pct_overlap: u32) -> Result<Self> {
        if !(5..=95).contains(&pct_overlap) {
            return Err(LancetError::InvalidPctOverlap(pct_overlap));
        }
        Ok(WindowBuilder {
            padding: padding as u64,
            window_length: window_length as u64,
            pct_overlap,
            raw_regions: Vec::new(),
        })
    }

    pub fn add_samtools_region(&mut self, region_str: &str, contigs: &ContigTable) -> Result<()> {
        self.raw_regions.push(parse_samtools_region(region_str, contigs)?);
        Ok(())
    }

    pub fn add_bed_file(&mut self, path: &Path, contigs: &ContigTable) -> Result<()> {
        self.raw_regions.extend(parse_bed_file(path, contigs)?);
        Ok(())
    }

    /// Add every contig in `contigs` as a whole-contig region, used when no
    /// `--region`/`--bed-file` was given.
    pub fn add_all_contigs(&mut self, contigs: &ContigTable) {
        for &(idx, len) in contigs.values() {
            self.raw_regions.push(Region { contig_idx: idx, start0: 0, end0: len });
        }
    }

    fn pad(&self, r: Region, contig_len: u64) -> Region {
        let start0 = r.start0.saturating_sub(self.padding);
        let end0 = (r.end0 + self.padding).min(contig_len);
        Region { contig_idx: r.contig_idx, start0, end0 }
    }

    /// Build sorted, padded, overlapping windows from the accumulated regions.
    pub fn build_windows(&self, contig_lengths: &HashMap<usize, u64>) -> Result<Vec<Window>> {
        if self.raw_regions.is_empty() {
            return Err(LancetError::MissingInput("no regions to build windows from"));
        }
        let step = step_size(self.window_length as u32, self.pct_overlap);
        let mut windows = Vec::new();

        for &raw in &self.raw_regions {
            let contig_len = *contig_lengths.get(&raw.contig_idx).unwrap_or(&raw.end0);
            let padded = self.pad(raw, contig_len);
            if padded.len() <= self.window_length {
                windows.push(padded);
                continue;
            }
            let mut s = padded.start0;
            while s < padded.end0 {
                let e = (s + self.window_length).min(padded.end0);
                windows.push(Region { contig_idx: padded.contig_idx, start0: s, end0: e });
                s += step;
            }
        }

        windows.sort_by_key(|r| (r.contig_idx, r.start0, r.end0));
        Ok(windows
            .into_iter()
            .enumerate()
            .map(|(index, region)| Window { region, index })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contigs() -> ContigTable {
        let mut m = HashMap::new();
        m.insert("chr1".to_string(), (0, 10_000));
        m.insert("chr2".to_string(), (1, 5_000));
        m
    }

    #[test]
    fn step_size_rounds_to_nearest_hundred() {
        assert_eq!(step_size(600, 50), 300);
        assert_eq!(step_size(600, 90), 100);
    }

    #[test]
    fn single_window_when_padded_region_fits() {
        let mut wb = WindowBuilder::new(10, 600, 50).unwrap();
        wb.add_samtools_region("chr1:100-200", &contigs()).unwrap();
        let mut lens = HashMap::new();
        lens.insert(0, 10_000);
        let windows = wb.build_windows(&lens).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].region.start0, 89);
        assert_eq!(windows[0].region.end0, 210);
    }

    #[test]
    fn windows_cover_every_position_in_padded_region() {
        let mut wb = WindowBuilder::new(0, 600, 50).unwrap();
        wb.add_samtools_region("chr1:1-5000", &contigs()).unwrap();
        let mut lens = HashMap::new();
        lens.insert(0, 10_000);
        let windows = wb.build_windows(&lens).unwrap();
        // every position in [0, 5000) must be covered by some window
        for pos in (0..5000u64).step_by(137) {
            assert!(windows.iter().any(|w| w.region.contains(pos)), "pos {pos} not covered");
        }
        // windows sorted and indices assigned in order
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index, i);
        }
    }

    #[test]
    fn unknown_contig_is_an_error() {
        let mut wb = WindowBuilder::new(0, 600, 50).unwrap();
        assert!(wb.add_samtools_region("chrZ:1-10", &contigs()).is_err());
    }

    #[test]
    fn rejects_out_of_range_overlap() {
        assert!(WindowBuilder::new(0, 600, 4).is_err());
        assert!(WindowBuilder::new(0, 600, 96).is_err());
    }
}
