//! Reference FASTA access: random-access fetch of a
//! `(contig, start0, end0)` span, and the contig table used to validate
//! regions and order windows.

use std::path::Path;

use rust_htslib::faidx;

use crate::errors::{LancetError, Result};
use crate::windowing::ContigTable;

/// Wraps `rust_htslib::faidx::Reader`, exposing 0-based half-open fetches
/// with uppercasing and non-ACGT coercion to `N`.
pub struct ReferenceReader {
    inner: faidx::Reader,
    contig_names: Vec<String>,
    contig_table: ContigTable,
}

impl ReferenceReader {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = faidx::Reader::from_path(path)?;
        let (contig_names, contig_table) = read_contig_table(path)?;
        Ok(Self { inner, contig_names, contig_table })
    }

    pub fn contig_table(&self) -> &ContigTable {
        &self.contig_table
    }

    pub fn contig_name(&self, idx: usize) -> Option<&str> {
        self.contig_names.get(idx).map(String::as_str)
    }

    pub fn contig_count(&self) -> usize {
        self.contig_names.len()
    }

    /// Fetch `[start0, end0)` on contig `contig_idx`, uppercased with any
    /// non-ACGT base coerced to `N`.
    pub fn fetch(&self, contig_idx: usize, start0: u64, end0: u64) -> Result<Vec<u8>> {
        let name = self.contig_name(contig_idx).ok_or_else(|| LancetError::UnknownContig {
            region: format!("{start0}-{end0}"),
            contig: format!("<index {contig_idx}>"),
        })?;
        if end0 <= start0 {
            return Ok(Vec::new());
        }
        let mut seq = self.inner.fetch_seq(name, start0 as usize, (end0 - 1) as usize)?.to_vec();
        normalize_in_place(&mut seq);
        Ok(seq)
    }
}

fn normalize_in_place(seq: &mut [u8]) {
    for b in seq.iter_mut() {
        *b = match b.to_ascii_uppercase() {
            c @ (b'A' | b'C' | b'G' | b'T') => c,
            _ => b'N',
        };
    }
}

/// Parse the `.fai` index for `fasta_path` to recover contig names and
/// lengths in FASTA header order, giving every contig a stable 0-based
/// index shared with the BAM readers and the VCF header.
fn read_contig_table(fasta_path: &Path) -> Result<(Vec<String>, ContigTable)> {
    let fai_path = append_extension(fasta_path, ".fai");
    let file = std::fs::File::open(&fai_path)?;
    let reader = std::io::BufReader::new(file);
    use std::io::BufRead;

    let mut names = Vec::new();
    let mut table = ContigTable::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let mut fields = line.split('\t');
        let name = fields.next().ok_or_else(|| LancetError::Invariant("empty .fai line".to_string()))?;
        let length: u64 = fields
            .next()
            .ok_or_else(|| LancetError::Invariant("missing .fai length field".to_string()))?
            .parse()
            .map_err(|_| LancetError::Invariant("non-numeric .fai length field".to_string()))?;
        names.push(name.to_string());
        table.insert(name.to_string(), (idx, length));
    }
    Ok((names, table))
}

fn append_extension(path: &Path, ext: &str) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(ext);
    std::path::PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let fasta_path = dir.path().join("ref.fa");
        let mut f = std::fs::File::create(&fasta_path).unwrap();
        writeln!(f, ">chr1").unwrap();
        writeln!(f, "ACGTacgtNNNNacgtACGT").unwrap();
        writeln!(f, ">chr2").unwrap();
        writeln!(f, "TTTTGGGG").unwrap();
        drop(f);

        let fai_path = dir.path().join("ref.fa.fai");
        let mut fai = std::fs::File::create(&fai_path).unwrap();
        // name, length, offset, linebases, linewidth (samtools faidx format)
        writeln!(fai, "chr1\t20\t6\t20\t21").unwrap();
        writeln!(fai, "chr2\t8\t33\t8\t9").unwrap();
        fasta_path
    }

    #[test]
    fn contig_table_preserves_header_order() {
        let dir = tempfile::tempdir().unwrap();
        let fasta_path = write_fasta(&dir);
        let (names, table) = read_contig_table(&fasta_path).unwrap();
        assert_eq!(names, vec!["chr1", "chr2"]);
        assert_eq!(table.get("chr1"), Some(&(0, 20)));
        assert_eq!(table.get("chr2"), Some(&(1, 8)));
    }

    #[test]
    fn normalize_uppercases_and_coerces_ambiguous_bases() {
        let mut seq = b"acgtNNNNacgt".to_vec();
        normalize_in_place(&mut seq);
        assert_eq!(seq, b"ACGTNNNNACGT");
    }
}
