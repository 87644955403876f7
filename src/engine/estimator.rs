//! ## Estimator engine
//! Answers queries in-process using `cardinality-estimator`'s HyperLogLog++ with `P = 12`,
//! `W = 6` (expected error 1.04 / sqrt(2^12) = 1.62%) and `WyHash`.
//!
//! Sketch files hold the estimator serialized as JSON. Elements are canonical k-mers: the
//! lexicographically smaller of a k-mer and its reverse complement, so both strands of a genome
//! produce the same sketch.

use std::fs;
use std::io::BufRead;
use std::path::Path;

use cardinality_estimator::CardinalityEstimator;
use wyhash::WyHash;

use super::SketchBackend;
use crate::error::OracleError;

/// Default k-mer length
pub const DEFAULT_K: usize = 31;

/// HyperLogLog++ sketch of canonical k-mers
pub type KmerSketch = CardinalityEstimator<[u8], WyHash, 12, 6>;

/// In-process sketch engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EstimatorEngine;

impl EstimatorEngine {
    /// Read a sketch from `path`
    pub fn load(&self, path: &Path) -> Result<KmerSketch, OracleError> {
        let bytes = fs::read(path).map_err(|e| OracleError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| OracleError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write `sketch` to `path`, replacing any existing file
    pub fn store(&self, path: &Path, sketch: &KmerSketch) -> Result<(), OracleError> {
        let bytes = serde_json::to_vec(sketch).map_err(|source| OracleError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, bytes).map_err(|e| OracleError::io(path, e))
    }

    /// Sketch the canonical `k`-mers of every sequence record read from `reader`.
    ///
    /// FASTA (`>`) and FASTQ (`@`, `+`) header lines are skipped, as are FASTQ quality lines
    /// following a `+` line. Wrapped sequence lines are joined, so k-mers span line breaks within a
    /// record but never cross a header. Windows containing anything but `ACGT`
    /// (case-insensitive) are skipped.
    pub fn sketch_sequences<R: BufRead>(&self, reader: R, k: usize) -> std::io::Result<KmerSketch> {
        let mut sketch = KmerSketch::new();
        let mut canonical = vec![0u8; k];
        let mut skip_quality = false;
        // last `k - 1` bases of the current record followed by the current line
        let mut record: Vec<u8> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if skip_quality {
                skip_quality = false;
                continue;
            }
            let seq = line.trim().as_bytes();
            match seq.first() {
                None => continue,
                Some(b'>') | Some(b'@') => {
                    record.clear();
                    continue;
                }
                Some(b'+') => {
                    record.clear();
                    skip_quality = true;
                    continue;
                }
                _ => {}
            }

            record.extend_from_slice(seq);
            if k > 0 && record.len() >= k {
                for window in record.windows(k) {
                    if canonicalize(window, &mut canonical) {
                        sketch.insert(canonical.as_slice());
                    }
                }
            }
            let keep = k.saturating_sub(1).min(record.len());
            record.drain(..record.len() - keep);
        }

        Ok(sketch)
    }
}

impl SketchBackend for EstimatorEngine {
    fn cardinality(&self, sketch: &Path) -> Result<f64, OracleError> {
        Ok(self.load(sketch)?.estimate() as f64)
    }

    fn union(&self, lhs: &Path, rhs: &Path, output: &Path) -> Result<(), OracleError> {
        let mut merged = KmerSketch::new();
        merged.merge(&self.load(lhs)?);
        merged.merge(&self.load(rhs)?);
        self.store(output, &merged)
    }

    fn extension(&self) -> &'static str {
        "sketch"
    }
}

/// Write the canonical form of `kmer` into `out`.
/// Returns false when `kmer` contains a non-`ACGT` base.
fn canonicalize(kmer: &[u8], out: &mut [u8]) -> bool {
    let mut forward_smaller = None;
    let n = kmer.len();
    for i in 0..n {
        let fwd = match kmer[i].to_ascii_uppercase() {
            b @ (b'A' | b'C' | b'G' | b'T') => b,
            _ => return false,
        };
        let rev = match kmer[n - 1 - i].to_ascii_uppercase() {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            _ => return false,
        };
        if forward_smaller.is_none() && fwd != rev {
            forward_smaller = Some(fwd < rev);
        }
    }

    let forward = forward_smaller.unwrap_or(true);
    for i in 0..n {
        out[i] = if forward {
            kmer[i].to_ascii_uppercase()
        } else {
            match kmer[n - 1 - i].to_ascii_uppercase() {
                b'A' => b'T',
                b'C' => b'G',
                b'G' => b'C',
                _ => b'A',
            }
        };
    }
    true
}
