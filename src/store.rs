//! File-backed bin sketches.
//!
//! `BinStore` owns a directory holding one persisted sketch per bin (`bin_<index>.<ext>`) and a
//! single scratch file (`temp_bin.<ext>`) for the candidate union under evaluation. The scratch
//! file never aliases a bin file: a candidate becomes a bin sketch only by being renamed over it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::{SketchBackend, SketchEngine};
use crate::error::{Error, OracleError, Result};
use crate::oracle::{CardinalityOracle, SketchMerger};

/// Oracle and merger over sketch files managed in a bin directory
#[derive(Debug, Clone)]
pub struct BinStore {
    engine: SketchEngine,
    dir: PathBuf,
    scratch: PathBuf,
}

impl BinStore {
    /// Creates new `BinStore`, creating `dir` if needed and clearing a stale scratch file
    pub fn create(engine: SketchEngine, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let scratch = dir.join(format!("temp_bin.{}", engine.extension()));
        remove_if_exists(&scratch).map_err(|e| Error::io(&scratch, e))?;
        Ok(Self {
            engine,
            dir,
            scratch,
        })
    }

    pub fn engine(&self) -> &SketchEngine {
        &self.engine
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the scratch candidate file
    pub fn scratch_path(&self) -> &Path {
        &self.scratch
    }

    /// Path of the persisted sketch of bin `index`
    pub fn bin_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("bin_{index}.{}", self.engine.extension()))
    }
}

impl CardinalityOracle<PathBuf> for BinStore {
    fn cardinality(&self, sketch: &PathBuf) -> std::result::Result<f64, OracleError> {
        self.engine.cardinality(sketch)
    }
}

impl SketchMerger<PathBuf> for BinStore {
    fn union(&self, lhs: &PathBuf, rhs: &PathBuf) -> std::result::Result<PathBuf, OracleError> {
        self.engine.union(lhs, rhs, &self.scratch)?;
        Ok(self.scratch.clone())
    }

    fn seed(&self, bin: usize, sketch: &PathBuf) -> std::result::Result<PathBuf, OracleError> {
        let path = self.bin_path(bin);
        fs::copy(sketch, &path).map_err(|e| OracleError::io(&path, e))?;
        debug!(bin, from = %sketch.display(), to = %path.display(), "seeded bin sketch");
        Ok(path)
    }

    fn commit(&self, bin: usize, candidate: PathBuf) -> std::result::Result<PathBuf, OracleError> {
        let path = self.bin_path(bin);
        fs::rename(&candidate, &path).map_err(|e| OracleError::io(&path, e))?;
        Ok(path)
    }

    fn discard(&self, candidate: PathBuf) -> std::result::Result<(), OracleError> {
        remove_if_exists(&candidate).map_err(|e| OracleError::io(&candidate, e))
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::engine::EstimatorEngine;

    #[test]
    fn test_candidate_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EstimatorEngine;
        let item_a = dir.path().join("a.sketch");
        let item_b = dir.path().join("b.sketch");
        engine
            .store(&item_a, &engine.sketch_sequences(Cursor::new("ACGTACGGA"), 4).unwrap())
            .unwrap();
        engine
            .store(&item_b, &engine.sketch_sequences(Cursor::new("TTGACCAGT"), 4).unwrap())
            .unwrap();

        let store = BinStore::create(engine.into(), dir.path().join("bins")).unwrap();
        let bin0 = store.seed(0, &item_a).unwrap();
        assert_eq!(bin0, store.bin_path(0));
        assert!(item_a.exists(), "seeding copies the item sketch");

        let candidate = store.union(&bin0, &item_b).unwrap();
        assert_eq!(candidate, store.scratch_path());
        store.discard(candidate).unwrap();
        assert!(!store.scratch_path().exists());

        let before = store.cardinality(&bin0).unwrap();
        let candidate = store.union(&bin0, &item_b).unwrap();
        let after = store.cardinality(&candidate).unwrap();
        let committed = store.commit(0, candidate).unwrap();
        assert_eq!(committed, bin0);
        assert!(!store.scratch_path().exists());
        assert!(after >= before);
        assert_eq!(store.cardinality(&bin0).unwrap(), after);
    }

    #[test]
    fn test_create_clears_stale_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("temp_bin.sketch");
        fs::write(&stale, b"leftover").unwrap();

        let store = BinStore::create(EstimatorEngine.into(), dir.path()).unwrap();
        assert_eq!(store.scratch_path(), stale);
        assert!(!stale.exists());
        assert_eq!(store.bin_path(3), dir.path().join("bin_3.sketch"));
    }
}
