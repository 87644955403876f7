//! Sketch engines backing on-disk sketch files.
//!
//! Every engine answers the same two questions about sketch files: how many distinct elements a
//! sketch holds, and what the union of two sketches is. Engines are stateless apart from their
//! configuration and never modify their input files.

use std::path::Path;

use enum_dispatch::enum_dispatch;

use crate::error::OracleError;

pub mod dashing;
pub mod estimator;

pub use dashing::DashingEngine;
pub use estimator::EstimatorEngine;

/// Engines supported by `BinStore`
#[derive(Debug, Clone)]
#[enum_dispatch]
pub enum SketchEngine {
    Dashing(DashingEngine),
    Estimator(EstimatorEngine),
}

/// Operations which must be implemented by all sketch engines.
#[enum_dispatch(SketchEngine)]
pub trait SketchBackend {
    /// Estimated number of distinct elements in the sketch at `sketch`
    fn cardinality(&self, sketch: &Path) -> Result<f64, OracleError>;

    /// Write the union of `lhs` and `rhs` to `output`, replacing any existing file
    fn union(&self, lhs: &Path, rhs: &Path, output: &Path) -> Result<(), OracleError>;

    /// File extension of sketches handled by this engine
    fn extension(&self) -> &'static str;
}

/// Engine selector used on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EngineKind {
    /// External `dashing` HyperLogLog binary
    #[default]
    Dashing,
    /// In-process HyperLogLog++ estimator
    Estimator,
}
