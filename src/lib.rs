//! `sketch-binpack` groups genome sketches into a small number of capacity-bounded bins.
//!
//! Each input is a probabilistic cardinality sketch (HyperLogLog). Bins are filled greedily with
//! First-Fit: an item joins the first open bin whose approximate union cardinality stays within
//! the capacity, otherwise it opens a new bin. Union cardinalities come from an external sketch
//! engine, so exact set operations are never needed.
mod catalog;
pub mod engine;
mod error;
mod oracle;
mod packer;
mod report;
mod store;

pub use catalog::{
    FallbackPolicy, Identifier, IdentifierRules, Item, ItemCatalog, DEFAULT_NOISE_TOKENS,
};
pub use engine::{DashingEngine, EngineKind, EstimatorEngine, SketchBackend, SketchEngine};
pub use error::{Error, OracleError, Result};
pub use oracle::{CardinalityOracle, SketchMerger};
pub use packer::{
    pack, Bin, BinSummary, FirstFitBinPacker, FitStrategy, PackerConfig, PackingResult, Placement,
    DEFAULT_SATURATION,
};
pub use report::{OutputLayout, ReportFormat, ReportWriter};
pub use store::BinStore;
