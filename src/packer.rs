//! First-Fit bin packing over an approximate-cardinality oracle.
//!
//! # Algorithm
//!
//! Items are placed one at a time, in catalog order, with no backtracking:
//! - bins are scanned in creation order, skipping saturated ones;
//! - for each available bin a candidate union of the bin sketch and the item sketch is built and
//!   its cardinality queried;
//! - the first candidate whose cardinality fits within `capacity` is committed, and the bin is
//!   saturated (permanently excluded from later scans) once its cardinality reaches
//!   `saturation * capacity`;
//! - when no bin accepts the item, a new bin seeded with the item sketch is opened.
//!
//! Every oracle call is blocking and sequential. Any oracle failure aborts the run.
//!
//! # Best-Fit
//!
//! [`FitStrategy::BestFit`] probes every available bin and commits to the one with the largest
//! fitting candidate cardinality (lowest index on ties). It costs one cardinality query per
//! available bin plus one extra union for the winner, because only a single candidate sketch is
//! ever alive at a time.

use std::fmt::{Debug, Formatter};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::Item;
use crate::error::{Error, Result};
use crate::oracle::{checked_cardinality, CardinalityOracle, SketchMerger};

/// Fraction of capacity at which a bin stops accepting items
pub const DEFAULT_SATURATION: f64 = 0.95;

/// Bin selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FitStrategy {
    /// Commit to the first available bin that fits
    #[default]
    FirstFit,
    /// Commit to the available bin left fullest by the item
    BestFit,
}

/// Packing policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackerConfig {
    capacity: f64,
    saturation: f64,
    strategy: FitStrategy,
}

impl PackerConfig {
    /// Creates new `PackerConfig` with default saturation and First-Fit placement
    pub fn new(capacity: f64) -> Result<Self> {
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(Error::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            saturation: DEFAULT_SATURATION,
            strategy: FitStrategy::default(),
        })
    }

    /// Set the saturation fraction, which must lie in `(0, 1]`
    pub fn with_saturation(mut self, saturation: f64) -> Result<Self> {
        if !(saturation > 0.0 && saturation <= 1.0) {
            return Err(Error::InvalidSaturation(saturation));
        }
        self.saturation = saturation;
        Ok(self)
    }

    pub fn with_strategy(mut self, strategy: FitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[inline]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    #[inline]
    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    #[inline]
    pub fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    /// Cardinality at or above which a bin is saturated
    #[inline]
    pub fn saturation_limit(&self) -> f64 {
        self.saturation * self.capacity
    }
}

/// Capacity-bounded group of items
#[derive(Clone, PartialEq)]
pub struct Bin<S> {
    index: usize,
    members: Vec<String>,
    sketch: S,
    cardinality: f64,
    available: bool,
}

impl<S> Bin<S> {
    /// Position of the bin in creation order
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Member identifiers in insertion order
    #[inline]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    #[inline]
    pub fn sketch(&self) -> &S {
        &self.sketch
    }

    /// Cardinality of the bin sketch as last reported by the oracle
    #[inline]
    pub fn cardinality(&self) -> f64 {
        self.cardinality
    }

    /// Whether the bin is still considered for placements
    #[inline]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Serializable view of the bin without its sketch
    pub fn summary(&self) -> BinSummary {
        BinSummary {
            index: self.index,
            members: self.members.clone(),
            cardinality: self.cardinality,
            saturated: !self.available,
        }
    }
}

impl<S> Debug for Bin<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bin")
            .field("index", &self.index)
            .field("members", &self.members)
            .field("cardinality", &self.cardinality)
            .field("available", &self.available)
            .finish()
    }
}

/// Sketch-free description of a packed bin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSummary {
    pub index: usize,
    pub members: Vec<String>,
    pub cardinality: f64,
    pub saturated: bool,
}

/// Bins in creation order
#[derive(Debug, Clone, PartialEq)]
pub struct PackingResult<S> {
    bins: Vec<Bin<S>>,
}

impl<S> PackingResult<S> {
    #[inline]
    pub fn bins(&self) -> &[Bin<S>] {
        &self.bins
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn into_bins(self) -> Vec<Bin<S>> {
        self.bins
    }

    /// Bin index of `id`, if it was packed
    pub fn bin_of(&self, id: &str) -> Option<usize> {
        self.bins
            .iter()
            .find(|bin| bin.members.iter().any(|m| m == id))
            .map(|bin| bin.index)
    }

    /// `(identifier, bin index)` pairs in bin order, then insertion order
    pub fn assignments(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.bins
            .iter()
            .flat_map(|bin| bin.members.iter().map(move |m| (m.as_str(), bin.index)))
    }

    pub fn summaries(&self) -> Vec<BinSummary> {
        self.bins.iter().map(Bin::summary).collect()
    }
}

/// Outcome of placing a single item
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Item merged into an existing bin
    Committed {
        bin: usize,
        cardinality: f64,
        saturated: bool,
    },
    /// Item seeded a new bin
    Opened { bin: usize, cardinality: f64 },
}

impl Placement {
    #[inline]
    pub fn bin(&self) -> usize {
        match *self {
            Placement::Committed { bin, .. } | Placement::Opened { bin, .. } => bin,
        }
    }

    #[inline]
    pub fn cardinality(&self) -> f64 {
        match *self {
            Placement::Committed { cardinality, .. } | Placement::Opened { cardinality, .. } => {
                cardinality
            }
        }
    }
}

/// Incremental bin packer.
///
/// [`place`](Self::place) decides and applies the placement of one item; [`pack`] drives it over
/// a whole catalog.
pub struct FirstFitBinPacker<S> {
    config: PackerConfig,
    bins: Vec<Bin<S>>,
}

impl<S> FirstFitBinPacker<S> {
    /// Creates new empty `FirstFitBinPacker`
    pub fn new(config: PackerConfig) -> Self {
        Self {
            config,
            bins: Vec::new(),
        }
    }

    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    pub fn bins(&self) -> &[Bin<S>] {
        &self.bins
    }

    /// Place `item` into a bin, opening one if needed.
    ///
    /// Bin state is only changed after every oracle call for the item has succeeded, so on error
    /// the packer still describes the bins as they were before the call.
    pub fn place<O, M>(&mut self, item: Item<S>, oracle: &O, merger: &M) -> Result<Placement>
    where
        O: CardinalityOracle<S>,
        M: SketchMerger<S>,
    {
        let chosen = match self.config.strategy {
            FitStrategy::FirstFit => self.first_fit(&item, oracle, merger)?,
            FitStrategy::BestFit => self.best_fit(&item, oracle, merger)?,
        };

        let (id, sketch) = item.into_parts();
        match chosen {
            Some((idx, candidate, cardinality)) => {
                let persisted = merger.commit(idx, candidate)?;
                let limit = self.config.saturation_limit();
                let bin = &mut self.bins[idx];
                bin.sketch = persisted;
                bin.members.push(id);
                bin.cardinality = cardinality;
                if cardinality >= limit {
                    bin.available = false;
                    info!(bin = idx, cardinality, "bin saturated");
                }
                Ok(Placement::Committed {
                    bin: idx,
                    cardinality,
                    saturated: !bin.available,
                })
            }
            None => self.open(id, &sketch, oracle, merger),
        }
    }

    /// Consume the packer, returning bins in creation order
    pub fn finish(self) -> PackingResult<S> {
        PackingResult { bins: self.bins }
    }

    /// Probe available bins in creation order, returning the first fitting candidate.
    fn first_fit<O, M>(
        &self,
        item: &Item<S>,
        oracle: &O,
        merger: &M,
    ) -> Result<Option<(usize, S, f64)>>
    where
        O: CardinalityOracle<S>,
        M: SketchMerger<S>,
    {
        for bin in self.bins.iter().filter(|bin| bin.available) {
            let (candidate, cardinality) = self.probe(bin, item, oracle, merger)?;
            if cardinality <= self.config.capacity {
                return Ok(Some((bin.index, candidate, cardinality)));
            }
            merger.discard(candidate)?;
        }
        Ok(None)
    }

    /// Probe every available bin, then rebuild the candidate of the fullest fitting one.
    ///
    /// The rebuilt candidate is measured again. If it no longer fits, the next fullest bin is
    /// tried, and the item opens a new bin when none remains.
    fn best_fit<O, M>(
        &self,
        item: &Item<S>,
        oracle: &O,
        merger: &M,
    ) -> Result<Option<(usize, S, f64)>>
    where
        O: CardinalityOracle<S>,
        M: SketchMerger<S>,
    {
        let mut fitting: Vec<(usize, f64)> = Vec::new();
        for bin in self.bins.iter().filter(|bin| bin.available) {
            let (candidate, cardinality) = self.probe(bin, item, oracle, merger)?;
            merger.discard(candidate)?;
            if cardinality <= self.config.capacity {
                fitting.push((bin.index, cardinality));
            }
        }
        // stable sort, so ties keep the lowest index first
        fitting.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (idx, measured) in fitting {
            let (candidate, cardinality) = self.probe(&self.bins[idx], item, oracle, merger)?;
            if cardinality <= self.config.capacity {
                return Ok(Some((idx, candidate, cardinality)));
            }
            warn!(
                bin = idx,
                item = item.id(),
                measured,
                cardinality,
                capacity = self.config.capacity,
                "candidate no longer fits when rebuilt"
            );
            merger.discard(candidate)?;
        }
        Ok(None)
    }

    /// Build the candidate union of `bin` and `item` and measure it.
    fn probe<O, M>(&self, bin: &Bin<S>, item: &Item<S>, oracle: &O, merger: &M) -> Result<(S, f64)>
    where
        O: CardinalityOracle<S>,
        M: SketchMerger<S>,
    {
        let candidate = merger.union(&bin.sketch, item.sketch())?;
        let cardinality = match oracle.cardinality(&candidate).and_then(checked_cardinality) {
            Ok(cardinality) => cardinality,
            Err(e) => {
                // the run aborts anyway, a failed discard must not mask the oracle error
                let _ = merger.discard(candidate);
                return Err(e.into());
            }
        };
        debug!(
            bin = bin.index,
            item = item.id(),
            cardinality,
            capacity = self.config.capacity,
            "probed candidate"
        );
        Ok((candidate, cardinality))
    }

    /// Open a new bin seeded with the item sketch.
    fn open<O, M>(&mut self, id: String, sketch: &S, oracle: &O, merger: &M) -> Result<Placement>
    where
        O: CardinalityOracle<S>,
        M: SketchMerger<S>,
    {
        let index = self.bins.len();
        let seeded = merger.seed(index, sketch)?;
        let cardinality = checked_cardinality(oracle.cardinality(&seeded)?)?;
        if cardinality > self.config.capacity {
            warn!(
                bin = index,
                item = %id,
                cardinality,
                capacity = self.config.capacity,
                "item alone exceeds bin capacity"
            );
        }
        info!(bin = index, item = %id, cardinality, "opened bin");

        self.bins.push(Bin {
            index,
            members: vec![id],
            sketch: seeded,
            cardinality,
            available: true,
        });
        Ok(Placement::Opened {
            bin: index,
            cardinality,
        })
    }
}

/// Pack `items` in order into capacity-bounded bins.
///
/// An empty input yields an empty result. The first oracle failure aborts packing.
pub fn pack<S, I, O, M>(
    items: I,
    config: &PackerConfig,
    oracle: &O,
    merger: &M,
) -> Result<PackingResult<S>>
where
    I: IntoIterator<Item = Item<S>>,
    O: CardinalityOracle<S>,
    M: SketchMerger<S>,
{
    let mut packer = FirstFitBinPacker::new(*config);
    for item in items {
        info!(item = item.id(), "binning");
        packer.place(item, oracle, merger)?;
    }
    Ok(packer.finish())
}
