//! Packs three in-memory sketches of 40, 50 and 30 distinct elements into bins of capacity 100.
//!
//! ```bash
//! cargo run --example pack_in_memory
//! ```

use cardinality_estimator::CardinalityEstimator;
use sketch_binpack::{pack, CardinalityOracle, Item, OracleError, PackerConfig, SketchMerger};
use wyhash::WyHash;

type Sketch = CardinalityEstimator<str, WyHash, 12, 6>;

/// Oracle and merger over sketches held in memory
struct InMemory;

impl CardinalityOracle<Sketch> for InMemory {
    fn cardinality(&self, sketch: &Sketch) -> Result<f64, OracleError> {
        Ok(sketch.estimate() as f64)
    }
}

impl SketchMerger<Sketch> for InMemory {
    fn union(&self, lhs: &Sketch, rhs: &Sketch) -> Result<Sketch, OracleError> {
        let mut merged = Sketch::new();
        merged.merge(lhs);
        merged.merge(rhs);
        Ok(merged)
    }

    fn seed(&self, _bin: usize, sketch: &Sketch) -> Result<Sketch, OracleError> {
        let mut seeded = Sketch::new();
        seeded.merge(sketch);
        Ok(seeded)
    }
}

fn sketch(prefix: &str, n: usize) -> Sketch {
    let mut estimator = Sketch::new();
    for i in 0..n {
        estimator.insert(format!("{prefix}{i}").as_str());
    }
    estimator
}

fn main() -> sketch_binpack::Result<()> {
    let items = vec![
        Item::new("A", sketch("a", 40)),
        Item::new("B", sketch("b", 50)),
        Item::new("C", sketch("c", 30)),
    ];

    let config = PackerConfig::new(100.0)?;
    let result = pack(items, &config, &InMemory, &InMemory)?;
    for bin in result.bins() {
        println!(
            "Bin {}: {}; Cardinality: {:?}",
            bin.index(),
            bin.members().join(", "),
            bin.cardinality()
        );
    }
    Ok(())
}
