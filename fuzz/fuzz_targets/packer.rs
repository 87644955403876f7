#![no_main]

use std::collections::HashSet;

use libfuzzer_sys::fuzz_target;
use sketch_binpack::{pack, FitStrategy, Item, OracleError, PackerConfig};
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // first byte picks capacity and strategy, each following byte is a disjoint item
    let capacity = f64::from(data[0] | 1);
    let strategy = if wyhash(data, 0) % 2 == 0 {
        FitStrategy::FirstFit
    } else {
        FitStrategy::BestFit
    };
    let config = PackerConfig::new(capacity).unwrap().with_strategy(strategy);
    let items: Vec<Item<f64>> = data[1..]
        .iter()
        .enumerate()
        .map(|(i, &b)| Item::new(format!("i{i}"), f64::from(b % 64)))
        .collect();

    let cardinality = |s: &f64| -> Result<f64, OracleError> { Ok(*s) };
    let union = |a: &f64, b: &f64| -> Result<f64, OracleError> { Ok(a + b) };
    let result = pack(items, &config, &cardinality, &union).unwrap();

    let ids: HashSet<&str> = result.assignments().map(|(id, _)| id).collect();
    assert_eq!(ids.len(), data.len() - 1);
    assert_eq!(result.assignments().count(), data.len() - 1);
    for (i, bin) in result.bins().iter().enumerate() {
        assert_eq!(bin.index(), i);
        if bin.members().len() > 1 {
            assert!(bin.cardinality() <= capacity);
        }
    }
});
