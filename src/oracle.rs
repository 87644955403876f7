//! Injected sketch operations.
//!
//! The packer never talks to a sketch engine directly. It is handed a [`CardinalityOracle`] and a
//! [`SketchMerger`] over some opaque sketch reference type `S`, so the placement logic can be
//! driven by deterministic stubs as easily as by [`BinStore`](crate::BinStore).
//!
//! Both traits are implemented for plain closures:
//!
//! ```
//! use sketch_binpack::{CardinalityOracle, OracleError, SketchMerger};
//!
//! let cardinality = |s: &f64| -> Result<f64, OracleError> { Ok(*s) };
//! let union = |a: &f64, b: &f64| -> Result<f64, OracleError> { Ok(a + b) };
//!
//! assert_eq!(cardinality.cardinality(&40.0).unwrap(), 40.0);
//! assert_eq!(union.union(&40.0, &50.0).unwrap(), 90.0);
//! ```

use crate::error::OracleError;

/// Approximate count of distinct elements represented by a sketch.
pub trait CardinalityOracle<S> {
    /// Return the estimated cardinality of `sketch` without modifying it.
    fn cardinality(&self, sketch: &S) -> Result<f64, OracleError>;
}

/// Approximate set union of sketches, plus ownership hooks for bin sketches.
///
/// `union` results are candidates: the packer either hands a candidate back through
/// [`commit`](SketchMerger::commit) to become the bin's new sketch, or through
/// [`discard`](SketchMerger::discard) before the next candidate is produced. At most one
/// candidate is alive at any time.
pub trait SketchMerger<S> {
    /// Produce a new sketch for the union of `lhs` and `rhs`. Inputs are left untouched.
    fn union(&self, lhs: &S, rhs: &S) -> Result<S, OracleError>;

    /// Create the persisted sketch of a freshly opened bin `bin` from an item sketch.
    fn seed(&self, bin: usize, sketch: &S) -> Result<S, OracleError>;

    /// Turn an accepted candidate into the persisted sketch of bin `bin`.
    fn commit(&self, bin: usize, candidate: S) -> Result<S, OracleError> {
        let _ = bin;
        Ok(candidate)
    }

    /// Release a rejected candidate.
    fn discard(&self, candidate: S) -> Result<(), OracleError> {
        drop(candidate);
        Ok(())
    }
}

impl<S, F> CardinalityOracle<S> for F
where
    F: Fn(&S) -> Result<f64, OracleError>,
{
    #[inline]
    fn cardinality(&self, sketch: &S) -> Result<f64, OracleError> {
        self(sketch)
    }
}

impl<S, F> SketchMerger<S> for F
where
    S: Clone,
    F: Fn(&S, &S) -> Result<S, OracleError>,
{
    #[inline]
    fn union(&self, lhs: &S, rhs: &S) -> Result<S, OracleError> {
        self(lhs, rhs)
    }

    #[inline]
    fn seed(&self, _bin: usize, sketch: &S) -> Result<S, OracleError> {
        Ok(sketch.clone())
    }
}

/// Reject cardinalities that would break capacity comparisons.
#[inline]
pub(crate) fn checked_cardinality(value: f64) -> Result<f64, OracleError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(OracleError::InvalidCardinality(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0 => true; "zero")]
    #[test_case(42.5 => true; "positive")]
    #[test_case(-1.0 => false; "negative")]
    #[test_case(f64::NAN => false; "nan")]
    #[test_case(f64::INFINITY => false; "infinite")]
    fn test_checked_cardinality(value: f64) -> bool {
        checked_cardinality(value).is_ok()
    }

    #[test]
    fn test_closure_merger_defaults() {
        let union = |a: &Vec<u8>, b: &Vec<u8>| -> Result<Vec<u8>, OracleError> {
            Ok(a.iter().chain(b).copied().collect())
        };

        let seeded = union.seed(3, &vec![1, 2]).unwrap();
        assert_eq!(seeded, vec![1, 2]);

        let candidate = union.union(&seeded, &vec![3]).unwrap();
        assert_eq!(candidate, vec![1, 2, 3]);
        assert_eq!(union.commit(3, candidate).unwrap(), vec![1, 2, 3]);
        assert!(union.discard(vec![9]).is_ok());
    }
}
