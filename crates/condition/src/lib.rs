//! Range conditions over ordered domains.
//!
//! A [`RangeCondition`] is a predicate over an ordered domain (timestamps,
//! attribute quarks) that answers three questions used to prune queries:
//!
//! - is a value selected (`test`)
//! - does a closed range `[low, high]` contain any selected value (`intersects`)
//! - what is the condition restricted to `[low, high]` (`sub_condition`)
//!
//! Four shapes exist:
//!
//! - [`ContinuousRangeCondition`]: every value between two bounds
//! - [`DiscreteRangeCondition`]: values on a fixed-step lattice between two bounds
//! - [`ArrayRangeCondition`]: an explicit sorted set of values
//! - [`SingletonRangeCondition`]: exactly one value
//!
//! Conditions are used as trait objects (`&dyn RangeCondition<i64>`) so
//! backends can accept any shape without being generic over it.

mod array;
mod continuous;
mod discrete;
mod singleton;

pub use array::ArrayRangeCondition;
pub use continuous::ContinuousRangeCondition;
pub use discrete::{Discrete, DiscreteRangeCondition};
pub use singleton::SingletonRangeCondition;

use std::fmt::Debug;
use thiserror::Error;
use tracestate_types::Quark;

/// Values a condition can range over.
pub trait Bound: Copy + Ord + Debug + Send + Sync + 'static {}

impl<T: Copy + Ord + Debug + Send + Sync + 'static> Bound for T {}

/// Errors from building a condition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("lower bound {min} is greater than upper bound {max}")]
    InvertedBounds { min: String, max: String },

    #[error("step must be strictly positive")]
    ZeroStep,

    #[error("a condition needs at least one value")]
    Empty,
}

/// A predicate over an ordered domain.
pub trait RangeCondition<T: Bound>: Debug + Send + Sync {
    /// Smallest selected value.
    fn min(&self) -> T;

    /// Largest selected value.
    fn max(&self) -> T;

    /// Whether `value` is selected.
    fn test(&self, value: T) -> bool;

    /// Whether any selected value lies in `[low, high]`. Always `false` when
    /// `low > high`.
    fn intersects(&self, low: T, high: T) -> bool;

    /// This condition restricted to `[low, high]`, or `None` if no selected
    /// value lies there.
    fn sub_condition(&self, low: T, high: T) -> Option<Box<dyn RangeCondition<T>>>;
}

/// Condition on timestamps.
pub type TimeCondition = dyn RangeCondition<i64>;

/// Condition on attribute quarks.
pub type QuarkCondition = dyn RangeCondition<Quark>;

/// Every value in `[min, max]`.
pub fn continuous<T: Bound>(min: T, max: T) -> Result<Box<dyn RangeCondition<T>>, ConditionError> {
    Ok(Box::new(ContinuousRangeCondition::new(min, max)?))
}

/// Exactly the given values. A single value yields a singleton condition.
pub fn from_collection<T: Bound>(
    values: impl IntoIterator<Item = T>,
) -> Result<Box<dyn RangeCondition<T>>, ConditionError> {
    let array = ArrayRangeCondition::new(values)?;
    if array.len() == 1 {
        return Ok(Box::new(SingletonRangeCondition::new(array.min())));
    }
    Ok(Box::new(array))
}

/// Exactly one value.
pub fn singleton<T: Bound>(value: T) -> Box<dyn RangeCondition<T>> {
    Box::new(SingletonRangeCondition::new(value))
}

fn inverted<T: Debug>(min: T, max: T) -> ConditionError {
    ConditionError::InvertedBounds {
        min: format!("{min:?}"),
        max: format!("{max:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_collection_picks_singleton() {
        let condition = from_collection([7i64, 7, 7]).unwrap();
        assert_eq!(condition.min(), 7);
        assert_eq!(condition.max(), 7);
        assert!(condition.test(7));
        assert!(!condition.test(8));
    }

    #[test]
    fn test_from_collection_rejects_empty() {
        let err = from_collection(Vec::<i64>::new()).unwrap_err();
        assert_eq!(err, ConditionError::Empty);
    }

    #[test]
    fn test_quark_conditions() {
        let condition = continuous(Quark(2), Quark(5)).unwrap();
        assert!(condition.test(Quark(2)));
        assert!(!condition.test(Quark(6)));
        assert!(condition.intersects(Quark(5), Quark(9)));
    }
}
