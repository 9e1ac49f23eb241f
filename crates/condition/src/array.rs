use crate::{Bound, ConditionError, RangeCondition};
use std::sync::Arc;

/// An explicit set of values, kept sorted and de-duplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayRangeCondition<T> {
    values: Arc<[T]>,
}

impl<T: Bound> ArrayRangeCondition<T> {
    pub fn new(values: impl IntoIterator<Item = T>) -> Result<Self, ConditionError> {
        let mut values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            return Err(ConditionError::Empty);
        }
        values.sort_unstable();
        values.dedup();
        Ok(Self {
            values: values.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Index of the first value `>= low`.
    fn lower_index(&self, low: T) -> usize {
        self.values.partition_point(|value| *value < low)
    }
}

impl<T: Bound> RangeCondition<T> for ArrayRangeCondition<T> {
    fn min(&self) -> T {
        self.values[0]
    }

    fn max(&self) -> T {
        self.values[self.values.len() - 1]
    }

    fn test(&self, value: T) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    fn intersects(&self, low: T, high: T) -> bool {
        if low > high {
            return false;
        }
        self.values
            .get(self.lower_index(low))
            .is_some_and(|first| *first <= high)
    }

    fn sub_condition(&self, low: T, high: T) -> Option<Box<dyn RangeCondition<T>>> {
        if low > high {
            return None;
        }
        let start = self.lower_index(low);
        let end = self.values.partition_point(|value| *value <= high);
        if start >= end {
            return None;
        }
        Some(Box::new(Self {
            values: self.values[start..end].into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_and_deduplicated() {
        let condition = ArrayRangeCondition::new([30i64, 10, 20, 10]).unwrap();
        assert_eq!(condition.values(), &[10, 20, 30]);
        assert_eq!(condition.min(), 10);
        assert_eq!(condition.max(), 30);
    }

    #[test]
    fn test_intersects_uses_gaps() {
        let condition = ArrayRangeCondition::new([10i64, 20, 30]).unwrap();
        assert!(!condition.intersects(11, 19));
        assert!(condition.intersects(11, 20));
        assert!(condition.intersects(0, 10));
        assert!(!condition.intersects(31, 40));
    }

    #[test]
    fn test_sub_condition() {
        let condition = ArrayRangeCondition::new([10i64, 20, 30, 40]).unwrap();
        let sub = condition.sub_condition(15, 35).unwrap();
        assert_eq!(sub.min(), 20);
        assert_eq!(sub.max(), 30);
        assert!(!sub.test(10));

        assert!(condition.sub_condition(41, 50).is_none());
        assert!(condition.sub_condition(35, 15).is_none());
    }
}
