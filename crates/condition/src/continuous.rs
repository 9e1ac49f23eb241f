use crate::{inverted, Bound, ConditionError, RangeCondition};

/// Every value in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuousRangeCondition<T> {
    min: T,
    max: T,
}

impl<T: Bound> ContinuousRangeCondition<T> {
    pub fn new(min: T, max: T) -> Result<Self, ConditionError> {
        if min > max {
            return Err(inverted(min, max));
        }
        Ok(Self { min, max })
    }
}

impl<T: Bound> RangeCondition<T> for ContinuousRangeCondition<T> {
    fn min(&self) -> T {
        self.min
    }

    fn max(&self) -> T {
        self.max
    }

    fn test(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    fn intersects(&self, low: T, high: T) -> bool {
        low <= high && low <= self.max && self.min <= high
    }

    fn sub_condition(&self, low: T, high: T) -> Option<Box<dyn RangeCondition<T>>> {
        let min = self.min.max(low);
        let max = self.max.min(high);
        if min > max {
            return None;
        }
        Some(Box::new(Self { min, max }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_bounds() {
        assert!(ContinuousRangeCondition::new(10i64, 5).is_err());
        assert!(ContinuousRangeCondition::new(5i64, 5).is_ok());
    }

    #[test]
    fn test_intersects() {
        let condition = ContinuousRangeCondition::new(10i64, 20).unwrap();
        assert!(condition.intersects(0, 10));
        assert!(condition.intersects(20, 30));
        assert!(condition.intersects(12, 13));
        assert!(condition.intersects(0, 100));
        assert!(!condition.intersects(0, 9));
        assert!(!condition.intersects(21, 30));
        assert!(!condition.intersects(15, 14));
    }

    #[test]
    fn test_sub_condition_clamps() {
        let condition = ContinuousRangeCondition::new(10i64, 20).unwrap();
        let sub = condition.sub_condition(15, 100).unwrap();
        assert_eq!(sub.min(), 15);
        assert_eq!(sub.max(), 20);

        assert!(condition.sub_condition(21, 30).is_none());
    }
}
