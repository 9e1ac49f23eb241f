use crate::{Bound, RangeCondition};

/// Exactly one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingletonRangeCondition<T> {
    value: T,
}

impl<T: Bound> SingletonRangeCondition<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Bound> RangeCondition<T> for SingletonRangeCondition<T> {
    fn min(&self) -> T {
        self.value
    }

    fn max(&self) -> T {
        self.value
    }

    fn test(&self, value: T) -> bool {
        self.value == value
    }

    fn intersects(&self, low: T, high: T) -> bool {
        low <= self.value && self.value <= high
    }

    fn sub_condition(&self, low: T, high: T) -> Option<Box<dyn RangeCondition<T>>> {
        self.intersects(low, high)
            .then(|| Box::new(*self) as Box<dyn RangeCondition<T>>)
    }
}
