use crate::{inverted, Bound, ConditionError, RangeCondition};
use tracestate_types::Quark;

/// Integer-like values that can be stepped through.
pub trait Discrete: Bound {
    fn to_i128(self) -> i128;

    /// Convert back. Only called with values between two existing bounds, so
    /// the conversion never overflows.
    fn from_i128(value: i128) -> Self;
}

macro_rules! impl_discrete {
    ($($ty:ty),*) => {
        $(
            impl Discrete for $ty {
                fn to_i128(self) -> i128 {
                    i128::from(self)
                }

                fn from_i128(value: i128) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_discrete!(i32, i64, u32, u64);

impl Discrete for Quark {
    fn to_i128(self) -> i128 {
        i128::from(self.0)
    }

    fn from_i128(value: i128) -> Self {
        Quark(value as u32)
    }
}

/// Values `min, min + step, min + 2 * step, ...` not exceeding `max`.
///
/// The upper bound is snapped down onto the lattice at construction, so
/// `max()` is always a selected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteRangeCondition<T> {
    min: T,
    max: T,
    step: u64,
}

impl<T: Discrete> DiscreteRangeCondition<T> {
    pub fn new(min: T, max: T, step: u64) -> Result<Self, ConditionError> {
        if step == 0 {
            return Err(ConditionError::ZeroStep);
        }
        if min > max {
            return Err(inverted(min, max));
        }
        let step_wide = i128::from(step);
        let span = max.to_i128() - min.to_i128();
        let max = T::from_i128(min.to_i128() + span / step_wide * step_wide);
        Ok(Self { min, max, step })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Smallest selected value `>= value`, if any.
    fn ceil(&self, value: T) -> Option<T> {
        if value <= self.min {
            return Some(self.min);
        }
        if value > self.max {
            return None;
        }
        let step = i128::from(self.step);
        let offset = value.to_i128() - self.min.to_i128();
        let steps = (offset + step - 1) / step;
        Some(T::from_i128(self.min.to_i128() + steps * step))
    }

    /// Largest selected value `<= value`, if any.
    fn floor(&self, value: T) -> Option<T> {
        if value >= self.max {
            return Some(self.max);
        }
        if value < self.min {
            return None;
        }
        let step = i128::from(self.step);
        let offset = value.to_i128() - self.min.to_i128();
        Some(T::from_i128(self.min.to_i128() + offset / step * step))
    }
}

impl<T: Discrete> RangeCondition<T> for DiscreteRangeCondition<T> {
    fn min(&self) -> T {
        self.min
    }

    fn max(&self) -> T {
        self.max
    }

    fn test(&self, value: T) -> bool {
        if value < self.min || value > self.max {
            return false;
        }
        (value.to_i128() - self.min.to_i128()) % i128::from(self.step) == 0
    }

    fn intersects(&self, low: T, high: T) -> bool {
        if low > high {
            return false;
        }
        matches!(self.ceil(low), Some(first) if first <= high)
    }

    fn sub_condition(&self, low: T, high: T) -> Option<Box<dyn RangeCondition<T>>> {
        let first = self.ceil(low)?;
        let last = self.floor(high)?;
        if first > last {
            return None;
        }
        Some(Box::new(Self {
            min: first,
            max: last,
            step: self.step,
        }))
    }
}
