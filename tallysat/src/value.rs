//! Values of components and branches.
use std::mem::size_of;

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Model count or satisfaction probability of a (sub-)formula.
///
/// Counting uses exact integers, stochastic formulas use probabilities in `[0, 1]`. A solver run
/// only ever produces one of the two variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Count(BigUint),
    Probability(f64),
}

impl Value {
    /// Neutral element of the product of independent components.
    pub fn one(quantified: bool) -> Value {
        if quantified {
            Value::Probability(1.0)
        } else {
            Value::Count(BigUint::one())
        }
    }

    pub fn zero(quantified: bool) -> Value {
        if quantified {
            Value::Probability(0.0)
        } else {
            Value::Count(BigUint::zero())
        }
    }

    /// Value of a component made of a single unconstrained variable.
    pub fn free_var(quantified: bool) -> Value {
        if quantified {
            Value::Probability(1.0)
        } else {
            Value::Count(BigUint::from(2u32))
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Count(count) => count.is_zero(),
            Value::Probability(prob) => *prob == 0.0,
        }
    }

    /// Multiply with the value of an independent component.
    pub fn mul_assign(&mut self, other: &Value) {
        match (self, other) {
            (Value::Count(count), Value::Count(other)) => *count *= other,
            (Value::Probability(prob), Value::Probability(other)) => *prob *= other,
            _ => panic!("mixed count and probability values"),
        }
    }

    /// The probability of a stochastic value.
    pub fn probability(&self) -> f64 {
        match self {
            Value::Probability(prob) => *prob,
            Value::Count(_) => panic!("probability of a model count requested"),
        }
    }

    /// Approximate heap and inline memory used by this value.
    pub fn byte_size(&self) -> usize {
        match self {
            Value::Count(count) => size_of::<Value>() + ((count.bits() as usize + 63) / 64) * 8,
            Value::Probability(_) => size_of::<Value>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn products() {
        let mut count = Value::one(false);
        count.mul_assign(&Value::free_var(false));
        count.mul_assign(&Value::Count(BigUint::from(3u32)));
        assert_eq!(count, Value::Count(BigUint::from(6u32)));
        assert!(!count.is_zero());

        let mut prob = Value::free_var(true);
        prob.mul_assign(&Value::Probability(0.25));
        assert_eq!(prob.probability(), 0.25);

        prob.mul_assign(&Value::zero(true));
        assert!(prob.is_zero());
    }
}
