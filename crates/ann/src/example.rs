//! # Training examples
//!
//! An [`Example`] pairs one input vector with its target vector. Targets
//! are matched to network outputs positionally, so example order within a
//! vector is free but component order is not.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One input/target pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

impl Example {
    pub fn new(input: Vec<f64>, target: Vec<f64>) -> Example {
        Example { input, target }
    }
}

/// Uniform random permutation in place (Fisher-Yates).
pub fn shuffle<T>(items: &mut [T], rng: &mut impl Rng) {
    items.shuffle(rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_shuffle_permutes_without_loss() {
        let mut items: Vec<usize> = (0..100).collect();
        let mut rng = StdRng::seed_from_u64(42);
        shuffle(&mut items, &mut rng);

        assert_ne!(items, (0..100).collect::<Vec<_>>());
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_is_deterministic_under_a_fixed_seed() {
        let mut a: Vec<usize> = (0..20).collect();
        let mut b: Vec<usize> = (0..20).collect();
        shuffle(&mut a, &mut StdRng::seed_from_u64(7));
        shuffle(&mut b, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_examples_round_trip_through_json() {
        let example = Example::new(vec![1.0, 2.0], vec![3.0]);
        let json = serde_json::to_string(&example).unwrap();
        let back: Example = serde_json::from_str(&json).unwrap();
        assert_eq!(back, example);
    }
}
