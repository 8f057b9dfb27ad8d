//! # Model variables
//!
//! A [`Variable`] describes one input dimension of a modelled system: the
//! range it covers and the distribution random probe values are drawn
//! from. Factories use variables twice, once to lay out deterministic
//! probe examples over the range corners and midpoints, and once to
//! sample interior points when a model calls for random coverage.
//!
//! The default distribution is uniform over `[min, max]`. Discrete
//! variables sample from their literal value set, such as the detent
//! positions of an indexed axis. Gaussian variables sample around the
//! range midpoint with one standard deviation spanning the whole range,
//! so their draws are not confined to `[min, max]`.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution as Draw, Normal};
use serde::{Deserialize, Serialize};
use symnet_ann::Example;

use crate::error::ModelError;

/// How a [`Variable`] draws random probe values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Uniform,
    Discrete,
    Gaussian,
}

/// One input dimension: its range, value set, and sampling distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    min: f64,
    max: f64,
    values: Vec<f64>,
    distribution: Distribution,
}

impl Variable {
    /// Uniform variable over the given values' range.
    pub fn new(values: &[f64]) -> Result<Variable, ModelError> {
        Variable::with_distribution(values, Distribution::Uniform)
    }

    /// Variable over the given values with an explicit distribution.
    ///
    /// # Errors
    ///
    /// Rejects an empty value set.
    pub fn with_distribution(
        values: &[f64],
        distribution: Distribution,
    ) -> Result<Variable, ModelError> {
        if values.is_empty() {
            return Err(ModelError::EmptyVariable);
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Variable {
            min,
            max,
            values: values.to_vec(),
            distribution,
        })
    }

    /// Uniform variable over `[a, b]` in either order. The common way to
    /// declare an axis.
    pub fn range(a: f64, b: f64) -> Variable {
        Variable {
            min: a.min(b),
            max: a.max(b),
            values: vec![a, b],
            distribution: Distribution::Uniform,
        }
    }

    /// Gaussian variable centered on `mean` whose range spans one
    /// standard deviation.
    pub fn gaussian(std_dev: f64, mean: f64) -> Variable {
        let half = std_dev / 2.0;
        Variable {
            min: mean - half,
            max: mean + half,
            values: vec![mean - half, mean + half],
            distribution: Distribution::Gaussian,
        }
    }

    /// One variable per input dimension of the examples, each covering
    /// the values that dimension takes.
    pub fn from_examples(examples: &[Example]) -> Result<Vec<Variable>, ModelError> {
        Variable::from_examples_with(examples, &[])
    }

    /// [`from_examples`](Variable::from_examples) with per-dimension
    /// distributions; dimensions beyond the slice stay uniform.
    pub fn from_examples_with(
        examples: &[Example],
        distributions: &[Distribution],
    ) -> Result<Vec<Variable>, ModelError> {
        if examples.is_empty() {
            return Err(ModelError::NoExamples);
        }
        let mut columns: Vec<Vec<f64>> = Vec::new();
        for example in examples {
            for (i, value) in example.input.iter().enumerate() {
                if columns.len() <= i {
                    columns.resize_with(i + 1, Vec::new);
                }
                columns[i].push(*value);
            }
        }
        columns
            .into_iter()
            .enumerate()
            .map(|(i, values)| {
                let distribution = distributions
                    .get(i)
                    .copied()
                    .unwrap_or(Distribution::Uniform);
                Variable::with_distribution(&values, distribution)
            })
            .collect()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// Range midpoint for uniform and Gaussian variables, the middle of
    /// the sorted value set for discrete ones.
    pub fn median(&self) -> f64 {
        match self.distribution {
            Distribution::Uniform | Distribution::Gaussian => (self.min + self.max) / 2.0,
            Distribution::Discrete => {
                let mut sorted = self.values.clone();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        }
    }

    pub fn mean(&self) -> f64 {
        match self.distribution {
            Distribution::Uniform | Distribution::Gaussian => (self.min + self.max) / 2.0,
            Distribution::Discrete => {
                self.values.iter().sum::<f64>() / self.values.len() as f64
            }
        }
    }

    /// Draw one value from the variable's distribution.
    ///
    /// A degenerate range samples its single point.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        match self.distribution {
            Distribution::Uniform => {
                if self.max == self.min {
                    self.min
                } else {
                    rng.gen_range(self.min..self.max)
                }
            }
            Distribution::Discrete => self.values.choose(rng).copied().unwrap_or(self.min),
            Distribution::Gaussian => match Normal::new(self.median(), self.max - self.min) {
                Ok(normal) => normal.sample(rng),
                Err(_) => self.median(),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
