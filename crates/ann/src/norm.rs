//! # Input normalization and range statistics
//!
//! Statistics follow a uniform-range model: a dimension observed over
//! [min, max] is summarized with mean (min+max)/2 and standard deviation
//! (max-min)/sqrt(12), the moments of a uniform distribution over that
//! interval. [`UNIFORM_STD`] is the standard deviation of uniform [-1, 1],
//! the default spread for standardized inputs.
//!
//! A [`Normalization`] is derived once from representative examples and
//! applied to every raw input before it reaches the compiled evaluators.

use serde::{Deserialize, Serialize};

/// Standard deviation of a uniform distribution over [-1, 1].
pub const UNIFORM_STD: f64 = 0.5773502691896258;

/// Per-dimension range statistics under the uniform-range model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl Stats {
    /// Statistics of a uniform distribution over [min, max].
    pub fn of_range(min: f64, max: f64) -> Stats {
        Stats {
            min,
            max,
            mean: (min + max) / 2.0,
            std: (max - min) / 12f64.sqrt(),
        }
    }
}

/// Per-dimension statistics over a rectangular set of rows.
///
/// Returns one [`Stats`] per column of the first row; an empty iterator
/// yields an empty vector.
pub fn example_stats<'a>(rows: impl IntoIterator<Item = &'a [f64]>) -> Vec<Stats> {
    let mut rows = rows.into_iter();
    let first = match rows.next() {
        Some(row) => row,
        None => return Vec::new(),
    };
    let mut mins = first.to_vec();
    let mut maxs = first.to_vec();
    for row in rows {
        for ((min, max), v) in mins.iter_mut().zip(maxs.iter_mut()).zip(row) {
            if *v < *min {
                *min = *v;
            }
            if *v > *max {
                *max = *v;
            }
        }
    }
    mins.iter()
        .zip(&maxs)
        .map(|(&min, &max)| Stats::of_range(min, max))
        .collect()
}

/// How raw inputs are mapped before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NormKind {
    /// Affine map of the observed [min, max] onto [-1, 1].
    MapMinMax,
    /// Shift and scale each dimension to the given mean and standard
    /// deviation.
    Standardize { mean: f64, std: f64 },
}

/// Installed normalization: the mapping kind plus the statistics it was
/// derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub kind: NormKind,
    pub stats: Vec<Stats>,
}

impl Normalization {
    /// Map one raw value in dimension `dim`.
    ///
    /// A dimension with zero spread maps to the target center instead of
    /// dividing by zero.
    pub fn map(&self, dim: usize, x: f64) -> f64 {
        let s = &self.stats[dim];
        match self.kind {
            NormKind::MapMinMax => {
                let span = s.max - s.min;
                if span == 0.0 {
                    0.0
                } else {
                    (x - s.min) / span * 2.0 - 1.0
                }
            }
            NormKind::Standardize { mean, std } => {
                if s.std == 0.0 {
                    mean
                } else {
                    (x - s.mean) / s.std * std + mean
                }
            }
        }
    }

    /// Map a whole raw input vector.
    pub fn normalize(&self, input: &[f64]) -> Vec<f64> {
        debug_assert_eq!(input.len(), self.stats.len());
        input
            .iter()
            .enumerate()
            .map(|(dim, &x)| self.map(dim, x))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_follow_the_uniform_range_model() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0], vec![2.0], vec![3.0]];
        let stats = example_stats(rows.iter().map(|r| r.as_slice()));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].min, 1.0);
        assert_eq!(stats[0].max, 3.0);
        assert_eq!(stats[0].mean, 2.0);
        assert!((stats[0].std - 2.0 / 12f64.sqrt()).abs() < 1e-15);
        assert!((stats[0].std - UNIFORM_STD).abs() < 1e-15);
    }

    #[test]
    fn test_uniform_std_is_the_spread_of_minus_one_to_one() {
        assert!((Stats::of_range(-1.0, 1.0).std - UNIFORM_STD).abs() < 1e-15);
    }

    #[test]
    fn test_mapminmax_sends_extremes_to_unit_bounds() {
        let norm = Normalization {
            kind: NormKind::MapMinMax,
            stats: vec![Stats::of_range(2.0, 10.0)],
        };
        assert_eq!(norm.map(0, 2.0), -1.0);
        assert_eq!(norm.map(0, 10.0), 1.0);
        assert_eq!(norm.map(0, 6.0), 0.0);
    }

    #[test]
    fn test_constant_dimension_does_not_divide_by_zero() {
        let norm = Normalization {
            kind: NormKind::MapMinMax,
            stats: vec![Stats::of_range(5.0, 5.0)],
        };
        assert_eq!(norm.map(0, 5.0), 0.0);
        assert_eq!(norm.map(0, 99.0), 0.0);

        let std = Normalization {
            kind: NormKind::Standardize {
                mean: 0.25,
                std: 0.3,
            },
            stats: vec![Stats::of_range(5.0, 5.0)],
        };
        assert_eq!(std.map(0, 5.0), 0.25);
    }

    #[test]
    fn test_standardize_hits_the_requested_moments() {
        let stats = Stats::of_range(0.0, 10.0);
        let norm = Normalization {
            kind: NormKind::Standardize {
                mean: 0.0,
                std: 0.3,
            },
            stats: vec![stats],
        };
        // the range mean maps to the target mean
        assert_eq!(norm.map(0, 5.0), 0.0);
        // one model standard deviation maps to 0.3
        let one_sigma = stats.mean + stats.std;
        assert!((norm.map(0, one_sigma) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_maps_dimensions_independently() {
        let norm = Normalization {
            kind: NormKind::MapMinMax,
            stats: vec![Stats::of_range(0.0, 4.0), Stats::of_range(-2.0, 2.0)],
        };
        assert_eq!(norm.normalize(&[0.0, 2.0]), vec![-1.0, 1.0]);
        assert_eq!(norm.normalize(&[4.0, -2.0]), vec![1.0, -1.0]);
    }

    #[test]
    fn test_norm_kind_serializes_with_a_kind_tag() {
        let json = serde_json::to_string(&NormKind::MapMinMax).unwrap();
        assert_eq!(json, "{\"kind\":\"mapminmax\"}");
        let back: NormKind =
            serde_json::from_str("{\"kind\":\"standardize\",\"mean\":0.0,\"std\":0.3}").unwrap();
        assert_eq!(
            back,
            NormKind::Standardize {
                mean: 0.0,
                std: 0.3
            }
        );
    }
}
