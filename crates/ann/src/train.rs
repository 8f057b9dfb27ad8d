//! # Training
//!
//! Per-example gradient descent over the compiled cost programs. One
//! epoch visits every example once (optionally in shuffled order) and
//! records the worst pre-update cost seen; training stops when that
//! worst cost reaches the target, when the epoch budget runs out, or
//! when a [`CancelToken`] fires.
//!
//! Failing to converge is an outcome, not an error: the returned
//! [`TrainResult`] says how far the run got.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, trace};

use crate::error::AnnError;
use crate::example::{shuffle, Example};
use crate::network::{Network, StepBuffers};
use crate::norm::{NormKind, UNIFORM_STD};

// ============================================================================
// Options and results
// ============================================================================

/// Cooperative stop flag shared with a training loop. The loop checks
/// it between examples and stops at the next boundary; steps already
/// taken keep their weight updates.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Snapshot handed to the epoch callback. `epoch` counts from zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    /// Worst pre-update example cost of this epoch.
    pub max_cost: f64,
    /// Learning rate the epoch ran with.
    pub learning_rate: f64,
}

/// Training knobs. Plain fields; build one with struct update syntax
/// over [`TrainOptions::default`].
pub struct TrainOptions {
    pub max_epochs: usize,
    /// Stop once every example's cost is at or below this.
    pub target_cost: f64,
    pub learning_rate: f64,
    /// Multiplied into the learning rate after each non-final epoch.
    pub learning_rate_decay: f64,
    pub learning_rate_min: f64,
    /// Visit examples in a fresh random order each epoch.
    pub shuffle: bool,
    /// Standardize inputs to this mean before training (0 when only the
    /// deviation is given). Ignored when a normalization is already
    /// installed.
    pub norm_in_mean: Option<f64>,
    /// Standardize inputs to this deviation before training
    /// ([`UNIFORM_STD`] when only the mean is given).
    pub norm_in_std: Option<f64>,
    /// Called after every completed epoch.
    pub on_epoch: Option<Box<dyn FnMut(&EpochReport)>>,
    pub cancel: Option<CancelToken>,
}

impl TrainOptions {
    pub const MAX_EPOCHS: usize = 500;
    pub const TARGET_COST: f64 = 1e-4;
    pub const LEARNING_RATE: f64 = 0.5;
    pub const LEARNING_RATE_DECAY: f64 = 0.99985;
    pub const LEARNING_RATE_MIN: f64 = 0.001;
}

impl Default for TrainOptions {
    fn default() -> TrainOptions {
        TrainOptions {
            max_epochs: TrainOptions::MAX_EPOCHS,
            target_cost: TrainOptions::TARGET_COST,
            learning_rate: TrainOptions::LEARNING_RATE,
            learning_rate_decay: TrainOptions::LEARNING_RATE_DECAY,
            learning_rate_min: TrainOptions::LEARNING_RATE_MIN,
            shuffle: false,
            norm_in_mean: None,
            norm_in_std: None,
            on_epoch: None,
            cancel: None,
        }
    }
}

/// Outcome of a training run.
///
/// `max_cost` is the worst example cost of the last completed epoch; it
/// is infinite when no epoch completed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainResult {
    pub epochs: usize,
    pub max_cost: f64,
    pub learning_rate: f64,
    pub target_cost: f64,
    pub converged: bool,
}

// ============================================================================
// The loop
// ============================================================================

impl Network {
    /// Train on the given examples until the worst per-example cost
    /// reaches `options.target_cost` or the epoch budget runs out.
    ///
    /// Compiles the network first if needed, and installs a
    /// standardizing input normalization when `norm_in_mean` or
    /// `norm_in_std` ask for one.
    ///
    /// # Errors
    ///
    /// Fails on an empty example set, on input/target arity mismatches,
    /// and on anything [`compile`](Network::compile) rejects.
    pub fn train(
        &mut self,
        examples: &[Example],
        options: TrainOptions,
    ) -> Result<TrainResult, AnnError> {
        self.train_with_rng(examples, options, &mut rand::thread_rng())
    }

    /// [`train`](Network::train) with an explicit random source for the
    /// per-epoch shuffle, for reproducible runs.
    pub fn train_with_rng(
        &mut self,
        examples: &[Example],
        mut options: TrainOptions,
        rng: &mut impl Rng,
    ) -> Result<TrainResult, AnnError> {
        if examples.is_empty() {
            return Err(AnnError::NoExamples);
        }
        for example in examples {
            if example.input.len() != self.n_in() {
                return Err(AnnError::InputLength {
                    expected: self.n_in(),
                    got: example.input.len(),
                });
            }
        }

        if self.normalization().is_none()
            && (options.norm_in_mean.is_some() || options.norm_in_std.is_some())
        {
            let kind = NormKind::Standardize {
                mean: options.norm_in_mean.unwrap_or(0.0),
                std: options.norm_in_std.unwrap_or(UNIFORM_STD),
            };
            self.normalize_input_with(examples, kind)?;
        }
        if !self.is_compiled() {
            self.compile()?;
        }

        let mut order: Vec<usize> = (0..examples.len()).collect();
        let mut buffers = StepBuffers::new();
        let mut learning_rate = options.learning_rate;
        let mut epochs = 0;
        let mut max_cost = f64::INFINITY;
        let mut converged = false;

        'training: for epoch in 0..options.max_epochs {
            if options.shuffle {
                shuffle(&mut order, rng);
            }
            let mut epoch_max: f64 = 0.0;
            for &idx in &order {
                if let Some(cancel) = &options.cancel {
                    if cancel.is_cancelled() {
                        debug!(epoch, "training cancelled");
                        break 'training;
                    }
                }
                let cost = self.train_step(&examples[idx], learning_rate, &mut buffers)?;
                // NaN is sticky so a diverged run cannot report converged.
                if cost.is_nan() || cost > epoch_max {
                    epoch_max = cost;
                }
            }

            epochs = epoch + 1;
            max_cost = epoch_max;
            trace!(epoch, max_cost, learning_rate, "epoch complete");
            if let Some(on_epoch) = options.on_epoch.as_mut() {
                on_epoch(&EpochReport {
                    epoch,
                    max_cost,
                    learning_rate,
                });
            }

            if epoch_max <= options.target_cost {
                converged = true;
                break;
            }
            learning_rate =
                (learning_rate * options.learning_rate_decay).max(options.learning_rate_min);
        }

        Ok(TrainResult {
            epochs,
            max_cost,
            learning_rate,
            target_cost: options.target_cost,
            converged,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::layer::DenseLayer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn line_examples() -> Vec<Example> {
        // f(x) = 3x + 8 sampled over [-2, 2].
        [-2.0f64, -1.0, 0.0, 1.0, 2.0]
            .iter()
            .map(|&x| Example::new(vec![x], vec![3.0 * x + 8.0]))
            .collect()
    }

    fn seeded_line_network() -> Network {
        let mut network = Network::new(1);
        network
            .add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))
            .unwrap();
        let weights: BTreeMap<String, f64> = [("w0b0", 0.1), ("w0r0c0", 0.1)]
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        network.initialize_from(&weights).unwrap();
        network
    }

    #[test]
    fn test_a_line_is_learned_to_target_cost() {
        let examples = line_examples();
        let mut network = seeded_line_network();
        network.normalize_input(&examples).unwrap();

        // No compile() call: train compiles on demand.
        let result = network.train(&examples, TrainOptions::default()).unwrap();
        assert!(result.converged, "{result:?}");
        assert!(result.max_cost <= TrainOptions::TARGET_COST);
        assert!(result.epochs <= TrainOptions::MAX_EPOCHS);

        // Held-out point on the same line.
        let out = network.activate(&[1.5]).unwrap().outputs[0];
        assert!((out - 12.5).abs() < 0.05, "out {out}");
    }

    #[test]
    fn test_shuffled_training_still_converges() {
        let examples = line_examples();
        let mut network = seeded_line_network();
        network.normalize_input(&examples).unwrap();

        let options = TrainOptions {
            shuffle: true,
            ..TrainOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let result = network
            .train_with_rng(&examples, options, &mut rng)
            .unwrap();
        assert!(result.converged, "{result:?}");
    }

    #[test]
    fn test_the_epoch_callback_sees_every_epoch_in_order() {
        let examples = line_examples();
        let mut network = seeded_line_network();
        network.normalize_input(&examples).unwrap();

        let seen: Rc<RefCell<Vec<EpochReport>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let options = TrainOptions {
            on_epoch: Some(Box::new(move |report| sink.borrow_mut().push(*report))),
            ..TrainOptions::default()
        };

        let result = network.train(&examples, options).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), result.epochs);
        assert_eq!(seen[0].epoch, 0);
        assert!(seen.windows(2).all(|w| w[1].epoch == w[0].epoch + 1));
        assert_eq!(seen.last().unwrap().max_cost, result.max_cost);
    }

    #[test]
    fn test_unreachable_targets_report_instead_of_erroring() {
        // Two different targets for the same input cannot both be fit.
        let examples = vec![
            Example::new(vec![1.0], vec![0.0]),
            Example::new(vec![1.0], vec![1.0]),
        ];
        let mut network = seeded_line_network();

        let options = TrainOptions {
            max_epochs: 10,
            target_cost: 0.0,
            learning_rate: 0.5,
            learning_rate_decay: 0.5,
            learning_rate_min: 0.1,
            ..TrainOptions::default()
        };
        let result = network.train(&examples, options).unwrap();

        assert!(!result.converged);
        assert_eq!(result.epochs, 10);
        assert!(result.max_cost > 0.0 && result.max_cost.is_finite());
        // 0.5 halves toward the floor and stays there.
        assert_eq!(result.learning_rate, 0.1);
    }

    #[test]
    fn test_cancellation_before_the_first_step_changes_nothing() {
        let examples = line_examples();
        let mut network = seeded_line_network();
        network.compile().unwrap();
        let snapshot = network.weights().clone();

        let cancel = CancelToken::new();
        cancel.cancel();
        let options = TrainOptions {
            cancel: Some(cancel),
            ..TrainOptions::default()
        };
        let result = network.train(&examples, options).unwrap();

        assert_eq!(result.epochs, 0);
        assert!(!result.converged);
        assert!(result.max_cost.is_infinite());
        assert_eq!(network.weights(), &snapshot);
    }

    #[test]
    fn test_training_standardizes_inputs_when_asked() {
        let examples = line_examples();
        let mut network = seeded_line_network();

        let options = TrainOptions {
            max_epochs: 1,
            norm_in_std: Some(UNIFORM_STD),
            ..TrainOptions::default()
        };
        network.train(&examples, options).unwrap();

        let norm = network.normalization().unwrap();
        assert_eq!(
            norm.kind,
            NormKind::Standardize {
                mean: 0.0,
                std: UNIFORM_STD
            }
        );
        assert_eq!(norm.stats.len(), 1);
    }

    #[test]
    fn test_an_empty_example_set_is_rejected() {
        let mut network = seeded_line_network();
        assert!(matches!(
            network.train(&[], TrainOptions::default()),
            Err(AnnError::NoExamples)
        ));
    }
}
