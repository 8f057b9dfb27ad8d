//! # Network factory
//!
//! A [`Factory`] turns a list of [`Variable`]s into a trained
//! [`Network`] for calibration-style regression. The layout is always
//! the same: a feature [`MapLayer`] expands the inputs into polynomial
//! powers, Fourier harmonics, or caller-supplied templates, and a dense
//! identity readout learns the output map on top. The factory lays
//! probe examples over the variable ranges, fits the input
//! normalization to them, and pretrains until every probe's cost is at
//! most `(tolerance / 2)^2`.
//!
//! Inversion reuses the same machinery backwards: the image of the
//! input region under a trained network becomes the variable ranges of
//! a second factory, whose network learns the output-to-input map from
//! two boundary anchors plus sampled interior pairs.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;

use symnet_ann::{
    input_expr, Activation, DenseLayer, Example, MapLayer, Network, TrainOptions, TrainResult,
};
use symnet_expr::Expr;

use crate::error::ModelError;
use crate::variable::Variable;

/// Maps raw example inputs to the values the modelled system produces.
pub type Transform = Box<dyn Fn(&[f64]) -> Vec<f64>>;

// ============================================================================
// Options
// ============================================================================

/// Standing configuration of a [`Factory`].
#[derive(Debug, Clone)]
pub struct FactoryOptions {
    /// Highest monomial degree in the default feature expansion.
    pub power: u32,
    /// Number of Fourier harmonics per input; overrides `power` when
    /// nonzero.
    pub fourier: usize,
    /// Output arity; defaults to the input arity.
    pub n_out: Option<usize>,
    /// Worst acceptable deviation of a pretrained network at its probe
    /// examples. Pretraining targets a per-example cost of
    /// `(tolerance / 2)^2`.
    pub tolerance: f64,
    /// Train created networks on their probe examples.
    pub pre_train: bool,
    /// Accept a pretrained network only once its probe MSE is at or
    /// below this bound, rebuilding with fresh weights otherwise.
    pub max_mse: Option<f64>,
    /// Attempt cap for the `max_mse` retry loop.
    pub training_reps: usize,
}

impl FactoryOptions {
    pub const TOLERANCE: f64 = 1e-3;
}

impl Default for FactoryOptions {
    fn default() -> FactoryOptions {
        FactoryOptions {
            power: 1,
            fourier: 0,
            n_out: None,
            tolerance: FactoryOptions::TOLERANCE,
            pre_train: true,
            max_mse: None,
            training_reps: 1,
        }
    }
}

/// Per-network overrides for one [`create_network`](Factory::create_network)
/// call. Plain fields; build one with struct update syntax over
/// [`NetworkOptions::default`].
pub struct NetworkOptions {
    /// Feature templates replacing the factory's default expansion.
    pub templates: Option<Vec<Expr>>,
    /// Fully built map layer, taking precedence over `templates`.
    pub map_layer: Option<MapLayer>,
    /// Initial values for weights referenced by `templates`; merged
    /// over the Fourier initials when the default expansion is used.
    pub map_weights: BTreeMap<String, f64>,
    /// Target-side transform applied to probe inputs.
    pub transform: Option<Transform>,
    /// Overrides the factory's `pre_train` flag.
    pub pre_train: Option<bool>,
    /// Include the deterministic corner and midpoint probes.
    pub outline: bool,
    /// Number of random interior probes appended after the outline.
    pub n_random: usize,
    /// Pretraining learning rate override.
    pub learning_rate: Option<f64>,
    /// Pretraining epoch budget override.
    pub max_epochs: Option<usize>,
    /// Pretraining cost target override.
    pub target_cost: Option<f64>,
}

impl Default for NetworkOptions {
    fn default() -> NetworkOptions {
        NetworkOptions {
            templates: None,
            map_layer: None,
            map_weights: BTreeMap::new(),
            transform: None,
            pre_train: None,
            outline: true,
            n_random: 0,
            learning_rate: None,
            max_epochs: None,
            target_cost: None,
        }
    }
}

/// Knobs for [`inverse_network`](Factory::inverse_network).
#[derive(Debug, Clone)]
pub struct InverseOptions {
    /// Random interior pairs added to the two boundary anchors.
    pub n_examples: usize,
    pub learning_rate: Option<f64>,
    pub max_epochs: Option<usize>,
    pub target_cost: Option<f64>,
}

impl InverseOptions {
    pub const N_EXAMPLES: usize = 150;
}

impl Default for InverseOptions {
    fn default() -> InverseOptions {
        InverseOptions {
            n_examples: InverseOptions::N_EXAMPLES,
            learning_rate: None,
            max_epochs: None,
            target_cost: None,
        }
    }
}

/// A network built by a [`Factory`], together with the probe examples
/// that shaped it and the pretraining outcome.
#[derive(Debug)]
pub struct NetworkBuild {
    pub network: Network,
    pub examples: Vec<Example>,
    pub training: Option<TrainResult>,
}

// ============================================================================
// Factory
// ============================================================================

/// Builds calibration networks over a fixed set of input variables.
#[derive(Debug, Clone)]
pub struct Factory {
    vars: Vec<Variable>,
    options: FactoryOptions,
}

impl Factory {
    /// # Errors
    ///
    /// Rejects an empty variable list.
    pub fn new(vars: Vec<Variable>, options: FactoryOptions) -> Result<Factory, ModelError> {
        if vars.is_empty() {
            return Err(ModelError::NoVariables);
        }
        Ok(Factory { vars, options })
    }

    pub fn n_in(&self) -> usize {
        self.vars.len()
    }

    pub fn n_out(&self) -> usize {
        self.options.n_out.unwrap_or(self.vars.len())
    }

    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // Feature templates
    // ------------------------------------------------------------------

    /// Template passing input `i` through unchanged.
    pub fn map_identity(&self, i: usize) -> Expr {
        input_expr(i)
    }

    /// Monomial template `x<i>^power`.
    pub fn map_power(&self, i: usize, power: u32) -> Expr {
        input_expr(i).powi(power as i32)
    }

    /// Sigmoid template `tanh(x<i> * weight)` with a caller-named gain
    /// weight. Declare the weight's initial value through
    /// [`NetworkOptions::map_weights`].
    pub fn map_sigmoid(&self, i: usize, weight: &str) -> Expr {
        (input_expr(i) * Expr::var(weight)).tanh()
    }

    /// Fourier template `sin(x<i> * (h * f) + p)` for harmonic `h`,
    /// where all of an input's harmonics share the one frequency weight
    /// `f` and each carries its own phase weight `p`.
    pub fn map_fourier(&self, i: usize, harmonic: usize) -> Expr {
        let frequency = Expr::var(fourier_frequency_name(i));
        let phase = Expr::var(fourier_phase_name(i, harmonic));
        let scaled = if harmonic == 1 {
            frequency
        } else {
            Expr::num(harmonic as f64) * frequency
        };
        (input_expr(i) * scaled + phase).sin()
    }

    /// The factory's standard feature expansion: one identity per
    /// input, then per input its Fourier harmonics when requested,
    /// otherwise its monomials of degree `2..=power`.
    pub fn default_templates(&self) -> Vec<Expr> {
        let n = self.n_in();
        let mut templates: Vec<Expr> = (0..n).map(|i| self.map_identity(i)).collect();
        if self.options.fourier > 0 {
            for i in 0..n {
                for h in 1..=self.options.fourier {
                    templates.push(self.map_fourier(i, h));
                }
            }
        } else {
            for i in 0..n {
                for p in 2..=self.options.power {
                    templates.push(self.map_power(i, p));
                }
            }
        }
        templates
    }

    /// Initial weight values for [`default_templates`](Factory::default_templates):
    /// unit frequency and zero phase for every Fourier term.
    pub fn default_map_weights(&self) -> BTreeMap<String, f64> {
        let mut weights = BTreeMap::new();
        if self.options.fourier > 0 {
            for i in 0..self.n_in() {
                weights.insert(fourier_frequency_name(i), 1.0);
                for h in 1..=self.options.fourier {
                    weights.insert(fourier_phase_name(i, h), 0.0);
                }
            }
        }
        weights
    }

    // ------------------------------------------------------------------
    // Probe examples
    // ------------------------------------------------------------------

    /// The deterministic probe examples for this factory's variables.
    pub fn create_examples(&self) -> Result<Vec<Example>, ModelError> {
        self.create_examples_with(&NetworkOptions::default(), &mut rand::thread_rng())
    }

    /// Probe examples under the given options.
    ///
    /// With the outline enabled the layout is: every variable at its
    /// minimum, every variable at its maximum, every variable at its
    /// median, then per variable the two opposing corners that isolate
    /// it. Nonlinear feature sets add two midpoint probes per variable.
    /// Random interior points follow, one draw of every variable each.
    ///
    /// Targets are the transformed inputs truncated to the output
    /// arity.
    ///
    /// # Errors
    ///
    /// Fails when the transform yields fewer values than the output
    /// arity.
    pub fn create_examples_with(
        &self,
        options: &NetworkOptions,
        rng: &mut impl Rng,
    ) -> Result<Vec<Example>, ModelError> {
        let mut inputs: Vec<Vec<f64>> = Vec::new();
        if options.outline {
            inputs.push(self.vars.iter().map(|v| v.min()).collect());
            inputs.push(self.vars.iter().map(|v| v.max()).collect());
            inputs.push(self.vars.iter().map(|v| v.median()).collect());
            for i in 0..self.n_in() {
                inputs.push(self.probe(i, |v| v.min(), |v| v.max()));
                inputs.push(self.probe(i, |v| v.max(), |v| v.min()));
            }
            if self.options.power > 1 || self.options.fourier > 0 {
                for i in 0..self.n_in() {
                    inputs.push(self.probe(i, |v| v.median(), |v| v.min()));
                    inputs.push(self.probe(i, |v| v.median(), |v| v.max()));
                }
            }
        }
        for _ in 0..options.n_random {
            inputs.push(self.vars.iter().map(|v| v.sample(rng)).collect());
        }
        inputs
            .into_iter()
            .map(|input| self.example_for(input, options))
            .collect()
    }

    /// Input with variable `pick` at one anchor and the rest at another.
    fn probe(
        &self,
        pick: usize,
        chosen: impl Fn(&Variable) -> f64,
        rest: impl Fn(&Variable) -> f64,
    ) -> Vec<f64> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, v)| if i == pick { chosen(v) } else { rest(v) })
            .collect()
    }

    fn example_for(
        &self,
        input: Vec<f64>,
        options: &NetworkOptions,
    ) -> Result<Example, ModelError> {
        let data = match &options.transform {
            Some(transform) => transform(&input),
            None => input.clone(),
        };
        if data.len() < self.n_out() {
            return Err(ModelError::TransformArity {
                expected: self.n_out(),
                got: data.len(),
            });
        }
        let target = data[..self.n_out()].to_vec();
        Ok(Example::new(input, target))
    }

    // ------------------------------------------------------------------
    // Network creation
    // ------------------------------------------------------------------

    /// Build, normalize, compile, and optionally pretrain a network
    /// over this factory's variables.
    pub fn create_network(&self, options: NetworkOptions) -> Result<NetworkBuild, ModelError> {
        self.create_network_with_rng(options, &mut rand::thread_rng())
    }

    /// [`create_network`](Factory::create_network) with an explicit
    /// random source for weight draws and random probes.
    ///
    /// When `max_mse` is configured, a pretrained network whose probe
    /// MSE misses the bound is thrown away and rebuilt with fresh
    /// random weights, up to `training_reps` attempts; the last attempt
    /// is kept regardless.
    ///
    /// # Errors
    ///
    /// Fails when the options yield no probe examples at all, and on
    /// anything network assembly or training rejects.
    pub fn create_network_with_rng(
        &self,
        options: NetworkOptions,
        rng: &mut impl Rng,
    ) -> Result<NetworkBuild, ModelError> {
        let examples = self.create_examples_with(&options, rng)?;
        let pre_train = options.pre_train.unwrap_or(self.options.pre_train);
        let target_cost = options
            .target_cost
            .unwrap_or(self.options.tolerance * self.options.tolerance / 4.0);
        let reps = self.options.training_reps.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut network = self.assemble(&options, rng)?;
            network.normalize_input(&examples)?;
            network.compile()?;
            if !pre_train {
                return Ok(NetworkBuild {
                    network,
                    examples,
                    training: None,
                });
            }

            let train_options = TrainOptions {
                target_cost,
                learning_rate: options
                    .learning_rate
                    .unwrap_or(TrainOptions::LEARNING_RATE),
                max_epochs: options.max_epochs.unwrap_or(TrainOptions::MAX_EPOCHS),
                ..TrainOptions::default()
            };
            let training = network.train_with_rng(&examples, train_options, rng)?;

            let acceptable = match self.options.max_mse {
                Some(bound) => network.mse(&examples)? <= bound,
                None => true,
            };
            if acceptable || attempt >= reps {
                if !acceptable {
                    debug!(attempt, "pretrain attempts exhausted, keeping last network");
                }
                return Ok(NetworkBuild {
                    network,
                    examples,
                    training: Some(training),
                });
            }
            debug!(attempt, "probe accuracy missed, rebuilding with fresh weights");
        }
    }

    /// Layer stack for this factory: the chosen map layer feeding a
    /// dense identity readout, with random values drawn for every
    /// weight that has no declared initial.
    fn assemble(
        &self,
        options: &NetworkOptions,
        rng: &mut impl Rng,
    ) -> Result<Network, ModelError> {
        let map_layer = match (&options.map_layer, &options.templates) {
            (Some(layer), _) => layer.clone(),
            (None, Some(templates)) => {
                MapLayer::with_weights(templates.clone(), options.map_weights.clone())
            }
            (None, None) => {
                let mut weights = self.default_map_weights();
                for (name, value) in &options.map_weights {
                    weights.insert(name.clone(), *value);
                }
                MapLayer::with_weights(self.default_templates(), weights)
            }
        };

        let mut network = Network::new(self.n_in());
        network.add_layer(Box::new(map_layer))?;
        network.add_layer(Box::new(DenseLayer::new(self.n_out(), Activation::Identity)))?;
        network.initialize_from_rng(&BTreeMap::new(), rng)?;
        debug!(
            n_in = self.n_in(),
            n_out = self.n_out(),
            weights = network.weights().len(),
            "assembled factory network"
        );
        Ok(network)
    }

    // ------------------------------------------------------------------
    // Inversion
    // ------------------------------------------------------------------

    /// Build a network approximating the inverse map of `network`.
    ///
    /// The network's input statistics define the region to invert: its
    /// boundary activations anchor the training set, and `n_examples`
    /// random interior points contribute (activation, input) pairs. The
    /// inverse network shares this factory's feature configuration and
    /// maps the network's outputs back to its inputs.
    ///
    /// # Errors
    ///
    /// Fails when the network carries no input normalization, and on
    /// anything activation or training rejects.
    pub fn inverse_network(
        &self,
        network: &Network,
        options: InverseOptions,
    ) -> Result<NetworkBuild, ModelError> {
        self.inverse_network_with_rng(network, options, &mut rand::thread_rng())
    }

    /// [`inverse_network`](Factory::inverse_network) with an explicit
    /// random source.
    pub fn inverse_network_with_rng(
        &self,
        network: &Network,
        options: InverseOptions,
        rng: &mut impl Rng,
    ) -> Result<NetworkBuild, ModelError> {
        let norm = network.normalization().ok_or(ModelError::NotInvertible)?;
        let region: Vec<Variable> = norm
            .stats
            .iter()
            .map(|s| Variable::range(s.min, s.max))
            .collect();

        let min_input: Vec<f64> = region.iter().map(|v| v.min()).collect();
        let max_input: Vec<f64> = region.iter().map(|v| v.max()).collect();
        let min_output = network.activate(&min_input)?.outputs;
        let max_output = network.activate(&max_input)?.outputs;

        let inverse_vars: Vec<Variable> = min_output
            .iter()
            .zip(&max_output)
            .map(|(&a, &b)| Variable::range(a, b))
            .collect();
        let inverse_factory = Factory::new(
            inverse_vars,
            FactoryOptions {
                n_out: Some(network.n_in()),
                pre_train: false,
                max_mse: None,
                training_reps: 1,
                ..self.options.clone()
            },
        )?;
        let mut inverse = inverse_factory
            .create_network_with_rng(NetworkOptions::default(), rng)?
            .network;

        let mut examples = vec![
            Example::new(min_output, min_input),
            Example::new(max_output, max_input),
        ];
        // Anchor the inverse normalization on the boundary images
        // before the random pairs narrow the observed range.
        inverse.normalize_input(&examples)?;
        for _ in 0..options.n_examples {
            let target: Vec<f64> = region.iter().map(|v| v.sample(rng)).collect();
            let input = network.activate(&target)?.outputs;
            examples.push(Example::new(input, target));
        }

        let train_options = TrainOptions {
            learning_rate: options
                .learning_rate
                .unwrap_or(TrainOptions::LEARNING_RATE),
            max_epochs: options.max_epochs.unwrap_or(TrainOptions::MAX_EPOCHS),
            target_cost: options.target_cost.unwrap_or(TrainOptions::TARGET_COST),
            ..TrainOptions::default()
        };
        let training = inverse.train_with_rng(&examples, train_options, rng)?;
        debug!(
            examples = examples.len(),
            epochs = training.epochs,
            converged = training.converged,
            "trained inverse network"
        );
        Ok(NetworkBuild {
            network: inverse,
            examples,
            training: Some(training),
        })
    }
}

/// Shared frequency weight of input `i`'s Fourier harmonics; the `0`
/// is the map layer's position in the stack.
fn fourier_frequency_name(i: usize) -> String {
    format!("w0x{}f", i)
}

/// Phase weight of input `i`'s harmonic `h`.
fn fourier_phase_name(i: usize, harmonic: usize) -> String {
    format!("w0x{}p{}", i, harmonic)
}

// ============================================================================
// Tests
// ============================================================================
