//! # Symbolic feed-forward networks
//!
//! A [`Network`] stacks layers over `n_in` raw inputs. Instead of
//! multiplying matrices at run time, the stack folds into closed-form
//! [`Expr`] trees: one tree per output, plus a half-squared-error cost
//! over target placeholders `yt<k>` and one cost derivative per weight.
//! [`Network::compile`] lowers all of these into shared straight-line
//! programs; after that, activation and gradient evaluation are pure
//! array arithmetic over a flat value vector.
//!
//! ## Weight space
//!
//! Weights live in one flat map keyed by structured names (`w0b0`,
//! `w0r0c1`, ...). Layer ids scope the names so stacked layers coexist
//! without clashing, and a [`Gradient`] is itself a named vector over
//! the same space.
//!
//! ## Example
//!
//! ```
//! use symnet_ann::{Activation, DenseLayer, Network};
//!
//! let mut network = Network::new(2);
//! network.add_layer(Box::new(DenseLayer::new(2, Activation::Identity)))?;
//! network.initialize();
//! network.compile()?;
//!
//! let activated = network.activate(&[5.0, 7.0])?;
//! assert_eq!(activated.outputs.len(), 2);
//! # Ok::<(), symnet_ann::AnnError>(())
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use symnet_expr::{compile, Evaluator, Expr};
use tracing::{debug, trace};

use crate::error::AnnError;
use crate::example::Example;
use crate::layer::{input_expr, input_name, is_reserved_name, target_name, Layer};
use crate::norm::{example_stats, NormKind, Normalization};
use crate::serial::LayerDescriptor;

// ============================================================================
// Activation record
// ============================================================================

/// Result of one forward pass.
///
/// `inputs` holds the values actually fed to the compiled expressions
/// (normalized when a normalization is installed), so cost and gradient
/// calls can replay the exact same pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Activated {
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
}

// ============================================================================
// Gradient
// ============================================================================

/// Partial derivatives of the cost with respect to every weight, in
/// sorted weight-name order.
#[derive(Debug, Clone)]
pub struct Gradient {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl Gradient {
    /// Component for one weight name, `None` if the name is unknown.
    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = self
            .names
            .binary_search_by(|n| n.as_str().cmp(name))
            .ok()?;
        Some(self.values[idx])
    }

    /// `(name, value)` pairs in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Compiled program set
// ============================================================================

/// Evaluators for one network configuration, all sharing a single
/// variable layout: `x0..`, then `yt0..`, then weight names in sorted
/// order. Rebuilt whenever layers or the weight set change.
#[derive(Debug)]
struct Compiled {
    vars: Vec<String>,
    n_out: usize,
    weight_names: Arc<[String]>,
    outputs: Vec<Evaluator>,
    cost: Evaluator,
    gradients: Vec<Evaluator>,
    exprs: Vec<Expr>,
    cost_expr: Expr,
}

/// Reusable scratch for the training loop, so per-example evaluation
/// does not allocate.
pub(crate) struct StepBuffers {
    values: Vec<f64>,
    scratch: Vec<f64>,
    grads: Vec<f64>,
}

impl StepBuffers {
    pub(crate) fn new() -> StepBuffers {
        StepBuffers {
            values: Vec::new(),
            scratch: Vec::new(),
            grads: Vec::new(),
        }
    }
}

// ============================================================================
// Network
// ============================================================================

/// A stack of layers compiled into pure numeric programs.
#[derive(Debug)]
pub struct Network {
    n_in: usize,
    layers: Vec<Box<dyn Layer>>,
    declared: BTreeMap<String, Option<f64>>,
    weights: BTreeMap<String, f64>,
    norm: Option<Normalization>,
    compiled: Option<Compiled>,
}

impl Network {
    /// Empty network taking `n_in` raw inputs.
    pub fn new(n_in: usize) -> Network {
        Network {
            n_in,
            layers: Vec::new(),
            declared: BTreeMap::new(),
            weights: BTreeMap::new(),
            norm: None,
            compiled: None,
        }
    }

    /// Build a network from a layer stack in one call.
    ///
    /// # Errors
    ///
    /// Fails like [`add_layer`](Network::add_layer) on the first layer
    /// that does not fit.
    pub fn from_layers(n_in: usize, layers: Vec<Box<dyn Layer>>) -> Result<Network, AnnError> {
        let mut network = Network::new(n_in);
        for layer in layers {
            network.add_layer(layer)?;
        }
        Ok(network)
    }

    /// Append a layer. The layer is attached at the next id, fed by the
    /// previous layer's outputs (or the raw inputs for the first layer).
    ///
    /// # Errors
    ///
    /// Rejects layers whose arity does not fit the stack, and weight
    /// declarations that reuse an existing name or shadow a reserved
    /// `x<i>` / `yt<k>` symbol. A rejected layer leaves the network
    /// unchanged.
    pub fn add_layer(&mut self, mut layer: Box<dyn Layer>) -> Result<(), AnnError> {
        let id = self.layers.len();
        let n_in = self.layers.last().map_or(self.n_in, |l| l.n_out());
        layer.attach(id, n_in)?;

        // Validate the whole declaration batch before touching any state.
        let declared = layer.weights();
        let mut batch = HashSet::new();
        for (name, _) in &declared {
            if is_reserved_name(name) {
                return Err(AnnError::ReservedName { name: name.clone() });
            }
            if self.declared.contains_key(name) || !batch.insert(name.clone()) {
                return Err(AnnError::WeightCollision { name: name.clone() });
            }
        }

        for (name, initial) in declared {
            self.declared.insert(name, initial);
        }
        self.layers.push(layer);
        self.compiled = None;
        Ok(())
    }

    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Output arity: the last layer's width, 0 while no layers exist.
    pub fn n_out(&self) -> usize {
        self.layers.last().map_or(0, |l| l.n_out())
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn weight(&self, name: &str) -> Option<f64> {
        self.weights.get(name).copied()
    }

    pub fn normalization(&self) -> Option<&Normalization> {
        self.norm.as_ref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Draw a value for every declared weight that has none yet.
    ///
    /// Weights that already hold a value keep it. Declared initials are
    /// used as-is; the rest are drawn uniformly from (-1, 1), nonzero
    /// and pairwise distinct so identically-shaped rows do not start
    /// out locked together.
    pub fn initialize(&mut self) {
        self.fill_missing(&BTreeMap::new(), &mut rand::thread_rng());
    }

    /// Like [`initialize`](Network::initialize), but seeds the given
    /// values first. Names outside the declared set are kept verbatim,
    /// so callers can carry auxiliary constants alongside trained
    /// weights.
    ///
    /// # Errors
    ///
    /// Rejects values keyed by a reserved `x<i>` / `yt<k>` name.
    pub fn initialize_from(&mut self, weights: &BTreeMap<String, f64>) -> Result<(), AnnError> {
        self.initialize_from_rng(weights, &mut rand::thread_rng())
    }

    /// [`initialize_from`](Network::initialize_from) with an explicit
    /// random source, for reproducible setups.
    pub fn initialize_from_rng(
        &mut self,
        weights: &BTreeMap<String, f64>,
        rng: &mut impl Rng,
    ) -> Result<(), AnnError> {
        for name in weights.keys() {
            if is_reserved_name(name) {
                return Err(AnnError::ReservedName { name: name.clone() });
            }
        }
        self.fill_missing(weights, rng);
        Ok(())
    }

    fn fill_missing(&mut self, provided: &BTreeMap<String, f64>, rng: &mut impl Rng) {
        for (name, value) in provided {
            self.weights.insert(name.clone(), *value);
        }

        let mut seen: HashSet<u64> = self.weights.values().map(|v| v.to_bits()).collect();
        let missing: Vec<(String, Option<f64>)> = self
            .declared
            .iter()
            .filter(|(name, _)| !self.weights.contains_key(*name))
            .map(|(name, initial)| (name.clone(), *initial))
            .collect();
        for (name, initial) in missing {
            let value = match initial {
                Some(v) => v,
                None => loop {
                    let v: f64 = rng.gen_range(-1.0..1.0);
                    if v != 0.0 && !seen.contains(&v.to_bits()) {
                        break v;
                    }
                },
            };
            seen.insert(value.to_bits());
            self.weights.insert(name, value);
        }
        self.compiled = None;
    }

    // ------------------------------------------------------------------
    // Input normalization
    // ------------------------------------------------------------------

    /// Fit a min-max normalization over the example inputs and install
    /// it. Subsequent [`activate`](Network::activate) calls map raw
    /// inputs onto [-1, 1] per dimension before evaluation.
    ///
    /// # Errors
    ///
    /// Needs at least one example, all with `n_in` inputs.
    pub fn normalize_input(&mut self, examples: &[Example]) -> Result<(), AnnError> {
        self.normalize_input_with(examples, NormKind::MapMinMax)
    }

    /// [`normalize_input`](Network::normalize_input) with an explicit
    /// mapping kind.
    pub fn normalize_input_with(
        &mut self,
        examples: &[Example],
        kind: NormKind,
    ) -> Result<(), AnnError> {
        if examples.is_empty() {
            return Err(AnnError::NoExamples);
        }
        for example in examples {
            if example.input.len() != self.n_in {
                return Err(AnnError::InputLength {
                    expected: self.n_in,
                    got: example.input.len(),
                });
            }
        }
        let stats = example_stats(examples.iter().map(|e| e.input.as_slice()));
        trace!(dims = stats.len(), ?kind, "fitted input normalization");
        self.norm = Some(Normalization { kind, stats });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Compilation
    // ------------------------------------------------------------------

    /// Fold the layer stack into closed-form output expressions and
    /// compile them, together with the cost and one cost derivative per
    /// weight, into shared straight-line programs.
    ///
    /// The cost is half the summed squared error against the target
    /// placeholders: `sum_k (out_k - yt<k>)^2 / 2`.
    ///
    /// # Errors
    ///
    /// Fails on an empty network, on declared weights that still have
    /// no value, and on weight map entries keyed by a reserved name.
    pub fn compile(&mut self) -> Result<(), AnnError> {
        if self.layers.is_empty() {
            return Err(AnnError::NoLayers);
        }
        for name in self.declared.keys() {
            if !self.weights.contains_key(name) {
                return Err(AnnError::MissingWeight { name: name.clone() });
            }
        }
        for name in self.weights.keys() {
            if is_reserved_name(name) {
                return Err(AnnError::ReservedName { name: name.clone() });
            }
        }

        let mut exprs: Vec<Expr> = (0..self.n_in).map(input_expr).collect();
        for layer in &self.layers {
            exprs = layer.expressions(&exprs)?;
        }
        let n_out = exprs.len();

        let cost_expr = exprs
            .iter()
            .enumerate()
            .map(|(k, out)| (out.clone() - Expr::var(target_name(k))).powi(2))
            .reduce(|a, b| a + b)
            .map(|sum| sum / 2.0)
            .unwrap_or_else(|| Expr::num(0.0))
            .simplified();

        let mut vars: Vec<String> = (0..self.n_in).map(input_name).collect();
        vars.extend((0..n_out).map(target_name));
        vars.extend(self.weights.keys().cloned());

        let outputs = exprs
            .iter()
            .map(|e| compile(e, &vars))
            .collect::<Result<Vec<_>, _>>()?;
        let cost = compile(&cost_expr, &vars)?;

        let weight_names: Arc<[String]> =
            self.weights.keys().cloned().collect::<Vec<_>>().into();
        let gradients = weight_names
            .iter()
            .map(|name| compile(&cost_expr.derive(name), &vars))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            n_out,
            weights = weight_names.len(),
            cost_steps = cost.steps(),
            "compiled network"
        );
        self.compiled = Some(Compiled {
            vars,
            n_out,
            weight_names,
            outputs,
            cost,
            gradients,
            exprs,
            cost_expr,
        });
        Ok(())
    }

    fn compiled(&self) -> Result<&Compiled, AnnError> {
        self.compiled.as_ref().ok_or(AnnError::NotCompiled)
    }

    /// Closed-form output expressions, one per network output.
    ///
    /// # Errors
    ///
    /// [`AnnError::NotCompiled`] before [`compile`](Network::compile).
    pub fn expressions(&self) -> Result<&[Expr], AnnError> {
        Ok(&self.compiled()?.exprs)
    }

    /// Closed-form cost expression over inputs, targets and weights.
    ///
    /// # Errors
    ///
    /// [`AnnError::NotCompiled`] before [`compile`](Network::compile).
    pub fn cost_expression(&self) -> Result<&Expr, AnnError> {
        Ok(&self.compiled()?.cost_expr)
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Fill the flat value vector behind `compiled.vars`: inputs, then
    /// targets (zero when absent), then weight values.
    fn bind_into(
        &self,
        compiled: &Compiled,
        inputs: &[f64],
        targets: Option<&[f64]>,
        values: &mut Vec<f64>,
    ) -> Result<(), AnnError> {
        if inputs.len() != self.n_in {
            return Err(AnnError::InputLength {
                expected: self.n_in,
                got: inputs.len(),
            });
        }
        if let Some(targets) = targets {
            if targets.len() != compiled.n_out {
                return Err(AnnError::TargetLength {
                    expected: compiled.n_out,
                    got: targets.len(),
                });
            }
        }

        values.clear();
        values.resize(compiled.vars.len(), 0.0);
        values[..self.n_in].copy_from_slice(inputs);
        if let Some(targets) = targets {
            values[self.n_in..self.n_in + compiled.n_out].copy_from_slice(targets);
        }
        let base = self.n_in + compiled.n_out;
        for (i, name) in compiled.weight_names.iter().enumerate() {
            values[base + i] = match self.weights.get(name) {
                Some(v) => *v,
                None => return Err(AnnError::MissingWeight { name: name.clone() }),
            };
        }
        Ok(())
    }

    fn bind(
        &self,
        compiled: &Compiled,
        inputs: &[f64],
        targets: Option<&[f64]>,
    ) -> Result<Vec<f64>, AnnError> {
        let mut values = Vec::new();
        self.bind_into(compiled, inputs, targets, &mut values)?;
        Ok(values)
    }

    /// Forward pass over one input vector.
    ///
    /// # Errors
    ///
    /// Needs a compiled network and an input of length `n_in`.
    pub fn activate(&self, input: &[f64]) -> Result<Activated, AnnError> {
        let compiled = self.compiled()?;
        if input.len() != self.n_in {
            return Err(AnnError::InputLength {
                expected: self.n_in,
                got: input.len(),
            });
        }
        let inputs = match &self.norm {
            Some(norm) => norm.normalize(input),
            None => input.to_vec(),
        };
        let values = self.bind(compiled, &inputs, None)?;
        let outputs = compiled.outputs.iter().map(|ev| ev.eval(&values)).collect();
        Ok(Activated { inputs, outputs })
    }

    /// Cost of one activation against its targets: half the summed
    /// squared output error.
    ///
    /// # Errors
    ///
    /// Needs a compiled network and a target of length `n_out`.
    pub fn cost(&self, activated: &Activated, targets: &[f64]) -> Result<f64, AnnError> {
        let compiled = self.compiled()?;
        let values = self.bind(compiled, &activated.inputs, Some(targets))?;
        Ok(compiled.cost.eval(&values))
    }

    /// Derivative of [`cost`](Network::cost) with respect to every
    /// weight, evaluated at the given activation and targets.
    ///
    /// # Errors
    ///
    /// Needs a compiled network and a target of length `n_out`.
    pub fn cost_gradient(
        &self,
        activated: &Activated,
        targets: &[f64],
    ) -> Result<Gradient, AnnError> {
        let compiled = self.compiled()?;
        let values = self.bind(compiled, &activated.inputs, Some(targets))?;
        let grads = compiled
            .gradients
            .iter()
            .map(|ev| ev.eval(&values))
            .collect();
        Ok(Gradient {
            names: Arc::clone(&compiled.weight_names),
            values: grads,
        })
    }

    /// One descent step `w <- w - rate * dC/dw` for every weight the
    /// gradient names. Unknown names are ignored.
    pub fn apply_gradient(&mut self, gradient: &Gradient, learning_rate: f64) {
        for (name, g) in gradient.iter() {
            if let Some(w) = self.weights.get_mut(name) {
                *w -= learning_rate * g;
            }
        }
    }

    /// Cost, gradient and descent step in one call. Returns the cost
    /// measured before the update.
    ///
    /// # Errors
    ///
    /// Needs a compiled network and a target of length `n_out`.
    pub fn propagate(
        &mut self,
        activated: &Activated,
        targets: &[f64],
        learning_rate: f64,
    ) -> Result<f64, AnnError> {
        let cost = self.cost(activated, targets)?;
        let gradient = self.cost_gradient(activated, targets)?;
        self.apply_gradient(&gradient, learning_rate);
        Ok(cost)
    }

    /// Mean squared output error over a set of examples.
    ///
    /// # Errors
    ///
    /// Needs a compiled network; every example must carry `n_in` inputs
    /// and `n_out` targets.
    pub fn mse(&self, examples: &[Example]) -> Result<f64, AnnError> {
        let n_out = self.compiled()?.n_out;
        if examples.is_empty() || n_out == 0 {
            return Ok(0.0);
        }
        let mut sum = 0.0;
        for example in examples {
            if example.target.len() != n_out {
                return Err(AnnError::TargetLength {
                    expected: n_out,
                    got: example.target.len(),
                });
            }
            let activated = self.activate(&example.input)?;
            for (out, target) in activated.outputs.iter().zip(&example.target) {
                let e = out - target;
                sum += e * e;
            }
        }
        Ok(sum / (examples.len() as f64 * n_out as f64))
    }

    /// Buffered propagate used by the training loop: one bind, cost and
    /// all gradients evaluated into reusable scratch, weights updated
    /// in place. Returns the pre-update cost.
    pub(crate) fn train_step(
        &mut self,
        example: &Example,
        learning_rate: f64,
        buffers: &mut StepBuffers,
    ) -> Result<f64, AnnError> {
        let compiled = self.compiled.as_ref().ok_or(AnnError::NotCompiled)?;
        let normalized = self.norm.as_ref().map(|n| n.normalize(&example.input));
        let inputs = normalized.as_deref().unwrap_or(&example.input);
        self.bind_into(compiled, inputs, Some(&example.target), &mut buffers.values)?;

        let cost = compiled.cost.eval_into(&buffers.values, &mut buffers.scratch);
        buffers.grads.clear();
        for ev in &compiled.gradients {
            let g = ev.eval_into(&buffers.values, &mut buffers.scratch);
            buffers.grads.push(g);
        }
        for (name, g) in compiled.weight_names.iter().zip(&buffers.grads) {
            if let Some(w) = self.weights.get_mut(name) {
                *w -= learning_rate * g;
            }
        }
        Ok(cost)
    }

    // ------------------------------------------------------------------
    // Persistence hooks
    // ------------------------------------------------------------------

    pub(crate) fn layer_descriptors(&self) -> Vec<LayerDescriptor> {
        self.layers.iter().map(|l| l.descriptor()).collect()
    }

    pub(crate) fn restore_weights(&mut self, weights: BTreeMap<String, f64>) {
        self.weights = weights;
        self.compiled = None;
    }

    pub(crate) fn set_normalization(&mut self, norm: Option<Normalization>) {
        self.norm = norm;
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
    use crate::map_layer::MapLayer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn weight_map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    fn linear_2x2() -> Network {
        let mut network = Network::new(2);
        network
            .add_layer(Box::new(DenseLayer::new(2, Activation::Identity)))
            .unwrap();
        network
            .initialize_from(&weight_map(&[
                ("w0b0", 0.1),
                ("w0b1", 0.2),
                ("w0r0c0", 1.0),
                ("w0r0c1", 2.0),
                ("w0r1c0", 3.0),
                ("w0r1c1", 4.0),
            ]))
            .unwrap();
        network.compile().unwrap();
        network
    }

    #[test]
    fn test_layers_compose_and_report_arity() {
        let mut network = Network::new(2);
        network
            .add_layer(Box::new(DenseLayer::new(3, Activation::Tanh)))
            .unwrap();
        network
            .add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))
            .unwrap();

        assert_eq!(network.n_in(), 2);
        assert_eq!(network.n_out(), 1);
        assert_eq!(network.layers()[0].id(), 0);
        assert_eq!(network.layers()[1].id(), 1);
        assert_eq!(network.layers()[1].n_in(), 3);

        network.initialize();
        // 3 units * (bias + 2 inputs) plus 1 unit * (bias + 3 inputs).
        assert_eq!(network.weights().len(), 13);
    }

    #[test]
    fn test_from_layers_matches_sequential_adds() {
        let built = Network::from_layers(
            2,
            vec![
                Box::new(DenseLayer::new(3, Activation::Tanh)),
                Box::new(DenseLayer::new(1, Activation::Identity)),
            ],
        )
        .unwrap();
        assert_eq!(built.n_out(), 1);
        assert_eq!(built.layers().len(), 2);
    }

    #[test]
    fn test_colliding_weight_declarations_are_rejected_at_add_time() {
        let shared = weight_map(&[("scale", 1.5)]);
        let template = input_expr(0) * Expr::var("scale");

        let mut network = Network::new(1);
        network
            .add_layer(Box::new(MapLayer::with_weights(
                vec![template.clone()],
                shared.clone(),
            )))
            .unwrap();
        let err = network
            .add_layer(Box::new(MapLayer::with_weights(vec![template], shared)))
            .unwrap_err();

        assert!(matches!(err, AnnError::WeightCollision { name } if name == "scale"));
        // The rejected layer must not have changed the stack.
        assert_eq!(network.layers().len(), 1);
    }

    #[test]
    fn test_weight_names_shadowing_reserved_symbols_are_rejected() {
        let mut network = Network::new(1);
        let err = network
            .add_layer(Box::new(MapLayer::with_weights(
                vec![input_expr(0) * Expr::var("yt0")],
                weight_map(&[("yt0", 1.0)]),
            )))
            .unwrap_err();
        assert!(matches!(err, AnnError::ReservedName { name } if name == "yt0"));

        let err = network
            .initialize_from(&weight_map(&[("x0", 3.0)]))
            .unwrap_err();
        assert!(matches!(err, AnnError::ReservedName { name } if name == "x0"));
    }

    #[test]
    fn test_activate_runs_the_documented_linear_network() {
        let network = linear_2x2();
        let activated = network.activate(&[5.0, 7.0]).unwrap();
        assert_eq!(activated.inputs, vec![5.0, 7.0]);
        assert_eq!(activated.outputs, vec![19.1, 43.2]);
    }

    #[test]
    fn test_cost_is_half_the_summed_squared_error() {
        let network = linear_2x2();
        let activated = network.activate(&[5.0, 7.0]).unwrap();

        let near = network.cost(&activated, &[19.0, 43.2]).unwrap();
        assert!((near - 0.005).abs() < 1e-12, "near {near}");

        let far = network.cost(&activated, &[18.0, 43.2]).unwrap();
        assert!((far - 0.605).abs() < 1e-12, "far {far}");
    }

    #[test]
    fn test_gradient_is_exactly_zero_at_a_perfect_fit() {
        let network = linear_2x2();
        let activated = network.activate(&[5.0, 7.0]).unwrap();
        let targets = activated.outputs.clone();

        let gradient = network.cost_gradient(&activated, &targets).unwrap();
        assert_eq!(gradient.len(), 6);
        for (name, g) in gradient.iter() {
            assert_eq!(g, 0.0, "d cost / d {name}");
        }
    }

    #[test]
    fn test_gradient_matches_the_hand_derivative_of_a_line() {
        let mut network = Network::new(1);
        network
            .add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))
            .unwrap();
        network
            .initialize_from(&weight_map(&[("w0b0", 0.5), ("w0r0c0", 2.0)]))
            .unwrap();
        network.compile().unwrap();

        // out = 0.5 + 2 * 3 = 6.5, residual 1.5 against target 5.
        let activated = network.activate(&[3.0]).unwrap();
        let gradient = network.cost_gradient(&activated, &[5.0]).unwrap();

        assert_eq!(gradient.get("w0b0"), Some(1.5));
        assert_eq!(gradient.get("w0r0c0"), Some(4.5));
        assert_eq!(gradient.get("w9b9"), None);
    }

    #[test]
    fn test_propagate_reduces_the_cost_it_reports() {
        let mut network = Network::new(1);
        network
            .add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))
            .unwrap();
        network
            .initialize_from(&weight_map(&[("w0b0", 0.0), ("w0r0c0", 0.5)]))
            .unwrap();
        network.compile().unwrap();

        let activated = network.activate(&[1.0]).unwrap();
        let before = network.propagate(&activated, &[2.0], 0.1).unwrap();
        assert_eq!(before, 1.125);

        let after = network
            .cost(&network.activate(&[1.0]).unwrap(), &[2.0])
            .unwrap();
        assert!(after < before, "after {after}, before {before}");
    }

    #[test]
    fn test_initialize_draws_distinct_nonzero_values_and_keeps_existing() {
        let mut network = Network::new(2);
        network
            .add_layer(Box::new(DenseLayer::new(2, Activation::Identity)))
            .unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        network
            .initialize_from_rng(&weight_map(&[("w0b0", 0.25)]), &mut rng)
            .unwrap();

        assert_eq!(network.weight("w0b0"), Some(0.25));
        assert_eq!(network.weights().len(), 6);
        let drawn: Vec<f64> = network.weights().values().copied().collect();
        for v in &drawn {
            assert!(*v != 0.0 && *v > -1.0 && *v < 1.0, "drawn {v}");
        }
        let distinct: HashSet<u64> = drawn.iter().map(|v| v.to_bits()).collect();
        assert_eq!(distinct.len(), drawn.len());

        // A second pass only fills missing weights, so nothing moves.
        let snapshot = network.weights().clone();
        network.initialize();
        assert_eq!(network.weights(), &snapshot);
    }

    #[test]
    fn test_declared_initials_are_used_for_missing_weights() {
        let mut network = Network::new(1);
        network
            .add_layer(Box::new(MapLayer::with_weights(
                vec![input_expr(0) * Expr::var("gain")],
                weight_map(&[("gain", 2.5)]),
            )))
            .unwrap();
        network.initialize();
        assert_eq!(network.weight("gain"), Some(2.5));
    }

    #[test]
    fn test_compile_requires_values_for_every_declared_weight() {
        let mut network = Network::new(1);
        network
            .add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))
            .unwrap();
        let err = network.compile().unwrap_err();
        assert!(matches!(err, AnnError::MissingWeight { name } if name == "w0b0"));
    }

    #[test]
    fn test_compile_rejects_an_empty_network() {
        let mut network = Network::new(1);
        assert!(matches!(network.compile(), Err(AnnError::NoLayers)));
    }

    #[test]
    fn test_activate_requires_compile_and_matching_arity() {
        let mut network = Network::new(2);
        network
            .add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))
            .unwrap();
        assert!(matches!(
            network.activate(&[1.0, 2.0]),
            Err(AnnError::NotCompiled)
        ));

        network.initialize();
        network.compile().unwrap();
        assert!(matches!(
            network.activate(&[1.0]),
            Err(AnnError::InputLength {
                expected: 2,
                got: 1
            })
        ));
        assert!(matches!(
            network.cost(&network.activate(&[1.0, 2.0]).unwrap(), &[1.0, 2.0]),
            Err(AnnError::TargetLength {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_normalized_inputs_feed_the_expressions() {
        let mut network = Network::new(1);
        network
            .add_layer(Box::new(MapLayer::new(vec![input_expr(0)])))
            .unwrap();
        let examples = vec![
            Example::new(vec![0.0], vec![0.0]),
            Example::new(vec![10.0], vec![0.0]),
        ];
        network.normalize_input(&examples).unwrap();
        network.compile().unwrap();

        let low = network.activate(&[0.0]).unwrap();
        assert_eq!(low.inputs, vec![-1.0]);
        assert_eq!(low.outputs, vec![-1.0]);

        let mid = network.activate(&[5.0]).unwrap();
        assert_eq!(mid.outputs, vec![0.0]);

        let high = network.activate(&[10.0]).unwrap();
        assert_eq!(high.outputs, vec![1.0]);
    }

    #[test]
    fn test_mse_averages_over_examples_and_outputs() {
        let network = linear_2x2();
        let examples = vec![
            Example::new(vec![5.0, 7.0], vec![19.1, 43.2]),
            Example::new(vec![5.0, 7.0], vec![20.1, 42.2]),
        ];
        // First example is exact; second is off by 1 in both outputs.
        let mse = network.mse(&examples).unwrap();
        assert!((mse - 0.5).abs() < 1e-12, "mse {mse}");
        assert_eq!(network.mse(&[]).unwrap(), 0.0);
    }

    #[test]
    fn test_expressions_expose_the_folded_stack() {
        let mut network = Network::new(1);
        network
            .add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))
            .unwrap();
        network
            .initialize_from(&weight_map(&[("w0b0", 0.0), ("w0r0c0", 1.0)]))
            .unwrap();
        network.compile().unwrap();

        let exprs = network.expressions().unwrap();
        assert_eq!(exprs.len(), 1);
        assert_eq!(exprs[0].to_string(), "w0b0 + w0r0c0 * x0");
        let cost = network.cost_expression().unwrap();
        assert!(cost.variables().contains("yt0"));
    }
}
