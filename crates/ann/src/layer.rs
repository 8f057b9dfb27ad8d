//! # Layers
//!
//! A layer is anything that can turn a vector of input expressions into a
//! vector of output expressions and declare the weights those outputs
//! mention. The network treats all layer kinds uniformly through the
//! [`Layer`] trait; no inheritance, no downcasting.
//!
//! ## Naming scheme
//!
//! Weight names carry their structure: `w<layer>b<row>` is the bias of
//! output `row`, `w<layer>r<row>c<col>` connects output `row` to input
//! `col`. Input variables are `x0, x1, ...` and training targets are
//! `yt0, yt1, ...`; those prefixes are reserved and rejected as weight
//! names. [`WeightId`] generates and parses the string forms, which
//! remain the map and serialization keys.

use std::fmt;
use std::str::FromStr;

use symnet_expr::Expr;

use crate::activation::Activation;
use crate::error::AnnError;
use crate::serial::LayerDescriptor;

/// Name of the i-th network input variable.
pub fn input_name(i: usize) -> String {
    format!("x{}", i)
}

/// Name of the k-th training-target variable.
pub fn target_name(k: usize) -> String {
    format!("yt{}", k)
}

/// Expression referencing the i-th network input.
pub fn input_expr(i: usize) -> Expr {
    Expr::var(input_name(i))
}

fn parse_indexed(name: &str, prefix: &str) -> Option<usize> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Index i if `name` is the input placeholder `x<i>`.
pub(crate) fn parse_input_index(name: &str) -> Option<usize> {
    parse_indexed(name, "x")
}

/// True for names reserved for inputs and targets.
pub(crate) fn is_reserved_name(name: &str) -> bool {
    parse_indexed(name, "x").is_some() || parse_indexed(name, "yt").is_some()
}

// ============================================================================
// Structured weight identifiers
// ============================================================================

/// The role a weight plays within its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeightRole {
    /// Bias of output `row`.
    Bias { row: usize },
    /// Matrix entry connecting output `row` to input `col`.
    Matrix { row: usize, col: usize },
}

/// Structured identity of a dense-layer weight.
///
/// The [`fmt::Display`] form (`w0b1`, `w2r0c3`) is the key used in the
/// weight map and in persisted documents; [`FromStr`] parses it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeightId {
    pub layer: usize,
    pub role: WeightRole,
}

impl WeightId {
    pub fn bias(layer: usize, row: usize) -> WeightId {
        WeightId {
            layer,
            role: WeightRole::Bias { row },
        }
    }

    pub fn matrix(layer: usize, row: usize, col: usize) -> WeightId {
        WeightId {
            layer,
            role: WeightRole::Matrix { row, col },
        }
    }

    /// Expression referencing this weight by name.
    pub fn expr(self) -> Expr {
        Expr::var(self.to_string())
    }
}

impl fmt::Display for WeightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            WeightRole::Bias { row } => write!(f, "w{}b{}", self.layer, row),
            WeightRole::Matrix { row, col } => write!(f, "w{}r{}c{}", self.layer, row, col),
        }
    }
}

fn split_digits(s: &str) -> Option<(usize, &str)> {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

impl FromStr for WeightId {
    type Err = AnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AnnError::WeightName {
            name: s.to_string(),
        };

        let rest = s.strip_prefix('w').ok_or_else(malformed)?;
        let (layer, rest) = split_digits(rest).ok_or_else(malformed)?;

        if let Some(rest) = rest.strip_prefix('b') {
            let (row, rest) = split_digits(rest).ok_or_else(malformed)?;
            if !rest.is_empty() {
                return Err(malformed());
            }
            return Ok(WeightId::bias(layer, row));
        }

        let rest = rest.strip_prefix('r').ok_or_else(malformed)?;
        let (row, rest) = split_digits(rest).ok_or_else(malformed)?;
        let rest = rest.strip_prefix('c').ok_or_else(malformed)?;
        let (col, rest) = split_digits(rest).ok_or_else(malformed)?;
        if !rest.is_empty() {
            return Err(malformed());
        }
        Ok(WeightId::matrix(layer, row, col))
    }
}

// ============================================================================
// Layer capability trait
// ============================================================================

/// Capabilities every layer kind exposes to the network.
///
/// A layer is bound to its position by [`Layer::attach`] when it is
/// appended: the network assigns the id (append order) and the input
/// arity (previous layer's output count). Re-adding a layer to another
/// network rebinds both.
pub trait Layer: fmt::Debug {
    /// Id assigned at append time; scopes this layer's weight names.
    fn id(&self) -> usize;

    fn n_in(&self) -> usize;

    fn n_out(&self) -> usize;

    /// Bind the layer to a network position.
    ///
    /// # Errors
    ///
    /// Layer kinds with internal arity requirements (for example feature
    /// templates referencing `x3` attached with three inputs) reject the
    /// binding here.
    fn attach(&mut self, id: usize, n_in: usize) -> Result<(), AnnError>;

    /// Output expressions given the incoming expressions, one per output.
    fn expressions(&self, inputs: &[Expr]) -> Result<Vec<Expr>, AnnError>;

    /// Declared weight names in declaration order. `Some(value)` fixes
    /// the initial value; `None` asks the network to draw one randomly.
    fn weights(&self) -> Vec<(String, Option<f64>)>;

    /// Serializable description sufficient to rebuild this layer.
    fn descriptor(&self) -> LayerDescriptor;
}

// ============================================================================
// Fully-connected layer
// ============================================================================

/// Dense layer: each output j is
/// `activation(w<id>b<j> + Σ_i w<id>r<j>c<i> * input_i)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    id: usize,
    n_in: usize,
    units: usize,
    activation: Activation,
}

impl DenseLayer {
    /// A dense layer with `units` outputs. Input arity is bound when the
    /// layer is added to a network.
    pub fn new(units: usize, activation: Activation) -> DenseLayer {
        DenseLayer {
            id: 0,
            n_in: 0,
            units,
            activation,
        }
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl Layer for DenseLayer {
    fn id(&self) -> usize {
        self.id
    }

    fn n_in(&self) -> usize {
        self.n_in
    }

    fn n_out(&self) -> usize {
        self.units
    }

    fn attach(&mut self, id: usize, n_in: usize) -> Result<(), AnnError> {
        self.id = id;
        self.n_in = n_in;
        Ok(())
    }

    fn expressions(&self, inputs: &[Expr]) -> Result<Vec<Expr>, AnnError> {
        if inputs.len() != self.n_in {
            return Err(AnnError::LayerArity {
                layer: self.id,
                expected: self.n_in,
                got: inputs.len(),
            });
        }
        let outputs = (0..self.units)
            .map(|j| {
                let mut sum = WeightId::bias(self.id, j).expr();
                for (i, input) in inputs.iter().enumerate() {
                    sum = sum + WeightId::matrix(self.id, j, i).expr() * input.clone();
                }
                self.activation.wrap(sum)
            })
            .collect();
        Ok(outputs)
    }

    fn weights(&self) -> Vec<(String, Option<f64>)> {
        let mut names = Vec::with_capacity(self.units * (self.n_in + 1));
        for j in 0..self.units {
            names.push((WeightId::bias(self.id, j).to_string(), None));
            for i in 0..self.n_in {
                names.push((WeightId::matrix(self.id, j, i).to_string(), None));
            }
        }
        names
    }

    fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor::Layer {
            id: self.id,
            n_in: self.n_in,
            n_out: self.units,
            activation: self.activation,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
