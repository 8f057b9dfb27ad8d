//! # Network errors
//!
//! Configuration and usage mistakes surface as [`AnnError`] values at the
//! earliest point they can be detected: layer-add time for name
//! collisions, compile time for unresolved symbols, call time for arity
//! mismatches. Training non-convergence is never an error; it is reported
//! through the training result.

use symnet_expr::ExprError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnError {
    /// An input vector does not match the expected arity.
    #[error("input length {got} does not match expected arity {expected}")]
    InputLength { expected: usize, got: usize },

    /// A target vector does not match the network's output arity.
    #[error("target length {got} does not match network output arity {expected}")]
    TargetLength { expected: usize, got: usize },

    /// A layer received the wrong number of input expressions.
    #[error("layer {layer} received {got} input expressions, expected {expected}")]
    LayerArity {
        layer: usize,
        expected: usize,
        got: usize,
    },

    /// Two layers (or one layer twice) declared the same weight name.
    #[error("weight `{name}` is declared by more than one layer")]
    WeightCollision { name: String },

    /// A weight name shadows an input (`x<i>`) or target (`yt<k>`) symbol.
    #[error("weight `{name}` collides with a reserved input or target symbol")]
    ReservedName { name: String },

    /// A string does not follow the structured weight naming scheme.
    #[error("`{name}` is not a structured weight name")]
    WeightName { name: String },

    /// A feature template mentions a symbol that is neither an input
    /// placeholder nor a declared weight.
    #[error("feature template references undeclared symbol `{name}`")]
    TemplateSymbol { name: String },

    /// The network has no layers to compile.
    #[error("network has no layers")]
    NoLayers,

    /// A declared weight has no value yet.
    #[error("weight `{name}` has no value; call initialize() before compile()")]
    MissingWeight { name: String },

    /// An operation that needs compiled evaluators ran before `compile()`.
    #[error("network is not compiled")]
    NotCompiled,

    /// An operation that needs examples received an empty set.
    #[error("no examples supplied")]
    NoExamples,

    /// A persisted network document is internally inconsistent.
    #[error("network document is inconsistent: {reason}")]
    Document { reason: String },

    /// A persisted network payload failed to parse.
    #[error("malformed network JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Expr(#[from] ExprError),
}
