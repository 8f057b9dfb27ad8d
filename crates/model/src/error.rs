//! # Factory errors
//!
//! Invalid factory configuration surfaces as [`ModelError`] values;
//! failures inside the assembled network pass through as
//! [`AnnError`](symnet_ann::AnnError). A network that trains poorly is
//! not an error here either, that is what the training result and the
//! factory's accuracy bound are for.

use symnet_ann::AnnError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// A variable was constructed over an empty value set.
    #[error("a variable needs at least one value")]
    EmptyVariable,

    /// A factory was constructed with no input variables.
    #[error("a factory needs at least one variable")]
    NoVariables,

    /// Variables were derived from an empty example set.
    #[error("no examples supplied")]
    NoExamples,

    /// A transform returned fewer values than the factory's output arity.
    #[error("transform produced {got} values, expected at least {expected}")]
    TransformArity { expected: usize, got: usize },

    /// Inversion was requested for a network without input statistics.
    #[error("only normalized networks are invertible")]
    NotInvertible,

    #[error(transparent)]
    Ann(#[from] AnnError),
}
