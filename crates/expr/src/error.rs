//! # Errors for expression construction and compilation
//!
//! Compilation is the boundary where configuration mistakes surface:
//! a program that compiles never fails at evaluation time.

use thiserror::Error;

/// Errors raised while lowering an expression into a runnable program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// The expression references a name that is not in the variable list.
    #[error("unresolved symbol `{name}` in expression")]
    UnresolvedSymbol { name: String },

    /// The same name appears twice in the variable list, so a value
    /// binding would be ambiguous.
    #[error("variable `{name}` is bound more than once")]
    DuplicateVariable { name: String },

    /// The lowered expression graph was not acyclic.
    #[error("expression graph contains a cycle")]
    Cycle,
}
