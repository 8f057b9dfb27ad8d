//! # symnet-expr: Symbolic Scalar Expressions
//!
//! The expression engine behind symnet's networks. Layers emit algebraic
//! formulas over named inputs and weights; this crate represents those
//! formulas, differentiates them analytically, and compiles them into
//! fast, shareable numeric evaluators.
//!
//! ## Pipeline
//!
//! ```text
//! Expr (AST)  --derive-->  Expr (gradient)  --compile-->  Evaluator
//! ```
//!
//! - [`Expr`]: immutable AST built with combinators or operator
//!   overloading; structural `Eq`/`Hash`.
//! - [`Expr::derive`]: exact symbolic partial derivative with
//!   simplification.
//! - [`compile`]: hash-conses the tree into a shared-subexpression DAG,
//!   topologically orders it, and flattens it into a step [`Program`];
//!   results are cached process-wide.
//!
//! ## Example
//!
//! ```
//! use symnet_expr::{compile, Expr};
//!
//! let f = Expr::var("w") * Expr::var("x") + Expr::num(1.0);
//! let df = f.derive("w");
//! assert_eq!(df.to_string(), "x");
//!
//! let vars = vec!["x".to_string(), "w".to_string()];
//! let eval = compile(&f, &vars).unwrap();
//! assert_eq!(eval.eval(&[2.0, 3.0]), 7.0);
//! ```

pub mod ast;
pub mod compile;
pub mod deriv;
pub mod error;

pub use ast::{BinOp, Expr, UnFn};
pub use compile::{compile, Evaluator, Program};
pub use error::ExprError;
