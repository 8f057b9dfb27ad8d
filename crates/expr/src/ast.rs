//! # Expression AST
//!
//! Immutable scalar formulas over named variables. An [`Expr`] is built
//! once (by combinators or operator overloading), then derived, compiled,
//! and evaluated; it is never mutated in place.
//!
//! ## Structural equality
//!
//! `Expr` implements `Eq` and `Hash` by structure, with constants compared
//! bit-for-bit. Two independently built trees of the same shape are equal,
//! which is what the compiled-program cache keys on.
//!
//! ## Example
//!
//! ```
//! use symnet_expr::Expr;
//!
//! let x = Expr::var("x");
//! let f = x.clone() * x + Expr::num(1.0);
//! assert_eq!(f.to_string(), "x * x + 1");
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops;

use serde::{Deserialize, Serialize};

use crate::error::ExprError;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnFn {
    Neg,
    Exp,
    Ln,
    Sin,
    Cos,
    Tanh,
}

impl UnFn {
    /// Apply the function to a concrete value.
    pub fn apply(self, v: f64) -> f64 {
        match self {
            UnFn::Neg => -v,
            UnFn::Exp => v.exp(),
            UnFn::Ln => v.ln(),
            UnFn::Sin => v.sin(),
            UnFn::Cos => v.cos(),
            UnFn::Tanh => v.tanh(),
        }
    }
}

impl BinOp {
    /// Apply the operator to concrete values.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

/// A scalar algebraic expression.
///
/// Variants mirror the forms layers generate: numeric constants, named
/// variables (inputs, targets, weights), binary arithmetic, and the unary
/// functions used by activations and feature maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Const(f64),
    Var(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnFn, Box<Expr>),
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Const(a), Expr::Const(b)) => a.to_bits() == b.to_bits(),
            (Expr::Var(a), Expr::Var(b)) => a == b,
            (Expr::Binary(op_a, l_a, r_a), Expr::Binary(op_b, l_b, r_b)) => {
                op_a == op_b && l_a == l_b && r_a == r_b
            }
            (Expr::Unary(f_a, a), Expr::Unary(f_b, b)) => f_a == f_b && a == b,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Expr::Const(v) => {
                0u8.hash(state);
                v.to_bits().hash(state);
            }
            Expr::Var(name) => {
                1u8.hash(state);
                name.hash(state);
            }
            Expr::Binary(op, l, r) => {
                2u8.hash(state);
                op.hash(state);
                l.hash(state);
                r.hash(state);
            }
            Expr::Unary(f, a) => {
                3u8.hash(state);
                f.hash(state);
                a.hash(state);
            }
        }
    }
}

impl Expr {
    /// Numeric constant.
    pub fn num(v: f64) -> Expr {
        Expr::Const(v)
    }

    /// Named variable.
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    fn unary(f: UnFn, a: Expr) -> Expr {
        Expr::Unary(f, Box::new(a))
    }

    fn binary(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    /// `self` raised to an arbitrary expression exponent.
    pub fn pow(self, exponent: Expr) -> Expr {
        Expr::binary(BinOp::Pow, self, exponent)
    }

    /// `self` raised to a constant integer exponent.
    pub fn powi(self, k: i32) -> Expr {
        self.pow(Expr::num(k as f64))
    }

    pub fn exp(self) -> Expr {
        Expr::unary(UnFn::Exp, self)
    }

    pub fn ln(self) -> Expr {
        Expr::unary(UnFn::Ln, self)
    }

    pub fn sin(self) -> Expr {
        Expr::unary(UnFn::Sin, self)
    }

    pub fn cos(self) -> Expr {
        Expr::unary(UnFn::Cos, self)
    }

    pub fn tanh(self) -> Expr {
        Expr::unary(UnFn::Tanh, self)
    }

    /// The logistic sigmoid `1 / (1 + exp(-self))`, assembled from
    /// primitives so differentiation needs no special case.
    pub fn logistic(self) -> Expr {
        Expr::num(1.0) / (Expr::num(1.0) + (-self).exp())
    }

    /// Every variable name referenced by this expression.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(name) => {
                names.insert(name.clone());
            }
            Expr::Binary(_, l, r) => {
                l.collect_variables(names);
                r.collect_variables(names);
            }
            Expr::Unary(_, a) => a.collect_variables(names),
        }
    }

    /// Replace every occurrence of the mapped variable names with the
    /// corresponding expressions. Unmapped variables pass through.
    pub fn substitute(&self, bindings: &HashMap<String, Expr>) -> Expr {
        match self {
            Expr::Const(v) => Expr::Const(*v),
            Expr::Var(name) => match bindings.get(name) {
                Some(replacement) => replacement.clone(),
                None => Expr::Var(name.clone()),
            },
            Expr::Binary(op, l, r) => {
                Expr::binary(*op, l.substitute(bindings), r.substitute(bindings))
            }
            Expr::Unary(f, a) => Expr::unary(*f, a.substitute(bindings)),
        }
    }

    /// Tree-walking evaluation against a name -> value scope.
    ///
    /// This is the reference semantics; [`compile`](crate::compile) is the
    /// fast path and must agree with it exactly.
    ///
    /// # Errors
    ///
    /// [`ExprError::UnresolvedSymbol`] if a variable is missing from the
    /// scope.
    pub fn eval_with(&self, scope: &HashMap<String, f64>) -> Result<f64, ExprError> {
        match self {
            Expr::Const(v) => Ok(*v),
            Expr::Var(name) => scope
                .get(name)
                .copied()
                .ok_or_else(|| ExprError::UnresolvedSymbol { name: name.clone() }),
            Expr::Binary(op, l, r) => Ok(op.apply(l.eval_with(scope)?, r.eval_with(scope)?)),
            Expr::Unary(f, a) => Ok(f.apply(a.eval_with(scope)?)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Const(_) | Expr::Var(_) => 4,
            Expr::Unary(UnFn::Neg, _) => 2,
            Expr::Unary(_, _) => 4,
            Expr::Binary(BinOp::Pow, _, _) => 3,
            Expr::Binary(BinOp::Mul, _, _) | Expr::Binary(BinOp::Div, _, _) => 2,
            Expr::Binary(BinOp::Add, _, _) | Expr::Binary(BinOp::Sub, _, _) => 1,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "(")?;
            self.fmt_inner(f)?;
            write!(f, ")")
        } else {
            self.fmt_inner(f)
        }
    }

    fn fmt_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{}", v),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Binary(op, l, r) => {
                let (symbol, l_min, r_min) = match op {
                    BinOp::Add => (" + ", 1, 1),
                    BinOp::Sub => (" - ", 1, 2),
                    BinOp::Mul => (" * ", 2, 2),
                    BinOp::Div => (" / ", 2, 3),
                    BinOp::Pow => ("^", 4, 4),
                };
                l.fmt_prec(f, l_min)?;
                write!(f, "{}", symbol)?;
                r.fmt_prec(f, r_min)
            }
            Expr::Unary(UnFn::Neg, a) => {
                write!(f, "-")?;
                a.fmt_prec(f, 3)
            }
            Expr::Unary(func, a) => {
                let name = match func {
                    UnFn::Exp => "exp",
                    UnFn::Ln => "ln",
                    UnFn::Sin => "sin",
                    UnFn::Cos => "cos",
                    UnFn::Tanh => "tanh",
                    UnFn::Neg => unreachable!(),
                };
                write!(f, "{}(", name)?;
                a.fmt_inner(f)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_inner(f)
    }
}

// ============================================================================
// Operator overloads
// ============================================================================

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Add, self, rhs)
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Sub, self, rhs)
    }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Mul, self, rhs)
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Div, self, rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnFn::Neg, self)
    }
}

impl ops::Add<f64> for Expr {
    type Output = Expr;
    fn add(self, rhs: f64) -> Expr {
        self + Expr::num(rhs)
    }
}

impl ops::Sub<f64> for Expr {
    type Output = Expr;
    fn sub(self, rhs: f64) -> Expr {
        self - Expr::num(rhs)
    }
}

impl ops::Mul<f64> for Expr {
    type Output = Expr;
    fn mul(self, rhs: f64) -> Expr {
        self * Expr::num(rhs)
    }
}

impl ops::Div<f64> for Expr {
    type Output = Expr;
    fn div(self, rhs: f64) -> Expr {
        self / Expr::num(rhs)
    }
}

impl ops::Add<Expr> for f64 {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::num(self) + rhs
    }
}

impl ops::Sub<Expr> for f64 {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::num(self) - rhs
    }
}

impl ops::Mul<Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::num(self) * rhs
    }
}

impl ops::Div<Expr> for f64 {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::num(self) / rhs
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn test_display_uses_minimal_parentheses() {
        let x = Expr::var("x");
        let y = Expr::var("y");

        let sum = x.clone() + y.clone() * 2.0;
        assert_eq!(sum.to_string(), "x + y * 2");

        let grouped = (x.clone() + y.clone()) * 2.0;
        assert_eq!(grouped.to_string(), "(x + y) * 2");

        let nested_sub = x.clone() - (y.clone() - 1.0);
        assert_eq!(nested_sub.to_string(), "x - (y - 1)");

        let power = (x.clone() + 1.0).powi(2);
        assert_eq!(power.to_string(), "(x + 1)^2");

        let neg = -(x.clone() * y.clone());
        assert_eq!(neg.to_string(), "-(x * y)");

        let call = (x * y).sin();
        assert_eq!(call.to_string(), "sin(x * y)");
    }

    #[test]
    fn test_structural_equality_ignores_provenance() {
        let a = Expr::var("x") * 3.0 + Expr::num(1.0);
        let b = Expr::var("x") * 3.0 + Expr::num(1.0);
        assert_eq!(a, b);

        let c = Expr::num(1.0) + Expr::var("x") * 3.0;
        assert_ne!(a, c);
    }

    #[test]
    fn test_variables_are_collected_once() {
        let e = Expr::var("x0") * Expr::var("w0") + Expr::var("x0").powi(2);
        let vars: Vec<_> = e.variables().into_iter().collect();
        assert_eq!(vars, vec!["w0".to_string(), "x0".to_string()]);
    }

    #[test]
    fn test_substitute_replaces_placeholders() {
        let template = Expr::var("x0").powi(2) + Expr::var("w");
        let mut bindings = HashMap::new();
        bindings.insert("x0".to_string(), Expr::var("a") + Expr::var("b"));

        let out = template.substitute(&bindings);
        assert_eq!(out.to_string(), "(a + b)^2 + w");
    }

    #[test]
    fn test_eval_with_matches_hand_computation() {
        let e = (Expr::var("x") * 2.0 + 1.0).sin() / Expr::var("y");
        let v = e.eval_with(&scope(&[("x", 0.25), ("y", 2.0)])).unwrap();
        assert!((v - (0.5f64 + 1.0).sin() / 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_eval_with_reports_missing_symbols() {
        let e = Expr::var("x") + Expr::var("missing");
        let err = e.eval_with(&scope(&[("x", 1.0)])).unwrap_err();
        assert_eq!(
            err,
            ExprError::UnresolvedSymbol {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_logistic_is_bounded() {
        let e = Expr::var("z").logistic();
        let lo = e.eval_with(&scope(&[("z", -40.0)])).unwrap();
        let hi = e.eval_with(&scope(&[("z", 40.0)])).unwrap();
        let mid = e.eval_with(&scope(&[("z", 0.0)])).unwrap();
        assert!(lo > 0.0 && lo < 1e-15);
        assert!(hi > 1.0 - 1e-15 && hi <= 1.0);
        assert!((mid - 0.5).abs() < 1e-15);
    }
}
