//! # Analytic differentiation
//!
//! Exact symbolic partial derivatives by structural recursion, followed by
//! a simplification pass (constant folding plus algebraic identities) that
//! keeps the derivative trees small enough to compile efficiently.
//!
//! The derivative of a formula with respect to a name it never mentions
//! collapses to the constant zero, which downstream code relies on when it
//! differentiates a cost with respect to every weight in a network.

use crate::ast::{BinOp, Expr, UnFn};

impl Expr {
    /// Exact partial derivative of `self` with respect to the named
    /// variable, simplified.
    ///
    /// # Example
    ///
    /// ```
    /// use symnet_expr::Expr;
    ///
    /// let f = Expr::var("x").powi(2) + Expr::var("y");
    /// assert_eq!(f.derive("x").to_string(), "2 * x");
    /// assert_eq!(f.derive("y").to_string(), "1");
    /// ```
    pub fn derive(&self, with_respect_to: &str) -> Expr {
        differentiate(self, with_respect_to).simplified()
    }

    /// Constant folding and identity elimination, applied bottom-up.
    ///
    /// The result is numerically equivalent on all inputs where the
    /// original is defined.
    pub fn simplified(&self) -> Expr {
        match self {
            Expr::Const(v) => Expr::Const(*v),
            Expr::Var(name) => Expr::Var(name.clone()),
            Expr::Binary(op, l, r) => fold_binary(*op, l.simplified(), r.simplified()),
            Expr::Unary(f, a) => fold_unary(*f, a.simplified()),
        }
    }
}

fn differentiate(e: &Expr, v: &str) -> Expr {
    match e {
        Expr::Const(_) => Expr::num(0.0),
        Expr::Var(name) => {
            if name == v {
                Expr::num(1.0)
            } else {
                Expr::num(0.0)
            }
        }
        Expr::Binary(op, l, r) => {
            let dl = differentiate(l, v);
            let dr = differentiate(r, v);
            let (l, r) = (l.as_ref().clone(), r.as_ref().clone());
            match op {
                BinOp::Add => dl + dr,
                BinOp::Sub => dl - dr,
                BinOp::Mul => dl * r + l * dr,
                BinOp::Div => (dl * r.clone() - l * dr) / r.powi(2),
                BinOp::Pow => match r {
                    // d(a^k) = k * a^(k-1) * da
                    Expr::Const(k) => Expr::num(k) * l.clone().pow(Expr::num(k - 1.0)) * dl,
                    // d(a^b) = a^b * (db * ln a + b * da / a)
                    exponent => {
                        l.clone().pow(exponent.clone())
                            * (dr * l.clone().ln() + exponent * dl / l)
                    }
                },
            }
        }
        Expr::Unary(f, a) => {
            let da = differentiate(a, v);
            let a = a.as_ref().clone();
            match f {
                UnFn::Neg => -da,
                UnFn::Exp => a.exp() * da,
                UnFn::Ln => da / a,
                UnFn::Sin => a.cos() * da,
                UnFn::Cos => -a.sin() * da,
                UnFn::Tanh => (1.0 - a.tanh().powi(2)) * da,
            }
        }
    }
}

fn is_const(e: &Expr, value: f64) -> bool {
    matches!(e, Expr::Const(v) if *v == value)
}

fn fold_binary(op: BinOp, l: Expr, r: Expr) -> Expr {
    if let (Expr::Const(a), Expr::Const(b)) = (&l, &r) {
        return Expr::Const(op.apply(*a, *b));
    }
    match op {
        BinOp::Add => {
            if is_const(&l, 0.0) {
                return r;
            }
            if is_const(&r, 0.0) {
                return l;
            }
        }
        BinOp::Sub => {
            if is_const(&r, 0.0) {
                return l;
            }
            if is_const(&l, 0.0) {
                return fold_unary(UnFn::Neg, r);
            }
        }
        BinOp::Mul => {
            if is_const(&l, 0.0) || is_const(&r, 0.0) {
                return Expr::num(0.0);
            }
            if is_const(&l, 1.0) {
                return r;
            }
            if is_const(&r, 1.0) {
                return l;
            }
        }
        BinOp::Div => {
            if is_const(&l, 0.0) {
                return Expr::num(0.0);
            }
            if is_const(&r, 1.0) {
                return l;
            }
        }
        BinOp::Pow => {
            if is_const(&r, 1.0) {
                return l;
            }
            if is_const(&r, 0.0) {
                return Expr::num(1.0);
            }
        }
    }
    Expr::Binary(op, Box::new(l), Box::new(r))
}

fn fold_unary(f: UnFn, a: Expr) -> Expr {
    if let Expr::Const(v) = a {
        return Expr::Const(f.apply(v));
    }
    if f == UnFn::Neg {
        if let Expr::Unary(UnFn::Neg, inner) = a {
            return *inner;
        }
    }
    Expr::Unary(f, Box::new(a))
}

// ============================================================================
// Tests
// ============================================================================
