//! # Activation kinds
//!
//! An activation is applied symbolically: the layer wraps its linear-sum
//! expression in the activation's formula, and differentiation of the
//! wrapped expression falls out of the expression engine. There is no
//! separate derivative table to keep in sync.

use std::fmt;

use serde::{Deserialize, Serialize};
use symnet_expr::Expr;

/// Activation applied to each output of a fully-connected layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Pass the linear sum through unchanged.
    #[default]
    Identity,
    /// Logistic sigmoid `1 / (1 + exp(-z))`.
    Logistic,
    /// Hyperbolic tangent.
    Tanh,
}

impl Activation {
    /// Wrap a pre-activation expression in this activation's formula.
    pub fn wrap(self, z: Expr) -> Expr {
        match self {
            Activation::Identity => z,
            Activation::Logistic => z.logistic(),
            Activation::Tanh => z.tanh(),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Identity => "identity",
            Activation::Logistic => "logistic",
            Activation::Tanh => "tanh",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_leaves_the_expression_alone() {
        let z = Expr::var("z") + 1.0;
        assert_eq!(Activation::Identity.wrap(z.clone()), z);
    }

    #[test]
    fn test_logistic_wraps_in_sigmoid_form() {
        let wrapped = Activation::Logistic.wrap(Expr::var("z"));
        assert_eq!(wrapped.to_string(), "1 / (1 + exp(-z))");
    }

    #[test]
    fn test_serde_uses_lowercase_tags() {
        let json = serde_json::to_string(&Activation::Logistic).unwrap();
        assert_eq!(json, "\"logistic\"");
        let back: Activation = serde_json::from_str("\"identity\"").unwrap();
        assert_eq!(back, Activation::Identity);
    }

    #[test]
    fn test_unknown_activation_tags_are_rejected() {
        let result = serde_json::from_str::<Activation>("\"softmax\"");
        assert!(result.is_err());
    }
}
