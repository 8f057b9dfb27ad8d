//! # Feature-map layer
//!
//! A [`MapLayer`] holds one expression template per output, written over
//! the layer's own input placeholders `x0..x<nIn-1>` plus any weight
//! names it declares. Composing the layer substitutes the incoming
//! expressions for the placeholders, so templates work unchanged at any
//! depth in the stack.
//!
//! Templates are data, not code: they serialize as expression trees and
//! regenerate identical outputs on restore. A template that declares no
//! weights is a pure feature transform (polynomial and Fourier feature
//! sets are the common cases); declared weights carry fixed initial
//! values, such as a Fourier frequency starting at 1.0.

use std::collections::{BTreeMap, HashMap};

use symnet_expr::Expr;

use crate::error::AnnError;
use crate::layer::{input_name, parse_input_index, Layer};
use crate::serial::LayerDescriptor;

/// Layer producing independently defined expressions over its inputs.
#[derive(Debug, Clone)]
pub struct MapLayer {
    id: usize,
    n_in: usize,
    templates: Vec<Expr>,
    weights: BTreeMap<String, f64>,
}

impl MapLayer {
    /// A non-trainable feature transform: one template per output, no
    /// declared weights.
    pub fn new(templates: Vec<Expr>) -> MapLayer {
        MapLayer::with_weights(templates, BTreeMap::new())
    }

    /// Templates plus declared trainable weights with their initial
    /// values.
    pub fn with_weights(templates: Vec<Expr>, weights: BTreeMap<String, f64>) -> MapLayer {
        let n_in = placeholder_arity(&templates);
        MapLayer {
            id: 0,
            n_in,
            templates,
            weights,
        }
    }

    pub fn templates(&self) -> &[Expr] {
        &self.templates
    }
}

/// Smallest input arity covering every `x<i>` placeholder mentioned.
fn placeholder_arity(templates: &[Expr]) -> usize {
    templates
        .iter()
        .flat_map(|t| t.variables())
        .filter_map(|name| parse_input_index(&name))
        .map(|i| i + 1)
        .max()
        .unwrap_or(0)
}

impl Layer for MapLayer {
    fn id(&self) -> usize {
        self.id
    }

    fn n_in(&self) -> usize {
        self.n_in
    }

    fn n_out(&self) -> usize {
        self.templates.len()
    }

    fn attach(&mut self, id: usize, n_in: usize) -> Result<(), AnnError> {
        let required = placeholder_arity(&self.templates);
        if n_in < required {
            return Err(AnnError::LayerArity {
                layer: id,
                expected: required,
                got: n_in,
            });
        }
        for template in &self.templates {
            for name in template.variables() {
                if parse_input_index(&name).is_none() && !self.weights.contains_key(&name) {
                    return Err(AnnError::TemplateSymbol { name });
                }
            }
        }
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
        let bindings: HashMap<String, Expr> = inputs
            .iter()
            .enumerate()
            .map(|(i, e)| (input_name(i), e.clone()))
            .collect();
        Ok(self
            .templates
            .iter()
            .map(|t| t.substitute(&bindings))
            .collect())
    }

    fn weights(&self) -> Vec<(String, Option<f64>)> {
        self.weights
            .iter()
            .map(|(name, value)| (name.clone(), Some(*value)))
            .collect()
    }

    fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor::MapLayer {
            id: self.id,
            n_in: self.n_in,
            n_out: self.templates.len(),
            templates: self.templates.clone(),
            weights: self.weights.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::input_expr;

    #[test]
    fn test_templates_substitute_incoming_expressions() {
        let mut layer = MapLayer::new(vec![input_expr(0), input_expr(0).powi(2)]);
        layer.attach(0, 1).unwrap();

        let plain = layer.expressions(&[input_expr(0)]).unwrap();
        assert_eq!(plain[0].to_string(), "x0");
        assert_eq!(plain[1].to_string(), "x0^2");

        let composed = layer
            .expressions(&[Expr::var("a") + Expr::var("b")])
            .unwrap();
        assert_eq!(composed[1].to_string(), "(a + b)^2");
    }

    #[test]
    fn test_declared_weights_carry_initial_values() {
        let mut weights = BTreeMap::new();
        weights.insert("w0x0f".to_string(), 1.0);
        weights.insert("w0x0p1".to_string(), 0.0);
        let template = (input_expr(0) * Expr::var("w0x0f") + Expr::var("w0x0p1")).sin();
        let mut layer = MapLayer::with_weights(vec![template], weights);
        layer.attach(0, 1).unwrap();

        assert_eq!(
            layer.weights(),
            vec![
                ("w0x0f".to_string(), Some(1.0)),
                ("w0x0p1".to_string(), Some(0.0)),
            ]
        );
        let exprs = layer.expressions(&[input_expr(0)]).unwrap();
        assert_eq!(exprs[0].to_string(), "sin(x0 * w0x0f + w0x0p1)");
    }

    #[test]
    fn test_undeclared_template_symbols_are_rejected_at_attach() {
        let mut layer = MapLayer::new(vec![input_expr(0) * Expr::var("alpha")]);
        let err = layer.attach(0, 1).unwrap_err();
        assert!(matches!(err, AnnError::TemplateSymbol { name } if name == "alpha"));
    }

    #[test]
    fn test_attach_requires_enough_inputs_for_placeholders() {
        let mut layer = MapLayer::new(vec![input_expr(2).tanh()]);
        let err = layer.attach(0, 2).unwrap_err();
        assert!(matches!(
            err,
            AnnError::LayerArity {
                expected: 3,
                got: 2,
                ..
            }
        ));
        layer.attach(0, 3).unwrap();
        assert_eq!(layer.n_in(), 3);
    }

    #[test]
    fn test_templates_may_use_a_subset_of_inputs() {
        let mut layer = MapLayer::new(vec![input_expr(1)]);
        layer.attach(0, 3).unwrap();
        let exprs = layer
            .expressions(&[input_expr(0), Expr::var("middle"), input_expr(2)])
            .unwrap();
        assert_eq!(exprs[0].to_string(), "middle");
    }
}
