//! # Persistence
//!
//! A trained network round-trips through [`NetworkDocument`], a plain
//! serde document with the field names the JSON format has always used
//! (`nIn`, `inStats`, `expressionTemplates`, ...). Weights are stored in
//! a sorted map and serde_json prints `f64` values with shortest
//! round-trip precision, so save/load reproduces a network bit for bit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use symnet_expr::Expr;

use crate::activation::Activation;
use crate::error::AnnError;
use crate::layer::{DenseLayer, Layer};
use crate::map_layer::MapLayer;
use crate::network::Network;
use crate::norm::{NormKind, Normalization, Stats};

// ============================================================================
// Layer descriptors
// ============================================================================

/// Serializable description of one layer, sufficient to rebuild it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerDescriptor {
    /// A fully-connected layer.
    Layer {
        id: usize,
        #[serde(rename = "nIn")]
        n_in: usize,
        #[serde(rename = "nOut")]
        n_out: usize,
        #[serde(default)]
        activation: Activation,
    },
    /// A feature-template layer.
    MapLayer {
        id: usize,
        #[serde(rename = "nIn")]
        n_in: usize,
        #[serde(rename = "nOut")]
        n_out: usize,
        #[serde(rename = "expressionTemplates")]
        templates: Vec<Expr>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        weights: BTreeMap<String, f64>,
    },
}

fn shape(descriptor: &LayerDescriptor) -> (usize, usize, usize) {
    match descriptor {
        LayerDescriptor::Layer { id, n_in, n_out, .. }
        | LayerDescriptor::MapLayer { id, n_in, n_out, .. } => (*id, *n_in, *n_out),
    }
}

// ============================================================================
// Network documents
// ============================================================================

/// Complete serializable snapshot of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDocument {
    pub n_in: usize,
    pub n_out: usize,
    pub layers: Vec<LayerDescriptor>,
    pub weights: BTreeMap<String, f64>,
    /// Per-dimension input statistics, present once the network has been
    /// normalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stats: Option<Vec<Stats>>,
    /// Mapping kind for `in_stats`. Documents written before the kind
    /// existed omit it; they always meant min-max.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormKind>,
}

impl Network {
    /// Snapshot this network as a serializable document.
    pub fn to_document(&self) -> NetworkDocument {
        let (in_stats, normalization) = match self.normalization() {
            Some(norm) => (Some(norm.stats.clone()), Some(norm.kind)),
            None => (None, None),
        };
        NetworkDocument {
            n_in: self.n_in(),
            n_out: self.n_out(),
            layers: self.layer_descriptors(),
            weights: self.weights().clone(),
            in_stats,
            normalization,
        }
    }

    /// Rebuild a network from a document and compile it.
    ///
    /// # Errors
    ///
    /// Fails with [`AnnError::Document`] when the document's recorded
    /// arities do not match the layers it describes, and with the usual
    /// compile errors when weights are missing.
    pub fn from_document(document: &NetworkDocument) -> Result<Network, AnnError> {
        let mut network = Network::new(document.n_in);
        for descriptor in &document.layers {
            let layer: Box<dyn Layer> = match descriptor {
                LayerDescriptor::Layer {
                    n_out, activation, ..
                } => Box::new(DenseLayer::new(*n_out, *activation)),
                LayerDescriptor::MapLayer {
                    templates, weights, ..
                } => Box::new(MapLayer::with_weights(templates.clone(), weights.clone())),
            };
            network.add_layer(layer)?;
        }

        for (position, (descriptor, layer)) in
            document.layers.iter().zip(network.layers()).enumerate()
        {
            let recorded = shape(descriptor);
            let rebuilt = shape(&layer.descriptor());
            if recorded != rebuilt {
                return Err(AnnError::Document {
                    reason: format!(
                        "layer {position} records shape {recorded:?} but rebuilds as {rebuilt:?}"
                    ),
                });
            }
        }
        if network.n_out() != document.n_out {
            return Err(AnnError::Document {
                reason: format!(
                    "document records {} outputs but the layers produce {}",
                    document.n_out,
                    network.n_out()
                ),
            });
        }
        if let Some(stats) = &document.in_stats {
            if stats.len() != document.n_in {
                return Err(AnnError::Document {
                    reason: format!(
                        "inStats covers {} dimensions but the network takes {}",
                        stats.len(),
                        document.n_in
                    ),
                });
            }
        }

        network.restore_weights(document.weights.clone());
        let norm = document.in_stats.as_ref().map(|stats| Normalization {
            kind: document.normalization.unwrap_or(NormKind::MapMinMax),
            stats: stats.clone(),
        });
        network.set_normalization(norm);
        network.compile()?;
        Ok(network)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Propagates serde_json failures.
    pub fn to_json(&self) -> Result<String, AnnError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Parse a JSON document, rebuild and compile the network.
    ///
    /// # Errors
    ///
    /// Malformed JSON surfaces as [`AnnError::Json`]; everything else
    /// fails like [`from_document`](Network::from_document).
    pub fn from_json(json: &str) -> Result<Network, AnnError> {
        let document: NetworkDocument = serde_json::from_str(json)?;
        Network::from_document(&document)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example::Example;
    use crate::layer::input_expr;
    use serde_json::json;

    fn trained_linear() -> Network {
        let mut network = Network::new(2);
        network
            .add_layer(Box::new(DenseLayer::new(2, Activation::Identity)))
            .unwrap();
        let weights: BTreeMap<String, f64> = [
            ("w0b0", 0.1),
            ("w0b1", 0.2),
            ("w0r0c0", 1.0),
            ("w0r0c1", 2.0),
            ("w0r1c0", 3.0),
            ("w0r1c1", 4.0),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
        network.initialize_from(&weights).unwrap();
        network
            .normalize_input(&[
                Example::new(vec![0.0, 0.0], vec![0.0, 0.0]),
                Example::new(vec![10.0, 4.0], vec![0.0, 0.0]),
            ])
            .unwrap();
        network.compile().unwrap();
        network
    }

    #[test]
    fn test_documents_round_trip_exactly() {
        let network = trained_linear();
        let json = network.to_json().unwrap();
        let restored = Network::from_json(&json).unwrap();

        assert_eq!(restored.n_in(), network.n_in());
        assert_eq!(restored.n_out(), network.n_out());
        assert_eq!(restored.weights(), network.weights());
        assert_eq!(
            restored.normalization().unwrap(),
            network.normalization().unwrap()
        );
        assert_eq!(
            restored.activate(&[3.0, 1.0]).unwrap(),
            network.activate(&[3.0, 1.0]).unwrap()
        );
        // A second snapshot of the rebuilt network is identical.
        assert_eq!(restored.to_json().unwrap(), json);
    }

    #[test]
    fn test_json_uses_the_legacy_field_names() {
        let network = trained_linear();
        let value: serde_json::Value =
            serde_json::to_value(network.to_document()).unwrap();

        assert_eq!(value["nIn"], json!(2));
        assert_eq!(value["nOut"], json!(2));
        assert_eq!(value["layers"][0]["type"], json!("Layer"));
        assert_eq!(value["layers"][0]["nIn"], json!(2));
        assert_eq!(value["layers"][0]["activation"], json!("identity"));
        assert_eq!(value["weights"]["w0r1c1"], json!(4.0));
        assert_eq!(value["inStats"][0]["min"], json!(0.0));
        assert_eq!(value["inStats"][0]["max"], json!(10.0));
        assert_eq!(value["normalization"]["kind"], json!("mapminmax"));
    }

    #[test]
    fn test_missing_normalization_kind_means_min_max() {
        let document = json!({
            "nIn": 1,
            "nOut": 1,
            "layers": [
                { "type": "Layer", "id": 0, "nIn": 1, "nOut": 1, "activation": "identity" }
            ],
            "weights": { "w0b0": 0.5, "w0r0c0": 2.0 },
            "inStats": [
                { "min": 0.0, "max": 10.0, "mean": 5.0, "std": 2.886751345948129 }
            ]
        });
        let network = Network::from_json(&document.to_string()).unwrap();
        assert_eq!(network.normalization().unwrap().kind, NormKind::MapMinMax);

        // min-max maps 10 onto 1, so the line evaluates at its top end.
        let activated = network.activate(&[10.0]).unwrap();
        assert_eq!(activated.outputs, vec![2.5]);
    }

    #[test]
    fn test_omitted_activation_defaults_to_identity() {
        let document = json!({
            "nIn": 1,
            "nOut": 1,
            "layers": [{ "type": "Layer", "id": 0, "nIn": 1, "nOut": 1 }],
            "weights": { "w0b0": 1.0, "w0r0c0": 1.0 }
        });
        let network = Network::from_json(&document.to_string()).unwrap();
        assert_eq!(network.activate(&[2.0]).unwrap().outputs, vec![3.0]);
    }

    #[test]
    fn test_inconsistent_documents_are_rejected() {
        let mut document = trained_linear().to_document();
        document.n_out = 3;
        let err = Network::from_document(&document).unwrap_err();
        assert!(matches!(err, AnnError::Document { .. }), "{err}");

        let mut document = trained_linear().to_document();
        if let Some(stats) = document.in_stats.as_mut() {
            stats.pop();
        }
        let err = Network::from_document(&document).unwrap_err();
        assert!(matches!(err, AnnError::Document { .. }), "{err}");
    }

    #[test]
    fn test_malformed_json_is_reported_as_such() {
        let err = Network::from_json("{ not json").unwrap_err();
        assert!(matches!(err, AnnError::Json(_)));
    }

    #[test]
    fn test_map_layer_templates_survive_the_round_trip() {
        let template = (input_expr(0) * Expr::var("w0x0f") + Expr::var("w0x0p1")).sin();
        let weights: BTreeMap<String, f64> =
            [("w0x0f".to_string(), 1.0), ("w0x0p1".to_string(), 0.0)]
                .into_iter()
                .collect();

        let mut network = Network::new(1);
        network
            .add_layer(Box::new(MapLayer::with_weights(vec![template], weights)))
            .unwrap();
        network.initialize();
        network.compile().unwrap();

        let restored = Network::from_json(&network.to_json().unwrap()).unwrap();
        assert_eq!(
            restored.expressions().unwrap()[0].to_string(),
            "sin(x0 * w0x0f + w0x0p1)"
        );
        assert_eq!(
            restored.activate(&[0.5]).unwrap(),
            network.activate(&[0.5]).unwrap()
        );
    }
}
