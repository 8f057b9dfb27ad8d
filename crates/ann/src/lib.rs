//! # symnet-ann - Symbolic Feed-Forward Networks
//!
//! This crate builds small regression networks whose mathematics is held
//! as expression trees rather than opaque matrix code:
//!
//! - **Layers**: fully-connected stacks and free-form feature templates
//! - **Networks**: layer composition, weight space, compilation
//! - **Normalization**: per-dimension input mapping fitted from examples
//! - **Training**: per-example gradient descent with decay and cancel
//! - **Persistence**: JSON documents that reproduce a network exactly
//!
//! ## Expression-first
//!
//! "Expression-first" means a network IS its formula. Composing layers
//! folds the stack into one closed-form expression per output; cost and
//! every weight derivative are derived symbolically and compiled once.
//! After that, activation and training touch nothing but flat `f64`
//! arrays, and the same formulas can be printed, persisted, or handed to
//! another process.
//!
//! ```
//! use symnet_ann::{Activation, DenseLayer, Example, Network, TrainOptions};
//!
//! let examples: Vec<Example> = (-2..=2)
//!     .map(|x| x as f64)
//!     .map(|x| Example::new(vec![x], vec![2.0 * x - 1.0]))
//!     .collect();
//!
//! let mut network = Network::new(1);
//! network.add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))?;
//! network.initialize();
//! network.normalize_input(&examples)?;
//!
//! let result = network.train(&examples, TrainOptions::default())?;
//! assert!(result.converged);
//! # Ok::<(), symnet_ann::AnnError>(())
//! ```

pub mod activation;
pub mod error;
pub mod example;
pub mod layer;
pub mod map_layer;
pub mod network;
pub mod norm;
pub mod serial;
pub mod train;

/// The expression engine this crate compiles against.
pub use symnet_expr as expr;

// Re-export key types at crate root for convenience
pub use activation::Activation;
pub use error::AnnError;
pub use example::{shuffle, Example};
pub use layer::{input_expr, input_name, target_name, DenseLayer, Layer, WeightId, WeightRole};
pub use map_layer::MapLayer;
pub use network::{Activated, Gradient, Network};
pub use norm::{example_stats, NormKind, Normalization, Stats, UNIFORM_STD};
pub use serial::{LayerDescriptor, NetworkDocument};
pub use train::{CancelToken, EpochReport, TrainOptions, TrainResult};
