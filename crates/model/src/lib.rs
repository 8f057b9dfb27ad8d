//! # symnet-model - Calibration Model Factory
//!
//! This crate assembles trained [`symnet_ann`] networks from a
//! description of the modelled system rather than from layers:
//!
//! - **Variables**: input dimensions with ranges and sampling rules
//! - **Factory**: probe layout, feature maps, pretraining to tolerance
//! - **Inversion**: companion networks that map outputs back to inputs
//!
//! ## Calibration
//!
//! The motivating use is machine calibration: train a network on the
//! positions a machine actually reaches, invert it, and the inverse
//! tells you what to command so the machine lands where you intended.
//!
//! ```
//! use symnet_model::{Factory, FactoryOptions, NetworkOptions, Variable};
//!
//! let factory = Factory::new(
//!     vec![Variable::range(0.0, 100.0), Variable::range(0.0, 50.0)],
//!     FactoryOptions::default(),
//! )?;
//! let build = factory.create_network(NetworkOptions::default())?;
//! assert!(build.training.unwrap().converged);
//!
//! let out = build.network.activate(&[40.0, 10.0])?.outputs;
//! assert!((out[0] - 40.0).abs() < 0.01);
//! # Ok::<(), symnet_model::ModelError>(())
//! ```

pub mod error;
pub mod factory;
pub mod variable;

/// The network engine factories build on.
pub use symnet_ann as ann;

// Re-export key types at crate root for convenience
pub use error::ModelError;
pub use factory::{
    Factory, FactoryOptions, InverseOptions, NetworkBuild, NetworkOptions, Transform,
};
pub use variable::{Distribution, Variable};
