//! Linear regression with a symbolic network
//!
//! Run with: cargo run -p symnet-ann --example linear_fit
//!
//! This example demonstrates:
//! - Building a one-input network and reading its closed-form expression
//! - Input normalization fitted from the training examples
//! - SGD training with the per-epoch report callback
//! - Persisting the fitted network as JSON

use symnet_ann::{Activation, DenseLayer, Example, Network, TrainOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Fitting y = 3x + 8 with a symbolic network ===\n");

    // -------------------------------------------------------------------------
    // 1. Training data
    // -------------------------------------------------------------------------
    let examples: Vec<Example> = (0..=20)
        .map(|i| i as f64 / 5.0 - 2.0)
        .map(|x| Example::new(vec![x], vec![3.0 * x + 8.0]))
        .collect();
    println!(
        "1. Training data: {} samples of y = 3x + 8 over [-2, 2]",
        examples.len()
    );
    println!();

    // -------------------------------------------------------------------------
    // 2. Model: one dense identity unit is enough for a line
    // -------------------------------------------------------------------------
    let mut network = Network::new(1);
    network.add_layer(Box::new(DenseLayer::new(1, Activation::Identity)))?;
    network.initialize();
    network.normalize_input(&examples)?;
    network.compile()?;

    println!("2. The model is its formula");
    println!("   output: {}", network.expressions()?[0]);
    println!("   cost:   {}", network.cost_expression()?);
    println!();

    // -------------------------------------------------------------------------
    // 3. Training with progress reports
    // -------------------------------------------------------------------------
    println!("3. Training");
    let result = network.train(
        &examples,
        TrainOptions {
            on_epoch: Some(Box::new(|report| {
                if report.epoch % 10 == 0 {
                    println!(
                        "   epoch {:>3}  worst cost {:>10.3e}  rate {:.3}",
                        report.epoch, report.max_cost, report.learning_rate
                    );
                }
            })),
            ..TrainOptions::default()
        },
    )?;
    println!(
        "   converged: {} after {} epochs (worst cost {:.3e})",
        result.converged, result.epochs, result.max_cost
    );
    println!();

    // -------------------------------------------------------------------------
    // 4. Prediction at a held-out point
    // -------------------------------------------------------------------------
    let out = network.activate(&[1.5])?.outputs;
    println!("4. f(1.5) = {:.4} (expected 12.5)", out[0]);
    println!();

    // -------------------------------------------------------------------------
    // 5. The whole model is one JSON document
    // -------------------------------------------------------------------------
    let json = network.to_json()?;
    let restored = Network::from_json(&json)?;
    println!("5. Serialized in {} bytes of JSON", json.len());
    println!(
        "   restored model predicts f(1.5) = {:.4}",
        restored.activate(&[1.5])?.outputs[0]
    );

    Ok(())
}
