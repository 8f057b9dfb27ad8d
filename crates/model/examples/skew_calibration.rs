//! Skew calibration for a three-axis gantry
//!
//! Run with: cargo run -p symnet-model --example skew_calibration
//!
//! This example demonstrates:
//! - Declaring machine axes as variables
//! - Training a measurement model from sampled positions
//! - Inverting the model into a calibration network
//! - Commanding through the calibration to cancel the skew

use symnet_model::{Factory, FactoryOptions, InverseOptions, NetworkOptions, Variable};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Calibrating away a 30-degree y-axis skew ===\n");

    // -------------------------------------------------------------------------
    // 1. The machine's axes
    // -------------------------------------------------------------------------
    let factory = Factory::new(
        vec![
            Variable::range(0.0, 300.0), // x, mm
            Variable::range(0.0, 200.0), // y, mm
            Variable::range(0.0, 10.0),  // z, mm
        ],
        FactoryOptions::default(),
    )?;
    println!("1. Axes: x 0..300 mm, y 0..200 mm, z 0..10 mm");
    println!();

    // -------------------------------------------------------------------------
    // 2. A measurement model of the skewed machine
    // -------------------------------------------------------------------------
    // Simulated measurements: the y axis leans 30 degrees into x, so a
    // commanded (x, y, z) lands at (x + y sin 30, y cos 30, z).
    let skew = 30.0_f64.to_radians();
    let measured = factory.create_network(NetworkOptions {
        transform: Some(Box::new(move |commanded: &[f64]| {
            vec![
                commanded[0] + commanded[1] * skew.sin(),
                commanded[1] * skew.cos(),
                commanded[2],
            ]
        })),
        n_random: 20,
        learning_rate: Some(0.25),
        ..NetworkOptions::default()
    })?;

    println!("2. Measurement model");
    if let Some(training) = &measured.training {
        println!(
            "   trained on {} probes in {} epochs (worst probe cost {:.2e})",
            measured.examples.len(),
            training.epochs,
            training.max_cost
        );
    }
    let reached = measured.network.activate(&[100.0, 100.0, 5.0])?.outputs;
    println!(
        "   commanding (100, 100, 5) actually reaches ({:.2}, {:.2}, {:.2})",
        reached[0], reached[1], reached[2]
    );
    println!();

    // -------------------------------------------------------------------------
    // 3. The calibration network is the model's inverse
    // -------------------------------------------------------------------------
    let calibrated = factory.inverse_network(
        &measured.network,
        InverseOptions {
            learning_rate: Some(0.25),
            target_cost: Some(2.5e-7),
            ..InverseOptions::default()
        },
    )?;
    println!(
        "3. Calibration network trained on {} measurement pairs",
        calibrated.examples.len()
    );
    println!();

    // -------------------------------------------------------------------------
    // 4. Command through the calibration
    // -------------------------------------------------------------------------
    let desired = [100.0, 100.0, 5.0];
    let command = calibrated.network.activate(&desired)?.outputs;
    let landed = measured.network.activate(&command)?.outputs;
    println!("4. To land on (100, 100, 5):");
    println!(
        "   command ({:.3}, {:.3}, {:.3})",
        command[0], command[1], command[2]
    );
    println!(
        "   the machine then reaches ({:.3}, {:.3}, {:.3})",
        landed[0], landed[1], landed[2]
    );

    Ok(())
}
