//! Trains a two-variable dependency network on synthetic data, prints the learned relation
//! `y = f(x)` and summarizes joint samples drawn from the network.
//!
//! Run with `RUST_LOG=info` to follow training and sampling. With the `csv` feature the samples
//! are written to the path given as first argument (default `deptool_samples.csv`).

use depnet::config::NetworkConfig;
use depnet::factory::{Factory, StandardFactory};
use depnet::network::DependencyNetwork;
use ndarray::{Array2, Axis};
use ndarray_stats::QuantileExt;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    const N_POINTS: usize = 5000;
    const N_SAMPLES: usize = 5000;
    const X_MAX: f64 = 20.0;
    const NOISE: f64 = 5.0;
    const N_DRAWS: usize = 200;
    const SEED: u64 = 42;

    let factory = StandardFactory::new();
    let mut x = factory.create_variable_spec();
    x.set_name("x");
    let mut y = factory.create_variable_spec();
    y.set_name("y");
    let y_id = y.id();

    // x ~ U(0, 20), y ~ N(x, 5)
    let mut rng = SmallRng::seed_from_u64(SEED);
    let uniform = Uniform::new(0.0, X_MAX);
    let mut data = Array2::<f64>::zeros((N_POINTS, 2));
    for mut row in data.rows_mut() {
        let x_value = uniform.sample(&mut rng);
        row[0] = x_value;
        row[1] = Normal::new(x_value, NOISE)?.sample(&mut rng);
    }

    let config = NetworkConfig::default().with_seed(SEED);
    let mut network = DependencyNetwork::new(vec![x, y], Box::new(factory), config)?;
    network.train(data.view())?;

    // The forest draws from its leaves; average repeated draws to show the learned mean.
    let y_model = network.get_model(y_id)?;
    for i in 0..15 {
        let mut total = 0.0;
        for _ in 0..N_DRAWS {
            total += y_model.predict(&[i as f64], &mut rng)?;
        }
        println!("{:.4}=f({i})", total / N_DRAWS as f64);
    }

    let samples = network.get_samples_with_progress(N_SAMPLES)?;
    println!("Generated {} joint samples", samples.nrows());
    for (name, column) in [("x", 0), ("y", 1)] {
        let values = samples.index_axis(Axis(1), column);
        println!(
            "{name}: mean {:.3}, std {:.3}, min {:.3}, max {:.3}",
            values.mean().unwrap_or(f64::NAN),
            values.std(1.0),
            values.min_skipnan(),
            values.max_skipnan()
        );
    }

    #[cfg(feature = "csv")]
    {
        let path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| "deptool_samples.csv".to_string());
        depnet::io::csv::save_samples_csv(&samples, &["x", "y"], &path)?;
        println!("Samples written to {path}");
    }

    Ok(())
}
