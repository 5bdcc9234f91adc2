/*!
# depnet

Dependency networks: a joint distribution over a fixed set of variables, approximated by one
conditional model per variable and sampled with multi-chain Gibbs sampling.

- [`network::DependencyNetwork`] trains one [`model::ConditionalModel`] per variable, each
  predicting its variable from all the others, and hands out joint samples.
- [`forest::RandomForestModel`] is the default conditional model.
- [`gibbs::StandardGibbsSampler`] sweeps several independent chains round-robin;
  [`iterator::StandardGibbsIterator`] applies warm-up and thinning on top of it.
- [`factory::Factory`] is the seam for plugging in other models or samplers.

## Example

```rust
use depnet::config::NetworkConfig;
use depnet::factory::StandardFactory;
use depnet::network::DependencyNetwork;
use depnet::variable::VariableSpecification;
use ndarray::Array2;

let x = VariableSpecification::continuous("x");
let y = VariableSpecification::continuous("y");
let config = NetworkConfig::default()
    .with_num_chains(4)
    .with_warm_up(20)
    .with_thin_interval(5)
    .with_seed(42);
let mut network =
    DependencyNetwork::new(vec![x, y], Box::new(StandardFactory::new()), config).unwrap();

// y = x + 1
let data = Array2::from_shape_fn((200, 2), |(i, j)| (i % 20) as f64 + j as f64);
network.train(data.view()).unwrap();

let samples = network.get_samples(10).unwrap();
assert_eq!(samples.shape(), &[10, 2]);
```

## Features

- `csv`: loading training matrices from and saving samples to CSV files ([`io::csv`]).
*/

pub mod config;
pub mod core;
pub mod error;
pub mod factory;
pub mod forest;
pub mod gibbs;
pub mod io;
pub mod iterator;
pub mod model;
pub mod network;
pub mod variable;

pub use error::{Error, Result};
pub use network::DependencyNetwork;
pub use variable::{VarId, VariableSpecification};
