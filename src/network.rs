/*!
# Dependency Network.

A [`DependencyNetwork`] approximates the joint distribution over a fixed set of variables by one
[`ConditionalModel`] per variable, each predicting its variable from all the others. Joint samples
are drawn by Gibbs sampling over those models.

The network owns the variable specifications, the trained models and the sampling state. It does
not know which concrete models or samplers it uses: a [`Factory`] builds them.

## Example

```rust
use depnet::config::NetworkConfig;
use depnet::network::DependencyNetwork;
use depnet::factory::StandardFactory;
use depnet::variable::VariableSpecification;
use ndarray::array;

let x = VariableSpecification::boolean("x");
let y = VariableSpecification::boolean("y");
let config = NetworkConfig::default()
    .with_num_chains(2)
    .with_warm_up(10)
    .with_thin_interval(2)
    .with_seed(7);
let mut network =
    DependencyNetwork::new(vec![x, y], Box::new(StandardFactory::new()), config).unwrap();

let data = array![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0], [1.0, 1.0]];
network.train(data.view()).unwrap();

let samples = network.get_samples(5).unwrap();
assert_eq!(samples.dim(), (5, 2));
```
*/

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::factory::{Factory, StandardFactory};
use crate::gibbs::{SamplerOptions, Sample};
use crate::iterator::GibbsIterator;
use crate::model::ConditionalModel;
use crate::variable::{VarId, VariableSpecification};

pub struct DependencyNetwork {
    variables: Vec<VariableSpecification>,
    factory: Box<dyn Factory>,
    config: NetworkConfig,
    models: HashMap<VarId, Arc<dyn ConditionalModel>>,
    iterator: Option<Box<dyn GibbsIterator>>,
}

impl DependencyNetwork {
    /// Creates an untrained network over `variables`, in the column order of future training
    /// matrices.
    pub fn new(
        variables: Vec<VariableSpecification>,
        factory: Box<dyn Factory>,
        config: NetworkConfig,
    ) -> Result<Self> {
        config.validate()?;
        for spec in &variables {
            spec.validate()?;
        }
        let distinct: HashSet<VarId> = variables.iter().map(VariableSpecification::id).collect();
        if distinct.len() != variables.len() {
            return Err(Error::config("the same variable is listed more than once"));
        }
        debug!("Created dependency network over {} variables", variables.len());
        Ok(Self {
            variables,
            factory,
            config,
            models: HashMap::new(),
            iterator: None,
        })
    }

    /// Random forests and default configuration.
    pub fn with_standard_factory(variables: Vec<VariableSpecification>) -> Result<Self> {
        Self::new(
            variables,
            Box::new(StandardFactory::new()),
            NetworkConfig::default(),
        )
    }

    pub fn variables(&self) -> &[VariableSpecification] {
        &self.variables
    }

    /// Id of the first variable called `name`.
    pub fn var_id(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .find(|spec| spec.name() == name)
            .map(VariableSpecification::id)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.iterator.is_some()
    }

    /// Trains one model per variable on `samples` and builds a fresh sampler over them.
    ///
    /// Column `j` of `samples` holds the values of the `j`-th variable; discrete variables hold
    /// level codes. Models from a previous training are discarded first. Models are trained in
    /// variable order and kept as soon as they are trained: if one fails, the models before it
    /// stay, the ones after it are missing, no sampler is available and the error is returned as
    /// raised.
    pub fn train(&mut self, samples: ArrayView2<f64>) -> Result<()> {
        let (n_rows, n_cols) = samples.dim();
        if n_cols != self.variables.len() {
            return Err(Error::config(format!(
                "training matrix has {n_cols} columns but the network has {} variables",
                self.variables.len()
            )));
        }
        info!(
            "Training dependency network: {} variables, {n_rows} instances",
            self.variables.len()
        );
        self.iterator = None;
        self.models.clear();

        let mut trained = Vec::with_capacity(n_cols);
        for (column, dependent) in self.variables.iter().enumerate() {
            let independent: Vec<VariableSpecification> = self
                .variables
                .iter()
                .filter(|spec| spec.id() != dependent.id())
                .cloned()
                .collect();
            let mut model = self.factory.create_model(independent, dependent.clone());
            debug!("Training model for `{}`", dependent.name());
            model.train(samples, column)?;

            let model: Arc<dyn ConditionalModel> = Arc::from(model);
            self.models.insert(dependent.id(), Arc::clone(&model));
            trained.push(model);
        }

        let options = SamplerOptions {
            seed: self.config.seed,
            init_range: self.config.init_range,
            ..SamplerOptions::default()
        };
        let sampler = self
            .factory
            .create_sampler(trained, self.config.num_chains, options)?;
        self.iterator = Some(self.factory.create_sample_iterator(
            sampler,
            self.config.warm_up,
            self.config.thin_interval,
        ));
        info!("Dependency network trained");
        Ok(())
    }

    /// The trained model of `var`.
    pub fn get_model(&self, var: VarId) -> Result<&dyn ConditionalModel> {
        let spec = self
            .variables
            .iter()
            .find(|spec| spec.id() == var)
            .ok_or_else(|| Error::config(format!("{var} is not part of this network")))?;
        self.models
            .get(&var)
            .map(|model| model.as_ref())
            .ok_or_else(|| {
                Error::illegal_state(format!("no trained model for `{}`", spec.name()))
            })
    }

    /// Draws `n` joint samples as an `n x V` matrix, columns in variable order.
    pub fn get_samples(&mut self, n: usize) -> Result<Array2<f64>> {
        self.collect_samples(n, None)
    }

    /// Like [`Self::get_samples`], drawing a progress bar on stderr.
    pub fn get_samples_with_progress(&mut self, n: usize) -> Result<Array2<f64>> {
        let pb = ProgressBar::new(n as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:8} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_prefix("Gibbs");
        let out = self.collect_samples(n, Some(&pb));
        match &out {
            Ok(_) => pb.finish_with_message("Done!"),
            Err(_) => pb.abandon_with_message("Failed"),
        }
        out
    }

    fn collect_samples(&mut self, n: usize, pb: Option<&ProgressBar>) -> Result<Array2<f64>> {
        let vars: Vec<VarId> = self.variables.iter().map(VariableSpecification::id).collect();
        let iterator = self.iterator_mut()?;
        let mut out = Array2::<f64>::zeros((n, vars.len()));
        for mut row in out.rows_mut() {
            let sample = iterator.advance()?;
            for (cell, &var) in row.iter_mut().zip(&vars) {
                *cell = value_of(&sample, var)?;
            }
            if let Some(pb) = pb {
                pb.inc(1);
            }
        }
        debug!(
            "Drew {n} samples, {} raw sweeps so far",
            iterator.total_samples()
        );
        Ok(out)
    }

    /// The stateful sampling handle of the trained network.
    pub fn get_sampler(&mut self) -> Result<&mut dyn GibbsIterator> {
        self.iterator_mut()
    }

    /// Reinitializes every chain and the warm-up/thinning counters. The next sample pays the
    /// warm-up again.
    pub fn reset_sampler(&mut self) -> Result<()> {
        self.iterator_mut()?.reset();
        info!("Gibbs sampler reset");
        Ok(())
    }

    fn iterator_mut(&mut self) -> Result<&mut dyn GibbsIterator> {
        match self.iterator.as_mut() {
            Some(iterator) => Ok(iterator.as_mut()),
            None => Err(Error::illegal_state("the dependency network is not trained")),
        }
    }
}

fn value_of(sample: &Sample, var: VarId) -> Result<f64> {
    sample
        .get(var)
        .ok_or_else(|| Error::illegal_state(format!("sampler does not produce {var}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestConfig;
    use crate::gibbs::tests::LinkModel;
    use crate::gibbs::GibbsSampler;
    use ndarray::array;

    fn xy() -> (VariableSpecification, VariableSpecification) {
        (
            VariableSpecification::continuous("x"),
            VariableSpecification::continuous("y"),
        )
    }

    fn small_config() -> NetworkConfig {
        NetworkConfig::default()
            .with_num_chains(2)
            .with_warm_up(5)
            .with_thin_interval(2)
            .with_seed(17)
    }

    fn forest_factory() -> Box<dyn Factory> {
        Box::new(StandardFactory::with_forest_config(
            ForestConfig::default().with_num_trees(10).with_seed(3),
        ))
    }

    fn training_data() -> Array2<f64> {
        Array2::from_shape_fn((40, 2), |(i, j)| i as f64 * 0.25 + j as f64)
    }

    /// Builds [`LinkModel`]s; the model of the variable named `broken` fails to predict.
    struct LinkFactory {
        broken: Option<&'static str>,
    }

    impl Factory for LinkFactory {
        fn create_model(
            &self,
            independent: Vec<VariableSpecification>,
            dependent: VariableSpecification,
        ) -> Box<dyn ConditionalModel> {
            Box::new(LinkModel {
                indep: independent.iter().map(VariableSpecification::id).collect(),
                fail: self.broken == Some(dependent.name()),
                dep: dependent,
                offset: 0.0,
            })
        }

        fn create_sampler(
            &self,
            models: Vec<Arc<dyn ConditionalModel>>,
            num_chains: usize,
            options: SamplerOptions,
        ) -> Result<Box<dyn GibbsSampler>> {
            StandardFactory::new().create_sampler(models, num_chains, options)
        }

        fn create_sample_iterator(
            &self,
            sampler: Box<dyn GibbsSampler>,
            warm_up: usize,
            interval: usize,
        ) -> Box<dyn GibbsIterator> {
            StandardFactory::new().create_sample_iterator(sampler, warm_up, interval)
        }
    }

    #[test]
    fn test_samples_have_requested_shape() {
        let (x, y) = xy();
        let mut network =
            DependencyNetwork::new(vec![x, y], forest_factory(), small_config()).unwrap();
        network.train(training_data().view()).unwrap();
        let samples = network.get_samples(3).unwrap();
        assert_eq!(samples.dim(), (3, 2));
        assert!(samples.iter().all(|v| v.is_finite()));
        assert_eq!(network.get_samples(0).unwrap().dim(), (0, 2));
    }

    #[test]
    fn test_models_condition_on_all_other_variables() {
        let (x, y) = xy();
        let z = VariableSpecification::discrete("z", ["a", "b"]);
        let ids = [x.id(), y.id(), z.id()];
        let mut network = DependencyNetwork::new(
            vec![x, y, z],
            forest_factory(),
            small_config(),
        )
        .unwrap();
        let data = Array2::from_shape_fn((30, 3), |(i, j)| {
            if j == 2 {
                (i % 2) as f64
            } else {
                (i * (j + 1)) as f64
            }
        });
        network.train(data.view()).unwrap();

        for &var in &ids {
            let model = network.get_model(var).unwrap();
            assert_eq!(model.dependent_var(), var);
            let expected: Vec<VarId> = ids.iter().copied().filter(|&v| v != var).collect();
            assert_eq!(model.independent_vars(), expected.as_slice());
        }
        assert!(network.get_model(ids[2]).unwrap().supports_class_density());
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, y) = xy();
        let mut network =
            DependencyNetwork::new(vec![x, y], forest_factory(), small_config()).unwrap();
        let data = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            network.train(data.view()),
            Err(Error::Configuration(_))
        ));
        assert!(!network.is_trained());
    }

    #[test]
    fn test_untrained_network() {
        let (x, y) = xy();
        let x_id = x.id();
        let mut network =
            DependencyNetwork::new(vec![x, y], forest_factory(), small_config()).unwrap();
        assert!(matches!(network.get_samples(1), Err(Error::IllegalState(_))));
        assert!(matches!(network.get_sampler(), Err(Error::IllegalState(_))));
        assert!(matches!(network.reset_sampler(), Err(Error::IllegalState(_))));
        assert!(matches!(network.get_model(x_id), Err(Error::IllegalState(_))));

        let stranger = VariableSpecification::continuous("stranger");
        assert!(matches!(
            network.get_model(stranger.id()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_construction() {
        let (x, _) = xy();
        assert!(DependencyNetwork::new(
            vec![x.clone(), x.clone()],
            forest_factory(),
            small_config()
        )
        .is_err());

        let mut levelless = VariableSpecification::new("levelless");
        levelless.set_discrete(true);
        assert!(matches!(
            DependencyNetwork::new(vec![x.clone(), levelless], forest_factory(), small_config()),
            Err(Error::Configuration(_))
        ));

        let no_chains = small_config().with_num_chains(0);
        assert!(DependencyNetwork::new(vec![x], forest_factory(), no_chains).is_err());
    }

    #[test]
    fn test_training_is_not_transactional() {
        let x = VariableSpecification::continuous("x");
        let y = VariableSpecification::boolean("y");
        let z = VariableSpecification::continuous("z");
        let ids = [x.id(), y.id(), z.id()];
        let mut network =
            DependencyNetwork::new(vec![x, y, z], forest_factory(), small_config()).unwrap();
        // 5 is not a level code of the boolean `y`.
        let data = Array2::from_shape_fn((10, 3), |(i, j)| if j == 1 { 5.0 } else { i as f64 });
        assert!(matches!(network.train(data.view()), Err(Error::Model(_))));

        assert!(network.get_model(ids[0]).is_ok());
        assert!(matches!(network.get_model(ids[1]), Err(Error::IllegalState(_))));
        assert!(matches!(network.get_model(ids[2]), Err(Error::IllegalState(_))));
        assert!(matches!(network.get_samples(1), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_failed_retraining_drops_previous_models() {
        let x = VariableSpecification::continuous("x");
        let y = VariableSpecification::boolean("y");
        let z = VariableSpecification::continuous("z");
        let ids = [x.id(), y.id(), z.id()];
        let mut network =
            DependencyNetwork::new(vec![x, y, z], forest_factory(), small_config()).unwrap();
        let good =
            Array2::from_shape_fn((10, 3), |(i, j)| if j == 1 { (i % 2) as f64 } else { i as f64 });
        network.train(good.view()).unwrap();
        assert!(ids.iter().all(|&v| network.get_model(v).is_ok()));

        let bad = Array2::from_shape_fn((10, 3), |(i, j)| if j == 1 { 5.0 } else { i as f64 });
        assert!(matches!(network.train(bad.view()), Err(Error::Model(_))));
        assert!(network.get_model(ids[0]).is_ok());
        assert!(matches!(network.get_model(ids[1]), Err(Error::IllegalState(_))));
        assert!(matches!(network.get_model(ids[2]), Err(Error::IllegalState(_))));
        assert!(!network.is_trained());
    }

    #[test]
    fn test_sample_columns_follow_variable_order() {
        let (x, y) = xy();
        let mut network =
            DependencyNetwork::new(vec![x, y], forest_factory(), small_config()).unwrap();
        // x in 0..10, y = x + 100: the two columns never overlap.
        let data = Array2::from_shape_fn((40, 2), |(i, j)| (i % 10) as f64 + 100.0 * j as f64);
        network.train(data.view()).unwrap();

        let samples = network.get_samples(3).unwrap();
        assert_eq!(samples.dim(), (3, 2));
        for row in samples.rows() {
            assert!((0.0..10.0).contains(&row[0]), "x column holds {}", row[0]);
            assert!((100.0..110.0).contains(&row[1]), "y column holds {}", row[1]);
        }
    }

    #[test]
    fn test_prediction_failure_surfaces_from_sampling() {
        let (x, y) = xy();
        let mut network = DependencyNetwork::new(
            vec![x, y],
            Box::new(LinkFactory { broken: Some("y") }),
            small_config(),
        )
        .unwrap();
        network.train(Array2::<f64>::zeros((4, 2)).view()).unwrap();
        assert!(network.is_trained());
        assert!(matches!(network.get_samples(1), Err(Error::Model(_))));
    }

    #[test]
    fn test_reset_sampler_restarts_warm_up() {
        let (x, y) = xy();
        let mut network = DependencyNetwork::new(
            vec![x, y],
            Box::new(LinkFactory { broken: None }),
            small_config(),
        )
        .unwrap();
        network.train(Array2::<f64>::zeros((4, 2)).view()).unwrap();
        network.get_samples(2).unwrap();
        // warm-up 5, interval 2: raw sweeps 6 and 8 are emitted.
        assert_eq!(network.get_sampler().unwrap().total_samples(), 9);

        network.reset_sampler().unwrap();
        let sampler = network.get_sampler().unwrap();
        assert_eq!(sampler.total_samples(), 0);
        assert!(!sampler.is_warmed_up());
    }

    #[test]
    fn test_lookup_by_name() {
        let (x, y) = xy();
        let y_id = y.id();
        let network = DependencyNetwork::with_standard_factory(vec![x, y]).unwrap();
        assert_eq!(network.var_id("y"), Some(y_id));
        assert_eq!(network.var_id("w"), None);
        assert_eq!(network.config(), &NetworkConfig::default());
        assert_eq!(network.variables().len(), 2);
    }
}
