/*!
# Random Decision Forest Model

[`RandomForestModel`] is the default [`ConditionalModel`] engine: a bag of CART trees, each grown
on a random subsample of the training rows with a random subset of features tried at every split.
Discrete dependent variables get classification trees whose averaged leaf frequencies form the
class density; continuous dependent variables get regression trees.

Level codes of discrete independent variables are used as split values directly, so no one-hot
encoding is needed.

## Example

```rust
use depnet::forest::{ForestConfig, PredictionMode, RandomForestModel};
use depnet::model::ConditionalModel;
use depnet::variable::VariableSpecification;
use ndarray::array;
use rand::{rngs::SmallRng, SeedableRng};

let x = VariableSpecification::continuous("x");
let y = VariableSpecification::continuous("y");
let config = ForestConfig::default()
    .with_train_ratio(1.0)
    .with_prediction(PredictionMode::Expected)
    .with_seed(42);
let mut model = RandomForestModel::new(vec![x.clone()], y.clone(), config);

// y = 2x
let data = array![[0.0, 0.0], [1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
model.train(data.view(), 1).unwrap();

let mut rng = SmallRng::seed_from_u64(0);
let y_hat = model.predict(&[4.0], &mut rng).unwrap();
assert!((y_hat - 8.0).abs() < 2.0);
```
*/

mod tree;

use log::{debug, trace};
use ndarray::{Array1, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use rand::distributions::WeightedIndex;
use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, RngCore, SeedableRng};
use rand_distr::Distribution;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{check_input_len, ConditionalModel};
use crate::variable::{VarId, VariableSpecification};
use tree::{GrowParams, Leaf, TargetKind, Tree, TreeBuilder};

/// How [`RandomForestModel::predict`] turns the forest into a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PredictionMode {
    /// Draw from the forest's conditional distribution. This is what Gibbs sampling needs.
    #[default]
    Draw,
    /// Most likely level for discrete targets, mean over trees for continuous ones.
    Expected,
}

/// Hyperparameters of a [`RandomForestModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub num_trees: usize,
    /// Fraction of the training rows, drawn with replacement, each tree is grown on.
    pub train_ratio: f64,
    /// Fraction of the independent variables tried at each split.
    pub feature_fraction: f64,
    pub min_leaf_size: usize,
    pub max_depth: usize,
    pub prediction: PredictionMode,
    /// Seed for subsampling and feature selection. Random when `None`.
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            train_ratio: 0.1,
            feature_fraction: 0.5,
            min_leaf_size: 1,
            max_depth: 32,
            prediction: PredictionMode::Draw,
            seed: None,
        }
    }
}

impl ForestConfig {
    pub fn with_num_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees;
        self
    }

    pub fn with_train_ratio(mut self, train_ratio: f64) -> Self {
        self.train_ratio = train_ratio;
        self
    }

    pub fn with_feature_fraction(mut self, feature_fraction: f64) -> Self {
        self.feature_fraction = feature_fraction;
        self
    }

    pub fn with_min_leaf_size(mut self, min_leaf_size: usize) -> Self {
        self.min_leaf_size = min_leaf_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_prediction(mut self, prediction: PredictionMode) -> Self {
        self.prediction = prediction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_trees == 0 {
            return Err(Error::config("num_trees must be at least 1"));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio <= 1.0) {
            return Err(Error::config(format!(
                "train_ratio must lie in (0, 1], got {}",
                self.train_ratio
            )));
        }
        if !(self.feature_fraction > 0.0 && self.feature_fraction <= 1.0) {
            return Err(Error::config(format!(
                "feature_fraction must lie in (0, 1], got {}",
                self.feature_fraction
            )));
        }
        if self.min_leaf_size == 0 {
            return Err(Error::config("min_leaf_size must be at least 1"));
        }
        Ok(())
    }
}

/// Regression or classification by random decision forests.
#[derive(Debug, Clone)]
pub struct RandomForestModel {
    independent: Vec<VariableSpecification>,
    independent_ids: Vec<VarId>,
    dependent: VariableSpecification,
    config: ForestConfig,
    trees: Vec<Tree>,
}

impl RandomForestModel {
    /// `independent` must be supplied in the order their columns appear in the training
    /// matrix (with the dependent column removed).
    pub fn new(
        independent: Vec<VariableSpecification>,
        dependent: VariableSpecification,
        config: ForestConfig,
    ) -> Self {
        let independent_ids = independent.iter().map(VariableSpecification::id).collect();
        Self {
            independent,
            independent_ids,
            dependent,
            config,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn independent_specs(&self) -> &[VariableSpecification] {
        &self.independent
    }

    pub fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    fn target_kind(&self) -> TargetKind {
        if self.dependent.is_discrete() {
            TargetKind::Classes(self.dependent.num_levels())
        } else {
            TargetKind::Values
        }
    }

    fn ensure_ready(&self, values: &[f64]) -> Result<()> {
        if !self.is_trained() {
            return Err(Error::illegal_state(format!(
                "forest for `{}` has not been trained",
                self.dependent.name()
            )));
        }
        check_input_len(self, values)
    }

    /// Encodes the dependent column, rejecting values the trees cannot learn from.
    fn encode_target(&self, data: ArrayView2<f64>, dependent_column: usize) -> Result<Vec<f64>> {
        data.column(dependent_column)
            .iter()
            .enumerate()
            .map(|(row, &value)| {
                if !value.is_finite() {
                    return Err(Error::model(format!(
                        "non-finite target {value} for `{}` in row {row}",
                        self.dependent.name()
                    )));
                }
                if self.dependent.is_discrete() {
                    let code = self.dependent.level_code(value).ok_or_else(|| {
                        Error::model(format!(
                            "value {value} in row {row} is not a level code of `{}` (0..{})",
                            self.dependent.name(),
                            self.dependent.num_levels()
                        ))
                    })?;
                    Ok(code as f64)
                } else {
                    Ok(value)
                }
            })
            .collect()
    }

    fn draw(&self, values: &[f64], rng: &mut dyn RngCore) -> Result<f64> {
        match self.target_kind() {
            TargetKind::Classes(_) => {
                let density = self.density(values);
                let dist = WeightedIndex::new(&density).map_err(Error::model)?;
                Ok(dist.sample(rng) as f64)
            }
            TargetKind::Values => {
                let tree = &self.trees[rng.gen_range(0..self.trees.len())];
                match tree.leaf(values) {
                    Leaf::Values(leaf) => Ok(leaf[rng.gen_range(0..leaf.len())]),
                    Leaf::Classes(_) => unreachable!("regression forest with a class leaf"),
                }
            }
        }
    }

    fn expected(&self, values: &[f64]) -> Result<f64> {
        match self.target_kind() {
            TargetKind::Classes(_) => {
                let density = Array1::from(self.density(values));
                let best = density.argmax().map_err(Error::model)?;
                Ok(best as f64)
            }
            TargetKind::Values => Ok(self
                .trees
                .iter()
                .map(|tree| tree.leaf(values).mean())
                .sum::<f64>()
                / self.trees.len() as f64),
        }
    }

    /// Averaged leaf class frequencies; only meaningful for classification forests.
    fn density(&self, values: &[f64]) -> Vec<f64> {
        let mut density = vec![0.0; self.dependent.num_levels()];
        for tree in &self.trees {
            if let Leaf::Classes(freqs) = tree.leaf(values) {
                density.iter_mut().zip(freqs).for_each(|(d, f)| *d += f);
            }
        }
        let n = self.trees.len() as f64;
        density.iter_mut().for_each(|d| *d /= n);
        density
    }
}

impl ConditionalModel for RandomForestModel {
    fn independent_vars(&self) -> &[VarId] {
        &self.independent_ids
    }

    fn dependent_spec(&self) -> &VariableSpecification {
        &self.dependent
    }

    fn predict(&self, values: &[f64], rng: &mut dyn RngCore) -> Result<f64> {
        self.ensure_ready(values)?;
        let value = match self.config.prediction {
            PredictionMode::Draw => self.draw(values, rng)?,
            PredictionMode::Expected => self.expected(values)?,
        };
        trace!("{} = {value} given {values:?}", self.dependent.name());
        Ok(value)
    }

    fn class_density(&self, values: &[f64]) -> Result<Vec<f64>> {
        if !self.supports_class_density() {
            return Err(Error::UnsupportedOperation(format!(
                "cannot retrieve class densities for non-discrete variable `{}`",
                self.dependent.name()
            )));
        }
        self.ensure_ready(values)?;
        Ok(self.density(values))
    }

    fn supports_class_density(&self) -> bool {
        self.dependent.is_discrete()
    }

    fn train(&mut self, data: ArrayView2<f64>, dependent_column: usize) -> Result<()> {
        self.config.validate()?;
        let (n_rows, n_cols) = data.dim();
        if n_cols != self.independent.len() + 1 {
            return Err(Error::config(format!(
                "forest for `{}` expects {} columns, got {n_cols}",
                self.dependent.name(),
                self.independent.len() + 1
            )));
        }
        if dependent_column >= n_cols {
            return Err(Error::config(format!(
                "dependent column {dependent_column} out of range for {n_cols} columns"
            )));
        }
        if n_rows == 0 {
            return Err(Error::model(format!(
                "cannot train forest for `{}` on an empty matrix",
                self.dependent.name()
            )));
        }
        if self.dependent.is_discrete() && self.dependent.num_levels() == 0 {
            return Err(Error::config(format!(
                "discrete variable `{}` has no levels",
                self.dependent.name()
            )));
        }

        let target = self.encode_target(data, dependent_column)?;
        let feature_columns: Vec<usize> = (0..n_cols).filter(|&c| c != dependent_column).collect();
        let features = data.select(Axis(1), &feature_columns);

        let kind = self.target_kind();
        let n_features = feature_columns.len();
        let params = GrowParams {
            features_per_split: ((self.config.feature_fraction * n_features as f64).round()
                as usize)
                .max(1),
            min_leaf_size: self.config.min_leaf_size,
            max_depth: self.config.max_depth,
        };
        let subsample = ((self.config.train_ratio * n_rows as f64).ceil() as usize).max(1);

        let seed = self.config.seed.unwrap_or_else(|| thread_rng().gen::<u64>());
        let mut master = SmallRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..self.config.num_trees).map(|_| master.gen()).collect();

        debug!(
            "Training forest for `{}`: {} trees on {subsample}/{n_rows} rows, {n_features} features",
            self.dependent.name(),
            tree_seeds.len()
        );

        self.trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = SmallRng::seed_from_u64(tree_seed);
                let rows: Vec<usize> = (0..subsample).map(|_| rng.gen_range(0..n_rows)).collect();
                TreeBuilder::new(features.view(), &target, kind, params, rng).grow(rows)
            })
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    fn config() -> ForestConfig {
        ForestConfig::default()
            .with_num_trees(20)
            .with_train_ratio(1.0)
            .with_seed(42)
    }

    /// x in 0..10 repeated, y = 2x.
    fn linear_data() -> Array2<f64> {
        Array2::from_shape_fn((200, 2), |(r, c)| {
            let x = (r % 10) as f64;
            if c == 0 {
                x
            } else {
                2.0 * x
            }
        })
    }

    #[test]
    fn test_regression_expected_prediction() {
        let x = VariableSpecification::continuous("x");
        let y = VariableSpecification::continuous("y");
        let mut model = RandomForestModel::new(
            vec![x],
            y,
            config().with_prediction(PredictionMode::Expected),
        );
        model.train(linear_data().view(), 1).unwrap();
        assert_eq!(model.num_trees(), 20);

        let y_hat = model.predict(&[3.0], &mut rng()).unwrap();
        assert_abs_diff_eq!(y_hat, 6.0, epsilon = 1.0);
    }

    #[test]
    fn test_regression_draw_returns_training_target() {
        let x = VariableSpecification::continuous("x");
        let y = VariableSpecification::continuous("y");
        let mut model = RandomForestModel::new(vec![y], x, config());
        // Dependent column 0: predict x from y.
        model.train(linear_data().view(), 0).unwrap();
        let mut rng = rng();
        for _ in 0..50 {
            let x_hat = model.predict(&[8.0], &mut rng).unwrap();
            assert!((0.0..10.0).contains(&x_hat));
            assert_eq!(x_hat.fract(), 0.0, "draws come from leaf targets");
        }
    }

    #[test]
    fn test_classification_density() {
        let b = VariableSpecification::boolean("b");
        let copy = VariableSpecification::boolean("copy");
        let mut model = RandomForestModel::new(vec![b], copy, config());
        let data = Array2::from_shape_fn((100, 2), |(r, _)| (r % 2) as f64);
        model.train(data.view(), 1).unwrap();

        assert!(model.supports_class_density());
        let density = model.class_density(&[1.0]).unwrap();
        assert_eq!(density.len(), 2);
        assert_abs_diff_eq!(density.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(density[1], 1.0, epsilon = 1e-9);

        let mut rng = rng();
        for _ in 0..20 {
            assert_eq!(model.predict(&[0.0], &mut rng).unwrap(), 0.0);
            assert_eq!(model.predict(&[1.0], &mut rng).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_expected_classification_picks_majority() {
        let x = VariableSpecification::continuous("x");
        let c = VariableSpecification::discrete("c", ["a", "b", "c"]);
        let mut model = RandomForestModel::new(
            vec![x],
            c,
            config().with_prediction(PredictionMode::Expected),
        );
        let data = array![
            [0.0, 2.0],
            [0.1, 2.0],
            [0.2, 2.0],
            [5.0, 0.0],
            [5.1, 0.0],
            [5.2, 0.0]
        ];
        model.train(data.view(), 1).unwrap();
        assert_eq!(model.predict(&[0.1], &mut rng()).unwrap(), 2.0);
        assert_eq!(model.predict(&[5.1], &mut rng()).unwrap(), 0.0);
    }

    #[test]
    fn test_density_on_continuous_is_unsupported() {
        let x = VariableSpecification::continuous("x");
        let y = VariableSpecification::continuous("y");
        let mut model = RandomForestModel::new(vec![x], y, config());
        assert!(!model.supports_class_density());
        assert!(matches!(
            model.class_density(&[1.0]),
            Err(Error::UnsupportedOperation(_))
        ));
        model.train(linear_data().view(), 1).unwrap();
        assert!(matches!(
            model.class_density(&[1.0]),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_predict_before_training_is_illegal_state() {
        let x = VariableSpecification::continuous("x");
        let y = VariableSpecification::continuous("y");
        let model = RandomForestModel::new(vec![x], y, config());
        assert!(matches!(
            model.predict(&[1.0], &mut rng()),
            Err(Error::IllegalState(_))
        ));
    }

    #[test]
    fn test_wrong_input_length() {
        let x = VariableSpecification::continuous("x");
        let y = VariableSpecification::continuous("y");
        let mut model = RandomForestModel::new(vec![x], y, config());
        model.train(linear_data().view(), 1).unwrap();
        assert!(matches!(
            model.predict(&[1.0, 2.0], &mut rng()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_training_errors() {
        let x = VariableSpecification::continuous("x");
        let c = VariableSpecification::discrete("c", ["a", "b"]);
        let mut model = RandomForestModel::new(vec![x.clone()], c, config());

        let bad_code = array![[0.0, 0.0], [1.0, 2.0]];
        assert!(matches!(
            model.train(bad_code.view(), 1),
            Err(Error::Model(_))
        ));
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(model.train(empty.view(), 1), Err(Error::Model(_))));
        let wide = Array2::<f64>::zeros((3, 3));
        assert!(matches!(
            model.train(wide.view(), 1),
            Err(Error::Configuration(_))
        ));
        assert!(!model.is_trained());

        let y = VariableSpecification::continuous("y");
        let mut model = RandomForestModel::new(vec![x], y, config());
        let nan = array![[0.0, f64::NAN]];
        assert!(matches!(model.train(nan.view(), 1), Err(Error::Model(_))));
    }

    #[test]
    fn test_invalid_config() {
        let bad = [
            config().with_num_trees(0),
            config().with_train_ratio(0.0),
            config().with_train_ratio(1.5),
            config().with_feature_fraction(0.0),
            config().with_min_leaf_size(0),
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{cfg:?} should be rejected");
        }
        assert!(ForestConfig::default().validate().is_ok());
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let train = || {
            let x = VariableSpecification::continuous("x");
            let y = VariableSpecification::continuous("y");
            let mut model = RandomForestModel::new(
                vec![x],
                y,
                config().with_train_ratio(0.3),
            );
            model.train(linear_data().view(), 1).unwrap();
            let mut rng = rng();
            (0..10)
                .map(|i| model.predict(&[i as f64], &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(train(), train());
    }

    #[test]
    fn test_single_variable_forest() {
        let y = VariableSpecification::continuous("y");
        let mut model = RandomForestModel::new(
            vec![],
            y,
            config().with_prediction(PredictionMode::Expected),
        );
        let data = array![[1.0], [3.0]];
        model.train(data.view(), 0).unwrap();
        let y_hat = model.predict(&[], &mut rng()).unwrap();
        assert!((1.0..=3.0).contains(&y_hat));
    }
}
