/*!
# Conditional Models

A [`ConditionalModel`] is the local predictor of one dependent variable given all the other
variables of the network. The sampling engine only ever talks to this trait, so any regression or
classification engine can be plugged in; [`crate::forest::RandomForestModel`] is the engine the
[`crate::factory::StandardFactory`] builds.

```rust
use depnet::error::{Error, Result};
use depnet::model::ConditionalModel;
use depnet::variable::{VarId, VariableSpecification};
use ndarray::ArrayView2;
use rand::RngCore;

/// Always predicts the mean of its training target.
struct MeanModel {
    indep: Vec<VarId>,
    dep: VariableSpecification,
    mean: f64,
}

impl ConditionalModel for MeanModel {
    fn independent_vars(&self) -> &[VarId] {
        &self.indep
    }
    fn dependent_spec(&self) -> &VariableSpecification {
        &self.dep
    }
    fn predict(&self, _values: &[f64], _rng: &mut dyn RngCore) -> Result<f64> {
        Ok(self.mean)
    }
    fn class_density(&self, _values: &[f64]) -> Result<Vec<f64>> {
        Err(Error::UnsupportedOperation("mean model has no density".into()))
    }
    fn supports_class_density(&self) -> bool {
        false
    }
    fn train(&mut self, data: ArrayView2<f64>, dependent_column: usize) -> Result<()> {
        self.mean = data.column(dependent_column).mean().unwrap_or(0.0);
        Ok(())
    }
}
```
*/

use ndarray::ArrayView2;
use rand::RngCore;

use crate::error::{Error, Result};
use crate::variable::{VarId, VariableSpecification};

/// A trainable predictor for one variable given the others.
///
/// Implementations must be `Send + Sync`: a trained model set is shared read-only by every chain
/// of a sampler, possibly across threads.
pub trait ConditionalModel: Send + Sync {
    /// Ids of the conditioning variables, in the order `predict` expects their values.
    fn independent_vars(&self) -> &[VarId];

    /// Metadata of the variable left of the conditioning bar.
    fn dependent_spec(&self) -> &VariableSpecification;

    /// Id of the variable left of the conditioning bar.
    fn dependent_var(&self) -> VarId {
        self.dependent_spec().id()
    }

    /// Produces a value for the dependent variable given `values` of the independent
    /// variables. `rng` belongs to the calling chain; stochastic models draw from it so
    /// that seeded runs are reproducible, deterministic models ignore it.
    fn predict(&self, values: &[f64], rng: &mut dyn RngCore) -> Result<f64>;

    /// Normalized probabilities over the dependent variable's levels.
    ///
    /// Fails with [`Error::UnsupportedOperation`] when the dependent variable is continuous.
    fn class_density(&self, values: &[f64]) -> Result<Vec<f64>>;

    fn supports_class_density(&self) -> bool;

    /// Trains on the full matrix; column `dependent_column` is the target and the remaining
    /// columns, in order, are the independent variables.
    fn train(&mut self, data: ArrayView2<f64>, dependent_column: usize) -> Result<()>;
}

/// Checks that a prediction input has one value per independent variable.
pub(crate) fn check_input_len(model: &dyn ConditionalModel, values: &[f64]) -> Result<()> {
    let expected = model.independent_vars().len();
    if values.len() != expected {
        return Err(Error::config(format!(
            "model for {} expects {} independent values, got {}",
            model.dependent_var(),
            expected,
            values.len()
        )));
    }
    Ok(())
}
