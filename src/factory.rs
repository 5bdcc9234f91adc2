/*!
# Component Factory.

A [`crate::network::DependencyNetwork`] never names a concrete model, sampler or iterator type.
It asks its [`Factory`] for them, so swapping the conditional-model engine or the sampling
strategy only means supplying a different factory.

[`StandardFactory`] wires the defaults: [`RandomForestModel`] per variable,
[`StandardGibbsSampler`] and [`StandardGibbsIterator`].
*/

use log::debug;
use std::sync::Arc;

use crate::error::Result;
use crate::forest::{ForestConfig, RandomForestModel};
use crate::gibbs::{GibbsSampler, SamplerOptions, StandardGibbsSampler};
use crate::iterator::{GibbsIterator, StandardGibbsIterator};
use crate::model::ConditionalModel;
use crate::variable::VariableSpecification;

/// Builds the pluggable parts of a dependency network.
pub trait Factory: Send + Sync {
    /// An untrained model predicting `dependent` from `independent`, in that column order.
    fn create_model(
        &self,
        independent: Vec<VariableSpecification>,
        dependent: VariableSpecification,
    ) -> Box<dyn ConditionalModel>;

    /// A sampler with `num_chains` chains over trained `models`, one per variable.
    fn create_sampler(
        &self,
        models: Vec<Arc<dyn ConditionalModel>>,
        num_chains: usize,
        options: SamplerOptions,
    ) -> Result<Box<dyn GibbsSampler>>;

    fn create_sample_iterator(
        &self,
        sampler: Box<dyn GibbsSampler>,
        warm_up: usize,
        interval: usize,
    ) -> Box<dyn GibbsIterator>;

    /// A fresh, unnamed continuous variable with its own id.
    fn create_variable_spec(&self) -> VariableSpecification {
        VariableSpecification::default()
    }
}

/// Random forests, the standard sampler and the standard iterator.
#[derive(Debug, Clone, Default)]
pub struct StandardFactory {
    forest: ForestConfig,
}

impl StandardFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `forest` for every model this factory creates.
    pub fn with_forest_config(forest: ForestConfig) -> Self {
        Self { forest }
    }

    pub fn forest_config(&self) -> &ForestConfig {
        &self.forest
    }
}

impl Factory for StandardFactory {
    fn create_model(
        &self,
        independent: Vec<VariableSpecification>,
        dependent: VariableSpecification,
    ) -> Box<dyn ConditionalModel> {
        debug!(
            "Creating random forest for `{}` over {} inputs",
            dependent.name(),
            independent.len()
        );
        Box::new(RandomForestModel::new(
            independent,
            dependent,
            self.forest.clone(),
        ))
    }

    fn create_sampler(
        &self,
        models: Vec<Arc<dyn ConditionalModel>>,
        num_chains: usize,
        options: SamplerOptions,
    ) -> Result<Box<dyn GibbsSampler>> {
        Ok(Box::new(StandardGibbsSampler::new(
            &models, num_chains, options,
        )?))
    }

    fn create_sample_iterator(
        &self,
        sampler: Box<dyn GibbsSampler>,
        warm_up: usize,
        interval: usize,
    ) -> Box<dyn GibbsIterator> {
        debug!("Creating Gibbs iterator: warm-up {warm_up}, interval {interval}");
        Box::new(StandardGibbsIterator::new(sampler, warm_up, interval))
    }
}
