/*!
# Gibbs Sampling over Conditional Models.

A dependency network represents a joint distribution only through one [`ConditionalModel`] per
variable. [`StandardGibbsSampler`] draws approximate joint samples from it by repeated
single-site resampling. The module defines:

- [`Sample`]: an immutable snapshot of one chain's joint assignment.
- [`GibbsChain`]: a single chain; one [`MarkovChain::step`] is one full sequential sweep.
- [`GibbsSampler`]: the sampler capability, implemented by [`StandardGibbsSampler`], which keeps
  `C` independent chains and sweeps them round-robin, one chain per [`GibbsSampler::sample`] call.

Every chain owns a [`SmallRng`] seeded with `seed + chain_index`, so a seeded sampler is fully
reproducible, including under [`GibbsSampler::sample_parallel`].

## Sweep order

Variables are swept in the order the models were supplied (for a
[`crate::network::DependencyNetwork`], the network's variable order). Evidence variables keep
their value and are skipped. The order can be replaced with [`GibbsSampler::set_sample_order`].
*/

use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::{validate_init_range, DEFAULT_INIT_RANGE};
use crate::core::{ChainRunner, HasChains, MarkovChain};
use crate::error::{Error, Result};
use crate::model::ConditionalModel;
use crate::variable::{VarId, VariableSpecification};

/// Variable layout shared by a sampler and all the samples it emits.
#[derive(Debug, PartialEq)]
struct Layout {
    vars: Vec<VarId>,
    index: HashMap<VarId, usize>,
}

impl Layout {
    fn new(vars: Vec<VarId>) -> Self {
        let index = vars.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        Self { vars, index }
    }
}

/// A joint assignment of every sampled variable, taken from one chain.
///
/// Samples are snapshots: later sweeps never change a sample already handed out.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    chain: usize,
    layout: Arc<Layout>,
    values: Vec<f64>,
}

impl Sample {
    /// Index of the chain this sample was taken from.
    pub fn chain(&self) -> usize {
        self.chain
    }

    /// Value assigned to `var`, or `None` if the sampler does not model it.
    pub fn get(&self, var: VarId) -> Option<f64> {
        self.layout.index.get(&var).map(|&i| self.values[i])
    }

    pub fn variables(&self) -> &[VarId] {
        &self.layout.vars
    }

    /// Values in the order of [`Self::variables`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.layout.vars.iter().copied().zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a sweep needs that never changes after construction.
struct SweepPlan {
    models: Vec<Arc<dyn ConditionalModel>>,
    /// Positions of each model's independent variables, in the model's order.
    blankets: Vec<Vec<usize>>,
}

/// Construction options of a [`StandardGibbsSampler`].
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerOptions {
    /// Global seed; chain `i` uses `seed + i`. Random when `None`.
    pub seed: Option<u64>,
    /// Initialization range for continuous variables without a finite range.
    pub init_range: (f64, f64),
    /// Starting assignments per chain index, used as-is; missing variables start at 0.
    pub initial_samples: HashMap<usize, HashMap<VarId, f64>>,
    /// Variables clamped to a fixed value in every chain and never resampled.
    pub evidence: HashMap<VarId, f64>,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            seed: None,
            init_range: DEFAULT_INIT_RANGE,
            initial_samples: HashMap::new(),
            evidence: HashMap::new(),
        }
    }
}

impl SamplerOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_init_range(mut self, low: f64, high: f64) -> Self {
        self.init_range = (low, high);
        self
    }

    pub fn with_initial_sample(mut self, chain: usize, values: HashMap<VarId, f64>) -> Self {
        self.initial_samples.insert(chain, values);
        self
    }

    pub fn with_evidence(mut self, var: VarId, value: f64) -> Self {
        self.evidence.insert(var, value);
        self
    }
}

/// A single Gibbs chain over a shared set of conditional models.
pub struct GibbsChain {
    plan: Arc<SweepPlan>,
    /// Positions to resample, in sweep order.
    order: Arc<[usize]>,
    current_state: Vec<f64>,
    /// The chain-specific random seed.
    pub seed: u64,
    rng: SmallRng,
    blanket_values: Vec<f64>,
}

impl MarkovChain<f64> for GibbsChain {
    /// One sequential sweep: each variable is resampled from its model given the chain's
    /// current values, including the ones updated earlier in the same sweep.
    fn step(&mut self) -> Result<&[f64]> {
        for &pos in self.order.iter() {
            let blanket = &self.plan.blankets[pos];
            self.blanket_values.clear();
            self.blanket_values
                .extend(blanket.iter().map(|&p| self.current_state[p]));
            let value = self.plan.models[pos].predict(&self.blanket_values, &mut self.rng)?;
            self.current_state[pos] = value;
        }
        Ok(&self.current_state)
    }

    fn current_state(&self) -> &[f64] {
        &self.current_state
    }
}

/// Multi-chain Gibbs sampling capability.
pub trait GibbsSampler: Send {
    /// Variables carried by every sample, in layout order.
    fn variables(&self) -> &[VarId];

    /// Variables in the order they are visited during a sweep.
    fn sample_order(&self) -> &[VarId];

    /// Replaces the sweep order; `order` must be a permutation of [`Self::variables`].
    fn set_sample_order(&mut self, order: Vec<VarId>) -> Result<()>;

    fn num_chains(&self) -> usize;

    /// Chain the next [`Self::sample`] call will sweep.
    fn current_chain(&self) -> usize;

    /// Current assignment of `chain` without advancing it.
    fn chain_state(&self, chain: usize) -> Option<Sample>;

    /// Performs one full sweep of the chain under the round-robin cursor, then moves the cursor
    /// to the next chain. Successive calls visit chains `0, 1, .., C - 1, 0, ..`.
    ///
    /// A failing model aborts the sweep: the chain keeps its partially updated assignment, the
    /// cursor stays put and the error is returned unchanged. Reinitialize the chain with
    /// [`Self::reset_chain`] before relying on it again.
    fn sample(&mut self) -> Result<Sample>;

    /// Opt-in parallel variant: sweeps every chain once, concurrently, and returns the samples
    /// in chain order. The round-robin cursor is not moved.
    fn sample_parallel(&mut self) -> Result<Vec<Sample>>;

    /// Randomly reinitializes every chain and moves the cursor back to chain 0.
    fn reset(&mut self);

    /// Randomly reinitializes one chain.
    fn reset_chain(&mut self, chain: usize) -> Result<()>;
}

/// Round-robin multi-chain Gibbs sampler.
pub struct StandardGibbsSampler {
    layout: Arc<Layout>,
    specs: Vec<VariableSpecification>,
    plan: Arc<SweepPlan>,
    order: Vec<VarId>,
    chains: Vec<GibbsChain>,
    cursor: usize,
    init_range: (f64, f64),
    evidence: HashMap<usize, f64>,
    /// The global seed.
    pub seed: u64,
}

impl StandardGibbsSampler {
    /// Creates a sampler with `num_chains` chains over `models`, one model per variable.
    ///
    /// The Markov blanket of each variable is its model's independent-variable list, resolved
    /// once here.
    pub fn new(
        models: &[Arc<dyn ConditionalModel>],
        num_chains: usize,
        options: SamplerOptions,
    ) -> Result<Self> {
        if num_chains == 0 {
            return Err(Error::config("a Gibbs sampler needs at least one chain"));
        }
        if models.is_empty() {
            return Err(Error::config("a Gibbs sampler needs at least one model"));
        }
        validate_init_range(options.init_range)?;

        let vars: Vec<VarId> = models.iter().map(|m| m.dependent_var()).collect();
        let layout = Arc::new(Layout::new(vars));
        if layout.index.len() != layout.vars.len() {
            return Err(Error::config("more than one model for the same variable"));
        }

        let blankets = models
            .iter()
            .map(|model| {
                model
                    .independent_vars()
                    .iter()
                    .map(|v| {
                        layout.index.get(v).copied().ok_or_else(|| {
                            Error::config(format!(
                                "model for `{}` conditions on {v}, which has no model",
                                model.dependent_spec().name()
                            ))
                        })
                    })
                    .collect::<Result<Vec<usize>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let evidence = options
            .evidence
            .iter()
            .map(|(v, &value)| {
                layout
                    .index
                    .get(v)
                    .map(|&pos| (pos, value))
                    .ok_or_else(|| Error::config(format!("evidence on unknown variable {v}")))
            })
            .collect::<Result<HashMap<usize, f64>>>()?;

        let specs = models.iter().map(|m| m.dependent_spec().clone()).collect();
        let plan = Arc::new(SweepPlan {
            models: models.to_vec(),
            blankets,
        });

        let seed = options.seed.unwrap_or_else(|| thread_rng().gen::<u64>());
        let order = layout.vars.clone();
        let mut sampler = Self {
            layout,
            specs,
            plan,
            order,
            chains: Vec::with_capacity(num_chains),
            cursor: 0,
            init_range: options.init_range,
            evidence,
            seed,
        };
        let sweep = sampler.sweep_positions();
        for i in 0..num_chains {
            let chain_seed = seed.wrapping_add(i as u64);
            let mut chain = GibbsChain {
                plan: Arc::clone(&sampler.plan),
                order: Arc::clone(&sweep),
                current_state: Vec::new(),
                seed: chain_seed,
                rng: SmallRng::seed_from_u64(chain_seed),
                blanket_values: Vec::new(),
            };
            chain.current_state = match options.initial_samples.get(&i) {
                Some(assignment) => sampler.seeded_state(assignment),
                None => sampler.random_state(&mut chain.rng),
            };
            sampler.chains.push(chain);
        }

        debug!(
            "Created Gibbs sampler: {} variables, {} chains, {} evidence, seed {}",
            sampler.layout.vars.len(),
            num_chains,
            sampler.evidence.len(),
            seed
        );
        Ok(sampler)
    }

    /// Positions to resample, in sweep order, evidence excluded.
    fn sweep_positions(&self) -> Arc<[usize]> {
        self.order
            .iter()
            .map(|v| self.layout.index[v])
            .filter(|pos| !self.evidence.contains_key(pos))
            .collect()
    }

    fn seeded_state(&self, assignment: &HashMap<VarId, f64>) -> Vec<f64> {
        let mut state: Vec<f64> = self
            .layout
            .vars
            .iter()
            .map(|v| assignment.get(v).copied().unwrap_or(0.0))
            .collect();
        self.apply_evidence(&mut state);
        state
    }

    fn random_state(&self, rng: &mut SmallRng) -> Vec<f64> {
        let mut state: Vec<f64> = self
            .specs
            .iter()
            .map(|spec| initial_value(spec, self.init_range, rng))
            .collect();
        self.apply_evidence(&mut state);
        state
    }

    fn apply_evidence(&self, state: &mut [f64]) {
        for (&pos, &value) in &self.evidence {
            state[pos] = value;
        }
    }

    fn snapshot(&self, chain: usize, values: Vec<f64>) -> Sample {
        Sample {
            chain,
            layout: Arc::clone(&self.layout),
            values,
        }
    }
}

/// Uniform draw over the variable's admissible values.
///
/// Discrete variables draw a level code. Continuous variables draw from their range when both
/// bounds are finite, from an `init_range`-wide window next to a single finite bound, and from
/// `init_range` itself when unbounded.
fn initial_value(spec: &VariableSpecification, init_range: (f64, f64), rng: &mut SmallRng) -> f64 {
    if spec.is_discrete() {
        return match spec.num_levels() {
            0 => 0.0,
            n => rng.gen_range(0..n) as f64,
        };
    }
    let (low, high) = init_range;
    let width = high - low;
    let (min, max) = spec.range();
    let (from, to) = match (min.is_finite(), max.is_finite()) {
        (true, true) => (min, max),
        (true, false) => (min, (min + width).min(f64::MAX)),
        (false, true) => ((max - width).max(f64::MIN), max),
        (false, false) => (low, high),
    };
    if !(from < to) {
        return from;
    }
    if (to - from).is_finite() {
        Uniform::new(from, to).sample(rng)
    } else {
        // The span overflows; interpolate between the bounds instead.
        let t: f64 = rng.gen();
        from * (1.0 - t) + to * t
    }
}

impl GibbsSampler for StandardGibbsSampler {
    fn variables(&self) -> &[VarId] {
        &self.layout.vars
    }

    fn sample_order(&self) -> &[VarId] {
        &self.order
    }

    fn set_sample_order(&mut self, order: Vec<VarId>) -> Result<()> {
        let distinct: HashSet<VarId> = order.iter().copied().collect();
        let is_permutation = order.len() == self.layout.vars.len()
            && distinct.len() == order.len()
            && distinct.iter().all(|v| self.layout.index.contains_key(v));
        if !is_permutation {
            return Err(Error::config(
                "sample order must list every sampled variable exactly once",
            ));
        }
        self.order = order;
        let sweep = self.sweep_positions();
        for chain in &mut self.chains {
            chain.order = Arc::clone(&sweep);
        }
        Ok(())
    }

    fn num_chains(&self) -> usize {
        self.chains.len()
    }

    fn current_chain(&self) -> usize {
        self.cursor
    }

    fn chain_state(&self, chain: usize) -> Option<Sample> {
        self.chains
            .get(chain)
            .map(|c| self.snapshot(chain, c.current_state.clone()))
    }

    fn sample(&mut self) -> Result<Sample> {
        let chain = self.cursor;
        let values = self.chains[chain].step()?.to_vec();
        trace!("Swept chain {chain}");
        self.cursor = (self.cursor + 1) % self.chains.len();
        Ok(self.snapshot(chain, values))
    }

    fn sample_parallel(&mut self) -> Result<Vec<Sample>> {
        let states = self.step_all()?;
        trace!("Swept {} chains in parallel", states.len());
        Ok(states
            .into_iter()
            .enumerate()
            .map(|(chain, values)| self.snapshot(chain, values))
            .collect())
    }

    fn reset(&mut self) {
        for i in 0..self.chains.len() {
            let mut rng = self.chains[i].rng.clone();
            self.chains[i].current_state = self.random_state(&mut rng);
            self.chains[i].rng = rng;
        }
        self.cursor = 0;
        debug!("Reinitialized {} chains", self.chains.len());
    }

    fn reset_chain(&mut self, chain: usize) -> Result<()> {
        if chain >= self.chains.len() {
            return Err(Error::config(format!(
                "chain {chain} out of range for {} chains",
                self.chains.len()
            )));
        }
        let mut rng = self.chains[chain].rng.clone();
        self.chains[chain].current_state = self.random_state(&mut rng);
        self.chains[chain].rng = rng;
        Ok(())
    }
}

impl HasChains<f64> for StandardGibbsSampler {
    type Chain = GibbsChain;

    fn chains_mut(&mut self) -> &mut Vec<Self::Chain> {
        &mut self.chains
    }
}
