/*!
# Core Chain Utilities.

This module provides the chain-level building blocks the Gibbs engine is assembled from:
- The [`MarkovChain<S>`] trait, which abstracts a single chain whose state is a slice of `S`.
- [`run_chain`], which advances one chain repeatedly and collects its states.
- The [`HasChains<S>`] trait for types that own multiple Markov chains.
- The [`ChainRunner<S>`] trait that extends [`HasChains<S>`] with a Rayon-parallel sweep of every
  chain.

Any type implementing [`HasChains<S>`] automatically implements [`ChainRunner<S>`] via a blanket
implementation.
*/

use ndarray::Array2;
use num_traits::Zero;
use rayon::prelude::*;

use crate::error::Result;

/// A single MCMC chain.
pub trait MarkovChain<S> {
    /// Performs one iteration of the chain and returns the new state. On error the state may be
    /// partially updated.
    fn step(&mut self) -> Result<&[S]>;

    /// Returns the current state without advancing the chain.
    fn current_state(&self) -> &[S];
}

/// Runs a single chain for `n_steps` iterations and collects every state into an
/// `[n_steps, dim]` array.
pub fn run_chain<S, M>(chain: &mut M, n_steps: usize) -> Result<Array2<S>>
where
    M: MarkovChain<S>,
    S: Clone + Zero,
{
    let dim = chain.current_state().len();
    let mut out = Array2::<S>::zeros((n_steps, dim));

    for i in 0..n_steps {
        let state = chain.step()?;
        out.row_mut(i)
            .iter_mut()
            .zip(state)
            .for_each(|(o, s)| *o = s.clone());
    }

    Ok(out)
}

/// A trait for "anything that owns multiple MarkovChains".
pub trait HasChains<S> {
    type Chain: MarkovChain<S> + Send;

    /// Returns a mutable reference to the vector of chains.
    fn chains_mut(&mut self) -> &mut Vec<Self::Chain>;
}

pub trait ChainRunner<S>: HasChains<S>
where
    S: Clone + Send,
{
    /// Advances every chain by one step in parallel and returns the new states in chain order.
    /// Each chain only ever touches its own state, so the outcome does not depend on scheduling.
    fn step_all(&mut self) -> Result<Vec<Vec<S>>> {
        self.chains_mut()
            .par_iter_mut()
            .map(|chain| chain.step().map(<[S]>::to_vec))
            .collect()
    }
}

impl<S: Clone + Send, T: HasChains<S>> ChainRunner<S> for T {}
