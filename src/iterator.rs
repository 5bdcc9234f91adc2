/*!
# Warm-up and Thinning over a Gibbs Sampler.

[`StandardGibbsIterator`] turns the raw sweeps of a [`GibbsSampler`] into the stream of samples a
caller actually keeps. It is an explicit pull-based generator: every [`GibbsIterator::advance`]
runs raw sweeps until the next retained one and returns it. The stream is infinite and never
restarts on its own.

Counting raw sweeps from zero, `advance`:
1. discards sweeps until `warm_up` of them have been drawn (paid once);
2. discards sweeps until the raw count is a multiple of `interval`;
3. draws one more sweep and emits it.

With `warm_up = 3, interval = 1` the first emitted sample is the 4th raw sweep. With
`warm_up = 0, interval = 5` the emitted samples are raw sweeps 0, 5, 10, 15, ...: the very first
sweep is emitted, so counting emitted samples from `k = 0`, the `k`-th one is raw sweep `5k`.
*/

use log::{debug, trace};

use crate::error::Result;
use crate::gibbs::{GibbsSampler, Sample};

/// Pull-based stream of retained Gibbs samples.
pub trait GibbsIterator: Send {
    /// Runs raw sweeps up to and including the next retained one and returns it.
    fn advance(&mut self) -> Result<Sample>;

    /// The most recently emitted sample.
    fn current(&self) -> Option<&Sample>;

    /// Raw sweeps drawn so far, discarded ones included.
    fn total_samples(&self) -> u64;

    /// Samples emitted so far.
    fn emitted(&self) -> u64;

    fn warm_up(&self) -> usize;

    fn interval(&self) -> usize;

    fn is_warmed_up(&self) -> bool {
        self.total_samples() >= self.warm_up() as u64
    }

    /// Resets the underlying sampler and the counters; warm-up is paid again.
    fn reset(&mut self);

    fn sampler(&self) -> &dyn GibbsSampler;

    fn sampler_mut(&mut self) -> &mut dyn GibbsSampler;
}

pub struct StandardGibbsIterator {
    sampler: Box<dyn GibbsSampler>,
    warm_up: usize,
    interval: usize,
    total: u64,
    emitted: u64,
    current: Option<Sample>,
}

impl StandardGibbsIterator {
    /// An `interval` of 0 means no thinning, the same as 1.
    pub fn new(sampler: Box<dyn GibbsSampler>, warm_up: usize, interval: usize) -> Self {
        Self {
            sampler,
            warm_up,
            interval: interval.max(1),
            total: 0,
            emitted: 0,
            current: None,
        }
    }

    fn discard(&mut self) -> Result<()> {
        self.sampler.sample()?;
        self.total += 1;
        Ok(())
    }
}

impl GibbsIterator for StandardGibbsIterator {
    fn advance(&mut self) -> Result<Sample> {
        if self.total < self.warm_up as u64 {
            debug!("Warming up: discarding {} sweeps", self.warm_up as u64 - self.total);
        }
        while self.total < self.warm_up as u64 {
            self.discard()?;
        }
        while self.total % self.interval as u64 != 0 {
            self.discard()?;
        }

        let sample = self.sampler.sample()?;
        trace!(
            "Emitting raw sweep {} from chain {}",
            self.total,
            sample.chain()
        );
        self.total += 1;
        self.emitted += 1;
        self.current = Some(sample.clone());
        Ok(sample)
    }

    fn current(&self) -> Option<&Sample> {
        self.current.as_ref()
    }

    fn total_samples(&self) -> u64 {
        self.total
    }

    fn emitted(&self) -> u64 {
        self.emitted
    }

    fn warm_up(&self) -> usize {
        self.warm_up
    }

    fn interval(&self) -> usize {
        self.interval
    }

    fn reset(&mut self) {
        self.sampler.reset();
        self.total = 0;
        self.emitted = 0;
        self.current = None;
    }

    fn sampler(&self) -> &dyn GibbsSampler {
        self.sampler.as_ref()
    }

    fn sampler_mut(&mut self) -> &mut dyn GibbsSampler {
        self.sampler.as_mut()
    }
}
