//! CUSUM event-bar construction.
//!
//! A left-to-right fold over the observations carrying
//! `(CusumFilter, BarAccumulator)`. When the filter fires the live bar is
//! sealed, a new one is seeded at the triggering close, and the filter is
//! reset. A trailing bar is kept only if it advanced past its seed.

use crate::domain::bar::{BarAccumulator, EventBar};
use crate::domain::cusum::{CusumConfig, CusumFilter};
use crate::domain::error::CusumError;
use crate::domain::observation::Observation;

#[derive(Debug)]
struct BuildState {
    filter: CusumFilter,
    current: BarAccumulator,
    sealed: Vec<EventBar>,
}

impl BuildState {
    fn seed(first: &Observation) -> Self {
        Self {
            filter: CusumFilter::new(),
            current: BarAccumulator::from_observation(first, 0),
            sealed: Vec::new(),
        }
    }

    fn step(
        mut self,
        prev: &Observation,
        obs: &Observation,
        index: usize,
        config: &CusumConfig,
    ) -> Result<Self, CusumError> {
        let ret = config.step_return(prev, obs, index)?;
        let fired = self.filter.update(ret, config.threshold);
        self.current.extend(obs, index);

        if fired {
            let next = BarAccumulator::from_price(obs.close, index);
            let done = std::mem::replace(&mut self.current, next);
            self.sealed.push(done.seal());
            self.filter.reset();
        }
        Ok(self)
    }

    fn finish(mut self) -> Vec<EventBar> {
        if self.current.has_advanced() {
            self.sealed.push(self.current.seal());
        }
        self.sealed
    }
}

/// Build event bars from an ordered observation series.
///
/// An empty or single-observation series yields no bars.
pub fn build_bars(
    observations: &[Observation],
    config: &CusumConfig,
) -> Result<Vec<EventBar>, CusumError> {
    build_bars_with_progress(observations, config, |_| {})
}

/// Same as [`build_bars`], calling `progress` with each processed index.
pub fn build_bars_with_progress<F>(
    observations: &[Observation],
    config: &CusumConfig,
    mut progress: F,
) -> Result<Vec<EventBar>, CusumError>
where
    F: FnMut(usize),
{
    let Some(first) = observations.first() else {
        return Ok(Vec::new());
    };

    let state = observations
        .windows(2)
        .enumerate()
        .try_fold(BuildState::seed(first), |state, (k, pair)| {
            let index = k + 1;
            progress(index);
            state.step(&pair[0], &pair[1], index, config)
        })?;

    Ok(state.finish())
}
