// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Decision, Proposal, StepSizeController};
use crate::error::SolveError;
use crate::solver::StepResult;
use crate::state::State;

/// Steps between the times of a prescribed grid. Every step is accepted.
///
/// The grid must start at `t0`, end at `t1` and be strictly monotonic in
/// the direction of integration. No `dt0` may be given.
///
/// ```
/// use ndarray_diffeq::{Euler, OdeTerm, Solve, StepCount, StepTo};
///
/// let term = OdeTerm::new(|_t, y: &f64| -y);
/// let sol = Solve::new(&Euler, &term, 0., 1., &1.)
///     .controller(StepTo::new(vec![0., 0.3, 0.5, 1.]))
///     .run()
///     .unwrap();
/// assert_eq!(sol.stats.num_accepted_steps, 3);
/// assert_eq!(sol.stats.compiled_num_steps, StepCount::Static(3));
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepTo
{
    ts: Vec<f64>,
}

impl StepTo
{
    pub fn new<V>(ts: V) -> Self
    where V: Into<Vec<f64>>
    {
        StepTo { ts: ts.into() }
    }

    pub fn ts(&self) -> &[f64]
    {
        &self.ts
    }
}

impl<Y> StepSizeController<Y> for StepTo
where Y: State
{
    /// Index of the end of the current step in the grid.
    type State = usize;

    fn is_adaptive(&self) -> bool
    {
        false
    }

    fn validate(&self, t0: f64, t1: f64, dt0: Option<f64>) -> Result<(), SolveError>
    {
        if dt0.is_some() {
            return Err(SolveError::UnexpectedInitialStep);
        }
        let ts = &self.ts;
        if ts.len() < 2 {
            return Err(SolveError::InvalidGrid("at least two times are required".to_string()));
        }
        if ts[0] != t0 || ts[ts.len() - 1] != t1 {
            return Err(SolveError::InvalidGrid(format!(
                "grid runs from {} to {}, but the solve runs from {} to {}",
                ts[0],
                ts[ts.len() - 1],
                t0,
                t1
            )));
        }
        let direction = (t1 - t0).signum();
        if !ts.windows(2).all(|w| direction * (w[1] - w[0]) > 0.) {
            return Err(SolveError::InvalidGrid(
                "times must be strictly monotonic in the direction of integration".to_string(),
            ));
        }
        Ok(())
    }

    fn static_num_steps(&self, _t0: f64, _t1: f64, _dt0: Option<f64>) -> Option<usize>
    {
        Some(self.ts.len().saturating_sub(1))
    }

    fn init<F>(&self, t0: f64, t1: f64, _y0: &Y, dt0: Option<f64>, _error_order: f64, _func: F)
        -> Result<(f64, usize), SolveError>
    where F: Fn(f64, &Y) -> Result<Y, SolveError>
    {
        StepSizeController::<Y>::validate(self, t0, t1, dt0)?;
        Ok((self.ts[1], 1))
    }

    fn adapt(&self, proposal: &Proposal<'_, Y>, &index: &usize) -> Result<Decision<usize>, SolveError>
    {
        if proposal.result == StepResult::ImplicitNonConvergence {
            return Err(SolveError::ImplicitNonConvergence);
        }
        let next = (index + 1).min(self.ts.len() - 1);
        Ok(Decision {
            accept: true,
            next_t0: proposal.t1,
            next_t1: self.ts[next],
            scaled_error: None,
            state: next,
        })
    }
}
