// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{clip_to_end, fixed_step_count, Decision, Proposal, StepSizeController};
use crate::error::SolveError;
use crate::solver::StepResult;
use crate::state::State;

/// Steps of constant size `dt0`. Every step is accepted.
///
/// Step `n` ends at `t0 + n dt0`, so rounding does not accumulate over the
/// solve; the last step is shortened to end exactly at `t1`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstantStepSize;

/// Position on the grid `t0 + n dt0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConstantState
{
    t_start: f64,
    t_end: f64,
    dt0: f64,
    n: u64,
}

impl ConstantState
{
    fn grid_point(&self, n: u64) -> f64
    {
        let span = (self.t_end - self.t_start).abs();
        let direction = (self.t_end - self.t_start).signum();
        clip_to_end(self.t_start + n as f64 * self.dt0, self.t_end, span, direction)
    }
}

impl<Y> StepSizeController<Y> for ConstantStepSize
where Y: State
{
    type State = ConstantState;

    fn is_adaptive(&self) -> bool
    {
        false
    }

    fn validate(&self, _t0: f64, _t1: f64, dt0: Option<f64>) -> Result<(), SolveError>
    {
        match dt0 {
            Some(_) => Ok(()),
            None => Err(SolveError::MissingInitialStep),
        }
    }

    fn static_num_steps(&self, t0: f64, t1: f64, dt0: Option<f64>) -> Option<usize>
    {
        dt0.map(|dt0| fixed_step_count(t0, t1, dt0))
    }

    fn init<F>(&self, t0: f64, t1: f64, _y0: &Y, dt0: Option<f64>, _error_order: f64, _func: F)
        -> Result<(f64, ConstantState), SolveError>
    where F: Fn(f64, &Y) -> Result<Y, SolveError>
    {
        let dt0 = dt0.ok_or(SolveError::MissingInitialStep)?;
        let state = ConstantState {
            t_start: t0,
            t_end: t1,
            dt0,
            n: 1,
        };
        Ok((state.grid_point(1), state))
    }

    fn adapt(&self, proposal: &Proposal<'_, Y>, state: &ConstantState) -> Result<Decision<ConstantState>, SolveError>
    {
        if proposal.result == StepResult::ImplicitNonConvergence {
            return Err(SolveError::ImplicitNonConvergence);
        }
        let n = state.n + 1;
        Ok(Decision {
            accept: true,
            next_t0: proposal.t1,
            next_t1: state.grid_point(n),
            scaled_error: None,
            state: ConstantState { n, ..*state },
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn proposal<'a>(t0: f64, t1: f64, y: &'a f64, result: StepResult) -> Proposal<'a, f64>
    {
        Proposal {
            t0,
            t1,
            y0: y,
            y1: y,
            y_error: None,
            error_order: 1.,
            result,
        }
    }

    #[test]
    fn walks_the_grid()
    {
        let c = ConstantStepSize;
        let y = 0.;
        let (mut t1, mut state) = c.init(0., 1., &y, Some(0.3), 1., |_, y| Ok(*y)).unwrap();
        let mut t0 = 0.;
        let mut ends = vec![];
        while t0 != 1. {
            ends.push(t1);
            let d = c.adapt(&proposal(t0, t1, &y, StepResult::Successful), &state).unwrap();
            assert!(d.accept);
            t0 = d.next_t0;
            t1 = d.next_t1;
            state = d.state;
        }
        assert_eq!(ends, vec![0.3, 0.6, 0.8999999999999999, 1.]);
    }

    #[test]
    fn backwards_grid_mirrors_forwards()
    {
        let c = ConstantStepSize;
        let y = 0.;
        let (f, fs) = c.init(0., 1., &y, Some(0.1), 1., |_, y| Ok(*y)).unwrap();
        let (b, bs) = c.init(0., -1., &y, Some(-0.1), 1., |_, y| Ok(*y)).unwrap();
        assert_eq!(f, -b);
        let df = c.adapt(&proposal(0., f, &y, StepResult::Successful), &fs).unwrap();
        let db = c.adapt(&proposal(0., b, &y, StepResult::Successful), &bs).unwrap();
        assert_eq!(df.next_t1, -db.next_t1);
    }

    #[test]
    fn requires_dt0_and_fails_on_nonconvergence()
    {
        let c = ConstantStepSize;
        assert_eq!(
            StepSizeController::<f64>::validate(&c, 0., 1., None),
            Err(SolveError::MissingInitialStep)
        );
        let y = 0.;
        let (_, state) = c.init(0., 1., &y, Some(0.5), 1., |_, y| Ok(*y)).unwrap();
        let err = c
            .adapt(&proposal(0., 0.5, &y, StepResult::ImplicitNonConvergence), &state)
            .unwrap_err();
        assert_eq!(err, SolveError::ImplicitNonConvergence);
    }
}
