// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The integration loop.

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::controller::{ConstantStepSize, Proposal, StepSizeController};
use crate::dense::{DenseInterpolation, DenseSegment};
use crate::error::SolveError;
use crate::saveat::SaveAt;
use crate::solver::{Solver, StepResult};
use crate::state::State;

/// Default bound on the number of attempted steps.
pub const DEFAULT_MAX_STEPS: usize = 4096;

/// Whether the number of steps of a solve was known before it started.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StepCount
{
    /// Fixed by the bounds, the initial step and a non-adaptive controller.
    Static(usize),
    /// Depends on the solve itself, or on per instance inputs of a batch.
    Dynamic,
}

impl StepCount
{
    pub fn get(self) -> Option<usize>
    {
        match self {
            StepCount::Static(n) => Some(n),
            StepCount::Dynamic => None,
        }
    }
}

/// Statistics of a finished solve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats
{
    pub num_accepted_steps: usize,
    pub num_rejected_steps: usize,
    /// Accepted and rejected steps.
    pub num_steps: usize,
    pub compiled_num_steps: StepCount,
}

/// The result of a solve.
#[derive(Clone, Debug)]
pub struct Solution<Y>
{
    pub t0: f64,
    pub t1: f64,
    /// Times of the saved values, in the order described by [`SaveAt`].
    pub ts: Vec<f64>,
    pub ys: Vec<Y>,
    pub stats: Stats,
    /// Present if dense output was requested.
    pub interpolation: Option<DenseInterpolation<Y>>,
}

impl<Y> Solution<Y>
where Y: State
{
    /// Evaluate the dense interpolant at `t`.
    ///
    /// **Errors** if dense output was not saved or `t` is outside of the solve.
    pub fn evaluate(&self, t: f64) -> Result<Y, SolveError>
    {
        self.interpolation
            .as_ref()
            .ok_or(SolveError::NoDenseOutput)?
            .evaluate(t)
    }

    /// Evaluate the derivative of the dense interpolant at `t`.
    pub fn derivative(&self, t: f64) -> Result<Y, SolveError>
    {
        self.interpolation
            .as_ref()
            .ok_or(SolveError::NoDenseOutput)?
            .derivative(t)
    }
}

/// Per instance inputs of a batched solve. Unset fields fall back to the
/// values of the [`Solve`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchInput<Y>
{
    pub y0: Y,
    pub t0: Option<f64>,
    pub t1: Option<f64>,
    pub dt0: Option<f64>,
}

impl<Y> BatchInput<Y>
{
    pub fn new(y0: Y) -> Self
    {
        BatchInput {
            y0,
            t0: None,
            t1: None,
            dt0: None,
        }
    }

    pub fn t0(mut self, t0: f64) -> Self
    {
        self.t0 = Some(t0);
        self
    }

    pub fn t1(mut self, t1: f64) -> Self
    {
        self.t1 = Some(t1);
        self
    }

    pub fn dt0(mut self, dt0: f64) -> Self
    {
        self.dt0 = Some(dt0);
        self
    }

    /// Return `true` if the instance overrides the bounds or the initial step.
    fn is_dynamic(&self) -> bool
    {
        self.t0.is_some() || self.t1.is_some() || self.dt0.is_some()
    }
}

/// Configuration of a solve of `terms` from `(t0, y0)` to `t1`.
///
/// The controller defaults to [`ConstantStepSize`], which requires `dt0`.
///
/// ```
/// use ndarray::array;
/// use ndarray_diffeq::{OdeTerm, PidController, SaveAt, Solve, Tsit5};
///
/// let term = OdeTerm::new(|_t, y: &ndarray::Array1<f64>| -y);
/// let y0 = array![1., 2.];
/// let sol = Solve::new(&Tsit5, &term, 0., 1., &y0)
///     .controller(PidController::new(1e-8, 1e-8))
///     .saveat(SaveAt::default().dense(true))
///     .run()
///     .unwrap();
/// let y = sol.evaluate(0.5).unwrap();
/// assert!((y[1] - 2. * (-0.5f64).exp()).abs() < 1e-6);
/// ```
pub struct Solve<'a, S, T, Y, C = ConstantStepSize>
{
    solver: &'a S,
    terms: &'a T,
    t0: f64,
    t1: f64,
    y0: &'a Y,
    dt0: Option<f64>,
    controller: C,
    saveat: SaveAt,
    max_steps: Option<usize>,
}

impl<'a, S, T, Y> Solve<'a, S, T, Y>
{
    pub fn new(solver: &'a S, terms: &'a T, t0: impl Into<f64>, t1: impl Into<f64>, y0: &'a Y) -> Self
    {
        Solve {
            solver,
            terms,
            t0: t0.into(),
            t1: t1.into(),
            y0,
            dt0: None,
            controller: ConstantStepSize,
            saveat: SaveAt::default(),
            max_steps: Some(DEFAULT_MAX_STEPS),
        }
    }
}

impl<'a, S, T, Y, C> Solve<'a, S, T, Y, C>
{
    /// Set the initial step size; its sign must match `t1 - t0`.
    pub fn dt0(mut self, dt0: impl Into<f64>) -> Self
    {
        self.dt0 = Some(dt0.into());
        self
    }

    pub fn controller<C2>(self, controller: C2) -> Solve<'a, S, T, Y, C2>
    {
        Solve {
            solver: self.solver,
            terms: self.terms,
            t0: self.t0,
            t1: self.t1,
            y0: self.y0,
            dt0: self.dt0,
            controller,
            saveat: self.saveat,
            max_steps: self.max_steps,
        }
    }

    pub fn saveat(mut self, saveat: SaveAt) -> Self
    {
        self.saveat = saveat;
        self
    }

    /// Bound the number of attempted steps; `None` for no bound.
    pub fn max_steps(mut self, max_steps: Option<usize>) -> Self
    {
        self.max_steps = max_steps;
        self
    }
}

impl<'a, S, T, Y, C> Solve<'a, S, T, Y, C>
where
    S: Solver<T, Y>,
    Y: State,
    C: StepSizeController<Y>,
{
    /// Run the solve.
    ///
    /// **Errors** if the configuration is invalid, or if the solve fails.
    pub fn run(&self) -> Result<Solution<Y>, SolveError>
    {
        self.integrate(self.y0, self.t0, self.t1, self.dt0, true)
    }

    /// Run one independent solve per input.
    ///
    /// Instances overriding `t0`, `t1` or `dt0` report
    /// [`StepCount::Dynamic`].
    #[cfg(not(feature = "rayon"))]
    pub fn run_batch(&self, inputs: &[BatchInput<Y>]) -> Vec<Result<Solution<Y>, SolveError>>
    {
        inputs.iter().map(|input| self.run_instance(input)).collect()
    }

    /// Run one independent solve per input, in parallel.
    ///
    /// Instances overriding `t0`, `t1` or `dt0` report
    /// [`StepCount::Dynamic`].
    #[cfg(feature = "rayon")]
    pub fn run_batch(&self, inputs: &[BatchInput<Y>]) -> Vec<Result<Solution<Y>, SolveError>>
    where
        S: Sync,
        T: Sync,
        Y: Send + Sync,
        C: Sync,
    {
        inputs
            .par_iter()
            .map(|input| self.run_instance(input))
            .collect()
    }

    fn run_instance(&self, input: &BatchInput<Y>) -> Result<Solution<Y>, SolveError>
    {
        let t0 = input.t0.unwrap_or(self.t0);
        let t1 = input.t1.unwrap_or(self.t1);
        let dt0 = input.dt0.or(self.dt0);
        self.integrate(&input.y0, t0, t1, dt0, !input.is_dynamic())
    }

    fn validate(&self, y0: &Y, t0: f64, t1: f64, dt0: Option<f64>) -> Result<(), SolveError>
    {
        if !(t0.is_finite() && t1.is_finite()) || t0 == t1 {
            return Err(SolveError::EmptyInterval { t0, t1 });
        }
        if let Some(dt0) = dt0 {
            if !(dt0.is_finite() && dt0 * (t1 - t0) > 0.) {
                return Err(SolveError::DirectionMismatch { t0, t1, dt0 });
            }
        }
        if self.controller.is_adaptive() && !self.solver.is_adaptive() {
            return Err(SolveError::ControllerSolverMismatch);
        }
        self.controller.validate(t0, t1, dt0)?;
        self.solver.validate(self.terms, t0, y0)?;
        self.saveat.validate(t0, t1)
    }

    fn integrate(&self, y0: &Y, t0: f64, t1: f64, dt0: Option<f64>, static_bounds: bool)
        -> Result<Solution<Y>, SolveError>
    {
        self.validate(y0, t0, t1, dt0)?;
        let (solver, terms, controller) = (self.solver, self.terms, &self.controller);
        let direction = (t1 - t0).signum();
        let error_order = solver.error_order(terms);

        let mut solver_state = solver.init(terms, t0, t1, y0)?;
        let (mut t_next, mut controller_state) =
            controller.init(t0, t1, y0, dt0, error_order, |t, y| solver.func_for_init(terms, t, y))?;
        debug!(t0, t1, ?dt0, adaptive = controller.is_adaptive(), "starting solve");

        let mut recorder = Recorder::new(&self.saveat, t0, y0, direction);
        let mut t = t0;
        let mut y = y0.clone();
        let mut accepted = 0;
        let mut rejected = 0;
        while t != t1 {
            if let Some(max_steps) = self.max_steps {
                if accepted + rejected >= max_steps {
                    return Err(SolveError::MaxStepsExceeded(max_steps));
                }
            }
            let out = solver.step(terms, t, t_next, &y, &solver_state)?;
            if out.result == StepResult::ImplicitNonConvergence {
                trace!(t0 = t, t1 = t_next, "implicit solve did not converge");
            }
            let proposal = Proposal {
                t0: t,
                t1: t_next,
                y0: &y,
                y1: &out.y1,
                y_error: out.y_error.as_ref(),
                error_order,
                result: out.result,
            };
            let decision = controller.adapt(&proposal, &controller_state)?;
            if decision.accept {
                if !out.y1.is_finite() {
                    return Err(SolveError::NonFiniteState { t: t_next });
                }
                recorder.record_step((t, &y), (t_next, &out.y1), out.dense);
                t = t_next;
                y = out.y1;
                solver_state = out.state;
                accepted += 1;
            } else {
                trace!(t0 = t, t1 = t_next, scaled_error = ?decision.scaled_error, "step rejected");
                rejected += 1;
            }
            debug_assert_eq!(decision.next_t0, t);
            controller_state = decision.state;
            t_next = decision.next_t1;
        }
        debug!(accepted, rejected, "solve finished");

        let compiled_num_steps = match controller.static_num_steps(t0, t1, dt0) {
            Some(n) if static_bounds => StepCount::Static(n),
            _ => StepCount::Dynamic,
        };
        let (ts, ys, interpolation) = recorder.finish(t1, y);
        Ok(Solution {
            t0,
            t1,
            ts,
            ys,
            stats: Stats {
                num_accepted_steps: accepted,
                num_rejected_steps: rejected,
                num_steps: accepted + rejected,
                compiled_num_steps,
            },
            interpolation,
        })
    }
}

/// Collects the saved values of a solve as steps are accepted.
struct Recorder<'s, Y>
{
    saveat: &'s SaveAt,
    direction: f64,
    ts: Vec<f64>,
    ys: Vec<Y>,
    /// Index of the next unsaved time of `saveat.ts`.
    next_save: usize,
    dense: Option<DenseInterpolation<Y>>,
}

impl<'s, Y> Recorder<'s, Y>
where Y: State
{
    fn new(saveat: &'s SaveAt, t0: f64, y0: &Y, direction: f64) -> Self
    {
        let mut recorder = Recorder {
            saveat,
            direction,
            ts: Vec::new(),
            ys: Vec::new(),
            next_save: 0,
            dense: saveat.dense.then(|| DenseInterpolation::new(t0, direction)),
        };
        if saveat.t0 {
            recorder.ts.push(t0);
            recorder.ys.push(y0.clone());
        }
        recorder
    }

    fn record_step(&mut self, (t0, y0): (f64, &Y), (t1, y1): (f64, &Y), segment: DenseSegment<Y>)
    {
        if let Some(save_ts) = &self.saveat.ts {
            let d = self.direction;
            while let Some(&t) = save_ts.get(self.next_save) {
                if d * t > d * t1 {
                    break;
                }
                let y = if t == t0 {
                    y0.clone()
                } else if t == t1 {
                    y1.clone()
                } else {
                    segment.evaluate((t - t0) / (t1 - t0))
                };
                self.ts.push(t);
                self.ys.push(y);
                self.next_save += 1;
            }
        }
        if self.saveat.steps {
            self.ts.push(t1);
            self.ys.push(y1.clone());
        }
        if let Some(dense) = &mut self.dense {
            dense.push(t1, segment);
        }
    }

    fn finish(mut self, t1: f64, y1: Y) -> (Vec<f64>, Vec<Y>, Option<DenseInterpolation<Y>>)
    {
        if self.saveat.t1 {
            self.ts.push(t1);
            self.ys.push(y1);
        }
        (self.ts, self.ys, self.dense)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::controller::{PidController, StepTo};
    use crate::solver::{Dopri5, Euler, Heun, Kvaerno3, Tsit5};
    use crate::term::OdeTerm;
    use approx::assert_abs_diff_eq;

    fn decay() -> OdeTerm<impl Fn(f64, &f64) -> f64>
    {
        OdeTerm::new(|_t, y: &f64| -y)
    }

    #[test]
    fn linear_decay_with_euler()
    {
        let term = decay();
        let sol = Solve::new(&Euler, &term, 0, 2, &1.).dt0(1).run().unwrap();
        // two Euler steps of size one land on zero
        assert_eq!(sol.ts, vec![2.]);
        assert_eq!(sol.ys, vec![0.]);
        assert_eq!(sol.stats.num_accepted_steps, 2);
        assert_eq!(sol.stats.compiled_num_steps, StepCount::Static(2));
    }

    #[test]
    fn linear_decay_with_tsit5()
    {
        let term = decay();
        let sol = Solve::new(&Tsit5, &term, 0., 2., &1.).dt0(0.25).run().unwrap();
        assert_abs_diff_eq!(sol.ys[0], (-2f64).exp(), epsilon = 1e-5);
    }

    #[test]
    fn save_policies()
    {
        let term = decay();
        let sol = Solve::new(&Heun, &term, 0., 1., &1.)
            .dt0(0.25)
            .saveat(SaveAt::new().t0(true).steps(true).t1(true))
            .run()
            .unwrap();
        assert_eq!(sol.ts, vec![0., 0.25, 0.5, 0.75, 1., 1.]);
        assert_eq!(sol.ys.len(), 6);
        assert_eq!(sol.ys[0], 1.);
        assert_eq!(sol.ys[4], sol.ys[5]);
        assert_eq!(sol.evaluate(0.5), Err(SolveError::NoDenseOutput));

        let sol = Solve::new(&Heun, &term, 0., 1., &1.)
            .dt0(0.25)
            .saveat(SaveAt::new().ts(vec![0., 0.1, 0.5, 1.]))
            .run()
            .unwrap();
        assert_eq!(sol.ts, vec![0., 0.1, 0.5, 1.]);
        assert_eq!(sol.ys[0], 1.);
        assert!(sol.ys[1] < 1. && sol.ys[1] > sol.ys[2]);
    }

    #[test]
    fn ts_match_dense_output()
    {
        let term = decay();
        let ts = vec![0.05, 0.3, 0.3, 0.71, 1.];
        let run = |saveat| {
            Solve::new(&Dopri5, &term, 0., 1., &1.)
                .controller(PidController::new(1e-6, 1e-9))
                .saveat(saveat)
                .run()
                .unwrap()
        };
        let sparse = run(SaveAt::new().ts(ts.clone()));
        let dense = run(SaveAt::new().dense(true));
        for (t, y) in sparse.ts.iter().zip(&sparse.ys) {
            assert_abs_diff_eq!(*y, dense.evaluate(*t).unwrap(), epsilon = 1e-12);
            assert_abs_diff_eq!(*y, (-t).exp(), epsilon = 1e-5);
        }
        assert_eq!(sparse.ts, ts);
    }

    #[test]
    fn validation_errors()
    {
        let term = decay();
        assert_eq!(
            Solve::new(&Euler, &term, 1., 1., &1.).dt0(0.1).run().unwrap_err(),
            SolveError::EmptyInterval { t0: 1., t1: 1. }
        );
        assert!(matches!(
            Solve::new(&Euler, &term, 0., 1., &1.).dt0(-0.1).run(),
            Err(SolveError::DirectionMismatch { .. })
        ));
        assert_eq!(Solve::new(&Euler, &term, 0., 1., &1.).run().unwrap_err(), SolveError::MissingInitialStep);
        assert_eq!(
            Solve::new(&Euler, &term, 0., 1., &1.)
                .controller(PidController::default())
                .run()
                .unwrap_err(),
            SolveError::ControllerSolverMismatch
        );
        assert_eq!(
            Solve::new(&Euler, &term, 0., 1., &1.)
                .dt0(0.5)
                .controller(StepTo::new(vec![0., 1.]))
                .run()
                .unwrap_err(),
            SolveError::UnexpectedInitialStep
        );
        assert!(matches!(
            Solve::new(&Euler, &term, 0., 1., &1.)
                .dt0(0.5)
                .saveat(SaveAt::new().steps(true).ts(vec![0.5]))
                .run(),
            Err(SolveError::InvalidSaveAt(_))
        ));
    }

    #[test]
    fn max_steps()
    {
        let term = decay();
        let err = Solve::new(&Euler, &term, 0., 1., &1.)
            .dt0(0.01)
            .max_steps(Some(50))
            .run()
            .unwrap_err();
        assert_eq!(err, SolveError::MaxStepsExceeded(50));
        let sol = Solve::new(&Euler, &term, 0., 1., &1.)
            .dt0(1e-4)
            .max_steps(None)
            .run()
            .unwrap();
        assert_eq!(sol.stats.num_steps, 10000);
    }

    #[test]
    fn non_finite_state()
    {
        let term = OdeTerm::new(|_t, y: &f64| y * y);
        let err = Solve::new(&Euler, &term, 0., 10., &1e200)
            .dt0(1.)
            .run()
            .unwrap_err();
        assert!(matches!(err, SolveError::NonFiniteState { .. }));
    }

    #[test]
    fn stiff_problem_with_implicit_solver()
    {
        let term = OdeTerm::new(|t: f64, y: &f64| -1000. * (y - t.cos()));
        let sol = Solve::new(&Kvaerno3::new(), &term, 0., 1., &0.)
            .controller(PidController::new(1e-5, 1e-7))
            .run()
            .unwrap();
        assert_abs_diff_eq!(sol.ys[0], 1f64.cos(), epsilon = 2e-3);
        assert!(sol.stats.num_steps < 500, "{:?}", sol.stats);
        assert_eq!(sol.stats.compiled_num_steps, StepCount::Dynamic);
    }

    #[test]
    fn batch()
    {
        let term = decay();
        let solve = Solve::new(&Euler, &term, 0., 1., &1.).dt0(0.1);
        let inputs = vec![BatchInput::new(1.), BatchInput::new(2.), BatchInput::new(1.).t1(2.)];
        let out = solve.run_batch(&inputs);
        assert_eq!(out.len(), 3);
        let a = out[0].as_ref().unwrap();
        let b = out[1].as_ref().unwrap();
        let c = out[2].as_ref().unwrap();
        assert_abs_diff_eq!(2. * a.ys[0], b.ys[0], epsilon = 1e-15);
        assert_eq!(a.stats.compiled_num_steps, StepCount::Static(10));
        assert_eq!(c.stats.compiled_num_steps, StepCount::Dynamic);
        assert_eq!(c.stats.num_accepted_steps, 20);
    }
}
