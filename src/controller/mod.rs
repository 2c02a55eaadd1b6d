// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step size controllers.
//!
//! After every attempted step the controller decides whether to keep it and
//! where the next step ends. Times are handled in the caller's direction of
//! integration: for `t1 < t0` every proposed step has negative length.

mod constant;
mod pid;
mod step_to;

pub use self::constant::{ConstantState, ConstantStepSize};
pub use self::pid::{Norm, PidController, PidState};
pub use self::step_to::StepTo;

use crate::error::SolveError;
use crate::solver::StepResult;
use crate::state::State;

/// An attempted step, as seen by a controller.
#[derive(Clone, Debug)]
pub struct Proposal<'a, Y>
{
    pub t0: f64,
    pub t1: f64,
    pub y0: &'a Y,
    pub y1: &'a Y,
    pub y_error: Option<&'a Y>,
    /// Order of the error estimate.
    pub error_order: f64,
    pub result: StepResult,
}

/// What to do after an attempted step.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision<S>
{
    pub accept: bool,
    /// Start of the next step: `t1` of the proposal if accepted, its `t0` otherwise.
    pub next_t0: f64,
    pub next_t1: f64,
    /// Scaled error norm of the proposal, if the controller computed one.
    pub scaled_error: Option<f64>,
    pub state: S,
}

/// Chooses step sizes and accepts or rejects steps.
pub trait StepSizeController<Y: State>
{
    /// Controller memory carried across steps.
    type State: Clone;

    /// Return `true` if the controller needs an error estimate from the solver.
    fn is_adaptive(&self) -> bool;

    /// Check the controller against the interval and the initial step.
    fn validate(&self, t0: f64, t1: f64, dt0: Option<f64>) -> Result<(), SolveError>;

    /// The number of steps the solve will take, when it is known before
    /// stepping.
    fn static_num_steps(&self, t0: f64, t1: f64, dt0: Option<f64>) -> Option<usize>;

    /// The end of the first step and the initial controller state.
    ///
    /// `func` evaluates `dy/dt`; adaptive controllers use it to choose an
    /// initial step when `dt0` is `None`.
    fn init<F>(&self, t0: f64, t1: f64, y0: &Y, dt0: Option<f64>, error_order: f64, func: F)
        -> Result<(f64, Self::State), SolveError>
    where F: Fn(f64, &Y) -> Result<Y, SolveError>;

    fn adapt(&self, proposal: &Proposal<'_, Y>, state: &Self::State) -> Result<Decision<Self::State>, SolveError>;
}

/// Fraction of the interval below which a step is stretched to end exactly at `t_end`.
const END_TOLERANCE: f64 = 1e-10;

/// Snap `t` to `t_end` if it lies within tolerance of it or beyond it.
pub(crate) fn clip_to_end(t: f64, t_end: f64, span: f64, direction: f64) -> f64
{
    if direction * (t_end - t) <= END_TOLERANCE * span {
        t_end
    } else {
        t
    }
}

/// Number of steps of length `|dt0|` to cover `[t0, t1]`, as taken by the loop.
pub(crate) fn fixed_step_count(t0: f64, t1: f64, dt0: f64) -> usize
{
    let ratio = (t1 - t0).abs() / dt0.abs();
    ((ratio * (1. - END_TOLERANCE)).ceil() as usize).max(1)
}
