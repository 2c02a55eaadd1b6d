// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{clip_to_end, Decision, Proposal, StepSizeController};
use crate::error::SolveError;
use crate::solver::StepResult;
use crate::state::{max_norm, rms_norm, State};

/// Norm used to reduce the scaled error of a step to a number.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Norm
{
    /// Root mean square over all leaves.
    #[default]
    Rms,
    /// Largest absolute value over all leaves.
    Max,
}

impl Norm
{
    pub fn apply<Y: State>(self, y: &Y) -> f64
    {
        match self {
            Norm::Rms => rms_norm(y),
            Norm::Max => max_norm(y),
        }
    }
}

/// Adaptive step size control by PID feedback on the local error.
///
/// A step is accepted when the scaled error
///
/// ```text
/// e = ‖ y_error / (atol + rtol max(|y0|, |y1|)) ‖
/// ```
///
/// is at most one. The next step is `dt · factor` with
///
/// ```text
/// factor = safety · e_n^-β1 · e_{n-1}^-β2 · e_{n-2}^-β3
/// β1 = (pcoeff + icoeff + dcoeff) / k
/// β2 = -(pcoeff + 2 dcoeff) / k
/// β3 = dcoeff / k
/// ```
///
/// where `k` is the order of the error estimate and `e_{n-1}`, `e_{n-2}` are
/// the errors of the last two accepted steps. The factor is clipped to
/// `[factormin, factormax]`, may not shrink an accepted step, and is at most
/// `safety` after a rejected one. The defaults (`icoeff = 1`, others zero)
/// give the classical I controller.
///
/// A step that fails at `dtmin`, because the implicit solve did not converge
/// or the error is not finite, ends the solve with an error.
///
/// ```
/// use ndarray_diffeq::{Norm, PidController};
///
/// let pid = PidController::new(1e-6, 1e-8)
///     .pcoeff(0.4)
///     .icoeff(0.3)
///     .norm(Norm::Max)
///     .dtmax(0.1);
/// assert_eq!(pid.rtol, 1e-6);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidController
{
    pub rtol: f64,
    pub atol: f64,
    pub pcoeff: f64,
    pub icoeff: f64,
    pub dcoeff: f64,
    pub safety: f64,
    pub factormin: f64,
    pub factormax: f64,
    pub dtmin: Option<f64>,
    pub dtmax: Option<f64>,
    /// Accept steps at `dtmin` even if the error is too large, instead of failing.
    pub force_dtmin: bool,
    pub norm: Norm,
}

impl Default for PidController
{
    fn default() -> Self
    {
        PidController {
            rtol: 1e-3,
            atol: 1e-6,
            pcoeff: 0.,
            icoeff: 1.,
            dcoeff: 0.,
            safety: 0.9,
            factormin: 0.2,
            factormax: 10.,
            dtmin: None,
            dtmax: None,
            force_dtmin: true,
            norm: Norm::Rms,
        }
    }
}

macro_rules! setter {
    ($(#[$meta:meta])* $name:ident: $t:ty) => {
        $(#[$meta])*
        pub fn $name(mut self, $name: $t) -> Self
        {
            self.$name = $name;
            self
        }
    };
}

impl PidController
{
    pub fn new(rtol: f64, atol: f64) -> Self
    {
        PidController {
            rtol,
            atol,
            ..Self::default()
        }
    }

    setter!(pcoeff: f64);
    setter!(icoeff: f64);
    setter!(dcoeff: f64);
    setter!(safety: f64);
    setter!(factormin: f64);
    setter!(factormax: f64);
    setter!(force_dtmin: bool);
    setter!(norm: Norm);

    /// Set the smallest allowed step.
    pub fn dtmin(mut self, dtmin: f64) -> Self
    {
        self.dtmin = Some(dtmin);
        self
    }

    /// Set the largest allowed step.
    pub fn dtmax(mut self, dtmax: f64) -> Self
    {
        self.dtmax = Some(dtmax);
        self
    }

    /// Scaled error norm of a step; at most one for acceptable steps.
    pub fn scaled_error<Y: State>(&self, y0: &Y, y1: &Y, y_error: &Y) -> f64
    {
        let tol = y0.zip_leaves(y1, |a, b| self.atol + self.rtol * a.abs().max(b.abs()));
        self.norm.apply(&y_error.zip_leaves(&tol, |e, t| e / t))
    }

    /// Initial step size by the heuristic of Hairer, Nørsett and Wanner,
    /// "Solving Ordinary Differential Equations I", section II.4.
    fn initial_step<Y, F>(&self, t0: f64, y0: &Y, direction: f64, span: f64, error_order: f64, func: &F)
        -> Result<f64, SolveError>
    where
        Y: State,
        F: Fn(f64, &Y) -> Result<Y, SolveError>,
    {
        let scale = y0.map_leaves(|a| self.atol + self.rtol * a.abs());
        let scaled_norm = |y: &Y| self.norm.apply(&y.zip_leaves(&scale, |a, s| a / s));
        let f0 = func(t0, y0)?;
        let d0 = scaled_norm(y0);
        let d1 = scaled_norm(&f0);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let h0 = h0.min(span);
        let y1 = y0.add_scaled(direction * h0, &f0);
        let f1 = func(t0 + direction * h0, &y1)?;
        let d2 = scaled_norm(&f1.sub(&f0)) / h0;
        let dmax = d1.max(d2);
        let h1 = if dmax <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / dmax).powf(1. / (error_order + 1.))
        };
        Ok((100. * h0).min(h1))
    }

    /// Apply `dtmin` and `dtmax` to a signed step.
    fn bound_step(&self, t: f64, dt: f64, direction: f64) -> Result<f64, SolveError>
    {
        let mut size = dt.abs();
        if let Some(dtmax) = self.dtmax {
            size = size.min(dtmax);
        }
        if let Some(dtmin) = self.dtmin {
            if size < dtmin {
                if !self.force_dtmin {
                    return Err(SolveError::StepSizeUnderflow { t, dt });
                }
                size = dtmin;
            }
        }
        Ok(direction * size)
    }
}

/// Memory of the PID controller.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidState
{
    t_end: f64,
    span: f64,
    direction: f64,
    /// Inverse scaled errors of the last two accepted steps.
    prev_inv: f64,
    prev_prev_inv: f64,
}

/// Inverse errors are capped so that an exact step does not stall the controller.
const MAX_INV_ERROR: f64 = 1e10;

impl<Y> StepSizeController<Y> for PidController
where Y: State
{
    type State = PidState;

    fn is_adaptive(&self) -> bool
    {
        true
    }

    fn validate(&self, _t0: f64, _t1: f64, _dt0: Option<f64>) -> Result<(), SolveError>
    {
        Ok(())
    }

    fn static_num_steps(&self, _t0: f64, _t1: f64, _dt0: Option<f64>) -> Option<usize>
    {
        None
    }

    fn init<F>(&self, t0: f64, t1: f64, y0: &Y, dt0: Option<f64>, error_order: f64, func: F)
        -> Result<(f64, PidState), SolveError>
    where F: Fn(f64, &Y) -> Result<Y, SolveError>
    {
        let direction = (t1 - t0).signum();
        let span = (t1 - t0).abs();
        let dt = match dt0 {
            Some(dt0) => dt0,
            None => direction * self.initial_step(t0, y0, direction, span, error_order, &func)?,
        };
        let dt = self.bound_step(t0, dt, direction)?;
        let state = PidState {
            t_end: t1,
            span,
            direction,
            prev_inv: 1.,
            prev_prev_inv: 1.,
        };
        Ok((clip_to_end(t0 + dt, t1, span, direction), state))
    }

    fn adapt(&self, proposal: &Proposal<'_, Y>, state: &PidState) -> Result<Decision<PidState>, SolveError>
    {
        let dt = proposal.t1 - proposal.t0;
        let scaled_error = match proposal.result {
            StepResult::ImplicitNonConvergence => None,
            StepResult::Successful => {
                let y_error = proposal.y_error.ok_or(SolveError::ControllerSolverMismatch)?;
                Some(self.scaled_error(proposal.y0, proposal.y1, y_error))
            }
        };

        let mut accept = matches!(scaled_error, Some(e) if e <= 1.);
        let at_dtmin = self.dtmin.map_or(false, |dtmin| dt.abs() <= dtmin);
        if !accept && at_dtmin && self.force_dtmin && scaled_error.map_or(false, f64::is_finite) {
            warn!(t = proposal.t0, dt, "accepting step at dtmin despite its error");
            accept = true;
        }

        let (factor, inv) = match scaled_error {
            Some(e) if e.is_finite() => {
                let inv = if e == 0. { MAX_INV_ERROR } else { (1. / e).min(MAX_INV_ERROR) };
                let k = proposal.error_order;
                let beta1 = (self.pcoeff + self.icoeff + self.dcoeff) / k;
                let beta2 = -(self.pcoeff + 2. * self.dcoeff) / k;
                let beta3 = self.dcoeff / k;
                let factor = self.safety
                    * inv.powf(beta1)
                    * state.prev_inv.powf(beta2)
                    * state.prev_prev_inv.powf(beta3);
                // a rejected step always shrinks, whatever the error history says
                let (lower, upper) = if accept { (1., self.factormax) } else { (self.factormin, self.safety) };
                (factor.max(lower).min(upper), inv)
            }
            // failed implicit solve: nothing smaller to retry with
            None if at_dtmin => return Err(SolveError::ImplicitNonConvergence),
            // non-finite error at dtmin
            _ if at_dtmin => return Err(SolveError::StepSizeUnderflow { t: proposal.t0, dt }),
            // non-finite error or failed implicit solve: retry much smaller
            _ => (self.factormin, state.prev_inv),
        };

        let next_dt = self.bound_step(proposal.t0, dt * factor, state.direction)?;
        let (next_t0, next_state) = if accept {
            let next_state = PidState {
                prev_inv: inv,
                prev_prev_inv: state.prev_inv,
                ..*state
            };
            (proposal.t1, next_state)
        } else {
            (proposal.t0, *state)
        };
        let next_t1 = clip_to_end(next_t0 + next_dt, state.t_end, state.span, state.direction);
        if next_t1 == next_t0 && next_t0 != state.t_end {
            return Err(SolveError::StepSizeUnderflow { t: next_t0, dt: next_dt });
        }
        Ok(Decision {
            accept,
            next_t0,
            next_t1,
            scaled_error,
            state: next_state,
        })
    }
}
