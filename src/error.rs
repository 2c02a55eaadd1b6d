// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use thiserror::Error;

/// An error produced while setting up, running or querying a solve.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SolveError
{
    /// `t0 == t1`, or one of them is not finite.
    #[error("integration interval is empty or not finite (t0 = {t0}, t1 = {t1})")]
    EmptyInterval { t0: f64, t1: f64 },
    /// The sign of the step size disagrees with `sign(t1 - t0)`.
    #[error("step size {dt0} does not point from t0 = {t0} towards t1 = {t1}")]
    DirectionMismatch { t0: f64, t1: f64, dt0: f64 },
    /// Term output does not have the structure of the state.
    #[error("structure mismatch: {0}")]
    StructureMismatch(&'static str),
    /// No `dt0` was given and the controller cannot choose one.
    #[error("an initial step size dt0 is required by this step size controller")]
    MissingInitialStep,
    /// A `dt0` was given to a controller that takes its steps from a grid.
    #[error("dt0 must be None when steps are prescribed by a grid")]
    UnexpectedInitialStep,
    /// A grid of times is not usable (ordering, bounds).
    #[error("invalid time grid: {0}")]
    InvalidGrid(String),
    /// The save policy is contradictory.
    #[error("invalid save policy: {0}")]
    InvalidSaveAt(&'static str),
    /// Automatic initial step selection needs a deterministic vector field.
    #[error("automatic initial step selection is only available for ODE terms, pass dt0")]
    InitialStepUnsupported,
    /// The nonlinear stage equation of an implicit method did not converge.
    #[error("implicit method did not converge")]
    ImplicitNonConvergence,
    /// The adaptive step size became too small to make progress.
    #[error("step size underflow at t = {t} (dt = {dt:e})")]
    StepSizeUnderflow { t: f64, dt: f64 },
    /// The solve took more steps than permitted.
    #[error("maximum number of steps ({0}) exceeded")]
    MaxStepsExceeded(usize),
    /// An adaptive controller was paired with a solver that gives no error estimate.
    #[error("adaptive step size control requires a solver with an embedded error estimate")]
    ControllerSolverMismatch,
    /// An accepted step produced NaN or infinite values.
    #[error("solution became non-finite at t = {t}")]
    NonFiniteState { t: f64 },
    /// A query time lies outside the solved (or sampled) interval.
    #[error("time {t} is outside of [{t0}, {t1}]")]
    OutOfDomain { t: f64, t0: f64, t1: f64 },
    /// An interval query with negative length.
    #[error("interval [{t0}, {t1}] has negative length")]
    InvalidInterval { t0: f64, t1: f64 },
    /// The interpolant only supports value evaluation.
    #[error("derivative evaluation is not supported by this interpolant")]
    DerivativeNotSupported,
    /// Dense output was not requested for this solve.
    #[error("dense output was not saved; use SaveAt::dense")]
    NoDenseOutput,
}

/// Category of a [`SolveError`].
///
/// This enumeration is not exhaustive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind
{
    /// raised before stepping begins
    Validation,
    /// implicit stage solve failure
    Convergence,
    /// step control failure during the solve
    Control,
    /// query outside of the valid domain of a path or interpolant
    Domain,
}

impl SolveError
{
    /// Return the `ErrorKind` of this error.
    pub fn kind(&self) -> ErrorKind
    {
        use SolveError::*;
        match self {
            EmptyInterval { .. }
            | DirectionMismatch { .. }
            | StructureMismatch(_)
            | MissingInitialStep
            | UnexpectedInitialStep
            | InvalidGrid(_)
            | InvalidSaveAt(_)
            | InitialStepUnsupported => ErrorKind::Validation,
            ImplicitNonConvergence => ErrorKind::Convergence,
            StepSizeUnderflow { .. } | MaxStepsExceeded(_) | ControllerSolverMismatch | NonFiniteState { .. } =>
                ErrorKind::Control,
            OutOfDomain { .. } | InvalidInterval { .. } | DerivativeNotSupported | NoDenseOutput => ErrorKind::Domain,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn kinds()
    {
        assert_eq!(SolveError::MissingInitialStep.kind(), ErrorKind::Validation);
        assert_eq!(SolveError::ImplicitNonConvergence.kind(), ErrorKind::Convergence);
        assert_eq!(SolveError::MaxStepsExceeded(10).kind(), ErrorKind::Control);
        assert_eq!(SolveError::DerivativeNotSupported.kind(), ErrorKind::Domain);
    }

    #[test]
    fn display()
    {
        let e = SolveError::OutOfDomain { t: 3., t0: 0., t1: 2. };
        assert_eq!(e.to_string(), "time 3 is outside of [0, 2]");
        assert_eq!(SolveError::ImplicitNonConvergence.to_string(), "implicit method did not converge");
    }
}
