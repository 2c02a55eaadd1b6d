// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Single step update rules.
//!
//! A solver advances a state over one proposed interval `[t0, t1]` and
//! reports a candidate value, an optional embedded error estimate and the
//! local interpolant of the step. Solvers carry their own state across steps
//! (for example the last vector field evaluation of an FSAL method), which
//! the integration loop threads through opaquely and commits only when the
//! step is accepted.
//!
//! | Solver | Terms | Order | Adaptive |
//! |---|---|---|---|
//! | [`Euler`] | single | 1 | no |
//! | [`Heun`] | single | 2 | yes |
//! | [`Midpoint`] | single | 2 | yes |
//! | [`Bosh3`] | single | 3 | yes |
//! | [`Dopri5`] | single | 5 | yes |
//! | [`Tsit5`] | single | 5 | yes |
//! | [`ImplicitEuler`] | single | 1 | no |
//! | [`Kvaerno3`] | single | 3 | yes |
//! | [`ReversibleHeun`] | single | 2 | yes |
//! | [`EulerHeun`] | pair | 1 | no |
//! | [`ItoMilstein`] | pair | 1 | no |
//! | [`StratonovichMilstein`] | pair | 1 | no |
//! | [`SemiImplicitEuler`] | pair | 1 | no |

mod explicit;
mod implicit;
mod linalg;
mod milstein;
mod reversible;
mod semi_implicit;
mod tableau;

pub use self::explicit::{Bosh3, Dopri5, Euler, Heun, Midpoint, Tsit5};
pub use self::implicit::{ImplicitEuler, Kvaerno3, NewtonSolver};
pub use self::milstein::{EulerHeun, ItoMilstein, StratonovichMilstein};
pub use self::reversible::ReversibleHeun;
pub use self::semi_implicit::SemiImplicitEuler;

use crate::dense::DenseSegment;
use crate::error::SolveError;
use crate::state::State;

/// How many terms a solver consumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TermStructure
{
    /// One term, possibly a [`MultiTerm`](crate::MultiTerm).
    Single,
    /// An ordered pair of terms, such as `(drift, diffusion)`.
    Pair,
}

/// Outcome of the numerical work inside one step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepResult
{
    Successful,
    /// An implicit stage equation did not converge; the candidate is
    /// meaningless and the step must be rejected or the solve aborted.
    ImplicitNonConvergence,
}

/// Everything a solver produces for one proposed step.
#[derive(Clone, Debug)]
pub struct StepOutput<Y, S>
{
    pub y1: Y,
    /// Embedded local error estimate; `None` for solvers without one.
    pub y_error: Option<Y>,
    /// Interpolant valid on `[t0, t1]`.
    pub dense: DenseSegment<Y>,
    /// Solver state to carry forward if the step is accepted.
    pub state: S,
    pub result: StepResult,
}

/// A single step update rule for the terms `T` acting on states `Y`.
pub trait Solver<T, Y: State>
{
    /// State carried from one accepted step to the next.
    type State: Clone;

    /// Order of convergence when solving ODEs.
    fn order(&self) -> u32;

    /// Strong order of convergence when solving SDEs.
    fn strong_order(&self) -> f64;

    fn term_structure(&self) -> TermStructure;

    /// Return `true` if the solver produces an embedded error estimate.
    fn is_adaptive(&self) -> bool;

    /// Return `true` if any of the terms is driven by a random path.
    fn is_stochastic(&self, terms: &T) -> bool;

    /// Check the terms against the initial state.
    fn validate(&self, terms: &T, t0: f64, y0: &Y) -> Result<(), SolveError>;

    /// `dy/dt`, for initial step size selection.
    fn func_for_init(&self, terms: &T, t: f64, y: &Y) -> Result<Y, SolveError>;

    fn init(&self, terms: &T, t0: f64, t1: f64, y0: &Y) -> Result<Self::State, SolveError>;

    /// Attempt a step from `(t0, y0)` to `t1`.
    ///
    /// `t1 < t0` for solves backwards in time.
    fn step(&self, terms: &T, t0: f64, t1: f64, y0: &Y, state: &Self::State)
        -> Result<StepOutput<Y, Self::State>, SolveError>;

    /// Order of the local error estimate, used by adaptive controllers.
    fn error_order(&self, terms: &T) -> f64
    {
        if self.is_stochastic(terms) {
            self.strong_order() + 0.5
        } else {
            self.order() as f64
        }
    }
}
