// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
#![doc(html_root_url = "https://docs.rs/ndarray-diffeq/0.3/")]

//! The `ndarray-diffeq` crate solves ordinary and stochastic differential
//! equations whose state is a nested container of `f64` and
//! [`ndarray`] arrays.
//!
//! A solve combines
//!
//! - **terms**, the right hand side of the equation: [`OdeTerm`] for
//!   `dy/dt = f(t, y)`, [`ControlTerm`] and [`DiagonalControlTerm`] for terms
//!   driven by a control such as a [`VirtualBrownianTree`], and [`MultiTerm`]
//!   for sums of terms,
//! - a **solver**, the single step rule (see [the list of solvers](solver)),
//! - a **step size controller**: [`ConstantStepSize`], [`StepTo`] or the
//!   adaptive [`PidController`],
//! - a [`SaveAt`] policy choosing what to keep of the trajectory.
//!
//! ```
//! use ndarray_diffeq::{Euler, OdeTerm, SaveAt, Solve};
//!
//! // dy/dt = -y, y(0) = 1
//! let term = OdeTerm::new(|_t, y: &f64| -y);
//! let sol = Solve::new(&Euler, &term, 0., 1., &1.)
//!     .dt0(0.1)
//!     .saveat(SaveAt::new().steps(true))
//!     .run()
//!     .unwrap();
//! assert_eq!(sol.ts.len(), 10);
//! assert!((sol.ys[9] - 0.9f64.powi(10)).abs() < 1e-12);
//! ```
//!
//! Time may run backwards: with `t1 < t0` every step size is negative and
//! the solve mirrors the forward solve of the time reversed equation.
//!
//! ## Crate Feature Flags
//!
//! - `rayon`: run the instances of [`Solve::run_batch`] in parallel.
//! - `serde`: serialisation of options and statistics.

mod brownian;
pub mod controller;
mod dense;
mod error;
mod integrate;
mod saveat;
pub mod solver;
mod state;
mod term;

pub use crate::brownian::{Path, VirtualBrownianTree};
pub use crate::controller::{ConstantStepSize, Norm, PidController, StepSizeController, StepTo};
pub use crate::dense::{DenseInterpolation, DenseSegment};
pub use crate::error::{ErrorKind, SolveError};
pub use crate::integrate::{BatchInput, Solution, Solve, Stats, StepCount, DEFAULT_MAX_STEPS};
pub use crate::saveat::SaveAt;
pub use crate::solver::{
    Bosh3, Dopri5, Euler, EulerHeun, Heun, ImplicitEuler, ItoMilstein, Kvaerno3, Midpoint, NewtonSolver,
    ReversibleHeun, SemiImplicitEuler, Solver, StratonovichMilstein, Tsit5,
};
pub use crate::state::{max_norm, rms_norm, State};
pub use crate::term::{ControlTerm, DiagonalControlTerm, MultiTerm, OdeTerm, Term};
