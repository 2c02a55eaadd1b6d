// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::tableau::{ButcherTableau, BOSH3, DOPRI5, EULER, HEUN, MIDPOINT, TSIT5};
use super::{Solver, StepOutput, StepResult, TermStructure};
use crate::error::SolveError;
use crate::state::State;
use crate::term::Term;

macro_rules! explicit_solver {
    ($(#[$meta:meta])* $name:ident, $tableau:expr, strong_order = $strong:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name
        {
            fn tableau(&self) -> &'static ButcherTableau
            {
                &$tableau
            }
        }

        impl<T, Y> Solver<T, Y> for $name
        where
            Y: State,
            T: Term<Y>,
        {
            /// Last vector field evaluation, reused by FSAL methods.
            type State = Option<T::VectorField>;

            fn order(&self) -> u32
            {
                self.tableau().order
            }

            fn strong_order(&self) -> f64
            {
                $strong
            }

            fn term_structure(&self) -> TermStructure
            {
                TermStructure::Single
            }

            fn is_adaptive(&self) -> bool
            {
                self.tableau().b_error.is_some()
            }

            fn is_stochastic(&self, terms: &T) -> bool
            {
                terms.is_stochastic()
            }

            fn validate(&self, terms: &T, t0: f64, y0: &Y) -> Result<(), SolveError>
            {
                terms.check_structure(t0, y0)
            }

            fn func_for_init(&self, terms: &T, t: f64, y: &Y) -> Result<Y, SolveError>
            {
                terms.func_for_init(t, y)
            }

            fn init(&self, _terms: &T, _t0: f64, _t1: f64, _y0: &Y) -> Result<Self::State, SolveError>
            {
                Ok(None)
            }

            fn step(&self, terms: &T, t0: f64, t1: f64, y0: &Y, state: &Self::State)
                -> Result<StepOutput<Y, Self::State>, SolveError>
            {
                let tableau = self.tableau();
                let step = tableau.explicit_step(terms, t0, t1, y0, state.as_ref())?;
                Ok(StepOutput {
                    y1: step.y1,
                    y_error: step.y_error,
                    dense: step.dense,
                    state: if tableau.fsal { Some(step.last_vf) } else { None },
                    result: StepResult::Successful,
                })
            }
        }
    };
}

explicit_solver!(
    /// Forward Euler; Euler-Maruyama when the terms are stochastic.
    ///
    /// Not adaptive. Linear interpolation between steps.
    Euler,
    EULER,
    strong_order = 0.5
);

explicit_solver!(
    /// Heun's method, embedding Euler for the error estimate.
    ///
    /// Solves Stratonovich SDEs when the terms are stochastic.
    Heun,
    HEUN,
    strong_order = 0.5
);

explicit_solver!(
    /// The explicit midpoint method, embedding Euler for the error estimate.
    Midpoint,
    MIDPOINT,
    strong_order = 0.5
);

explicit_solver!(
    /// Bogacki-Shampine 3(2), with cubic Hermite interpolation.
    Bosh3,
    BOSH3,
    strong_order = 0.5
);

explicit_solver!(
    /// Dormand-Prince 5(4), with cubic Hermite interpolation.
    Dopri5,
    DOPRI5,
    strong_order = 0.5
);

explicit_solver!(
    /// Tsitouras 5(4), with its fourth order continuous extension.
    ///
    /// The interpolant only supports values; derivative queries fail with
    /// [`SolveError::DerivativeNotSupported`].
    Tsit5,
    TSIT5,
    strong_order = 0.5
);
