// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::{Solver, StepOutput, StepResult, TermStructure};
use crate::dense::DenseSegment;
use crate::error::SolveError;
use crate::state::State;
use crate::term::Term;

/// The reversible Heun method.
///
/// Carries a second state `ŷ` alongside the solution, which makes the
/// update algebraically reversible. Solves Stratonovich SDEs with strong
/// order 0.5 (1 for additive noise) and ODEs with order 2, using a single
/// vector field evaluation per step. The difference of the two vector field
/// evaluations gives an error estimate, so it may be used with adaptive step
/// size control.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReversibleHeun;

impl<T, Y> Solver<T, Y> for ReversibleHeun
where
    Y: State,
    T: Term<Y>,
{
    /// `(ŷ, vf(t, ŷ))` at the start of the next step.
    type State = (Y, T::VectorField);

    fn order(&self) -> u32
    {
        2
    }

    fn strong_order(&self) -> f64
    {
        0.5
    }

    fn term_structure(&self) -> TermStructure
    {
        TermStructure::Single
    }

    fn is_adaptive(&self) -> bool
    {
        true
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

    fn init(&self, terms: &T, t0: f64, _t1: f64, y0: &Y) -> Result<Self::State, SolveError>
    {
        Ok((y0.clone(), terms.vf(t0, y0)))
    }

    fn step(&self, terms: &T, t0: f64, t1: f64, y0: &Y, state: &Self::State)
        -> Result<StepOutput<Y, Self::State>, SolveError>
    {
        let (yhat0, vf0) = state;
        let control = terms.contr(t0, t1)?;
        let p0 = terms.prod(vf0, &control);
        let yhat1 = y0.scale(2.).sub(yhat0).add(&p0);
        let vf1 = terms.vf(t1, &yhat1);
        let p1 = terms.prod(&vf1, &control);
        let y1 = y0.add_scaled(0.5, &p0.add(&p1));
        let y_error = p1.sub(&p0).scale(0.5);
        Ok(StepOutput {
            dense: DenseSegment::Linear {
                y0: y0.clone(),
                y1: y1.clone(),
            },
            y1,
            y_error: Some(y_error),
            state: (yhat1, vf1),
            result: StepResult::Successful,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::term::OdeTerm;

    #[test]
    fn steps_are_reversible()
    {
        let term = OdeTerm::new(|t: f64, y: &f64| (t * y).sin());
        let y0 = 0.7;
        let state = ReversibleHeun.init(&term, 0., 0.3, &y0).unwrap();
        let fwd = ReversibleHeun.step(&term, 0., 0.3, &y0, &state).unwrap();
        let (yhat1, _) = fwd.state.clone();

        // run the update backwards from (y1, ŷ1)
        let back_state = (yhat1.clone(), term.vf(0.3, &yhat1));
        let back = ReversibleHeun.step(&term, 0.3, 0., &fwd.y1, &back_state).unwrap();
        assert!((back.y1 - y0).abs() < 1e-14);
        assert!((back.state.0 - state.0).abs() < 1e-14);
    }
}
