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

/// Symplectic Euler for partitioned systems
///
/// ```text
/// dp/dt = f(t, q)
/// dq/dt = g(t, p)
/// ```
///
/// with state `(p, q)` and terms `(f, g)`. `p` is advanced first and the new
/// value is used to advance `q`. Both halves have the same type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SemiImplicitEuler;

impl<Y, F, G> Solver<(F, G), (Y, Y)> for SemiImplicitEuler
where
    Y: State,
    F: Term<Y>,
    G: Term<Y>,
{
    type State = ();

    fn order(&self) -> u32
    {
        1
    }

    fn strong_order(&self) -> f64
    {
        0.5
    }

    fn term_structure(&self) -> TermStructure
    {
        TermStructure::Pair
    }

    fn is_adaptive(&self) -> bool
    {
        false
    }

    fn is_stochastic(&self, terms: &(F, G)) -> bool
    {
        terms.0.is_stochastic() || terms.1.is_stochastic()
    }

    fn validate(&self, terms: &(F, G), t0: f64, y0: &(Y, Y)) -> Result<(), SolveError>
    {
        if !y0.0.same_structure(&y0.1) {
            return Err(SolveError::StructureMismatch("both halves of the state must have the same structure"));
        }
        terms.0.check_structure(t0, &y0.1)?;
        terms.1.check_structure(t0, &y0.0)
    }

    fn func_for_init(&self, terms: &(F, G), t: f64, y: &(Y, Y)) -> Result<(Y, Y), SolveError>
    {
        Ok((terms.0.func_for_init(t, &y.1)?, terms.1.func_for_init(t, &y.0)?))
    }

    fn init(&self, _terms: &(F, G), _t0: f64, _t1: f64, _y0: &(Y, Y)) -> Result<(), SolveError>
    {
        Ok(())
    }

    fn step(&self, terms: &(F, G), t0: f64, t1: f64, y0: &(Y, Y), _state: &())
        -> Result<StepOutput<(Y, Y), ()>, SolveError>
    {
        let (p0, q0) = y0;
        let control_p = terms.0.contr(t0, t1)?;
        let control_q = terms.1.contr(t0, t1)?;
        let p1 = p0.add(&terms.0.vf_prod(t0, q0, &control_p));
        let q1 = q0.add(&terms.1.vf_prod(t0, &p1, &control_q));
        let y1 = (p1, q1);
        Ok(StepOutput {
            dense: DenseSegment::Linear {
                y0: y0.clone(),
                y1: y1.clone(),
            },
            y1,
            y_error: None,
            state: (),
            result: StepResult::Successful,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::term::OdeTerm;
    use ndarray::array;

    #[test]
    fn harmonic_oscillator_step()
    {
        let terms = (OdeTerm::new(|_t, q: &f64| -q), OdeTerm::new(|_t, p: &f64| *p));
        let out = SemiImplicitEuler.step(&terms, 0., 0.1, &(1., 0.5), &()).unwrap();
        // p1 = 1 - 0.1 * 0.5, q1 = 0.5 + 0.1 * p1
        assert!((out.y1.0 - 0.95).abs() < 1e-15);
        assert!((out.y1.1 - 0.595).abs() < 1e-15);
    }

    #[test]
    fn halves_must_match()
    {
        let terms = (
            OdeTerm::new(|_t, q: &ndarray::Array1<f64>| -q),
            OdeTerm::new(|_t, p: &ndarray::Array1<f64>| p.clone()),
        );
        let y0 = (array![1., 2.], array![1.]);
        assert!(matches!(SemiImplicitEuler.validate(&terms, 0., &y0), Err(SolveError::StructureMismatch(_))));
    }
}
