// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! SDE schemes taking the terms as a `(drift, diffusion)` pair.
//!
//! The Milstein methods assume commutative noise (for example diagonal or
//! scalar noise); this is not checked. The derivative of the diffusion along
//! the noise direction is approximated by central differences.

use super::{Solver, StepOutput, StepResult, TermStructure};
use crate::dense::DenseSegment;
use crate::error::SolveError;
use crate::state::{max_norm, State};
use crate::term::Term;

/// Central difference approximation of `D f(y)[v]`.
fn directional_derivative<Y, F>(f: F, y: &Y, v: &Y) -> Y
where
    Y: State,
    F: Fn(&Y) -> Y,
{
    let v_norm = max_norm(v);
    if v_norm == 0. || !v_norm.is_finite() {
        return y.zeros_like();
    }
    let eps = f64::EPSILON.cbrt() * (1. + max_norm(y)) / v_norm;
    let fp = f(&y.add_scaled(eps, v));
    let fm = f(&y.add_scaled(-eps, v));
    fp.sub(&fm).scale(0.5 / eps)
}

/// Unit vectors along each leaf of a control.
fn control_basis<C: State>(control: &C) -> Vec<C>
{
    let n = control.num_leaves();
    (0..n)
        .map(|j| {
            let mut i = 0;
            control.map_leaves(|_| {
                let e = if i == j { 1. } else { 0. };
                i += 1;
                e
            })
        })
        .collect()
}

fn linear_output<Y: State>(y0: &Y, y1: Y) -> StepOutput<Y, ()>
{
    StepOutput {
        dense: DenseSegment::Linear {
            y0: y0.clone(),
            y1: y1.clone(),
        },
        y1,
        y_error: None,
        state: (),
        result: StepResult::Successful,
    }
}

macro_rules! pair_solver_common {
    (order = $order:expr, strong_order = $strong:expr) => {
        type State = ();

        fn order(&self) -> u32
        {
            $order
        }

        fn strong_order(&self) -> f64
        {
            $strong
        }

        fn term_structure(&self) -> TermStructure
        {
            TermStructure::Pair
        }

        fn is_adaptive(&self) -> bool
        {
            false
        }

        fn is_stochastic(&self, terms: &(D, G)) -> bool
        {
            terms.0.is_stochastic() || terms.1.is_stochastic()
        }

        fn validate(&self, terms: &(D, G), t0: f64, y0: &Y) -> Result<(), SolveError>
        {
            terms.0.check_structure(t0, y0)?;
            terms.1.check_structure(t0, y0)
        }

        fn func_for_init(&self, terms: &(D, G), t: f64, y: &Y) -> Result<Y, SolveError>
        {
            Ok(terms.0.func_for_init(t, y)?.add(&terms.1.func_for_init(t, y)?))
        }

        fn init(&self, _terms: &(D, G), _t0: f64, _t1: f64, _y0: &Y) -> Result<(), SolveError>
        {
            Ok(())
        }
    };
}

/// The Euler-Heun method for Stratonovich SDEs.
///
/// Strong order 0.5 in general, 1 for commutative noise. Not adaptive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EulerHeun;

impl<Y, D, G> Solver<(D, G), Y> for EulerHeun
where
    Y: State,
    D: Term<Y>,
    G: Term<Y>,
{
    pair_solver_common!(order = 1, strong_order = 0.5);

    fn step(&self, terms: &(D, G), t0: f64, t1: f64, y0: &Y, _state: &())
        -> Result<StepOutput<Y, ()>, SolveError>
    {
        let (drift, diffusion) = terms;
        let dt = drift.contr(t0, t1)?;
        let dw = diffusion.contr(t0, t1)?;
        let f0 = drift.vf_prod(t0, y0, &dt);
        let g0 = diffusion.vf_prod(t0, y0, &dw);
        let g_prime = diffusion.vf_prod(t0, &y0.add(&g0), &dw);
        let y1 = y0.add(&f0).add_scaled(0.5, &g0.add(&g_prime));
        Ok(linear_output(y0, y1))
    }
}

/// Milstein's method for Stratonovich SDEs with commutative noise.
///
/// Strong order 1. Not adaptive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StratonovichMilstein;

impl<Y, D, G> Solver<(D, G), Y> for StratonovichMilstein
where
    Y: State,
    D: Term<Y>,
    G: Term<Y>,
{
    pair_solver_common!(order = 1, strong_order = 1.);

    fn step(&self, terms: &(D, G), t0: f64, t1: f64, y0: &Y, _state: &())
        -> Result<StepOutput<Y, ()>, SolveError>
    {
        let (drift, diffusion) = terms;
        let dt = drift.contr(t0, t1)?;
        let dw = diffusion.contr(t0, t1)?;
        let f0 = drift.vf_prod(t0, y0, &dt);
        let g0 = diffusion.vf_prod(t0, y0, &dw);
        // ½ D[g(y) ΔW](g ΔW)
        let correction = directional_derivative(|y| diffusion.vf_prod(t0, y, &dw), y0, &g0);
        let y1 = y0.add(&f0).add(&g0).add_scaled(0.5, &correction);
        Ok(linear_output(y0, y1))
    }
}

/// Milstein's method for Itô SDEs with commutative noise.
///
/// Strong order 1. Not adaptive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ItoMilstein;

impl<Y, D, G> Solver<(D, G), Y> for ItoMilstein
where
    Y: State,
    D: Term<Y>,
    G: Term<Y>,
{
    pair_solver_common!(order = 1, strong_order = 1.);

    fn step(&self, terms: &(D, G), t0: f64, t1: f64, y0: &Y, _state: &())
        -> Result<StepOutput<Y, ()>, SolveError>
    {
        let (drift, diffusion) = terms;
        let dt = drift.contr(t0, t1)?;
        let dw = diffusion.contr(t0, t1)?;
        let f0 = drift.vf_prod(t0, y0, &dt);
        let g0 = diffusion.vf_prod(t0, y0, &dw);
        let stratonovich = directional_derivative(|y| diffusion.vf_prod(t0, y, &dw), y0, &g0);
        // Itô correction: Σ_j D[g_j](g_j) Δt over the columns g_j of the diffusion
        let ito = control_basis(&dw)
            .iter()
            .map(|e| {
                let gj = diffusion.vf_prod(t0, y0, e);
                directional_derivative(|y| diffusion.vf_prod(t0, y, e), y0, &gj)
            })
            .fold(y0.zeros_like(), |acc, d| acc.add(&d));
        let y1 = y0
            .add(&f0)
            .add(&g0)
            .add_scaled(0.5, &stratonovich)
            .add_scaled(-0.5 * (t1 - t0), &ito);
        Ok(linear_output(y0, y1))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::brownian::{Path, VirtualBrownianTree};
    use crate::term::{DiagonalControlTerm, OdeTerm};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn directional_derivative_of_quadratic()
    {
        let d = directional_derivative(|y: &Array1<f64>| y.mapv(|a| a * a), &array![1., 2.], &array![1., -1.]);
        assert_abs_diff_eq!(d[0], 2., epsilon = 1e-8);
        assert_abs_diff_eq!(d[1], -4., epsilon = 1e-8);
    }

    #[test]
    fn basis()
    {
        let b = control_basis(&(0.3, array![1., 2.]));
        assert_eq!(b.len(), 3);
        assert_eq!(b[0], (1., array![0., 0.]));
        assert_eq!(b[2], (0., array![0., 1.]));
    }

    #[test]
    fn milstein_on_geometric_brownian_motion()
    {
        // dy = σ y dW: the Stratonovich step is the Taylor expansion of
        // y exp(σ ΔW) to second order, the Itô step subtracts ½ σ² y Δt
        let sigma = 0.5;
        let bm = VirtualBrownianTree::new(0., 1., 1, 11).unwrap();
        let drift = OdeTerm::new(|_t, y: &Array1<f64>| y * 0.);
        let diffusion = DiagonalControlTerm::new(move |_t, y: &Array1<f64>| y * sigma, bm.clone());
        let terms = (drift, diffusion);
        let (t0, t1) = (0.25, 0.5);
        let dw = bm.increment(t0, t1).unwrap()[0];
        let y0 = array![2.];
        let strat = StratonovichMilstein.step(&terms, t0, t1, &y0, &()).unwrap().y1[0];
        let expected = 2. * (1. + sigma * dw + 0.5 * sigma * sigma * dw * dw);
        assert_abs_diff_eq!(strat, expected, epsilon = 1e-9);
        let ito = ItoMilstein.step(&terms, t0, t1, &y0, &()).unwrap().y1[0];
        assert_abs_diff_eq!(ito, expected - 0.5 * sigma * sigma * 2. * (t1 - t0), epsilon = 1e-9);
        let heun = EulerHeun.step(&terms, t0, t1, &y0, &()).unwrap().y1[0];
        assert_abs_diff_eq!(heun, expected, epsilon = 1e-12);
    }

    #[test]
    fn pair_solvers_have_no_initial_step()
    {
        let bm = VirtualBrownianTree::new(0., 1., 1, 0).unwrap();
        let terms = (
            OdeTerm::new(|_t, y: &Array1<f64>| y.clone()),
            DiagonalControlTerm::new(|_t, y: &Array1<f64>| y.clone(), bm),
        );
        assert_eq!(EulerHeun.func_for_init(&terms, 0., &array![1.]), Err(SolveError::InitialStepUnsupported));
        assert_eq!(structure(&EulerHeun, &terms, &array![1.]), TermStructure::Pair);
    }

    fn structure<S, T, Y>(solver: &S, _terms: &T, _y: &Y) -> TermStructure
    where
        S: Solver<T, Y>,
        Y: State,
    {
        solver.term_structure()
    }
}
