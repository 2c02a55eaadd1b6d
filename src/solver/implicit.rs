// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Diagonally implicit Runge-Kutta methods for stiff problems.
//!
//! Every implicit stage solves `z = base + γ F(z)`, with
//! `F(z) = vf(t, z) · control`, by a simplified Newton iteration: the
//! iteration matrix `I - γ J` is built once per step from a finite difference
//! Jacobian of `F` at `(t0, y0)` and factorised once with nalgebra's LU.

use ndarray::Array2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::linalg::LuFactors;
use super::tableau::{combine, stage_time, ButcherTableau, IMPLICIT_EULER, KVAERNO3};
use super::{Solver, StepOutput, StepResult, TermStructure};
use crate::dense::DenseSegment;
use crate::error::SolveError;
use crate::state::{rms_norm, State};
use crate::term::Term;

/// Options of the Newton iteration used for implicit stages.
///
/// The iteration stops when the estimated distance to the root, measured in
/// the norm scaled by `atol + rtol |z|`, drops below `kappa`. It fails if the
/// iterates stop contracting or after `max_iters` iterations.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewtonSolver
{
    pub rtol: f64,
    pub atol: f64,
    pub kappa: f64,
    pub max_iters: usize,
}

impl Default for NewtonSolver
{
    fn default() -> Self
    {
        NewtonSolver {
            rtol: 1e-7,
            atol: 1e-9,
            kappa: 1e-2,
            max_iters: 10,
        }
    }
}

impl NewtonSolver
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn rtol(mut self, rtol: f64) -> Self
    {
        self.rtol = rtol;
        self
    }

    pub fn atol(mut self, atol: f64) -> Self
    {
        self.atol = atol;
        self
    }

    pub fn kappa(mut self, kappa: f64) -> Self
    {
        self.kappa = kappa;
        self
    }

    pub fn max_iters(mut self, max_iters: usize) -> Self
    {
        self.max_iters = max_iters;
        self
    }

    /// Solve `z = base + gamma F(z)`, starting from `base`.
    fn solve_stage<Y, T>(&self, terms: &T, t: f64, base: &Y, gamma: f64, control: &T::Control, lu: &LuFactors)
        -> Option<Y>
    where
        Y: State,
        T: Term<Y>,
    {
        let mut z = base.clone();
        let mut prev_norm: Option<f64> = None;
        for _ in 0..self.max_iters {
            let residual = z.sub(base).add_scaled(-gamma, &terms.vf_prod(t, &z, control));
            let delta = z.from_flat(lu.solve(residual.to_flat().view())?.view());
            z = z.sub(&delta);
            if !z.is_finite() {
                return None;
            }
            let scale = z.map_leaves(|a| self.atol + self.rtol * a.abs());
            let norm = rms_norm(&delta.zip_leaves(&scale, |d, s| d / s));
            if norm == 0. {
                return Some(z);
            }
            match prev_norm {
                None if norm < self.kappa => return Some(z),
                Some(prev) => {
                    let rate = norm / prev;
                    if rate >= 1. {
                        return None;
                    }
                    if rate / (1. - rate) * norm < self.kappa {
                        return Some(z);
                    }
                }
                None => {}
            }
            prev_norm = Some(norm);
        }
        None
    }
}

/// Forward difference Jacobian of `y ↦ vf(t, y) · control` over the flattened state.
fn jacobian<Y, T>(terms: &T, t: f64, y: &Y, control: &T::Control) -> Array2<f64>
where
    Y: State,
    T: Term<Y>,
{
    let x = y.to_flat();
    let n = x.len();
    let f0 = terms.vf_prod(t, y, control).to_flat();
    let mut jac = Array2::zeros((n, n));
    for j in 0..n {
        let mut xp = x.clone();
        xp[j] += f64::EPSILON.sqrt() * x[j].abs().max(1.);
        let h = xp[j] - x[j];
        let fp = terms.vf_prod(t, &y.from_flat(xp.view()), control).to_flat();
        jac.column_mut(j).assign(&((fp - &f0) / h));
    }
    jac
}

fn nonconvergence<Y: State>(y0: &Y) -> StepOutput<Y, ()>
{
    StepOutput {
        y1: y0.clone(),
        y_error: None,
        dense: DenseSegment::Linear {
            y0: y0.clone(),
            y1: y0.clone(),
        },
        state: (),
        result: StepResult::ImplicitNonConvergence,
    }
}

impl ButcherTableau
{
    /// Take one step of a diagonally implicit method.
    fn implicit_step<Y, T>(&self, newton: &NewtonSolver, terms: &T, t0: f64, t1: f64, y0: &Y)
        -> Result<StepOutput<Y, ()>, SolveError>
    where
        Y: State,
        T: Term<Y>,
    {
        let control = terms.contr(t0, t1)?;
        let diagonal = self.diagonal.unwrap_or(&[]);
        let stages = self.b_sol.len();
        let mut lu: Option<LuFactors> = None;
        let mut ks: Vec<Y> = Vec::with_capacity(stages);
        for i in 0..stages {
            let (t, base) = if i == 0 {
                (t0, y0.clone())
            } else {
                (stage_time(t0, t1, self.c[i - 1]), combine(y0, self.a[i - 1], &ks))
            };
            let gamma = diagonal.get(i).copied().unwrap_or(0.);
            if gamma == 0. {
                ks.push(terms.vf_prod(t, &base, &control));
                continue;
            }
            if lu.is_none() {
                let mut m = jacobian(terms, t0, y0, &control) * -gamma;
                m.diag_mut().mapv_inplace(|a| a + 1.);
                lu = LuFactors::new(&m);
            }
            let z = match &lu {
                Some(lu) => newton.solve_stage(terms, t, &base, gamma, &control, lu),
                None => None,
            };
            match z {
                Some(z) => ks.push(z.sub(&base).scale(1. / gamma)),
                None => {
                    trace!(t0, t1, stage = i, "implicit stage did not converge");
                    return Ok(nonconvergence(y0));
                }
            }
        }
        let y1 = combine(y0, self.b_sol, &ks);
        let y_error = self
            .b_error
            .map(|e| combine(&y0.zeros_like(), e, &ks));
        let dense = self.dense_segment(y0, &y1, ks);
        Ok(StepOutput {
            y1,
            y_error,
            dense,
            state: (),
            result: StepResult::Successful,
        })
    }
}

macro_rules! implicit_solver {
    ($(#[$meta:meta])* $name:ident, $tableau:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq)]
        pub struct $name
        {
            root_finder: NewtonSolver,
        }

        impl $name
        {
            pub fn new() -> Self
            {
                Self::default()
            }

            /// Set the options of the Newton iteration.
            pub fn newton(mut self, root_finder: NewtonSolver) -> Self
            {
                self.root_finder = root_finder;
                self
            }

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
            type State = ();

            fn order(&self) -> u32
            {
                self.tableau().order
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

            fn init(&self, _terms: &T, _t0: f64, _t1: f64, _y0: &Y) -> Result<(), SolveError>
            {
                Ok(())
            }

            fn step(&self, terms: &T, t0: f64, t1: f64, y0: &Y, _state: &())
                -> Result<StepOutput<Y, ()>, SolveError>
            {
                self.tableau()
                    .implicit_step(&self.root_finder, terms, t0, t1, y0)
            }
        }
    };
}

implicit_solver!(
    /// Backward Euler. Not adaptive; linear interpolation between steps.
    ImplicitEuler,
    IMPLICIT_EULER
);

implicit_solver!(
    /// Kværnø's 3(2) ESDIRK method, L-stable and stiffly accurate, with cubic
    /// Hermite interpolation.
    Kvaerno3,
    KVAERNO3
);
