// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Butcher tableaux and the explicit Runge-Kutta step they drive.

use crate::dense::DenseSegment;
use crate::error::SolveError;
use crate::state::State;
use crate::term::Term;

/// Kind of interpolant built from the stages of a step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Interpolant
{
    Linear,
    /// Cubic Hermite from the first and last stage; requires FSAL.
    Hermite,
    Tsit5,
}

/// Coefficients of an `s` stage Runge-Kutta method.
///
/// Stage `0` is evaluated at `(t0, y0)`; row `i` of `a` and entry `i` of `c`
/// belong to stage `i + 1`. For implicit methods `diagonal` holds the
/// coefficient `a_ii` of every stage.
#[derive(Debug)]
pub(crate) struct ButcherTableau
{
    pub a: &'static [&'static [f64]],
    pub c: &'static [f64],
    pub diagonal: Option<&'static [f64]>,
    pub b_sol: &'static [f64],
    pub b_error: Option<&'static [f64]>,
    /// The last stage is evaluated at `(t1, y1)` and reused as the first
    /// stage of the next step.
    pub fsal: bool,
    pub order: u32,
    pub interpolant: Interpolant,
}

/// `base + Σ coeffs[j] k[j]`, skipping zero coefficients.
pub(crate) fn combine<Y: State>(base: &Y, coeffs: &[f64], ks: &[Y]) -> Y
{
    coeffs
        .iter()
        .zip(ks)
        .filter(|&(&a, _)| a != 0.)
        .fold(base.clone(), |acc, (&a, k)| acc.add_scaled(a, k))
}

/// Time of a stage at fraction `c` of the step.
pub(crate) fn stage_time(t0: f64, t1: f64, c: f64) -> f64
{
    if c == 1. {
        t1
    } else {
        t0 + c * (t1 - t0)
    }
}

/// Result of an explicit step before it is wrapped for the loop.
pub(crate) struct ExplicitStep<Y, V>
{
    pub y1: Y,
    pub y_error: Option<Y>,
    pub dense: DenseSegment<Y>,
    pub last_vf: V,
}

impl ButcherTableau
{
    /// Take one explicit step. `first_vf` is the FSAL stage of the previous
    /// step, if any.
    pub(crate) fn explicit_step<Y, T>(&self, terms: &T, t0: f64, t1: f64, y0: &Y, first_vf: Option<&T::VectorField>)
        -> Result<ExplicitStep<Y, T::VectorField>, SolveError>
    where
        Y: State,
        T: Term<Y>,
    {
        debug_assert!(self.diagonal.is_none());
        let control = terms.contr(t0, t1)?;
        let vf0 = match first_vf {
            Some(vf) if self.fsal => vf.clone(),
            _ => terms.vf(t0, y0),
        };
        let mut ks = Vec::with_capacity(self.a.len() + 1);
        ks.push(terms.prod(&vf0, &control));
        let mut last_vf = vf0;
        for (row, &c) in self.a.iter().zip(self.c) {
            let yi = combine(y0, row, &ks);
            last_vf = terms.vf(stage_time(t0, t1, c), &yi);
            ks.push(terms.prod(&last_vf, &control));
        }
        let y1 = combine(y0, self.b_sol, &ks);
        let y_error = self
            .b_error
            .map(|e| combine(&y0.zeros_like(), e, &ks));
        let dense = self.dense_segment(y0, &y1, ks);
        Ok(ExplicitStep { y1, y_error, dense, last_vf })
    }

    pub(crate) fn dense_segment<Y: State>(&self, y0: &Y, y1: &Y, mut ks: Vec<Y>) -> DenseSegment<Y>
    {
        match self.interpolant {
            Interpolant::Linear => DenseSegment::Linear {
                y0: y0.clone(),
                y1: y1.clone(),
            },
            Interpolant::Hermite => {
                let k1 = ks.pop().unwrap_or_else(|| y1.sub(y0));
                let k0 = if ks.is_empty() { k1.clone() } else { ks.swap_remove(0) };
                DenseSegment::Hermite {
                    y0: y0.clone(),
                    y1: y1.clone(),
                    k0,
                    k1,
                }
            }
            Interpolant::Tsit5 => DenseSegment::Tsit5 { y0: y0.clone(), k: ks },
        }
    }
}

pub(crate) static EULER: ButcherTableau = ButcherTableau {
    a: &[],
    c: &[],
    diagonal: None,
    b_sol: &[1.],
    b_error: None,
    fsal: false,
    order: 1,
    interpolant: Interpolant::Linear,
};

pub(crate) static HEUN: ButcherTableau = ButcherTableau {
    a: &[&[1.]],
    c: &[1.],
    diagonal: None,
    b_sol: &[0.5, 0.5],
    b_error: Some(&[0.5, -0.5]),
    fsal: false,
    order: 2,
    interpolant: Interpolant::Linear,
};

pub(crate) static MIDPOINT: ButcherTableau = ButcherTableau {
    a: &[&[0.5]],
    c: &[0.5],
    diagonal: None,
    b_sol: &[0., 1.],
    b_error: Some(&[1., -1.]),
    fsal: false,
    order: 2,
    interpolant: Interpolant::Linear,
};

pub(crate) static BOSH3: ButcherTableau = ButcherTableau {
    a: &[&[1. / 2.], &[0., 3. / 4.], &[2. / 9., 1. / 3., 4. / 9.]],
    c: &[1. / 2., 3. / 4., 1.],
    diagonal: None,
    b_sol: &[2. / 9., 1. / 3., 4. / 9., 0.],
    b_error: Some(&[2. / 9. - 7. / 24., 1. / 3. - 1. / 4., 4. / 9. - 1. / 3., -1. / 8.]),
    fsal: true,
    order: 3,
    interpolant: Interpolant::Hermite,
};

pub(crate) static DOPRI5: ButcherTableau = ButcherTableau {
    a: &[
        &[1. / 5.],
        &[3. / 40., 9. / 40.],
        &[44. / 45., -56. / 15., 32. / 9.],
        &[19372. / 6561., -25360. / 2187., 64448. / 6561., -212. / 729.],
        &[9017. / 3168., -355. / 33., 46732. / 5247., 49. / 176., -5103. / 18656.],
        &[35. / 384., 0., 500. / 1113., 125. / 192., -2187. / 6784., 11. / 84.],
    ],
    c: &[1. / 5., 3. / 10., 4. / 5., 8. / 9., 1., 1.],
    diagonal: None,
    b_sol: &[35. / 384., 0., 500. / 1113., 125. / 192., -2187. / 6784., 11. / 84., 0.],
    b_error: Some(&[
        71. / 57600.,
        0.,
        -71. / 16695.,
        71. / 1920.,
        -17253. / 339200.,
        22. / 525.,
        -1. / 40.,
    ]),
    fsal: true,
    order: 5,
    interpolant: Interpolant::Hermite,
};

pub(crate) static TSIT5: ButcherTableau = ButcherTableau {
    a: &[
        &[0.161],
        &[-0.008480655492356989, 0.335480655492357],
        &[2.897153057105493, -6.359448489975075, 4.3622954328695815],
        &[5.325864828439257, -11.748883564062828, 7.4955393428898365, -0.09249506636175525],
        &[5.86145544294642, -12.92096931784711, 8.159367898576159, -0.071584973281401, -0.028269050394068383],
        &[
            0.09646076681806523,
            0.01,
            0.4798896504144996,
            1.379008574103742,
            -3.290069515436081,
            2.324710524099774,
        ],
    ],
    c: &[0.161, 0.327, 0.9, 0.9800255409045097, 1., 1.],
    diagonal: None,
    b_sol: &[
        0.09646076681806523,
        0.01,
        0.4798896504144996,
        1.379008574103742,
        -3.290069515436081,
        2.324710524099774,
        0.,
    ],
    b_error: Some(&[
        -0.00178001105222577714,
        -0.0008164344596567469,
        0.007880878010261995,
        -0.1447110071732629,
        0.5823571654525552,
        -0.45808210592918697,
        1. / 66.,
    ]),
    fsal: true,
    order: 5,
    interpolant: Interpolant::Tsit5,
};

const KVAERNO3_GAMMA: f64 = 0.43586652150;
const KVAERNO3_A31: f64 = (-4. * KVAERNO3_GAMMA * KVAERNO3_GAMMA + 6. * KVAERNO3_GAMMA - 1.) / (4. * KVAERNO3_GAMMA);
const KVAERNO3_A32: f64 = (-2. * KVAERNO3_GAMMA + 1.) / (4. * KVAERNO3_GAMMA);
const KVAERNO3_A41: f64 = (6. * KVAERNO3_GAMMA - 1.) / (12. * KVAERNO3_GAMMA);
const KVAERNO3_A42: f64 = -1. / ((24. * KVAERNO3_GAMMA - 12.) * KVAERNO3_GAMMA);
const KVAERNO3_A43: f64 =
    (-6. * KVAERNO3_GAMMA * KVAERNO3_GAMMA + 6. * KVAERNO3_GAMMA - 1.) / (6. * KVAERNO3_GAMMA - 3.);

/// Backward Euler, as an explicit stage at `t0` followed by one implicit
/// stage at `t1`.
pub(crate) static IMPLICIT_EULER: ButcherTableau = ButcherTableau {
    a: &[&[0.]],
    c: &[1.],
    diagonal: Some(&[0., 1.]),
    b_sol: &[0., 1.],
    b_error: None,
    fsal: false,
    order: 1,
    interpolant: Interpolant::Linear,
};

/// Kværnø's stiffly accurate ESDIRK 3(2) method.
pub(crate) static KVAERNO3: ButcherTableau = ButcherTableau {
    a: &[
        &[KVAERNO3_GAMMA],
        &[KVAERNO3_A31, KVAERNO3_A32],
        &[KVAERNO3_A41, KVAERNO3_A42, KVAERNO3_A43],
    ],
    c: &[2. * KVAERNO3_GAMMA, 1., 1.],
    diagonal: Some(&[0., KVAERNO3_GAMMA, KVAERNO3_GAMMA, KVAERNO3_GAMMA]),
    b_sol: &[KVAERNO3_A41, KVAERNO3_A42, KVAERNO3_A43, KVAERNO3_GAMMA],
    b_error: Some(&[
        KVAERNO3_A41 - KVAERNO3_A31,
        KVAERNO3_A42 - KVAERNO3_A32,
        KVAERNO3_A43 - KVAERNO3_GAMMA,
        KVAERNO3_GAMMA,
    ]),
    fsal: false,
    order: 3,
    interpolant: Interpolant::Hermite,
};

#[cfg(test)]
mod tests
{
    use super::*;
    use approx::assert_abs_diff_eq;

    fn all() -> [&'static ButcherTableau; 8]
    {
        [&EULER, &HEUN, &MIDPOINT, &BOSH3, &DOPRI5, &TSIT5, &IMPLICIT_EULER, &KVAERNO3]
    }

    #[test]
    fn consistency()
    {
        for tab in all() {
            let diag = |i: usize| tab.diagonal.map_or(0., |d| d[i]);
            let stages = tab.a.len() + 1;
            assert_eq!(tab.b_sol.len(), stages);
            assert_abs_diff_eq!(tab.b_sol.iter().sum::<f64>(), 1., epsilon = 1e-9);
            // the first stage is evaluated at t0
            assert_eq!(diag(0), 0.);
            for (i, (row, &c)) in tab.a.iter().zip(tab.c).enumerate() {
                assert_eq!(row.len(), i + 1);
                assert_abs_diff_eq!(row.iter().sum::<f64>() + diag(i + 1), c, epsilon = 1e-9);
            }
            if let Some(e) = tab.b_error {
                assert_eq!(e.len(), stages);
                assert_abs_diff_eq!(e.iter().sum::<f64>(), 0., epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn fsal_last_row_is_solution()
    {
        for tab in all().iter().filter(|tab| tab.fsal) {
            let last = tab.a[tab.a.len() - 1];
            assert_eq!(&tab.b_sol[..last.len()], last);
            assert_eq!(tab.c[tab.c.len() - 1], 1.);
        }
    }
}
