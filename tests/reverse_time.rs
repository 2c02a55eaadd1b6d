// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use approx::assert_abs_diff_eq;
use ndarray::{array, Array1};

use ndarray_diffeq::{
    Bosh3, Dopri5, Euler, Heun, ImplicitEuler, Kvaerno3, OdeTerm, PidController, ReversibleHeun, SaveAt, Solution,
    Solve, Solver, StepTo, Tsit5,
};

fn field(t: f64, y: &Array1<f64>) -> Array1<f64>
{
    array![-y[0] + t.sin(), 0.3 * y[0] * y[1] - 0.1 * t]
}

/// `f'(s, y) = -f(-s, y)`, whose solution is `y(-s)`.
fn reversed(s: f64, y: &Array1<f64>) -> Array1<f64>
{
    -field(-s, y)
}

const T0: f64 = 0.5;
const T1: f64 = 2.;

fn save() -> SaveAt
{
    SaveAt::new().t0(true).steps(true).t1(true).dense(true)
}

fn assert_mirrored(forward: &Solution<Array1<f64>>, backward: &Solution<Array1<f64>>)
{
    assert_eq!(forward.ts.len(), backward.ts.len());
    assert_eq!(forward.stats.num_accepted_steps, backward.stats.num_accepted_steps);
    assert_eq!(forward.stats.num_rejected_steps, backward.stats.num_rejected_steps);
    for (t, s) in forward.ts.iter().zip(&backward.ts) {
        assert_abs_diff_eq!(*t, -s, epsilon = 1e-12);
    }
    for (y, z) in forward.ys.iter().zip(&backward.ys) {
        assert_abs_diff_eq!(y, z, epsilon = 1e-12);
    }
    for &t in &[T0, 0.75, 1.3, 1.999, T1] {
        let y = forward.evaluate(t).unwrap();
        let z = backward.evaluate(-t).unwrap();
        assert_abs_diff_eq!(y, z, epsilon = 1e-12);
    }
}

fn check_constant<S>(solver: &S, dt0: f64)
where S: Solver<OdeTerm<fn(f64, &Array1<f64>) -> Array1<f64>>, Array1<f64>>
{
    let f = OdeTerm::new(field as fn(f64, &Array1<f64>) -> Array1<f64>);
    let g = OdeTerm::new(reversed as fn(f64, &Array1<f64>) -> Array1<f64>);
    let y0 = array![1., 0.5];
    let forward = Solve::new(solver, &f, T0, T1, &y0)
        .dt0(dt0)
        .saveat(save())
        .run()
        .unwrap();
    let backward = Solve::new(solver, &g, -T0, -T1, &y0)
        .dt0(-dt0)
        .saveat(save())
        .run()
        .unwrap();
    assert_mirrored(&forward, &backward);
}

fn check_adaptive<S>(solver: &S)
where S: Solver<OdeTerm<fn(f64, &Array1<f64>) -> Array1<f64>>, Array1<f64>>
{
    let f = OdeTerm::new(field as fn(f64, &Array1<f64>) -> Array1<f64>);
    let g = OdeTerm::new(reversed as fn(f64, &Array1<f64>) -> Array1<f64>);
    let y0 = array![1., 0.5];
    let controller = PidController::new(1e-6, 1e-8).pcoeff(0.1).icoeff(0.3);
    let forward = Solve::new(solver, &f, T0, T1, &y0)
        .controller(controller.clone())
        .saveat(save())
        .run()
        .unwrap();
    let backward = Solve::new(solver, &g, -T0, -T1, &y0)
        .controller(controller)
        .saveat(save())
        .run()
        .unwrap();
    assert!(forward.stats.num_accepted_steps > 3);
    assert_mirrored(&forward, &backward);
}

#[test]
fn constant_steps_are_mirrored()
{
    check_constant(&Euler, 0.1);
    check_constant(&Heun, 0.1);
    check_constant(&Tsit5, 0.1);
    check_constant(&ReversibleHeun, 0.1);
    check_constant(&Kvaerno3::new(), 0.1);
}

#[test]
fn uneven_constant_steps_are_mirrored()
{
    // 1.5 / 0.4 is not an integer: the last step is shortened to end at T1
    check_constant(&Euler, 0.4);
    check_constant(&Tsit5, 0.4);
    check_constant(&ImplicitEuler::new(), 0.4);
}

#[test]
fn last_backward_step_is_clipped()
{
    let term = OdeTerm::new(|_t, y: &f64| -y);
    let sol = Solve::new(&Euler, &term, 1., 0., &1.)
        .dt0(-0.3)
        .saveat(SaveAt::new().steps(true))
        .run()
        .unwrap();
    assert_eq!(sol.stats.num_accepted_steps, 4);
    assert_eq!(sol.ts.len(), 4);
    for (t, expected) in sol.ts.iter().zip(&[0.7, 0.4, 0.1, 0.]) {
        assert_abs_diff_eq!(*t, *expected, epsilon = 1e-12);
    }
    assert_eq!(*sol.ts.last().unwrap(), 0.);
    // each step multiplies by 1 - dt: three full steps and a short one
    assert_abs_diff_eq!(sol.ys[3], 1.3f64.powi(3) * 1.1, epsilon = 1e-12);
}

#[test]
fn adaptive_steps_are_mirrored()
{
    check_adaptive(&Bosh3);
    check_adaptive(&Dopri5);
    check_adaptive(&Tsit5);
}

#[test]
fn save_times_are_mirrored()
{
    let f = OdeTerm::new(field);
    let g = OdeTerm::new(reversed);
    let y0 = array![1., 0.5];
    let ts = vec![T0, 0.6, 1.1, 1.1, T1];
    let minus_ts: Vec<f64> = ts.iter().map(|t| -t).collect();
    let forward = Solve::new(&Tsit5, &f, T0, T1, &y0)
        .dt0(0.25)
        .saveat(SaveAt::new().ts(ts))
        .run()
        .unwrap();
    let backward = Solve::new(&Tsit5, &g, -T0, -T1, &y0)
        .dt0(-0.25)
        .saveat(SaveAt::new().ts(minus_ts.clone()))
        .run()
        .unwrap();
    assert_eq!(backward.ts, minus_ts);
    for (y, z) in forward.ys.iter().zip(&backward.ys) {
        assert_abs_diff_eq!(y, z, epsilon = 1e-12);
    }
}

#[test]
fn step_to_backwards()
{
    let term = OdeTerm::new(|_t, y: &f64| -y);
    let sol = Solve::new(&Euler, &term, 1., 0., &1.)
        .controller(StepTo::new(vec![1., 0.5, 0.]))
        .saveat(SaveAt::new().steps(true))
        .run()
        .unwrap();
    assert_eq!(sol.ts, vec![0.5, 0.]);
    // y' = -y backwards grows: 1 * 1.5 * 1.5
    assert_eq!(sol.ys, vec![1.5, 2.25]);
}
