// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use approx::assert_abs_diff_eq;
use ndarray::Array1;
use state_gen::{decay_matrix, ArrayBuilder};

use ndarray_diffeq::{Dopri5, ImplicitEuler, Kvaerno3, OdeTerm, PidController, Solve, StepCount};

const N: usize = 6;

fn reference(y0: &Array1<f64>) -> Array1<f64>
{
    let a = decay_matrix(N);
    let term = OdeTerm::new(move |_t, y: &Array1<f64>| a.dot(y));
    let sol = Solve::new(&Dopri5, &term, 0., 2., y0)
        .controller(PidController::new(1e-11, 1e-12))
        .max_steps(None)
        .run()
        .unwrap();
    sol.ys[0].clone()
}

#[test]
fn implicit_solvers_on_coupled_decay()
{
    let y0: Array1<f64> = ArrayBuilder::new(N).build();
    let expected = reference(&y0);
    let a = decay_matrix(N);
    let term = OdeTerm::new(move |_t, y: &Array1<f64>| a.dot(y));

    let sol = Solve::new(&Kvaerno3::new(), &term, 0., 2., &y0)
        .controller(PidController::new(1e-7, 1e-9))
        .run()
        .unwrap();
    assert_eq!(sol.stats.compiled_num_steps, StepCount::Dynamic);
    assert_abs_diff_eq!(sol.ys[0], expected, epsilon = 1e-4);

    let sol = Solve::new(&ImplicitEuler::new(), &term, 0., 2., &y0)
        .dt0(1e-3)
        .run()
        .unwrap();
    assert_eq!(sol.stats.num_accepted_steps, 2000);
    assert_abs_diff_eq!(sol.ys[0], expected, epsilon = 1e-2);
}

#[test]
fn rates_matrix()
{
    let a = decay_matrix(3);
    assert_eq!(a.diag().to_vec(), vec![-1., -2., -3.]);
    assert_eq!(a[[0, 2]], 0.1);
}
