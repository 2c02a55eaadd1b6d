// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, Array2, Array3, ArrayD, IxDyn, Order};
use state_gen::{ArrayBuilder, ElementGenerator};

use ndarray_diffeq::{max_norm, Dopri5, OdeTerm, PidController, SaveAt, Solve, SolveError, State, Tsit5};

/// Solve `dy/dt = -y` on `[0, 1]` and check the output keeps the structure
/// of `y0` everywhere it is saved.
fn decay_preserves_structure<Y: State>(y0: Y)
{
    let term = OdeTerm::new(|_t, y: &Y| y.map_leaves(|x| -x));
    let sol = Solve::new(&Tsit5, &term, 0., 1., &y0)
        .controller(PidController::new(1e-8, 1e-10))
        .saveat(SaveAt::new().t0(true).ts(vec![0.5]).t1(true).dense(true))
        .run()
        .unwrap();
    assert_eq!(sol.ys.len(), 3);
    for y in sol.ys.iter().chain(Some(&sol.evaluate(0.25).unwrap())) {
        assert!(y.same_structure(&y0));
    }
    let expected = y0.scale((-1f64).exp());
    let relative = sol.ys[2].zip_leaves(&expected, |a, b| (a - b).abs() / (1. + b.abs()));
    assert!(max_norm(&relative) < 1e-6);
}

#[test]
fn scalar()
{
    decay_preserves_structure(2.);
}

#[test]
fn arrays_of_any_dimension()
{
    decay_preserves_structure(ArrayBuilder::new(5).build());
    decay_preserves_structure(ArrayBuilder::new((3, 4)).build());
    decay_preserves_structure(ArrayBuilder::new((2, 3, 2)).memory_order(Order::F).build());
    decay_preserves_structure(ArrayD::from_elem(IxDyn(&[2, 1, 2, 1]), 0.5));
}

#[test]
fn nested_containers()
{
    let leaf = |seed| -> Array2<f64> { ArrayBuilder::new((2, 2)).generator(ElementGenerator::Normal(seed)).build() };
    decay_preserves_structure(vec![leaf(1), leaf(2), leaf(3)]);
    decay_preserves_structure((1., array![1., 2.]));
    decay_preserves_structure((vec![(0.5, leaf(4))], array![[1.]], 3.));
    let deep: (Vec<Array3<f64>>, (f64, Vec<f64>)) = (
        vec![ArrayBuilder::new((1, 2, 3)).build(); 2],
        (4., vec![1., 2., 3.]),
    );
    decay_preserves_structure(deep);
}

#[test]
fn fortran_layout_is_kept()
{
    let y0: Array2<f64> = ArrayBuilder::new((3, 2)).memory_order(Order::F).build();
    let term = OdeTerm::new(|_t, y: &Array2<f64>| -y);
    let sol = Solve::new(&Dopri5, &term, 0., 1., &y0)
        .dt0(0.1)
        .run()
        .unwrap();
    assert_eq!(sol.ys[0].shape(), y0.shape());
    assert_abs_diff_eq!(sol.ys[0], y0.mapv(|x| x * (-1f64).exp()), epsilon = 1e-6);
}

#[test]
fn mismatched_vector_field()
{
    // the field drops a leaf
    let term = OdeTerm::new(|_t, y: &Array1<f64>| y.slice(ndarray::s![1..]).to_owned());
    let err = Solve::new(&Tsit5, &term, 0., 1., &array![1., 2., 3.])
        .dt0(0.1)
        .run()
        .unwrap_err();
    assert!(matches!(err, SolveError::StructureMismatch(_)));
    let term = OdeTerm::new(|_t, y: &Vec<f64>| y[..1].to_vec());
    let err = Solve::new(&Tsit5, &term, 0., 1., &vec![1., 2.])
        .dt0(0.1)
        .run()
        .unwrap_err();
    assert!(matches!(err, SolveError::StructureMismatch(_)));
}
