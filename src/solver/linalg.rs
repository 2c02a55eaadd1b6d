// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Factorised Newton iteration matrix.
//!
//! The factorisation itself is nalgebra's partially pivoted LU; this module
//! only moves data between `ndarray` and `nalgebra` at the Newton boundary.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1};

/// LU factors of a square matrix, `P A = L U`.
#[derive(Clone, Debug)]
pub(crate) struct LuFactors
{
    lu: LU<f64, Dyn, Dyn>,
}

impl LuFactors
{
    /// Factor a square matrix.
    ///
    /// Return `None` if the matrix is singular to working precision.
    pub(crate) fn new(a: &Array2<f64>) -> Option<Self>
    {
        debug_assert_eq!(a.nrows(), a.ncols());
        let m = DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]]);
        let lu = m.lu();
        if lu.is_invertible() {
            Some(LuFactors { lu })
        } else {
            None
        }
    }

    /// Solve `A x = b`.
    pub(crate) fn solve(&self, b: ArrayView1<'_, f64>) -> Option<Array1<f64>>
    {
        let rhs = DVector::from_iterator(b.len(), b.iter().copied());
        let x = self.lu.solve(&rhs)?;
        Some(x.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn solves_with_pivoting()
    {
        let a = array![[0., 2., 1.], [1., 1., 0.], [3., 0., 1.]];
        let x = array![1., -2., 0.5];
        let b = a.dot(&x);
        let lu = LuFactors::new(&a).unwrap();
        let sol = lu.solve(b.view()).unwrap();
        for (u, v) in sol.iter().zip(&x) {
            assert_abs_diff_eq!(u, v, epsilon = 1e-12);
        }
    }

    #[test]
    fn singular()
    {
        assert!(LuFactors::new(&array![[1., 2.], [2., 4.]]).is_none());
    }
}
