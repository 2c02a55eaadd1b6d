// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Terms: vector fields paired with the control they are integrated against.
//!
//! A term contributes `vf(t, y) · (X(t1) - X(t0))` to a step over `[t0, t1]`.
//! For an ODE the control is time itself, so the contribution is
//! `f(t, y) · dt`; for an SDE the diffusion is integrated against a Brownian
//! path. Auxiliary parameters are captured by the closures.
//!
//! ```
//! use ndarray::array;
//! use ndarray_diffeq::{OdeTerm, Term};
//!
//! let term = OdeTerm::new(|_t, y: &ndarray::Array1<f64>| -y);
//! let y = array![1., 2.];
//! let dt = term.contr(0., 0.5).unwrap();
//! assert_eq!(term.vf_prod(0., &y, &dt), array![-0.5, -1.]);
//! ```

use ndarray::{Array1, Array2};

use crate::brownian::Path;
use crate::error::SolveError;
use crate::state::State;

/// A contribution to the state update over a time interval.
pub trait Term<Y: State>
{
    /// Value of the vector field at a point, before contraction with the control.
    type VectorField: Clone;
    /// Increment of the driving signal over an interval.
    type Control: State;

    fn vf(&self, t: f64, y: &Y) -> Self::VectorField;

    /// The control increment `X(t1) - X(t0)`. Reversed intervals (`t1 < t0`)
    /// give the negated forward increment.
    fn contr(&self, t0: f64, t1: f64) -> Result<Self::Control, SolveError>;

    /// Contract a vector field value with a control increment.
    fn prod(&self, vf: &Self::VectorField, control: &Self::Control) -> Y;

    fn vf_prod(&self, t: f64, y: &Y, control: &Self::Control) -> Y
    {
        self.prod(&self.vf(t, y), control)
    }

    /// `dy/dt` at `(t, y)`, used to pick an initial step size.
    ///
    /// Only deterministic terms have one.
    fn func_for_init(&self, _t: f64, _y: &Y) -> Result<Y, SolveError>
    {
        Err(SolveError::InitialStepUnsupported)
    }

    /// Return `true` if the term is driven by a random path.
    fn is_stochastic(&self) -> bool
    {
        false
    }

    /// Check that the term maps `y0` to contributions of the same structure.
    fn check_structure(&self, t0: f64, y0: &Y) -> Result<(), SolveError>
    {
        let control = self.contr(t0, t0)?;
        if self.vf_prod(t0, y0, &control).same_structure(y0) {
            Ok(())
        } else {
            Err(SolveError::StructureMismatch("term output does not match the state"))
        }
    }
}

/// An ODE `dy/dt = f(t, y)`.
#[derive(Clone, Debug)]
pub struct OdeTerm<F>
{
    vector_field: F,
}

impl<F> OdeTerm<F>
{
    pub fn new(vector_field: F) -> Self
    {
        OdeTerm { vector_field }
    }
}

impl<Y, F> Term<Y> for OdeTerm<F>
where
    Y: State,
    F: Fn(f64, &Y) -> Y,
{
    type VectorField = Y;
    type Control = f64;

    fn vf(&self, t: f64, y: &Y) -> Y
    {
        (self.vector_field)(t, y)
    }

    fn contr(&self, t0: f64, t1: f64) -> Result<f64, SolveError>
    {
        Ok(t1 - t0)
    }

    fn prod(&self, vf: &Y, control: &f64) -> Y
    {
        vf.scale(*control)
    }

    fn func_for_init(&self, t: f64, y: &Y) -> Result<Y, SolveError>
    {
        Ok(self.vf(t, y))
    }
}

/// Increment of `path` over `[t0, t1]`, in either direction.
fn directed_increment<C, P>(path: &P, t0: f64, t1: f64) -> Result<C, SolveError>
where
    C: State,
    P: Path<C>,
{
    if t0 <= t1 {
        path.increment(t0, t1)
    } else {
        Ok(path.increment(t1, t0)?.scale(-1.))
    }
}

/// A vector state driven by a vector control through a matrix valued field:
/// the contribution is `g(t, y) · dX` with `g(t, y)` of shape
/// `(state length, control length)`.
#[derive(Clone, Debug)]
pub struct ControlTerm<F, P>
{
    vector_field: F,
    path: P,
}

impl<F, P> ControlTerm<F, P>
{
    pub fn new(vector_field: F, path: P) -> Self
    {
        ControlTerm { vector_field, path }
    }

    pub fn path(&self) -> &P
    {
        &self.path
    }
}

impl<F, P> Term<Array1<f64>> for ControlTerm<F, P>
where
    F: Fn(f64, &Array1<f64>) -> Array2<f64>,
    P: Path<Array1<f64>>,
{
    type VectorField = Array2<f64>;
    type Control = Array1<f64>;

    fn vf(&self, t: f64, y: &Array1<f64>) -> Array2<f64>
    {
        (self.vector_field)(t, y)
    }

    fn contr(&self, t0: f64, t1: f64) -> Result<Array1<f64>, SolveError>
    {
        directed_increment(&self.path, t0, t1)
    }

    fn prod(&self, vf: &Array2<f64>, control: &Array1<f64>) -> Array1<f64>
    {
        vf.dot(control)
    }

    fn is_stochastic(&self) -> bool
    {
        true
    }

    fn check_structure(&self, t0: f64, y0: &Array1<f64>) -> Result<(), SolveError>
    {
        let g = self.vf(t0, y0);
        let control = self.contr(t0, t0)?;
        if g.nrows() != y0.len() {
            Err(SolveError::StructureMismatch("diffusion rows do not match the state length"))
        } else if g.ncols() != control.len() {
            Err(SolveError::StructureMismatch("diffusion columns do not match the control length"))
        } else {
            Ok(())
        }
    }
}

/// A state driven leaf by leaf by a control of the same structure: the
/// contribution is `g(t, y) ⊙ dX` (diagonal noise).
#[derive(Clone, Debug)]
pub struct DiagonalControlTerm<F, P>
{
    vector_field: F,
    path: P,
}

impl<F, P> DiagonalControlTerm<F, P>
{
    pub fn new(vector_field: F, path: P) -> Self
    {
        DiagonalControlTerm { vector_field, path }
    }

    pub fn path(&self) -> &P
    {
        &self.path
    }
}

impl<Y, F, P> Term<Y> for DiagonalControlTerm<F, P>
where
    Y: State,
    F: Fn(f64, &Y) -> Y,
    P: Path<Y>,
{
    type VectorField = Y;
    type Control = Y;

    fn vf(&self, t: f64, y: &Y) -> Y
    {
        (self.vector_field)(t, y)
    }

    fn contr(&self, t0: f64, t1: f64) -> Result<Y, SolveError>
    {
        directed_increment(&self.path, t0, t1)
    }

    fn prod(&self, vf: &Y, control: &Y) -> Y
    {
        vf.zip_leaves(control, |g, dw| g * dw)
    }

    fn is_stochastic(&self) -> bool
    {
        true
    }

    fn check_structure(&self, t0: f64, y0: &Y) -> Result<(), SolveError>
    {
        let control = self.contr(t0, t0)?;
        if !control.same_structure(y0) {
            Err(SolveError::StructureMismatch("control does not match the state"))
        } else if !self.vf(t0, y0).same_structure(y0) {
            Err(SolveError::StructureMismatch("diffusion does not match the state"))
        } else {
            Ok(())
        }
    }
}

/// Two terms acting on the same state; their contributions are summed.
///
/// Typically a drift [`OdeTerm`] and a diffusion [`ControlTerm`].
#[derive(Clone, Debug)]
pub struct MultiTerm<A, B>(pub A, pub B);

impl<Y, A, B> Term<Y> for MultiTerm<A, B>
where
    Y: State,
    A: Term<Y>,
    B: Term<Y>,
{
    type VectorField = (A::VectorField, B::VectorField);
    type Control = (A::Control, B::Control);

    fn vf(&self, t: f64, y: &Y) -> Self::VectorField
    {
        (self.0.vf(t, y), self.1.vf(t, y))
    }

    fn contr(&self, t0: f64, t1: f64) -> Result<Self::Control, SolveError>
    {
        Ok((self.0.contr(t0, t1)?, self.1.contr(t0, t1)?))
    }

    fn prod(&self, vf: &Self::VectorField, control: &Self::Control) -> Y
    {
        self.0.prod(&vf.0, &control.0).add(&self.1.prod(&vf.1, &control.1))
    }

    fn func_for_init(&self, t: f64, y: &Y) -> Result<Y, SolveError>
    {
        Ok(self.0.func_for_init(t, y)?.add(&self.1.func_for_init(t, y)?))
    }

    fn is_stochastic(&self) -> bool
    {
        self.0.is_stochastic() || self.1.is_stochastic()
    }

    fn check_structure(&self, t0: f64, y0: &Y) -> Result<(), SolveError>
    {
        self.0.check_structure(t0, y0)?;
        self.1.check_structure(t0, y0)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::brownian::VirtualBrownianTree;
    use ndarray::{array, Array1};

    #[test]
    fn ode_term_reversed_interval()
    {
        let term = OdeTerm::new(|t: f64, y: &f64| t * y);
        assert_eq!(term.contr(1., 0.25).unwrap(), -0.75);
        assert_eq!(term.vf_prod(2., &3., &0.5), 3.);
        assert_eq!(term.func_for_init(2., &3.).unwrap(), 6.);
    }

    #[test]
    fn control_term_reversed_increment_is_negated()
    {
        let bm = VirtualBrownianTree::new(0., 1., 2, 3).unwrap();
        let term = ControlTerm::new(|_t, _y: &Array1<f64>| Array2::eye(2), bm.clone());
        let fwd = term.contr(0.2, 0.6).unwrap();
        let bwd = term.contr(0.6, 0.2).unwrap();
        assert_eq!(fwd, -bwd);
        assert_eq!(fwd, bm.increment(0.2, 0.6).unwrap());
        assert!(term.is_stochastic());
        assert_eq!(term.func_for_init(0., &array![1., 1.]), Err(SolveError::InitialStepUnsupported));
    }

    #[test]
    fn control_term_shape_checks()
    {
        let bm = VirtualBrownianTree::new(0., 1., 3, 3).unwrap();
        let term = ControlTerm::new(|_t, _y: &Array1<f64>| Array2::zeros((2, 2)), bm);
        assert!(matches!(term.check_structure(0., &array![1., 1.]), Err(SolveError::StructureMismatch(_))));
    }

    #[test]
    fn multi_term_sums()
    {
        let bm = VirtualBrownianTree::new(0., 1., 2, 9).unwrap();
        let drift = OdeTerm::new(|_t, y: &Array1<f64>| y * 2.);
        let diffusion = DiagonalControlTerm::new(|_t, _y: &Array1<f64>| array![1., 1.], bm.clone());
        let terms = MultiTerm(drift, diffusion);
        let y = array![1., -1.];
        let control = terms.contr(0., 0.5).unwrap();
        let dw = bm.increment(0., 0.5).unwrap();
        assert_eq!(terms.vf_prod(0., &y, &control), array![1., -1.] + &dw);
        assert!(terms.is_stochastic());
        assert!(terms.check_structure(0., &y).is_ok());
    }

    #[test]
    fn structure_mismatch()
    {
        let term = OdeTerm::new(|_t, _y: &Array1<f64>| array![0., 0., 0.]);
        assert!(term.check_structure(0., &array![1., 2.]).is_err());
    }
}
