// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Nested numeric state containers.
//!
//! A [`State`] is a tree of `f64` leaves with a fixed structure: a scalar, an
//! n-dimensional [`Array`], a `Vec` of states, or a tuple of states. Solvers
//! only ever combine states leaf by leaf, so any container implementing this
//! trait can be integrated.
//!
//! ```
//! use ndarray::array;
//! use ndarray_diffeq::State;
//!
//! let y = (1.0, array![[1., 2.], [3., 4.]]);
//! let z = y.add_scaled(0.5, &y);
//! assert_eq!(z.0, 1.5);
//! assert_eq!(z.1, array![[1.5, 3.], [4.5, 6.]]);
//! assert_eq!(y.num_leaves(), 5);
//! ```

use std::fmt;

use ndarray::{Array, Array1, ArrayView1, Dimension, Zip};

/// A nested container of `f64` leaves with a fixed structure.
///
/// Implementations must visit leaves in the same order in
/// [`map_leaves`](State::map_leaves), [`zip_leaves`](State::zip_leaves) and
/// [`for_each_leaf`](State::for_each_leaf).
pub trait State: Clone + fmt::Debug
{
    /// Apply `f` to every leaf, returning a state of the same structure.
    fn map_leaves<F>(&self, f: F) -> Self
    where F: FnMut(f64) -> f64;

    /// Combine two states of the same structure leaf by leaf.
    ///
    /// **Panics** if the structures differ.
    fn zip_leaves<F>(&self, other: &Self, f: F) -> Self
    where F: FnMut(f64, f64) -> f64;

    /// Visit every leaf.
    fn for_each_leaf<F>(&self, f: F)
    where F: FnMut(f64);

    /// Return `true` if `self` and `other` have identical structure (and shapes).
    fn same_structure(&self, other: &Self) -> bool;

    /// Number of leaves.
    fn num_leaves(&self) -> usize
    {
        let mut n = 0;
        self.for_each_leaf(|_| n += 1);
        n
    }

    fn add(&self, other: &Self) -> Self
    {
        self.zip_leaves(other, |a, b| a + b)
    }

    fn sub(&self, other: &Self) -> Self
    {
        self.zip_leaves(other, |a, b| a - b)
    }

    fn scale(&self, alpha: f64) -> Self
    {
        self.map_leaves(|a| alpha * a)
    }

    /// `self + alpha * other`
    fn add_scaled(&self, alpha: f64, other: &Self) -> Self
    {
        self.zip_leaves(other, |a, b| a + alpha * b)
    }

    fn zeros_like(&self) -> Self
    {
        self.map_leaves(|_| 0.)
    }

    /// Return `true` if no leaf is NaN or infinite.
    fn is_finite(&self) -> bool
    {
        let mut finite = true;
        self.for_each_leaf(|a| finite &= a.is_finite());
        finite
    }

    /// Copy the leaves into a flat vector, in visiting order.
    fn to_flat(&self) -> Array1<f64>
    {
        let mut v = Vec::with_capacity(self.num_leaves());
        self.for_each_leaf(|a| v.push(a));
        Array1::from(v)
    }

    /// Build a state with the structure of `self` from a flat vector.
    ///
    /// **Panics** if `flat` has fewer elements than `self` has leaves.
    fn from_flat(&self, flat: ArrayView1<'_, f64>) -> Self
    {
        let mut i = 0;
        self.map_leaves(|_| {
            let a = flat[i];
            i += 1;
            a
        })
    }
}

impl State for f64
{
    fn map_leaves<F>(&self, mut f: F) -> Self
    where F: FnMut(f64) -> f64
    {
        f(*self)
    }

    fn zip_leaves<F>(&self, other: &Self, mut f: F) -> Self
    where F: FnMut(f64, f64) -> f64
    {
        f(*self, *other)
    }

    fn for_each_leaf<F>(&self, mut f: F)
    where F: FnMut(f64)
    {
        f(*self)
    }

    fn same_structure(&self, _other: &Self) -> bool
    {
        true
    }

    fn num_leaves(&self) -> usize
    {
        1
    }
}

/// `map_leaves` and `for_each_leaf` visit leaves in logical (row major)
/// order, whatever the memory layout.
impl<D> State for Array<f64, D>
where D: Dimension
{
    fn map_leaves<F>(&self, mut f: F) -> Self
    where F: FnMut(f64) -> f64
    {
        let mut out = self.clone();
        out.iter_mut().for_each(|a| *a = f(*a));
        out
    }

    fn zip_leaves<F>(&self, other: &Self, mut f: F) -> Self
    where F: FnMut(f64, f64) -> f64
    {
        assert_eq!(self.shape(), other.shape(), "zip_leaves: array shapes differ");
        let mut out = self.clone();
        Zip::from(&mut out)
            .and(other)
            .for_each(|a, &b| *a = f(*a, b));
        out
    }

    fn for_each_leaf<F>(&self, mut f: F)
    where F: FnMut(f64)
    {
        self.iter().for_each(|&a| f(a))
    }

    fn same_structure(&self, other: &Self) -> bool
    {
        self.shape() == other.shape()
    }

    fn num_leaves(&self) -> usize
    {
        self.len()
    }
}

impl<S> State for Vec<S>
where S: State
{
    fn map_leaves<F>(&self, mut f: F) -> Self
    where F: FnMut(f64) -> f64
    {
        self.iter().map(|s| s.map_leaves(&mut f)).collect()
    }

    fn zip_leaves<F>(&self, other: &Self, mut f: F) -> Self
    where F: FnMut(f64, f64) -> f64
    {
        assert_eq!(self.len(), other.len(), "zip_leaves: vector lengths differ");
        self.iter()
            .zip(other)
            .map(|(a, b)| a.zip_leaves(b, &mut f))
            .collect()
    }

    fn for_each_leaf<F>(&self, mut f: F)
    where F: FnMut(f64)
    {
        for s in self {
            s.for_each_leaf(&mut f);
        }
    }

    fn same_structure(&self, other: &Self) -> bool
    {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_structure(b))
    }
}

macro_rules! tuple_state {
    ($($T:ident $i:tt),+) => {
        impl<$($T),+> State for ($($T,)+)
        where $($T: State),+
        {
            fn map_leaves<F>(&self, mut f: F) -> Self
            where F: FnMut(f64) -> f64
            {
                ($(self.$i.map_leaves(&mut f),)+)
            }

            fn zip_leaves<F>(&self, other: &Self, mut f: F) -> Self
            where F: FnMut(f64, f64) -> f64
            {
                ($(self.$i.zip_leaves(&other.$i, &mut f),)+)
            }

            fn for_each_leaf<F>(&self, mut f: F)
            where F: FnMut(f64)
            {
                $(self.$i.for_each_leaf(&mut f);)+
            }

            fn same_structure(&self, other: &Self) -> bool
            {
                true $(&& self.$i.same_structure(&other.$i))+
            }
        }
    };
}

tuple_state!(A 0, B 1);
tuple_state!(A 0, B 1, C 2);

/// Root mean square of the leaves; zero for a state without leaves.
pub fn rms_norm<Y: State>(y: &Y) -> f64
{
    let mut sum = 0.;
    let mut n = 0usize;
    y.for_each_leaf(|a| {
        sum += a * a;
        n += 1;
    });
    if n == 0 {
        0.
    } else {
        (sum / n as f64).sqrt()
    }
}

/// Largest absolute value of the leaves; zero for a state without leaves.
pub fn max_norm<Y: State>(y: &Y) -> f64
{
    let mut m: f64 = 0.;
    y.for_each_leaf(|a| {
        // NaN propagates
        if a.is_nan() || a.abs() > m {
            m = a.abs();
        }
    });
    m
}
