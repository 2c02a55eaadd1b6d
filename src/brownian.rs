// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reproducible Brownian motion sampled on demand.
//!
//! [`VirtualBrownianTree`] never stores the path. The value at any time is
//! found by bisecting `[t0, t1]` from the root: every bisection draws the
//! midpoint from the Brownian bridge between the two endpoints, using a
//! random number generator seeded from the node's position in the tree. The
//! same query therefore always returns the same bits, in any order and from
//! any thread.
//!
//! ```
//! use ndarray_diffeq::{Path, VirtualBrownianTree};
//!
//! let bm = VirtualBrownianTree::new(0., 1., 3, 1234).unwrap().tol(1e-6);
//! let a = bm.increment(0.25, 0.5).unwrap();
//! let b = bm.increment(0.25, 0.5).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.len(), 3);
//! ```

use ndarray::{Array, Dimension, IntoDimension};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::SolveError;

/// A control signal that can be differenced over an interval.
pub trait Path<C>
{
    /// Start of the interval on which the path is defined.
    fn t0(&self) -> f64;

    /// End of the interval on which the path is defined.
    fn t1(&self) -> f64;

    /// The increment `X(t1) - X(t0)`, for `t0 <= t1` inside the domain.
    fn increment(&self, t0: f64, t1: f64) -> Result<C, SolveError>;
}

impl<'a, C, P> Path<C> for &'a P
where P: Path<C> + ?Sized
{
    fn t0(&self) -> f64
    {
        (**self).t0()
    }

    fn t1(&self) -> f64
    {
        (**self).t1()
    }

    fn increment(&self, t0: f64, t1: f64) -> Result<C, SolveError>
    {
        (**self).increment(t0, t1)
    }
}

/// Brownian motion on `[t0, t1]` with values of shape `D`.
///
/// Queries are resolved to within `tol` by bisection and linearly
/// interpolated below that. Every node's draw is a pure function of the seed
/// and the node's bit path, so the tree holds no cache and can be shared
/// freely between threads.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualBrownianTree<D>
{
    t0: f64,
    t1: f64,
    tol: f64,
    shape: D,
    seed: u64,
}

const ROOT_BIT: u64 = 2;

impl<D> VirtualBrownianTree<D>
where D: Dimension
{
    /// Create a Brownian motion on `[t0, t1]` with the given value shape.
    ///
    /// The default tolerance is `2^-20 (t1 - t0)`.
    ///
    /// **Errors** if the interval is empty, reversed or not finite.
    pub fn new<Sh>(t0: f64, t1: f64, shape: Sh, seed: u64) -> Result<Self, SolveError>
    where Sh: IntoDimension<Dim = D>
    {
        if !(t0.is_finite() && t1.is_finite()) || t0 == t1 {
            return Err(SolveError::EmptyInterval { t0, t1 });
        }
        if t1 < t0 {
            return Err(SolveError::InvalidInterval { t0, t1 });
        }
        Ok(VirtualBrownianTree {
            t0,
            t1,
            tol: (t1 - t0) * 2f64.powi(-20),
            shape: shape.into_dimension(),
            seed,
        })
    }

    /// Set the resolution below which the path is linearly interpolated.
    ///
    /// **Panics** if `tol` is not positive.
    pub fn tol(mut self, tol: f64) -> Self
    {
        assert!(tol > 0., "VirtualBrownianTree: tol must be positive");
        self.tol = tol;
        self
    }

    pub fn shape(&self) -> &[usize]
    {
        self.shape.slice()
    }

    /// The value `W(t)`, with `W(t0) = 0`.
    pub fn evaluate(&self, t: f64) -> Result<Array<f64, D>, SolveError>
    {
        self.check_domain(t)?;
        Ok(self.descend(self.root(), t))
    }

    fn check_domain(&self, t: f64) -> Result<(), SolveError>
    {
        if t >= self.t0 && t <= self.t1 {
            Ok(())
        } else {
            Err(SolveError::OutOfDomain { t, t0: self.t0, t1: self.t1 })
        }
    }

    fn root(&self) -> Node<D>
    {
        let key = splitmix64(self.seed);
        let w1 = self.draw(split(key, ROOT_BIT), (self.t1 - self.t0).sqrt());
        Node {
            s: self.t0,
            u: self.t1,
            ws: Array::zeros(self.shape.clone()),
            wu: w1,
            key,
        }
    }

    /// Standard normal array of our shape, times `scale`.
    fn draw(&self, key: u64, scale: f64) -> Array<f64, D>
    {
        let mut rng = StdRng::seed_from_u64(key);
        Array::from_shape_simple_fn(self.shape.clone(), || scale * rng.sample::<f64, _>(StandardNormal))
    }

    /// Bisect `node` towards `t` until the tolerance is met, then interpolate.
    fn descend(&self, mut node: Node<D>, t: f64) -> Array<f64, D>
    {
        loop {
            if t == node.s {
                return node.ws;
            }
            if t == node.u {
                return node.wu;
            }
            if node.u - node.s <= self.tol {
                let r = (t - node.s) / (node.u - node.s);
                return &node.ws + &((&node.wu - &node.ws) * r);
            }
            let right = t > node.mid();
            node = node.child(self, right);
        }
    }
}

impl<D> Path<Array<f64, D>> for VirtualBrownianTree<D>
where D: Dimension
{
    fn t0(&self) -> f64
    {
        self.t0
    }

    fn t1(&self) -> f64
    {
        self.t1
    }

    /// Find the smallest node containing both endpoints, then resolve each
    /// endpoint below it.
    fn increment(&self, t0: f64, t1: f64) -> Result<Array<f64, D>, SolveError>
    {
        if t1 < t0 {
            return Err(SolveError::InvalidInterval { t0, t1 });
        }
        self.check_domain(t0)?;
        self.check_domain(t1)?;
        if t0 == t1 {
            return Ok(Array::zeros(self.shape.clone()));
        }
        let mut node = self.root();
        while node.u - node.s > self.tol {
            let mid = node.mid();
            if t0 >= mid && t0 != node.s {
                node = node.child(self, true);
            } else if t1 <= mid && t1 != node.u {
                node = node.child(self, false);
            } else {
                break;
            }
        }
        let w1 = self.descend(node.clone(), t1);
        let w0 = self.descend(node, t0);
        Ok(w1 - w0)
    }
}

/// A dyadic node of the tree: the interval `[s, u]`, the path values at its
/// ends and the key of its midpoint draw.
#[derive(Clone, Debug)]
struct Node<D: Dimension>
{
    s: f64,
    u: f64,
    ws: Array<f64, D>,
    wu: Array<f64, D>,
    key: u64,
}

impl<D> Node<D>
where D: Dimension
{
    fn mid(&self) -> f64
    {
        self.s + 0.5 * (self.u - self.s)
    }

    /// Draw the midpoint from the Brownian bridge and step into one half.
    fn child(self, tree: &VirtualBrownianTree<D>, right: bool) -> Self
    {
        let mid = self.mid();
        // Var[W(mid) | W(s), W(u)] = (u - s) / 4
        let noise = tree.draw(self.key, (0.25 * (self.u - self.s)).sqrt());
        let wmid = (&self.ws + &self.wu) * 0.5 + noise;
        if right {
            Node {
                s: mid,
                u: self.u,
                ws: wmid,
                wu: self.wu,
                key: split(self.key, 1),
            }
        } else {
            Node {
                s: self.s,
                u: mid,
                ws: self.ws,
                wu: wmid,
                key: split(self.key, 0),
            }
        }
    }
}

fn splitmix64(mut z: u64) -> u64
{
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Key of the child `bit` of the node with key `key`.
fn split(key: u64, bit: u64) -> u64
{
    splitmix64(key ^ (bit + 1).wrapping_mul(0xd1b5_4a32_d192_ed03))
}
