// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Builders for test states.

use ndarray::{Array, Dimension, IntoDimension, Order};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// How to generate elements
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ElementGenerator
{
    /// `start, start + 1, start + 2, ...`
    Sequential(f64),
    Constant(f64),
    /// Standard normal draws from a seeded generator.
    Normal(u64),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ArrayBuilder<D: Dimension>
{
    dim: D,
    memory_order: Order,
    generator: ElementGenerator,
}

impl<D: Dimension> Default for ArrayBuilder<D>
{
    fn default() -> Self
    {
        Self::new(D::zeros(D::NDIM.unwrap_or(1)))
    }
}

impl<D> ArrayBuilder<D>
where D: Dimension
{
    pub fn new(dim: impl IntoDimension<Dim = D>) -> Self
    {
        ArrayBuilder {
            dim: dim.into_dimension(),
            memory_order: Order::C,
            generator: ElementGenerator::Sequential(1.),
        }
    }

    pub fn memory_order(mut self, order: Order) -> Self
    {
        self.memory_order = order;
        self
    }

    pub fn generator(mut self, generator: ElementGenerator) -> Self
    {
        self.generator = generator;
        self
    }

    pub fn build(self) -> Array<f64, D>
    {
        let size = self.dim.size();
        let elements: Vec<f64> = match self.generator {
            ElementGenerator::Sequential(start) => (0..size).map(|i| start + i as f64).collect(),
            ElementGenerator::Constant(c) => vec![c; size],
            ElementGenerator::Normal(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..size).map(|_| rng.sample(StandardNormal)).collect()
            }
        };
        Array::from_vec(elements)
            .into_shape_with_order((self.dim, self.memory_order))
            .unwrap()
    }
}

/// A small diagonal-dominant decay rate matrix: `-(k + 1)` on the diagonal
/// and `0.1` off it.
pub fn decay_matrix(n: usize) -> ndarray::Array2<f64>
{
    Array::from_shape_fn((n, n), |(i, j)| if i == j { -(i as f64 + 1.) } else { 0.1 })
}

#[test]
fn test_order()
{
    let (m, n) = (4, 5);
    let c = ArrayBuilder::new((m, n)).memory_order(Order::C).build();
    let f = ArrayBuilder::new((m, n)).memory_order(Order::F).build();

    assert_eq!(c.shape(), &[m, n]);
    assert_eq!(f.shape(), &[m, n]);
    assert_eq!(c.strides(), &[n as isize, 1]);
    assert_eq!(f.strides(), &[1, m as isize]);
    assert_eq!(c[[0, 1]], 2.);
    assert_eq!(f[[1, 0]], 2.);
}

#[test]
fn test_generators()
{
    let z = ArrayBuilder::new(3).generator(ElementGenerator::Constant(0.)).build();
    assert_eq!(z.to_vec(), vec![0.; 3]);
    let a = ArrayBuilder::new((2, 2)).generator(ElementGenerator::Normal(7)).build();
    let b = ArrayBuilder::new((2, 2)).generator(ElementGenerator::Normal(7)).build();
    assert_eq!(a, b);
}
