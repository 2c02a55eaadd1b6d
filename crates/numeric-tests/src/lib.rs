// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Helpers for measuring convergence orders.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Least squares slope of `ln(errs)` against `ln(hs)`.
///
/// **Panics** if the lengths differ or fewer than two points are given.
pub fn log_log_slope(hs: &[f64], errs: &[f64]) -> f64
{
    assert_eq!(hs.len(), errs.len());
    assert!(hs.len() >= 2);
    let n = hs.len() as f64;
    let xs: Vec<f64> = hs.iter().map(|h| h.ln()).collect();
    let ys: Vec<f64> = errs.iter().map(|e| e.ln()).collect();
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = xs.iter().map(|x| (x - mx) * (x - mx)).sum();
    sxy / sxx
}

/// `n` path seeds derived from one master seed.
pub fn seeds(n: usize, master: u64) -> Vec<u64>
{
    let mut rng = StdRng::seed_from_u64(master);
    (0..n).map(|_| rng.random()).collect()
}

/// Step sizes `span / 2^k` for `k` in `ks`.
pub fn dyadic_steps(span: f64, ks: std::ops::RangeInclusive<i32>) -> Vec<f64>
{
    ks.map(|k| span * 2f64.powi(-k)).collect()
}

