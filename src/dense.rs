// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Continuous output between accepted steps.

use crate::error::SolveError;
use crate::state::State;

/// Local interpolant of a single step, in terms of the normalised time
/// `θ = (t - t0) / (t1 - t0) ∈ [0, 1]`.
#[derive(Clone, Debug)]
pub enum DenseSegment<Y>
{
    /// Straight line between the endpoints.
    Linear { y0: Y, y1: Y },
    /// Cubic Hermite polynomial. `k0` and `k1` are the increments
    /// `(t1 - t0) y'(t0)` and `(t1 - t0) y'(t1)`.
    Hermite { y0: Y, y1: Y, k0: Y, k1: Y },
    /// Fourth order continuous extension of Tsitouras' 5(4) method from its
    /// seven stage increments.
    Tsit5 { y0: Y, k: Vec<Y> },
}

impl<Y> DenseSegment<Y>
where Y: State
{
    pub fn evaluate(&self, theta: f64) -> Y
    {
        match self {
            DenseSegment::Linear { y0, y1 } => y0.add_scaled(theta, &y1.sub(y0)),
            DenseSegment::Hermite { y0, y1, k0, k1 } => {
                let t2 = theta * theta;
                let t3 = t2 * theta;
                let h00 = 2. * t3 - 3. * t2 + 1.;
                let h10 = t3 - 2. * t2 + theta;
                let h01 = -2. * t3 + 3. * t2;
                let h11 = t3 - t2;
                y0.scale(h00)
                    .add_scaled(h10, k0)
                    .add_scaled(h01, y1)
                    .add_scaled(h11, k1)
            }
            DenseSegment::Tsit5 { y0, k } => tsit5_weights(theta)
                .iter()
                .zip(k)
                .fold(y0.clone(), |acc, (&b, ki)| acc.add_scaled(b, ki)),
        }
    }

    /// `dy/dt` at `θ`, for a step of signed length `dt`.
    pub fn derivative(&self, theta: f64, dt: f64) -> Result<Y, SolveError>
    {
        match self {
            DenseSegment::Linear { y0, y1 } => Ok(y1.sub(y0).scale(1. / dt)),
            DenseSegment::Hermite { y0, y1, k0, k1 } => {
                let t2 = theta * theta;
                let d00 = 6. * t2 - 6. * theta;
                let d10 = 3. * t2 - 4. * theta + 1.;
                let d01 = -d00;
                let d11 = 3. * t2 - 2. * theta;
                Ok(y0
                    .scale(d00)
                    .add_scaled(d10, k0)
                    .add_scaled(d01, y1)
                    .add_scaled(d11, k1)
                    .scale(1. / dt))
            }
            DenseSegment::Tsit5 { .. } => Err(SolveError::DerivativeNotSupported),
        }
    }
}

/// Weights `b_i(θ)` of the Tsit5 continuous extension.
fn tsit5_weights(t: f64) -> [f64; 7]
{
    let t2 = t * t;
    [
        -1.0530884977290216 * t * (t - 1.3299890189751412) * (t2 - 1.4364028541716351 * t + 0.7139816917074209),
        0.1017 * t2 * (t2 - 2.1966568338249754 * t + 1.2949852507374631),
        2.490627285651252793 * t2 * (t2 - 2.38535645472061657 * t + 1.57803468208092486),
        -16.54810288924490272 * (t - 1.21712927295533244) * (t - 0.61620406037800089) * t2,
        47.37952196281928122 * (t - 1.203071208372362603) * (t - 0.658047292653547382) * t2,
        -34.87065786149660974 * (t - 1.2) * (t - 0.666666666666666667) * t2,
        2.5 * (t - 1.) * (t - 0.6) * t2,
    ]
}

/// Piecewise interpolant over the whole solve: one [`DenseSegment`] per
/// accepted step, contiguous and ordered in the direction of integration.
#[derive(Clone, Debug)]
pub struct DenseInterpolation<Y>
{
    /// Step boundaries, one more than there are segments.
    ts: Vec<f64>,
    segments: Vec<DenseSegment<Y>>,
    direction: f64,
}

impl<Y> DenseInterpolation<Y>
where Y: State
{
    pub(crate) fn new(t0: f64, direction: f64) -> Self
    {
        DenseInterpolation {
            ts: vec![t0],
            segments: Vec::new(),
            direction,
        }
    }

    /// Append the interpolant of the step ending at `t1`.
    pub(crate) fn push(&mut self, t1: f64, segment: DenseSegment<Y>)
    {
        self.ts.push(t1);
        self.segments.push(segment);
    }

    pub fn t0(&self) -> f64
    {
        self.ts[0]
    }

    pub fn t1(&self) -> f64
    {
        self.ts[self.ts.len() - 1]
    }

    /// Boundaries of the accepted steps.
    pub fn step_times(&self) -> &[f64]
    {
        &self.ts
    }

    /// The interpolated solution at `t`.
    ///
    /// **Errors** if `t` is outside of the solved interval.
    pub fn evaluate(&self, t: f64) -> Result<Y, SolveError>
    {
        let (i, theta) = self.locate(t)?;
        Ok(self.segments[i].evaluate(theta))
    }

    /// The derivative of the interpolated solution at `t`.
    ///
    /// **Errors** if `t` is outside of the solved interval, or if the
    /// interpolant only supports values.
    pub fn derivative(&self, t: f64) -> Result<Y, SolveError>
    {
        let (i, theta) = self.locate(t)?;
        self.segments[i].derivative(theta, self.ts[i + 1] - self.ts[i])
    }

    /// Index of the segment containing `t` and the normalised time inside it.
    fn locate(&self, t: f64) -> Result<(usize, f64), SolveError>
    {
        let d = self.direction;
        let (t0, t1) = (self.t0(), self.t1());
        if self.segments.is_empty() || !(d * t >= d * t0 && d * t <= d * t1) {
            return Err(SolveError::OutOfDomain { t, t0, t1 });
        }
        let ends = &self.ts[1..];
        let i = ends
            .partition_point(|&s| d * s < d * t)
            .min(self.segments.len() - 1);
        let theta = (t - self.ts[i]) / (self.ts[i + 1] - self.ts[i]);
        Ok((i, theta))
    }
}
