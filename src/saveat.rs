// Copyright 2026 ndarray-diffeq developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SolveError;

/// Which values of the solution to keep.
///
/// Saved values appear in [`Solution::ys`](crate::Solution) in this order:
/// `t0`, then the times of `ts` or of every step, then `t1`. `ts` and
/// `steps` are mutually exclusive. With `dense` the whole trajectory can be
/// evaluated afterwards.
///
/// The default saves only the value at `t1`.
///
/// ```
/// use ndarray_diffeq::SaveAt;
///
/// let saveat = SaveAt::new().t0(true).ts(vec![0.5, 1.5]).dense(true);
/// assert!(saveat.validate(0., 2.).is_ok());
/// assert!(SaveAt::new().ts(vec![0.5]).steps(true).validate(0., 1.).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SaveAt
{
    pub(crate) t0: bool,
    pub(crate) t1: bool,
    pub(crate) ts: Option<Vec<f64>>,
    pub(crate) steps: bool,
    pub(crate) dense: bool,
}

impl Default for SaveAt
{
    fn default() -> Self
    {
        SaveAt::new().t1(true)
    }
}

impl SaveAt
{
    /// Save nothing.
    pub fn new() -> Self
    {
        SaveAt {
            t0: false,
            t1: false,
            ts: None,
            steps: false,
            dense: false,
        }
    }

    /// Save the initial value.
    pub fn t0(mut self, save: bool) -> Self
    {
        self.t0 = save;
        self
    }

    /// Save the final value.
    pub fn t1(mut self, save: bool) -> Self
    {
        self.t1 = save;
        self
    }

    /// Save at these times, ordered in the direction of integration.
    pub fn ts<V>(mut self, ts: V) -> Self
    where V: Into<Vec<f64>>
    {
        self.ts = Some(ts.into());
        self
    }

    /// Save after every accepted step.
    pub fn steps(mut self, save: bool) -> Self
    {
        self.steps = save;
        self
    }

    /// Keep a dense interpolant of the whole solve.
    pub fn dense(mut self, save: bool) -> Self
    {
        self.dense = save;
        self
    }

    /// Check the policy against the interval `[t0, t1]`.
    pub fn validate(&self, t0: f64, t1: f64) -> Result<(), SolveError>
    {
        let Some(ts) = &self.ts else {
            return Ok(());
        };
        if self.steps {
            return Err(SolveError::InvalidSaveAt("ts and steps cannot both be set"));
        }
        let d = (t1 - t0).signum();
        if let Some(&t) = ts.iter().find(|&&t| !(d * t >= d * t0 && d * t <= d * t1)) {
            return Err(SolveError::InvalidGrid(format!("save time {} is outside of [{}, {}]", t, t0, t1)));
        }
        if !ts.windows(2).all(|w| d * w[0] <= d * w[1]) {
            return Err(SolveError::InvalidGrid(
                "save times must be ordered in the direction of integration".to_string(),
            ));
        }
        Ok(())
    }
}
