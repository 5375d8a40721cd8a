//! Weighted ranking score for initiatives.
//!
//! The weight is the only ranking signal persisted on the initiative row. It
//! is a cache of [`weight`]; no other code path computes it.

use serde::{Deserialize, Serialize};

/// An attribute score in `1..=5` (value, speed or cost).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
  pub const MIN: i64 = 1;
  pub const MAX: i64 = 5;

  /// Returns `None` when `raw` falls outside `1..=5`.
  pub fn new(raw: i64) -> Option<Self> {
    (Self::MIN..=Self::MAX)
      .contains(&raw)
      .then(|| Self(raw as u8))
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<i64> for Rating {
  type Error = String;

  fn try_from(raw: i64) -> Result<Self, Self::Error> {
    Self::new(raw).ok_or_else(|| format!("rating {raw} is not between 1 and 5"))
  }
}

impl From<Rating> for i64 {
  fn from(r: Rating) -> Self { i64::from(r.0) }
}

/// `0.5*value + 0.3*speed - 0.2*cost`, rounded half-up to two decimals.
///
/// A missing attribute contributes nothing to its term. When all three are
/// missing the result is exactly `0.0`.
pub fn weight(
  value: Option<Rating>,
  speed: Option<Rating>,
  cost: Option<Rating>,
) -> f64 {
  if value.is_none() && speed.is_none() && cost.is_none() {
    return 0.0;
  }

  let term = |r: Option<Rating>| r.map_or(0.0, |r| f64::from(r.get()));
  let raw = 0.5 * term(value) + 0.3 * term(speed) - 0.2 * term(cost);
  round_half_up(raw)
}

/// Scale by 100, add one half, drop the fraction, scale back.
///
/// `floor` rather than `trunc` so negative weights (cost only) round to the
/// nearest cent instead of toward zero.
fn round_half_up(raw: f64) -> f64 { (raw * 100.0 + 0.5).floor() / 100.0 }
