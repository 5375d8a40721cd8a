//! Votes and vote aggregates.
//!
//! Each user holds at most one live vote per initiative. Aggregates are never
//! stored on the initiative; they are computed from the vote rows on read,
//! always in one batch per page.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, initiative::Initiative};

/// A stored vote. "No vote" is the absence of a row, never a zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum VoteValue {
  Up,
  Down,
}

impl VoteValue {
  pub fn as_i8(self) -> i8 {
    match self {
      Self::Up => 1,
      Self::Down => -1,
    }
  }
}

impl From<VoteValue> for i8 {
  fn from(v: VoteValue) -> Self { v.as_i8() }
}

impl TryFrom<i8> for VoteValue {
  type Error = String;

  fn try_from(raw: i8) -> Result<Self, Self::Error> {
    match raw {
      1 => Ok(Self::Up),
      -1 => Ok(Self::Down),
      other => Err(format!("invalid stored vote value: {other}")),
    }
  }
}

/// Body of a vote request: `1` up, `-1` down, `0` remove.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VoteRequest {
  pub value: i64,
}

impl VoteRequest {
  /// `Ok(None)` means "remove my vote".
  pub fn intent(&self) -> Result<Option<VoteValue>> {
    match self.value {
      1 => Ok(Some(VoteValue::Up)),
      -1 => Ok(Some(VoteValue::Down)),
      0 => Ok(None),
      _ => Err(Error::validation("value", "must be -1, 0, or 1")),
    }
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// Vote summary for one initiative from one caller's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAggregates {
  pub up_votes:          u32,
  pub down_votes:        u32,
  /// Always `up_votes - down_votes`.
  pub vote_score:        i64,
  /// The caller's own vote: `-1`, `0` (none) or `1`.
  pub current_user_vote: i8,
}

impl VoteAggregates {
  pub fn new(up_votes: u32, down_votes: u32, current_user_vote: Option<VoteValue>) -> Self {
    Self {
      up_votes,
      down_votes,
      vote_score: i64::from(up_votes) - i64::from(down_votes),
      current_user_vote: current_user_vote.map_or(0, VoteValue::as_i8),
    }
  }
}

pub type AggregateMap = HashMap<Uuid, VoteAggregates>;

/// One tallied row as produced by a grouped storage query.
#[derive(Debug, Clone, Copy)]
pub struct VoteTally {
  pub initiative_id: Uuid,
  pub up_votes:      u32,
  pub down_votes:    u32,
  pub caller_vote:   Option<VoteValue>,
}

/// Build the aggregate map for `ids`, with a zeroed entry for every id that
/// has no tally. Tallies for ids outside `ids` are ignored.
pub fn aggregate(ids: &[Uuid], tallies: impl IntoIterator<Item = VoteTally>) -> AggregateMap {
  let mut map: AggregateMap =
    ids.iter().map(|id| (*id, VoteAggregates::default())).collect();

  for t in tallies {
    if let Some(slot) = map.get_mut(&t.initiative_id) {
      *slot = VoteAggregates::new(t.up_votes, t.down_votes, t.caller_vote);
    }
  }
  map
}

/// Copy aggregates onto `items`.
///
/// A failed lookup is a secondary metric failing: it is logged and the items
/// keep zeroed aggregates instead of failing the whole read.
pub fn apply_aggregates<E>(items: &mut [Initiative], lookup: Result<AggregateMap, E>)
where
  E: std::fmt::Display,
{
  match lookup {
    Ok(map) => {
      for item in items.iter_mut() {
        item.votes = map.get(&item.id).copied().unwrap_or_default();
      }
    }
    Err(e) => {
      tracing::warn!(error = %e, count = items.len(), "failed to load vote aggregates");
      for item in items.iter_mut() {
        item.votes = VoteAggregates::default();
      }
    }
  }
}
