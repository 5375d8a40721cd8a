//! Initiatives: the read model, creation input and partial-update payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  scoring::Rating,
  tristate::TriState,
  user::UserSummary,
  vote::VoteAggregates,
};

pub const TITLE_MAX_RUNES: usize = 140;
pub const DESCRIPTION_MAX_RUNES: usize = 10_000;

// ─── Read model ──────────────────────────────────────────────────────────────

/// A fully materialised, display-ready initiative.
///
/// `weight` mirrors the persisted column; vote aggregates and the comment
/// count are derived on read. Soft-deleted initiatives are never returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
  pub id:             Uuid,
  pub title:          String,
  pub description:    Option<String>,
  pub author_id:      Uuid,
  pub author:         UserSummary,
  pub assignee_id:    Option<Uuid>,
  pub assignee:       Option<UserSummary>,
  pub value:          Option<Rating>,
  pub speed:          Option<Rating>,
  pub cost:           Option<Rating>,
  pub weight:         f64,
  #[serde(flatten)]
  pub votes:          VoteAggregates,
  pub comments_count: u32,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl Initiative {
  pub fn is_author(&self, user_id: Uuid) -> bool { self.author_id == user_id }

  pub fn is_assignee(&self, user_id: Uuid) -> bool {
    self.assignee_id == Some(user_id)
  }
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// Body of `POST /initiatives`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInitiative {
  pub title:       String,
  pub description: Option<String>,
}

impl NewInitiative {
  /// Trim the title and check both fields; returns the normalised input.
  pub fn validate(self) -> Result<Self> {
    Ok(Self {
      title:       validate_title(&self.title)?,
      description: self.description.map(validate_description).transpose()?,
    })
  }
}

// ─── Partial update ──────────────────────────────────────────────────────────

/// Body of `PATCH /initiatives/:id`, exactly as it arrived on the wire.
///
/// `description`, `value`, `speed` and `cost` treat `null` the same as a
/// missing key. Only `assigneeId` distinguishes the two, so that an assignee
/// can be cleared.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInitiative {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub value:       Option<i64>,
  pub speed:       Option<i64>,
  pub cost:        Option<i64>,
  #[serde(default)]
  pub assignee_id: TriState<Uuid>,
}

impl UpdateInitiative {
  /// Whether the raw payload names an admin-only field at all, valid or not.
  pub fn touches_admin_fields(&self) -> bool {
    self.value.is_some()
      || self.speed.is_some()
      || self.cost.is_some()
      || self.assignee_id.is_present()
  }

  /// Field-scoped validation, failing on the first offending field. Does not
  /// check that an assignee exists; that needs the store.
  pub fn validate(self) -> Result<InitiativePatch> {
    let assignee = match self.assignee_id {
      TriState::Absent => AssigneeChange::Keep,
      TriState::Null => AssigneeChange::Clear,
      TriState::Value(id) => AssigneeChange::Set(id),
      TriState::Invalid(_) => {
        return Err(Error::validation("assigneeId", "invalid uuid"));
      }
    };

    Ok(InitiativePatch {
      title: self.title.as_deref().map(validate_title).transpose()?,
      description: self.description.map(validate_description).transpose()?,
      value: self.value.map(|v| validate_rating("value", v)).transpose()?,
      speed: self.speed.map(|v| validate_rating("speed", v)).transpose()?,
      cost: self.cost.map(|v| validate_rating("cost", v)).transpose()?,
      assignee,
    })
  }
}

/// What to do with the assignee column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssigneeChange {
  #[default]
  Keep,
  Clear,
  Set(Uuid),
}

/// A validated partial update. `None` / [`AssigneeChange::Keep`] leave the
/// stored column untouched. There is no weight here: the store derives it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitiativePatch {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub value:       Option<Rating>,
  pub speed:       Option<Rating>,
  pub cost:        Option<Rating>,
  pub assignee:    AssigneeChange,
}

impl InitiativePatch {
  pub fn is_empty(&self) -> bool { self.changed_fields().is_empty() }

  /// Whether the patch touches a field only admins may change.
  pub fn touches_admin_fields(&self) -> bool {
    self.value.is_some()
      || self.speed.is_some()
      || self.cost.is_some()
      || self.assignee != AssigneeChange::Keep
  }

  /// Whether the stored weight has to be recomputed.
  pub fn touches_scores(&self) -> bool {
    self.value.is_some() || self.speed.is_some() || self.cost.is_some()
  }

  /// Wire names of the fields this patch writes, in a stable order.
  pub fn changed_fields(&self) -> Vec<&'static str> {
    let mut changed = Vec::with_capacity(6);
    if self.title.is_some() {
      changed.push("title");
    }
    if self.description.is_some() {
      changed.push("description");
    }
    if self.value.is_some() {
      changed.push("value");
    }
    if self.speed.is_some() {
      changed.push("speed");
    }
    if self.cost.is_some() {
      changed.push("cost");
    }
    if self.assignee != AssigneeChange::Keep {
      changed.push("assigneeId");
    }
    changed
  }
}

// ─── Field validation ────────────────────────────────────────────────────────

pub fn validate_title(raw: &str) -> Result<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(Error::validation("title", "must not be empty"));
  }
  if trimmed.chars().count() > TITLE_MAX_RUNES {
    return Err(Error::validation(
      "title",
      format!("must not exceed {TITLE_MAX_RUNES} characters"),
    ));
  }
  Ok(trimmed.to_owned())
}

pub fn validate_description(raw: String) -> Result<String> {
  if raw.chars().count() > DESCRIPTION_MAX_RUNES {
    return Err(Error::validation(
      "description",
      format!("must not exceed {DESCRIPTION_MAX_RUNES} characters"),
    ));
  }
  Ok(raw)
}

fn validate_rating(field: &'static str, raw: i64) -> Result<Rating> {
  Rating::new(raw).ok_or_else(|| Error::validation(field, "must be between 1 and 5"))
}
