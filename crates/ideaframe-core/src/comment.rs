//! Comments on initiatives. Immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, user::UserSummary};

pub const TEXT_MAX_CHARS: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub id:            Uuid,
  pub initiative_id: Uuid,
  pub text:          String,
  pub author:        UserSummary,
  pub created_at:    DateTime<Utc>,
}

/// Body of `POST /initiatives/:id/comments`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
  pub text: String,
}

impl NewComment {
  /// Returns the trimmed text, which must hold 1 to 1000 characters.
  pub fn validate(self) -> Result<String> {
    let text = self.text.trim();
    let len = text.chars().count();
    if len == 0 || len > TEXT_MAX_CHARS {
      return Err(Error::validation(
        "text",
        format!("must be between 1 and {TEXT_MAX_CHARS} characters"),
      ));
    }
    Ok(text.to_owned())
  }
}
