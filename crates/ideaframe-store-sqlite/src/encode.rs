//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width so
//! that lexicographic order matches chronological order. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use ideaframe_core::{
  comment::Comment,
  initiative::Initiative,
  scoring::Rating,
  user::{User, UserSummary},
  vote::{VoteAggregates, VoteTally, VoteValue},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Scores and votes ────────────────────────────────────────────────────────

pub fn decode_rating(column: &str, raw: Option<i64>) -> Result<Option<Rating>> {
  raw
    .map(|v| {
      Rating::new(v).ok_or_else(|| Error::InvalidValue(format!("{column} = {v}")))
    })
    .transpose()
}

pub fn decode_vote(raw: Option<i64>) -> Result<Option<VoteValue>> {
  raw
    .map(|v| {
      i8::try_from(v)
        .ok()
        .and_then(|v| VoteValue::try_from(v).ok())
        .ok_or_else(|| Error::InvalidValue(format!("vote = {v}")))
    })
    .transpose()
}

fn decode_count(column: &str, raw: i64) -> Result<u32> {
  u32::try_from(raw).map_err(|_| Error::InvalidValue(format!("{column} = {raw}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawInitiative::from_row`]. Callers append their own
/// conditions after the `WHERE`.
pub const INITIATIVE_SELECT: &str = "
SELECT
  i.initiative_id, i.title, i.description,
  i.author_id, au.login, au.display_name,
  i.assignee_id, asg.login, asg.display_name,
  i.value, i.speed, i.cost, i.weight,
  (SELECT COUNT(*) FROM comments c WHERE c.initiative_id = i.initiative_id),
  i.created_at, i.updated_at
FROM initiatives i
JOIN users au       ON au.user_id  = i.author_id
LEFT JOIN users asg ON asg.user_id = i.assignee_id
WHERE i.is_deleted = 0";

/// Raw values read from an `initiatives` row joined with its users.
pub struct RawInitiative {
  pub initiative_id:         String,
  pub title:                 String,
  pub description:           Option<String>,
  pub author_id:             String,
  pub author_login:          String,
  pub author_display_name:   String,
  pub assignee_id:           Option<String>,
  pub assignee_login:        Option<String>,
  pub assignee_display_name: Option<String>,
  pub value:                 Option<i64>,
  pub speed:                 Option<i64>,
  pub cost:                  Option<i64>,
  pub weight:                f64,
  pub comments_count:        i64,
  pub created_at:            String,
  pub updated_at:            String,
}

impl RawInitiative {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      initiative_id:         row.get(0)?,
      title:                 row.get(1)?,
      description:           row.get(2)?,
      author_id:             row.get(3)?,
      author_login:          row.get(4)?,
      author_display_name:   row.get(5)?,
      assignee_id:           row.get(6)?,
      assignee_login:        row.get(7)?,
      assignee_display_name: row.get(8)?,
      value:                 row.get(9)?,
      speed:                 row.get(10)?,
      cost:                  row.get(11)?,
      weight:                row.get(12)?,
      comments_count:        row.get(13)?,
      created_at:            row.get(14)?,
      updated_at:            row.get(15)?,
    })
  }

  /// Decode into an [`Initiative`] with zeroed vote aggregates.
  pub fn into_initiative(self) -> Result<Initiative> {
    let author_id = decode_uuid(&self.author_id)?;
    let assignee_id = self.assignee_id.as_deref().map(decode_uuid).transpose()?;

    let assignee = match (assignee_id, self.assignee_login, self.assignee_display_name) {
      (Some(id), Some(login), Some(display_name)) => {
        Some(UserSummary { id, login, display_name })
      }
      _ => None,
    };

    Ok(Initiative {
      id: decode_uuid(&self.initiative_id)?,
      title: self.title,
      description: self.description,
      author_id,
      author: UserSummary {
        id:           author_id,
        login:        self.author_login,
        display_name: self.author_display_name,
      },
      assignee_id,
      assignee,
      value: decode_rating("value", self.value)?,
      speed: decode_rating("speed", self.speed)?,
      cost: decode_rating("cost", self.cost)?,
      weight: self.weight,
      votes: VoteAggregates::default(),
      comments_count: decode_count("comments_count", self.comments_count)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const USER_COLUMNS: &str = "user_id, login, display_name, email, created_at";

/// Raw strings read from a `users` row (see [`USER_COLUMNS`]).
pub struct RawUser {
  pub user_id:      String,
  pub login:        String,
  pub display_name: String,
  pub email:        String,
  pub created_at:   String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      login:        row.get(1)?,
      display_name: row.get(2)?,
      email:        row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:           decode_uuid(&self.user_id)?,
      login:        self.login,
      display_name: self.display_name,
      email:        self.email,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const COMMENT_SELECT: &str = "
SELECT c.comment_id, c.initiative_id, c.text, c.author_id, u.login, u.display_name, c.created_at
FROM comments c
JOIN users u ON u.user_id = c.author_id";

/// Raw strings read from a `comments` row joined with its author.
pub struct RawComment {
  pub comment_id:          String,
  pub initiative_id:       String,
  pub text:                String,
  pub author_id:           String,
  pub author_login:        String,
  pub author_display_name: String,
  pub created_at:          String,
}

impl RawComment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:          row.get(0)?,
      initiative_id:       row.get(1)?,
      text:                row.get(2)?,
      author_id:           row.get(3)?,
      author_login:        row.get(4)?,
      author_display_name: row.get(5)?,
      created_at:          row.get(6)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      id:            decode_uuid(&self.comment_id)?,
      initiative_id: decode_uuid(&self.initiative_id)?,
      text:          self.text,
      author:        UserSummary {
        id:           decode_uuid(&self.author_id)?,
        login:        self.author_login,
        display_name: self.author_display_name,
      },
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// One row of the grouped vote query.
pub struct RawTally {
  pub initiative_id: String,
  pub up_votes:      i64,
  pub down_votes:    i64,
  pub caller_vote:   Option<i64>,
}

impl RawTally {
  pub fn into_tally(self) -> Result<VoteTally> {
    Ok(VoteTally {
      initiative_id: decode_uuid(&self.initiative_id)?,
      up_votes:      decode_count("up_votes", self.up_votes)?,
      down_votes:    decode_count("down_votes", self.down_votes)?,
      caller_vote:   decode_vote(self.caller_vote)?,
    })
  }
}
