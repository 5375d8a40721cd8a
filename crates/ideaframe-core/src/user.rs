//! Users as seen by the initiative core, and the admin policy.
//!
//! Users are created and authenticated outside the core. The core only reads
//! them: to resolve authors and assignees, and to decide whether an actor may
//! touch admin-only fields.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:           Uuid,
  pub login:        String,
  pub display_name: String,
  pub email:        String,
  pub created_at:   DateTime<Utc>,
}

impl User {
  pub fn summary(&self) -> UserSummary {
    UserSummary {
      id:           self.id,
      login:        self.login.clone(),
      display_name: self.display_name.clone(),
    }
  }
}

/// The compact, display-safe projection embedded in initiatives and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
  pub id:           Uuid,
  pub login:        String,
  pub display_name: String,
}

/// The authenticated caller as returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  #[serde(flatten)]
  pub user:     User,
  pub is_admin: bool,
}

/// Input to [`crate::store::IdeaStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub login:         String,
  pub display_name:  String,
  pub email:         String,
  /// argon2 PHC string; hashing happens before the store sees it.
  pub password_hash: String,
}

/// A user together with their stored password hash. Used by the
/// authentication layer only; deliberately not `Serialize`.
#[derive(Debug, Clone)]
pub struct UserCredentials {
  pub user:          User,
  pub password_hash: String,
}

// ─── Admin policy ────────────────────────────────────────────────────────────

/// Decides whether a user may mutate admin-only initiative fields
/// (value, speed, cost, assignee) and soft-delete initiatives.
pub trait AdminPolicy: Send + Sync {
  fn is_admin(&self, user: &User) -> bool;
}

/// Admins are the users whose email appears in a configured allowlist.
/// Matching ignores case and surrounding whitespace.
#[derive(Debug, Clone, Default)]
pub struct EmailAllowlist {
  emails: HashSet<String>,
}

impl EmailAllowlist {
  pub fn new<I, E>(emails: I) -> Self
  where
    I: IntoIterator<Item = E>,
    E: AsRef<str>,
  {
    let emails = emails
      .into_iter()
      .map(|e| normalize_email(e.as_ref()))
      .filter(|e| !e.is_empty())
      .collect();
    Self { emails }
  }

  pub fn contains(&self, email: &str) -> bool {
    self.emails.contains(&normalize_email(email))
  }

  pub fn len(&self) -> usize { self.emails.len() }

  pub fn is_empty(&self) -> bool { self.emails.is_empty() }
}

impl AdminPolicy for EmailAllowlist {
  fn is_admin(&self, user: &User) -> bool { self.contains(&user.email) }
}

fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }
