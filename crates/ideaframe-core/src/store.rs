//! The `IdeaStore` trait: everything the core needs from persistence.
//!
//! Implemented by storage backends (e.g. `ideaframe-store-sqlite`). The
//! service layer and the HTTP crates depend on this abstraction only.

use std::future::Future;

use uuid::Uuid;

use crate::{
  comment::Comment,
  initiative::{Initiative, InitiativePatch, NewInitiative},
  query::{ListQuery, Page},
  user::{NewUser, User, UserCredentials},
  vote::{AggregateMap, VoteValue},
};

/// Abstraction over an IdeaFrame storage backend.
///
/// Every write is its own atomic unit; no method expects a transaction to
/// span calls. Soft-deleted initiatives behave as if they did not exist for
/// every read and write except [`IdeaStore::soft_delete_initiative`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait IdeaStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Health ────────────────────────────────────────────────────────────

  /// Cheap round trip to the backend.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. Fails if the login is already taken.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look up a user and their password hash by login.
  fn find_credentials<'a>(
    &'a self,
    login: &'a str,
  ) -> impl Future<Output = Result<Option<UserCredentials>, Self::Error>> + Send + 'a;

  /// All users, ordered by display name.
  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Initiatives ───────────────────────────────────────────────────────

  /// Insert a validated initiative authored by `author_id`. The store sets
  /// the timestamps and the initial weight.
  fn create_initiative(
    &self,
    input: NewInitiative,
    author_id: Uuid,
  ) -> impl Future<Output = Result<Initiative, Self::Error>> + Send + '_;

  /// Fetch one initiative with zeroed vote aggregates. `None` if missing or
  /// soft-deleted.
  fn get_initiative(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Initiative>, Self::Error>> + Send + '_;

  /// Like [`IdeaStore::get_initiative`], with aggregates for `caller`.
  fn get_initiative_with_votes(
    &self,
    id: Uuid,
    caller: Uuid,
  ) -> impl Future<Output = Result<Option<Initiative>, Self::Error>> + Send + '_;

  /// Write only the fields present in `patch`, recompute the weight from the
  /// resulting value/speed/cost, and return the reloaded row (aggregates
  /// zeroed). `None` if missing or soft-deleted.
  fn update_initiative(
    &self,
    id: Uuid,
    patch: InitiativePatch,
  ) -> impl Future<Output = Result<Option<Initiative>, Self::Error>> + Send + '_;

  /// `Some(true)` if the row was flipped to deleted, `Some(false)` if it was
  /// already deleted, `None` if it never existed.
  fn soft_delete_initiative(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<bool>, Self::Error>> + Send + '_;

  /// One page of base rows (aggregates zeroed) plus the total number of
  /// rows matching the filter.
  fn list_initiatives<'a>(
    &'a self,
    query: &'a ListQuery,
    caller: Uuid,
  ) -> impl Future<Output = Result<(Vec<Initiative>, u64), Self::Error>> + Send + 'a;

  // ── Votes ─────────────────────────────────────────────────────────────

  /// Insert or overwrite the caller's vote in a single conflict-handling
  /// statement.
  fn upsert_vote(
    &self,
    initiative_id: Uuid,
    user_id: Uuid,
    value: VoteValue,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove the caller's vote. Returns whether a row existed; a missing row
  /// is not an error.
  fn delete_vote(
    &self,
    initiative_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Aggregates for every id in `ids`, zero-filled, from `caller`'s view.
  fn get_vote_aggregates<'a>(
    &'a self,
    ids: &'a [Uuid],
    caller: Uuid,
  ) -> impl Future<Output = Result<AggregateMap, Self::Error>> + Send + 'a;

  // ── Comments ──────────────────────────────────────────────────────────

  fn create_comment(
    &self,
    initiative_id: Uuid,
    author_id: Uuid,
    text: String,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Comments oldest first, plus the total count for the initiative.
  fn list_comments(
    &self,
    initiative_id: Uuid,
    page: Page,
  ) -> impl Future<Output = Result<(Vec<Comment>, u64), Self::Error>> + Send + '_;
}
