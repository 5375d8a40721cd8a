//! `InitiativeService`: the operations the HTTP layer calls, on top of any
//! [`IdeaStore`].
//!
//! Every operation takes the authenticated actor explicitly. Validation and
//! authorization failures are returned before the first write.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  comment::{Comment, NewComment},
  initiative::{AssigneeChange, Initiative, NewInitiative, UpdateInitiative},
  query::{ListQuery, Page, Paginated},
  store::IdeaStore,
  user::{AdminPolicy, Profile, User, UserSummary},
  vote::{VoteRequest, apply_aggregates},
};

pub struct InitiativeService<S> {
  store:  Arc<S>,
  admins: Arc<dyn AdminPolicy>,
}

impl<S> Clone for InitiativeService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), admins: Arc::clone(&self.admins) }
  }
}

impl<S: IdeaStore> InitiativeService<S> {
  pub fn new(store: Arc<S>, admins: Arc<dyn AdminPolicy>) -> Self {
    Self { store, admins }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn is_admin(&self, user: &User) -> bool { self.admins.is_admin(user) }

  // ─── Initiatives ───────────────────────────────────────────────────────────

  pub async fn create(&self, actor: &User, input: NewInitiative) -> Result<Initiative> {
    let input = input.validate()?;
    let created = self
      .store
      .create_initiative(input, actor.id)
      .await
      .map_err(Error::store)?;

    tracing::info!(
      initiative_id = %created.id,
      author_id = %actor.id,
      "initiative created"
    );
    Ok(created)
  }

  pub async fn get(&self, actor: &User, id: Uuid) -> Result<Initiative> {
    self
      .store
      .get_initiative_with_votes(id, actor.id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::InitiativeNotFound(id))
  }

  /// Apply a partial update.
  ///
  /// Runs authorizing, validating, loading, assignee resolution, the no-op
  /// check, then a single store write that also reloads the joined row. An
  /// empty payload performs no write at all.
  pub async fn update(
    &self,
    actor: &User,
    id: Uuid,
    payload: UpdateInitiative,
  ) -> Result<Initiative> {
    self.update_if(actor, id, payload, |_| true).await
  }

  /// [`update`](Self::update) guarded by `precondition`, which sees the
  /// loaded initiative once authorization and validation have passed.
  /// A rejected precondition is [`Error::PreconditionFailed`] and writes
  /// nothing.
  pub async fn update_if<P>(
    &self,
    actor: &User,
    id: Uuid,
    payload: UpdateInitiative,
    precondition: P,
  ) -> Result<Initiative>
  where
    P: FnOnce(&Initiative) -> bool,
  {
    if payload.touches_admin_fields() && !self.is_admin(actor) {
      tracing::debug!(initiative_id = %id, actor_id = %actor.id, "non-admin touched admin fields");
      return Err(Error::Forbidden);
    }

    let patch = payload.validate()?;

    let current = self
      .store
      .get_initiative(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::InitiativeNotFound(id))?;

    if !precondition(&current) {
      tracing::debug!(initiative_id = %id, "precondition failed");
      return Err(Error::PreconditionFailed);
    }

    if let AssigneeChange::Set(assignee_id) = patch.assignee {
      let exists = self
        .store
        .get_user(assignee_id)
        .await
        .map_err(Error::store)?
        .is_some();
      if !exists {
        return Err(Error::validation("assigneeId", "unknown user"));
      }
    }

    if patch.is_empty() {
      tracing::debug!(initiative_id = %id, "no changes");
      return self.with_votes(current, actor.id).await;
    }

    let changed = patch.changed_fields();
    let assignee = patch.assignee;

    let updated = self
      .store
      .update_initiative(id, patch)
      .await
      .map_err(Error::store)?
      .ok_or(Error::InitiativeNotFound(id))?;

    tracing::info!(
      initiative_id = %id,
      actor_id = %actor.id,
      changed = ?changed,
      weight = updated.weight,
      "initiative updated"
    );
    if assignee != AssigneeChange::Keep {
      tracing::info!(
        initiative_id = %id,
        old = %assignee_label(current.assignee_id),
        new = %assignee_label(updated.assignee_id),
        "assignee changed"
      );
    }

    self.with_votes(updated, actor.id).await
  }

  /// Admin only. Deleting an already deleted initiative succeeds.
  pub async fn soft_delete(&self, actor: &User, id: Uuid) -> Result<()> {
    if !self.is_admin(actor) {
      return Err(Error::Forbidden);
    }

    match self.store.soft_delete_initiative(id).await.map_err(Error::store)? {
      Some(true) => {
        tracing::info!(initiative_id = %id, actor_id = %actor.id, "initiative deleted");
        Ok(())
      }
      Some(false) => {
        tracing::info!(initiative_id = %id, "initiative already deleted");
        Ok(())
      }
      None => Err(Error::InitiativeNotFound(id)),
    }
  }

  /// One page of initiatives, enriched with a single batch aggregate lookup.
  pub async fn list(&self, actor: &User, query: ListQuery) -> Result<Paginated<Initiative>> {
    let (mut items, total) = self
      .store
      .list_initiatives(&query, actor.id)
      .await
      .map_err(Error::store)?;

    if !items.is_empty() {
      let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
      let lookup = self.store.get_vote_aggregates(&ids, actor.id).await;
      apply_aggregates(&mut items, lookup);
    }

    Ok(Paginated::new(items, total, query.page))
  }

  // ─── Votes ─────────────────────────────────────────────────────────────────

  /// Cast, change or (with `0`) remove the actor's vote, then return the
  /// reloaded initiative.
  pub async fn cast_vote(
    &self,
    actor: &User,
    id: Uuid,
    request: VoteRequest,
  ) -> Result<Initiative> {
    let intent = request.intent()?;

    self.require_live(id).await?;

    let previous = match self.store.get_vote_aggregates(&[id], actor.id).await {
      Ok(map) => map.get(&id).map_or(0, |a| a.current_user_vote),
      Err(e) => {
        tracing::warn!(initiative_id = %id, error = %e, "failed to read previous vote");
        0
      }
    };

    match intent {
      Some(value) => self
        .store
        .upsert_vote(id, actor.id, value)
        .await
        .map_err(Error::store)?,
      None => {
        self.store.delete_vote(id, actor.id).await.map_err(Error::store)?;
      }
    }

    tracing::info!(
      initiative_id = %id,
      user_id = %actor.id,
      prev = previous,
      new = request.value,
      "vote_change"
    );

    let reloaded = self
      .store
      .get_initiative(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::InitiativeNotFound(id))?;
    self.with_votes(reloaded, actor.id).await
  }

  // ─── Comments ──────────────────────────────────────────────────────────────

  pub async fn add_comment(&self, actor: &User, id: Uuid, input: NewComment) -> Result<Comment> {
    let text = input.validate()?;
    self.require_live(id).await?;

    let comment = self
      .store
      .create_comment(id, actor.id, text)
      .await
      .map_err(Error::store)?;
    tracing::info!(initiative_id = %id, comment_id = %comment.id, "comment added");
    Ok(comment)
  }

  pub async fn list_comments(&self, id: Uuid, page: Page) -> Result<Paginated<Comment>> {
    self.require_live(id).await?;
    let (items, total) = self
      .store
      .list_comments(id, page)
      .await
      .map_err(Error::store)?;
    Ok(Paginated::new(items, total, page))
  }

  // ─── Users ─────────────────────────────────────────────────────────────────

  pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
    let users = self.store.list_users().await.map_err(Error::store)?;
    Ok(users.iter().map(User::summary).collect())
  }

  pub fn profile(&self, actor: &User) -> Profile {
    Profile { is_admin: self.is_admin(actor), user: actor.clone() }
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  async fn require_live(&self, id: Uuid) -> Result<()> {
    match self.store.get_initiative(id).await.map_err(Error::store)? {
      Some(_) => Ok(()),
      None => Err(Error::InitiativeNotFound(id)),
    }
  }

  async fn with_votes(&self, mut item: Initiative, caller: Uuid) -> Result<Initiative> {
    let lookup = self.store.get_vote_aggregates(&[item.id], caller).await;
    apply_aggregates(std::slice::from_mut(&mut item), lookup);
    Ok(item)
  }
}

fn assignee_label(id: Option<Uuid>) -> String {
  id.map_or_else(|| "null".to_owned(), |id| id.to_string())
}
