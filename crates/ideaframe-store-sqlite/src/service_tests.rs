//! `InitiativeService` scenarios run against a real in-memory store.
//!
//! [`CountingStore`] wraps `SqliteStore`, counts every write call and can be
//! told to fail aggregate lookups.

use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicUsize, Ordering},
};

use ideaframe_core::{
  Error as CoreError, InitiativeService,
  comment::{Comment, NewComment},
  initiative::{Initiative, InitiativePatch, NewInitiative, UpdateInitiative},
  query::{ListQuery, ListSort, Page},
  store::IdeaStore,
  user::{EmailAllowlist, NewUser, User, UserCredentials},
  vote::{AggregateMap, VoteRequest, VoteValue},
};
use uuid::Uuid;

use crate::{Error, Result, SqliteStore};

// ─── Spy store ───────────────────────────────────────────────────────────────

struct CountingStore {
  inner:           SqliteStore,
  writes:          AtomicUsize,
  aggregate_calls: AtomicUsize,
  fail_aggregates: AtomicBool,
}

impl CountingStore {
  fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

  fn aggregate_calls(&self) -> usize { self.aggregate_calls.load(Ordering::SeqCst) }

  fn wrote(&self) { self.writes.fetch_add(1, Ordering::SeqCst); }
}

impl IdeaStore for CountingStore {
  type Error = Error;

  async fn ping(&self) -> Result<()> { self.inner.ping().await }

  async fn add_user(&self, input: NewUser) -> Result<User> {
    self.wrote();
    self.inner.add_user(input).await
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> { self.inner.get_user(id).await }

  async fn find_credentials(&self, login: &str) -> Result<Option<UserCredentials>> {
    self.inner.find_credentials(login).await
  }

  async fn list_users(&self) -> Result<Vec<User>> { self.inner.list_users().await }

  async fn create_initiative(&self, input: NewInitiative, author_id: Uuid) -> Result<Initiative> {
    self.wrote();
    self.inner.create_initiative(input, author_id).await
  }

  async fn get_initiative(&self, id: Uuid) -> Result<Option<Initiative>> {
    self.inner.get_initiative(id).await
  }

  async fn get_initiative_with_votes(&self, id: Uuid, caller: Uuid) -> Result<Option<Initiative>> {
    if self.fail_aggregates.load(Ordering::SeqCst) {
      return Err(Error::InvalidValue("aggregates unavailable".into()));
    }
    self.inner.get_initiative_with_votes(id, caller).await
  }

  async fn update_initiative(&self, id: Uuid, patch: InitiativePatch) -> Result<Option<Initiative>> {
    self.wrote();
    self.inner.update_initiative(id, patch).await
  }

  async fn soft_delete_initiative(&self, id: Uuid) -> Result<Option<bool>> {
    self.wrote();
    self.inner.soft_delete_initiative(id).await
  }

  async fn list_initiatives(&self, query: &ListQuery, caller: Uuid) -> Result<(Vec<Initiative>, u64)> {
    self.inner.list_initiatives(query, caller).await
  }

  async fn upsert_vote(&self, initiative_id: Uuid, user_id: Uuid, value: VoteValue) -> Result<()> {
    self.wrote();
    self.inner.upsert_vote(initiative_id, user_id, value).await
  }

  async fn delete_vote(&self, initiative_id: Uuid, user_id: Uuid) -> Result<bool> {
    self.wrote();
    self.inner.delete_vote(initiative_id, user_id).await
  }

  async fn get_vote_aggregates(&self, ids: &[Uuid], caller: Uuid) -> Result<AggregateMap> {
    self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_aggregates.load(Ordering::SeqCst) {
      return Err(Error::InvalidValue("aggregates unavailable".into()));
    }
    self.inner.get_vote_aggregates(ids, caller).await
  }

  async fn create_comment(&self, initiative_id: Uuid, author_id: Uuid, text: String) -> Result<Comment> {
    self.wrote();
    self.inner.create_comment(initiative_id, author_id, text).await
  }

  async fn list_comments(&self, initiative_id: Uuid, page: Page) -> Result<(Vec<Comment>, u64)> {
    self.inner.list_comments(initiative_id, page).await
  }
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

struct Fixture {
  store:   Arc<CountingStore>,
  service: InitiativeService<CountingStore>,
  admin:   User,
  alice:   User,
  bob:     User,
}

impl Fixture {
  async fn new() -> Self {
    let store = Arc::new(CountingStore {
      inner:           SqliteStore::open_in_memory().await.unwrap(),
      writes:          AtomicUsize::new(0),
      aggregate_calls: AtomicUsize::new(0),
      fail_aggregates: AtomicBool::new(false),
    });
    let service = InitiativeService::new(
      Arc::clone(&store),
      Arc::new(EmailAllowlist::new(["Admin@Example.com"])),
    );

    let add = |login: &str| {
      let store = Arc::clone(&store);
      let login = login.to_owned();
      async move {
        store
          .add_user(NewUser {
            email:         format!("{login}@example.com"),
            display_name:  login.to_uppercase(),
            password_hash: "hash".into(),
            login,
          })
          .await
          .unwrap()
      }
    };
    let admin = add("admin").await;
    let alice = add("alice").await;
    let bob = add("bob").await;

    Self { store, service, admin, alice, bob }
  }

  async fn create(&self, title: &str) -> Initiative {
    self
      .service
      .create(&self.alice, NewInitiative { title: title.into(), description: None })
      .await
      .unwrap()
  }

  async fn patch(&self, actor: &User, id: Uuid, json: &str) -> Result<Initiative, CoreError> {
    let payload: UpdateInitiative = serde_json::from_str(json).unwrap();
    self.service.update(actor, id, payload).await
  }

  async fn vote(&self, actor: &User, id: Uuid, value: i64) -> Result<Initiative, CoreError> {
    self.service.cast_vote(actor, id, VoteRequest { value }).await
  }
}

fn validation_field(err: CoreError) -> (&'static str, String) {
  match err {
    CoreError::Validation { field, message } => (field, message),
    other => panic!("expected validation error, got {other:?}"),
  }
}

// ─── Update state machine ────────────────────────────────────────────────────

#[tokio::test]
async fn admin_scoring_end_to_end() {
  let f = Fixture::new().await;
  let created = f.create("Improve onboarding").await;
  assert_eq!(created.weight, 0.0);

  let updated = f
    .patch(&f.admin, created.id, r#"{"value":5,"speed":3,"cost":2}"#)
    .await
    .unwrap();
  assert_eq!(updated.weight, 3.0);
  assert_eq!(updated.title, "Improve onboarding");
  assert_eq!(updated.author, f.alice.summary());
}

#[tokio::test]
async fn non_admin_may_edit_title_only() {
  let f = Fixture::new().await;
  let created = f.create("Draft").await;

  let updated = f.patch(&f.bob, created.id, r#"{"title":"  Final "}"#).await.unwrap();
  assert_eq!(updated.title, "Final");
}

#[tokio::test]
async fn non_admin_touching_scores_is_forbidden() {
  let f = Fixture::new().await;
  let created = f.create("Guarded").await;
  let before = f.store.writes();

  for json in [
    r#"{"title":"ok","value":3}"#,
    r#"{"title":"","value":3}"#,
    r#"{"cost":9}"#,
    r#"{"assigneeId":null}"#,
    r#"{"assigneeId":"not-a-uuid"}"#,
  ] {
    let err = f.patch(&f.bob, created.id, json).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden), "{json}: {err:?}");
  }
  assert_eq!(f.store.writes(), before);
}

#[tokio::test]
async fn validation_errors_name_the_field() {
  let f = Fixture::new().await;
  let created = f.create("Checked").await;

  let (field, _) = validation_field(f.patch(&f.admin, created.id, r#"{"title":"   "}"#).await.unwrap_err());
  assert_eq!(field, "title");

  let (field, _) = validation_field(f.patch(&f.admin, created.id, r#"{"speed":0}"#).await.unwrap_err());
  assert_eq!(field, "speed");

  let (field, message) =
    validation_field(f.patch(&f.admin, created.id, r#"{"assigneeId":"nope"}"#).await.unwrap_err());
  assert_eq!((field, message.as_str()), ("assigneeId", "invalid uuid"));
}

#[tokio::test]
async fn unknown_assignee_is_rejected_before_writing() {
  let f = Fixture::new().await;
  let created = f.create("Orphan").await;
  let before = f.store.writes();

  let json = format!(r#"{{"assigneeId":"{}"}}"#, Uuid::new_v4());
  let (field, message) = validation_field(f.patch(&f.admin, created.id, &json).await.unwrap_err());
  assert_eq!((field, message.as_str()), ("assigneeId", "unknown user"));
  assert_eq!(f.store.writes(), before);
}

#[tokio::test]
async fn assignee_tri_state_over_the_wire() {
  let f = Fixture::new().await;
  let created = f.create("Owner").await;

  let json = format!(r#"{{"assigneeId":"{}"}}"#, f.bob.id);
  let assigned = f.patch(&f.admin, created.id, &json).await.unwrap();
  assert_eq!(assigned.assignee, Some(f.bob.summary()));

  // Omitting the key keeps the assignee.
  let kept = f.patch(&f.admin, created.id, r#"{"value":2}"#).await.unwrap();
  assert_eq!(kept.assignee_id, Some(f.bob.id));

  let cleared = f.patch(&f.admin, created.id, r#"{"assigneeId":null}"#).await.unwrap();
  assert_eq!(cleared.assignee_id, None);
}

#[tokio::test]
async fn empty_payload_writes_nothing() {
  let f = Fixture::new().await;
  let created = f.create("Untouched").await;
  let before = f.store.writes();

  let same = f.patch(&f.bob, created.id, "{}").await.unwrap();
  assert_eq!(same, created);

  let same = f.patch(&f.bob, created.id, r#"{"description":null}"#).await.unwrap();
  assert_eq!(same.updated_at, created.updated_at);
  assert_eq!(f.store.writes(), before);
}

#[tokio::test]
async fn precondition_runs_after_authorization_and_validation() {
  let f = Fixture::new().await;
  let created = f.create("Contended").await;
  let before = f.store.writes();
  let stale = |_: &Initiative| false;

  let payload = |json: &str| serde_json::from_str::<UpdateInitiative>(json).unwrap();

  let err = f.service.update_if(&f.bob, created.id, payload(r#"{"value":3}"#), stale).await.unwrap_err();
  assert!(matches!(err, CoreError::Forbidden), "{err:?}");

  let err = f.service.update_if(&f.bob, created.id, payload(r#"{"title":""}"#), stale).await.unwrap_err();
  assert_eq!(validation_field(err).0, "title");

  let err = f.service.update_if(&f.bob, created.id, payload(r#"{"title":"Late"}"#), stale).await.unwrap_err();
  assert!(matches!(err, CoreError::PreconditionFailed), "{err:?}");
  assert_eq!(f.store.writes(), before);

  let updated = f
    .service
    .update_if(&f.bob, created.id, payload(r#"{"title":"On time"}"#), |current| {
      current.updated_at == created.updated_at
    })
    .await
    .unwrap();
  assert_eq!(updated.title, "On time");
}

#[tokio::test]
async fn update_missing_initiative_is_not_found() {
  let f = Fixture::new().await;
  let id = Uuid::new_v4();
  let err = f.patch(&f.admin, id, r#"{"title":"x"}"#).await.unwrap_err();
  assert!(matches!(err, CoreError::InitiativeNotFound(missing) if missing == id));
}

#[tokio::test]
async fn update_returns_callers_vote_view() {
  let f = Fixture::new().await;
  let created = f.create("Popular").await;
  f.vote(&f.bob, created.id, 1).await.unwrap();

  let updated = f.patch(&f.bob, created.id, r#"{"description":"more"}"#).await.unwrap();
  assert_eq!(updated.votes.up_votes, 1);
  assert_eq!(updated.votes.current_user_vote, 1);
  assert_eq!(updated.description.as_deref(), Some("more"));
}

// ─── Soft delete ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_is_admin_only_and_repeatable() {
  let f = Fixture::new().await;
  let created = f.create("Gone").await;

  let err = f.service.soft_delete(&f.alice, created.id).await.unwrap_err();
  assert!(matches!(err, CoreError::Forbidden));

  f.service.soft_delete(&f.admin, created.id).await.unwrap();
  f.service.soft_delete(&f.admin, created.id).await.unwrap();

  let err = f.service.get(&f.alice, created.id).await.unwrap_err();
  assert!(matches!(err, CoreError::InitiativeNotFound(_)));

  let err = f.service.soft_delete(&f.admin, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, CoreError::InitiativeNotFound(_)));
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn voting_twice_is_idempotent() {
  let f = Fixture::new().await;
  let created = f.create("Vote me").await;

  f.vote(&f.bob, created.id, 1).await.unwrap();
  let again = f.vote(&f.bob, created.id, 1).await.unwrap();
  assert_eq!(again.votes.up_votes, 1);
  assert_eq!(again.votes.down_votes, 0);
  assert_eq!(again.votes.current_user_vote, 1);
}

#[tokio::test]
async fn voting_zero_removes_and_repeats_quietly() {
  let f = Fixture::new().await;
  let created = f.create("Undo").await;

  f.vote(&f.bob, created.id, 1).await.unwrap();
  let removed = f.vote(&f.bob, created.id, 0).await.unwrap();
  assert_eq!(removed.votes.up_votes, 0);
  assert_eq!(removed.votes.current_user_vote, 0);

  let again = f.vote(&f.bob, created.id, 0).await.unwrap();
  assert_eq!(again.votes.vote_score, 0);
}

#[tokio::test]
async fn opposing_votes_cancel_until_one_is_withdrawn() {
  let f = Fixture::new().await;
  let created = f.create("Split").await;

  f.vote(&f.alice, created.id, 1).await.unwrap();
  let split = f.vote(&f.bob, created.id, -1).await.unwrap();
  assert_eq!((split.votes.up_votes, split.votes.down_votes, split.votes.vote_score), (1, 1, 0));
  assert_eq!(split.votes.current_user_vote, -1);

  let after = f.vote(&f.alice, created.id, 0).await.unwrap();
  assert_eq!(after.votes.vote_score, -1);

  let after = f.vote(&f.bob, created.id, 0).await.unwrap();
  assert_eq!(after.votes.vote_score, 0);
}

#[tokio::test]
async fn out_of_range_vote_is_a_validation_error() {
  let f = Fixture::new().await;
  let created = f.create("Bounds").await;
  let before = f.store.writes();

  let (field, _) = validation_field(f.vote(&f.bob, created.id, 2).await.unwrap_err());
  assert_eq!(field, "value");
  assert_eq!(f.store.writes(), before);
}

#[tokio::test]
async fn voting_on_deleted_initiative_is_not_found() {
  let f = Fixture::new().await;
  let created = f.create("Closed").await;
  f.service.soft_delete(&f.admin, created.id).await.unwrap();

  let err = f.vote(&f.bob, created.id, 1).await.unwrap_err();
  assert!(matches!(err, CoreError::InitiativeNotFound(_)));
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn weight_ties_list_newest_first() {
  let f = Fixture::new().await;
  let first = f.create("first").await;
  let middle = f.create("middle").await;
  let last = f.create("last").await;

  f.patch(&f.admin, first.id, r#"{"value":5,"speed":3,"cost":2}"#).await.unwrap();
  f.patch(&f.admin, middle.id, r#"{"value":3}"#).await.unwrap();
  f.patch(&f.admin, last.id, r#"{"value":5,"speed":3,"cost":2}"#).await.unwrap();

  let page = f.service.list(&f.alice, ListQuery::default()).await.unwrap();
  let order: Vec<_> = page.items.iter().map(|i| (i.title.as_str(), i.weight)).collect();
  assert_eq!(order, [("last", 3.0), ("first", 3.0), ("middle", 1.5)]);
  assert_eq!((page.total, page.limit, page.offset), (3, 20, 0));
}

#[tokio::test]
async fn list_enriches_in_one_batch() {
  let f = Fixture::new().await;
  let voted = f.create("voted").await;
  f.create("quiet").await;
  f.vote(&f.alice, voted.id, 1).await.unwrap();

  let before = f.store.aggregate_calls();
  let query = ListQuery { sort: ListSort::Votes, ..Default::default() };
  let page = f.service.list(&f.alice, query).await.unwrap();
  assert_eq!(f.store.aggregate_calls() - before, 1);

  assert_eq!(page.items[0].id, voted.id);
  assert_eq!(page.items[0].votes.current_user_vote, 1);
  assert_eq!(page.items[1].votes.up_votes, 0);
}

#[tokio::test]
async fn list_survives_aggregate_failure() {
  let f = Fixture::new().await;
  let voted = f.create("voted").await;
  f.vote(&f.alice, voted.id, 1).await.unwrap();

  f.store.fail_aggregates.store(true, Ordering::SeqCst);
  let page = f.service.list(&f.alice, ListQuery::default()).await.unwrap();
  assert_eq!(page.items.len(), 1);
  assert_eq!(page.items[0].votes.up_votes, 0);
  assert_eq!(page.items[0].votes.current_user_vote, 0);
}

#[tokio::test]
async fn vote_survives_aggregate_failure() {
  let f = Fixture::new().await;
  let created = f.create("Flaky counts").await;

  f.store.fail_aggregates.store(true, Ordering::SeqCst);
  let voted = f.vote(&f.bob, created.id, 1).await.unwrap();
  assert_eq!(voted.id, created.id);
  assert_eq!(voted.votes, Default::default());

  f.store.fail_aggregates.store(false, Ordering::SeqCst);
  let fresh = f.service.get(&f.bob, created.id).await.unwrap();
  assert_eq!(fresh.votes.up_votes, 1);
  assert_eq!(fresh.votes.current_user_vote, 1);
}

// ─── Comments & users ────────────────────────────────────────────────────────

#[tokio::test]
async fn comments_require_a_live_initiative() {
  let f = Fixture::new().await;
  let created = f.create("Talk").await;

  let comment = f
    .service
    .add_comment(&f.bob, created.id, NewComment { text: "  nice  ".into() })
    .await
    .unwrap();
  assert_eq!(comment.text, "nice");

  let (field, _) = validation_field(
    f.service
      .add_comment(&f.bob, created.id, NewComment { text: " ".into() })
      .await
      .unwrap_err(),
  );
  assert_eq!(field, "text");

  let page = f
    .service
    .list_comments(created.id, Page::new(None, None, 50))
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.limit, 50);

  f.service.soft_delete(&f.admin, created.id).await.unwrap();
  let err = f
    .service
    .add_comment(&f.bob, created.id, NewComment { text: "late".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InitiativeNotFound(_)));
}

#[tokio::test]
async fn profile_reports_admin_membership() {
  let f = Fixture::new().await;
  assert!(f.service.profile(&f.admin).is_admin);
  assert!(!f.service.profile(&f.alice).is_admin);

  let users = f.service.list_users().await.unwrap();
  assert_eq!(users.len(), 3);
}
