//! [`SqliteStore`]: the SQLite implementation of [`IdeaStore`].

use std::path::Path;

use chrono::{SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, Transaction, types::Value};
use uuid::Uuid;

use ideaframe_core::{
  comment::Comment,
  deadline::{self, CommitGate},
  initiative::{AssigneeChange, Initiative, InitiativePatch, NewInitiative},
  query::{ListFilter, ListQuery, ListSort, Page},
  scoring::{self, Rating},
  store::IdeaStore,
  user::{NewUser, User, UserCredentials},
  vote::{self, AggregateMap, VoteValue},
};

use crate::{
  Error, Result,
  encode::{
    COMMENT_SELECT, INITIATIVE_SELECT, RawComment, RawInitiative, RawTally, RawUser,
    USER_COLUMNS, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An IdeaFrame store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_initiative(&self, id: Uuid) -> Result<Option<Initiative>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawInitiative> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("{INITIATIVE_SELECT} AND i.initiative_id = ?1"),
            rusqlite::params![id_str],
            RawInitiative::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawInitiative::into_initiative).transpose()
  }
}

/// `SET` fragments and their bound values for a partial update, in
/// placeholder order.
fn patch_assignments(
  patch: &InitiativePatch,
  weight: Option<f64>,
  now: String,
) -> (Vec<&'static str>, Vec<Value>) {
  let mut sets = Vec::new();
  let mut values = Vec::new();

  if let Some(title) = &patch.title {
    sets.push("title = ?");
    values.push(Value::Text(title.clone()));
  }
  if let Some(description) = &patch.description {
    sets.push("description = ?");
    values.push(Value::Text(description.clone()));
  }
  for (column, rating) in [("value = ?", patch.value), ("speed = ?", patch.speed), ("cost = ?", patch.cost)]
  {
    if let Some(r) = rating {
      sets.push(column);
      values.push(Value::Integer(i64::from(r)));
    }
  }
  match patch.assignee {
    AssigneeChange::Keep => {}
    AssigneeChange::Clear => sets.push("assignee_id = NULL"),
    AssigneeChange::Set(id) => {
      sets.push("assignee_id = ?");
      values.push(Value::Text(encode_uuid(id)));
    }
  }
  if let Some(w) = weight {
    sets.push("weight = ?");
    values.push(Value::Real(w));
  }
  sets.push("updated_at = ?");
  values.push(Value::Text(now));

  (sets, values)
}

/// Result of a write transaction that ran under a request deadline.
enum Outcome<T> {
  Done(T),
  Expired,
}

impl<T> Outcome<T> {
  fn into_result(self) -> Result<T> {
    match self {
      Self::Done(value) => Ok(value),
      Self::Expired => Err(Error::DeadlineExpired),
    }
  }
}

/// Commit `tx` unless the request deadline expired first. An expired
/// transaction is dropped, which rolls it back.
fn commit_unless_expired<T>(
  tx: Transaction<'_>,
  gate: Option<&CommitGate>,
  value: T,
) -> rusqlite::Result<Outcome<T>> {
  if gate.is_some_and(|g| !g.try_commit()) {
    tracing::warn!("request deadline expired before commit; rolling back");
    return Ok(Outcome::Expired);
  }
  tx.commit()?;
  Ok(Outcome::Done(value))
}

// ─── IdeaStore impl ──────────────────────────────────────────────────────────

impl IdeaStore for SqliteStore {
  type Error = Error;

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      id:           Uuid::new_v4(),
      login:        input.login,
      display_name: input.display_name,
      email:        input.email,
      created_at:   Utc::now().trunc_subsecs(6),
    };

    let id_str = encode_uuid(user.id);
    let login = user.login.clone();
    let display_name = user.display_name.clone();
    let email = user.email.clone();
    let hash = input.password_hash;
    let at_str = encode_dt(user.created_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let taken = conn
          .query_row(
            "SELECT 1 FROM users WHERE login = ?1",
            rusqlite::params![login],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(false);
        }

        conn.execute(
          "INSERT INTO users (user_id, login, display_name, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, login, display_name, email, hash, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::LoginTaken(user.login));
    }
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            rusqlite::params![id_str],
            RawUser::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_credentials(&self, login: &str) -> Result<Option<UserCredentials>> {
    let login = login.to_owned();

    let raw: Option<(RawUser, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE login = ?1"),
            rusqlite::params![login],
            |row| Ok((RawUser::from_row(row)?, row.get(5)?)),
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(user, password_hash)| {
        Ok(UserCredentials { user: user.into_user()?, password_hash })
      })
      .transpose()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users ORDER BY display_name, login"
        ))?;
        let rows = stmt
          .query_map([], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Initiatives ───────────────────────────────────────────────────────────

  async fn create_initiative(&self, input: NewInitiative, author_id: Uuid) -> Result<Initiative> {
    let id = Uuid::new_v4();
    let now = encode_dt(Utc::now());
    let weight = scoring::weight(None, None, None);

    let id_str = encode_uuid(id);
    let author_str = encode_uuid(author_id);
    let gate = deadline::current();

    let outcome: Outcome<RawInitiative> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO initiatives (
             initiative_id, title, description, author_id, weight, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![id_str, input.title, input.description, author_str, weight, now],
        )?;
        let raw = tx.query_row(
          &format!("{INITIATIVE_SELECT} AND i.initiative_id = ?1"),
          rusqlite::params![id_str],
          RawInitiative::from_row,
        )?;
        Ok(commit_unless_expired(tx, gate.as_ref(), raw)?)
      })
      .await?;

    outcome.into_result()?.into_initiative()
  }

  async fn get_initiative(&self, id: Uuid) -> Result<Option<Initiative>> {
    self.fetch_initiative(id).await
  }

  async fn get_initiative_with_votes(&self, id: Uuid, caller: Uuid) -> Result<Option<Initiative>> {
    let Some(mut item) = self.fetch_initiative(id).await? else {
      return Ok(None);
    };
    let map = self.get_vote_aggregates(&[id], caller).await?;
    item.votes = map.get(&id).copied().unwrap_or_default();
    Ok(Some(item))
  }

  async fn update_initiative(
    &self,
    id: Uuid,
    patch: InitiativePatch,
  ) -> Result<Option<Initiative>> {
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());
    let gate = deadline::current();

    // Write, weight recompute and reload commit or roll back together.
    let outcome: Outcome<Option<RawInitiative>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let scores: Option<(Option<i64>, Option<i64>, Option<i64>)> = tx
          .query_row(
            "SELECT value, speed, cost FROM initiatives
             WHERE initiative_id = ?1 AND is_deleted = 0",
            rusqlite::params![id_str],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;
        let Some((value, speed, cost)) = scores else {
          return Ok(Outcome::Done(None));
        };

        let weight = patch.touches_scores().then(|| {
          let merged = |new: Option<Rating>, old: Option<i64>| new.or_else(|| old.and_then(Rating::new));
          scoring::weight(
            merged(patch.value, value),
            merged(patch.speed, speed),
            merged(patch.cost, cost),
          )
        });

        let (sets, mut values) = patch_assignments(&patch, weight, now);
        values.push(Value::Text(id_str.clone()));
        tx.execute(
          &format!("UPDATE initiatives SET {} WHERE initiative_id = ?", sets.join(", ")),
          rusqlite::params_from_iter(values.iter()),
        )?;

        let raw = tx.query_row(
          &format!("{INITIATIVE_SELECT} AND i.initiative_id = ?1"),
          rusqlite::params![id_str],
          RawInitiative::from_row,
        )?;
        Ok(commit_unless_expired(tx, gate.as_ref(), Some(raw))?)
      })
      .await?;

    outcome.into_result()?.map(RawInitiative::into_initiative).transpose()
  }

  async fn soft_delete_initiative(&self, id: Uuid) -> Result<Option<bool>> {
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());
    let gate = deadline::current();

    let outcome: Outcome<Option<bool>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let deleted: Option<bool> = tx
          .query_row(
            "SELECT is_deleted FROM initiatives WHERE initiative_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        match deleted {
          None => Ok(Outcome::Done(None)),
          Some(true) => Ok(Outcome::Done(Some(false))),
          Some(false) => {
            tx.execute(
              "UPDATE initiatives SET is_deleted = 1, updated_at = ?2
               WHERE initiative_id = ?1 AND is_deleted = 0",
              rusqlite::params![id_str, now],
            )?;
            Ok(commit_unless_expired(tx, gate.as_ref(), Some(true))?)
          }
        }
      })
      .await?;

    outcome.into_result()
  }

  async fn list_initiatives(&self, query: &ListQuery, caller: Uuid) -> Result<(Vec<Initiative>, u64)> {
    let filter = match query.filter {
      ListFilter::All => "",
      ListFilter::MineCreated => " AND i.author_id = ?",
      ListFilter::AssignedToMe => " AND i.assignee_id = ?",
    };
    let order = match query.sort {
      ListSort::Weight => "i.weight DESC, i.created_at DESC, i.rowid DESC",
      ListSort::Votes => {
        "(SELECT COALESCE(SUM(v.value), 0) FROM initiative_votes v
           WHERE v.initiative_id = i.initiative_id) DESC,
         i.created_at DESC, i.rowid DESC"
      }
    };

    let filter_values: Vec<Value> = match query.filter {
      ListFilter::All => Vec::new(),
      _ => vec![Value::Text(encode_uuid(caller))],
    };
    let Page { limit, offset } = query.page;

    let (raws, total): (Vec<RawInitiative>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM initiatives i WHERE i.is_deleted = 0{filter}"),
          rusqlite::params_from_iter(filter_values.iter()),
          |row| row.get(0),
        )?;

        let mut values = filter_values;
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(offset)));

        let mut stmt = conn.prepare(&format!(
          "{INITIATIVE_SELECT}{filter} ORDER BY {order} LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), RawInitiative::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawInitiative::into_initiative)
      .collect::<Result<Vec<_>>>()?;
    Ok((items, total.max(0) as u64))
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  async fn upsert_vote(&self, initiative_id: Uuid, user_id: Uuid, value: VoteValue) -> Result<()> {
    let initiative_str = encode_uuid(initiative_id);
    let user_str = encode_uuid(user_id);
    let now = encode_dt(Utc::now());
    let value = i64::from(value.as_i8());
    let gate = deadline::current();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO initiative_votes (initiative_id, user_id, value, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (initiative_id, user_id)
           DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
          rusqlite::params![initiative_str, user_str, value, now],
        )?;
        Ok(commit_unless_expired(tx, gate.as_ref(), ())?)
      })
      .await?;
    outcome.into_result()
  }

  async fn delete_vote(&self, initiative_id: Uuid, user_id: Uuid) -> Result<bool> {
    let initiative_str = encode_uuid(initiative_id);
    let user_str = encode_uuid(user_id);

    let gate = deadline::current();

    let outcome: Outcome<bool> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = tx.execute(
          "DELETE FROM initiative_votes WHERE initiative_id = ?1 AND user_id = ?2",
          rusqlite::params![initiative_str, user_str],
        )?;
        Ok(commit_unless_expired(tx, gate.as_ref(), n > 0)?)
      })
      .await?;
    outcome.into_result()
  }

  async fn get_vote_aggregates(&self, ids: &[Uuid], caller: Uuid) -> Result<AggregateMap> {
    if ids.is_empty() {
      return Ok(AggregateMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut values = vec![Value::Text(encode_uuid(caller))];
    values.extend(ids.iter().map(|id| Value::Text(encode_uuid(*id))));

    let raws: Vec<RawTally> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT initiative_id,
                  SUM(CASE WHEN value =  1 THEN 1 ELSE 0 END),
                  SUM(CASE WHEN value = -1 THEN 1 ELSE 0 END),
                  MAX(CASE WHEN user_id = ?1 THEN value END)
           FROM initiative_votes
           WHERE initiative_id IN ({placeholders})
           GROUP BY initiative_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), |row| {
            Ok(RawTally {
              initiative_id: row.get(0)?,
              up_votes:      row.get(1)?,
              down_votes:    row.get(2)?,
              caller_vote:   row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let tallies = raws
      .into_iter()
      .map(RawTally::into_tally)
      .collect::<Result<Vec<_>>>()?;
    Ok(vote::aggregate(ids, tallies))
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn create_comment(&self, initiative_id: Uuid, author_id: Uuid, text: String) -> Result<Comment> {
    let comment_str = encode_uuid(Uuid::new_v4());
    let initiative_str = encode_uuid(initiative_id);
    let author_str = encode_uuid(author_id);
    let now = encode_dt(Utc::now());
    let gate = deadline::current();

    let outcome: Outcome<RawComment> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO comments (comment_id, initiative_id, author_id, text, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![comment_str, initiative_str, author_str, text, now],
        )?;
        let raw = tx.query_row(
          &format!("{COMMENT_SELECT} WHERE c.comment_id = ?1"),
          rusqlite::params![comment_str],
          RawComment::from_row,
        )?;
        Ok(commit_unless_expired(tx, gate.as_ref(), raw)?)
      })
      .await?;

    outcome.into_result()?.into_comment()
  }

  async fn list_comments(&self, initiative_id: Uuid, page: Page) -> Result<(Vec<Comment>, u64)> {
    let initiative_str = encode_uuid(initiative_id);
    let limit = i64::from(page.limit);
    let offset = i64::from(page.offset);

    let (raws, total): (Vec<RawComment>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM comments WHERE initiative_id = ?1",
          rusqlite::params![initiative_str],
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "{COMMENT_SELECT} WHERE c.initiative_id = ?1
           ORDER BY c.created_at ASC, c.rowid ASC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![initiative_str, limit, offset], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawComment::into_comment)
      .collect::<Result<Vec<_>>>()?;
    Ok((items, total.max(0) as u64))
  }
}
