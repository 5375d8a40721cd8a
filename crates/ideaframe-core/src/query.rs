//! List parameters and the pagination envelope.
//!
//! Unknown filter and sort values are not errors: they silently fall back to
//! the defaults. Pagination values are clamped rather than rejected.

use serde::Serialize;

pub const DEFAULT_INITIATIVE_LIMIT: u32 = 20;
pub const DEFAULT_COMMENT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
  /// Every initiative that is not soft-deleted.
  #[default]
  All,
  /// Authored by the caller.
  MineCreated,
  /// Assigned to the caller.
  AssignedToMe,
}

impl ListFilter {
  pub fn from_param(raw: Option<&str>) -> Self {
    match raw {
      Some("mineCreated") => Self::MineCreated,
      Some("assignedToMe") => Self::AssignedToMe,
      _ => Self::All,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::All => "all",
      Self::MineCreated => "mineCreated",
      Self::AssignedToMe => "assignedToMe",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListSort {
  /// `weight DESC, created_at DESC`.
  #[default]
  Weight,
  /// `vote_score DESC, created_at DESC`.
  Votes,
}

impl ListSort {
  pub fn from_param(raw: Option<&str>) -> Self {
    match raw {
      Some("votes") => Self::Votes,
      _ => Self::Weight,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Weight => "weight",
      Self::Votes => "votes",
    }
  }
}

/// A clamped page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub limit:  u32,
  pub offset: u32,
}

impl Page {
  /// A missing or non-positive limit becomes `default_limit`; anything above
  /// [`MAX_LIMIT`] is capped. A missing or negative offset becomes zero.
  pub fn new(limit: Option<i64>, offset: Option<i64>, default_limit: u32) -> Self {
    let limit = match limit {
      Some(l) if l > 0 => l.min(i64::from(MAX_LIMIT)) as u32,
      _ => default_limit.clamp(1, MAX_LIMIT),
    };
    let offset = offset
      .unwrap_or(0)
      .clamp(0, i64::from(u32::MAX)) as u32;
    Self { limit, offset }
  }
}

/// Parameters for [`crate::store::IdeaStore::list_initiatives`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
  pub filter: ListFilter,
  pub sort:   ListSort,
  pub page:   Page,
}

impl Default for ListQuery {
  fn default() -> Self {
    Self {
      filter: ListFilter::default(),
      sort:   ListSort::default(),
      page:   Page::new(None, None, DEFAULT_INITIATIVE_LIMIT),
    }
  }
}

/// `{items, total, limit, offset}`; `total` counts every matching row, not
/// just the ones on this page.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
  pub items:  Vec<T>,
  pub total:  u64,
  pub limit:  u32,
  pub offset: u32,
}

impl<T> Paginated<T> {
  pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
    Self { items, total, limit: page.limit, offset: page.offset }
  }
}
