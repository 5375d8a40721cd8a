//! ETags for initiatives.
//!
//! An ETag is a SHA-256 hash over the initiative id and the microsecond
//! `updated_at` timestamp, so any persisted change produces a new tag.

use ideaframe_core::initiative::Initiative;
use sha2::{Digest, Sha256};

/// Compute the quoted ETag for `initiative`.
pub fn compute_etag(initiative: &Initiative) -> String {
  let mut hasher = Sha256::new();
  hasher.update(initiative.id.as_bytes());
  hasher.update(initiative.updated_at.timestamp_micros().to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Whether an `If-Match` header value accepts `current`. Handles `*`, lists
/// and tags sent without the surrounding quotes.
pub fn if_match_accepts(header: &str, current: &str) -> bool {
  header.split(',').map(str::trim).any(|candidate| {
    candidate == "*" || strip_etag_quotes(candidate) == strip_etag_quotes(current)
  })
}

fn strip_etag_quotes(s: &str) -> &str { s.trim_matches('"') }
