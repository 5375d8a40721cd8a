//! Request deadlines that reach into storage.
//!
//! A [`CommitGate`] is shared between the task enforcing a deadline and the
//! store performing the request's write. The store claims the gate right
//! before committing; the deadline expires it. Whichever side gets there
//! first wins, so a request either reports success for a committed write or
//! reports a timeout for a write that rolled back, never a timeout for a
//! write that landed.

use std::{
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
  },
};

const OPEN: u8 = 0;
const COMMITTED: u8 = 1;
const EXPIRED: u8 = 2;

#[derive(Debug, Clone, Default)]
pub struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
  pub fn new() -> Self { Self::default() }

  /// Claim the right to commit. Also `true` when an earlier write of the
  /// same request already claimed it.
  pub fn try_commit(&self) -> bool {
    match self.0.compare_exchange(OPEN, COMMITTED, Ordering::AcqRel, Ordering::Acquire) {
      Ok(_) => true,
      Err(state) => state == COMMITTED,
    }
  }

  /// Close the gate. `false` if a write committed first, in which case the
  /// request has to run to completion.
  pub fn expire(&self) -> bool {
    match self.0.compare_exchange(OPEN, EXPIRED, Ordering::AcqRel, Ordering::Acquire) {
      Ok(_) => true,
      Err(state) => state == EXPIRED,
    }
  }

  pub fn is_expired(&self) -> bool { self.0.load(Ordering::Acquire) == EXPIRED }
}

tokio::task_local! {
  static GATE: CommitGate;
}

/// Run `fut` with `gate` visible to [`current`].
pub async fn scope<F: Future>(gate: CommitGate, fut: F) -> F::Output {
  GATE.scope(gate, fut).await
}

/// The gate of the enclosing [`scope`]. Outside any scope there is no
/// deadline and writes always commit.
pub fn current() -> Option<CommitGate> { GATE.try_with(CommitGate::clone).ok() }
