//! # Expression Identifiers
//!
//! Every named expression (slot reference or alias) carries an `ExprId`. Plan layers
//! are wired together by these identifiers: a slot in a parent node "points to" the
//! named expression with the same id in one of its children. Nothing is linked by
//! node identity.
//!
//! Identifiers come from an [`ExprIdGenerator`] owned by the per-compilation
//! [`RewriteContext`](crate::context::RewriteContext). The counter is atomic, so a
//! single generator may be shared across threads behind an `Arc` and still never hand
//! out the same id twice.
//!
//! The counter never wraps. `u64::MAX` is never handed out; once the counter reaches
//! it, every allocation fails with `IdSpaceExhausted`. Seeding above an id that has no
//! successor fails the same way.

use crate::error::{Result, RewriteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier of a named expression within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExprId(pub u64);

impl ExprId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator of [`ExprId`]s.
#[derive(Debug, Default)]
pub struct ExprIdGenerator {
    next: AtomicU64,
}

impl ExprIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose first id is `max + 1`.
    ///
    /// Used when the plan being rewritten was built elsewhere (e.g. deserialized)
    /// and already contains identifiers up to `max`.
    pub fn starting_after(max: ExprId) -> Result<Self> {
        let first = max
            .0
            .checked_add(1)
            .ok_or(RewriteError::IdSpaceExhausted(max))?;
        Ok(Self {
            next: AtomicU64::new(first),
        })
    }

    /// Allocate the next id, or fail once the id space is used up.
    pub fn next_id(&self) -> Result<ExprId> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map(ExprId)
            .map_err(|n| RewriteError::IdSpaceExhausted(ExprId(n)))
    }

    /// The id the next call to [`next_id`](Self::next_id) would return.
    pub fn peek(&self) -> ExprId {
        ExprId(self.next.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_monotonic() {
        let ids = ExprIdGenerator::new();
        let a = ids.next_id().unwrap();
        let b = ids.next_id().unwrap();
        assert!(b > a);
        assert_eq!(ids.peek(), ExprId(2));
    }

    #[test]
    fn test_starting_after() {
        let ids = ExprIdGenerator::starting_after(ExprId(41)).unwrap();
        assert_eq!(ids.next_id().unwrap(), ExprId(42));
    }

    #[test]
    fn test_starting_after_largest_id_fails() {
        let err = ExprIdGenerator::starting_after(ExprId(u64::MAX)).unwrap_err();
        assert!(matches!(err, RewriteError::IdSpaceExhausted(ExprId(u64::MAX))));
    }

    #[test]
    fn test_exhausted_generator_does_not_wrap() {
        let ids = ExprIdGenerator::starting_after(ExprId(u64::MAX - 2)).unwrap();
        assert_eq!(ids.next_id().unwrap(), ExprId(u64::MAX - 1));
        for _ in 0..3 {
            assert!(matches!(ids.next_id(), Err(RewriteError::IdSpaceExhausted(_))));
        }
        assert_eq!(ids.peek(), ExprId(u64::MAX));
    }

    #[test]
    fn test_shared_generator_never_repeats() {
        let ids = Arc::new(ExprIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
