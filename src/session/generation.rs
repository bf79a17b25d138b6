//! Generation token authority: the only cancellation primitive.
//!
//! Every async operation remembers the generation it started under and
//! compares it against `current()` before touching shared state. Nothing
//! is ever aborted; stale work simply finishes and is ignored.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one logical session. Strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct GenerationAuthority {
    current: AtomicU64,
}

impl GenerationAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate everything in flight and return the new generation.
    pub fn bump(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::SeqCst))
    }

    /// True if work tagged with `generation` may still commit.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}
