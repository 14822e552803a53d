//! Process-wide modification clock
//!
//! Every modification, parameter change and successful execution takes a
//! fresh value from one shared counter. A token taken when a node finishes
//! executing is therefore strictly greater than the node's own modification
//! time and every upstream token observed before it.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Monotonic modification / validity token
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// The version before anything was modified
    pub const ZERO: Version = Version(0);

    /// Take the next value from the global clock
    pub fn next() -> Self {
        Version(CLOCK.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_monotonic() {
        let a = Version::next();
        let b = Version::next();
        assert!(b > a);
        assert!(a > Version::ZERO);
    }
}
