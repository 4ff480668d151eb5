//! Dry-run switch
//!
//! Reads, reference resolution and audit snapshots always run. Only the calls
//! that mutate the store consult this policy.

/// Whether store-mutating calls are suppressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DryRunPolicy {
    active: bool,
}

impl DryRunPolicy {
    pub fn new(active: bool) -> Self {
        Self { active }
    }

    /// Suppress store writes
    pub fn enabled() -> Self {
        Self::new(true)
    }

    /// Perform store writes
    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Log a skipped mutation and report whether it must be skipped
    pub fn skips(&self, action: &str, count: usize) -> bool {
        if self.active {
            tracing::warn!("DRY RUN: skipping {} of {} documents", action, count);
        }
        self.active
    }
}

impl std::fmt::Display for DryRunPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.active { "dry-run" } else { "live" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_live() {
        assert!(!DryRunPolicy::default().is_active());
        assert!(!DryRunPolicy::disabled().skips("tombstone write", 3));
        assert!(DryRunPolicy::enabled().skips("tombstone write", 3));
        assert_eq!(DryRunPolicy::enabled().to_string(), "dry-run");
    }
}
