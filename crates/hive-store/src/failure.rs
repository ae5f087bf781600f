use std::collections::HashSet;
use std::fmt::Display;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

/// Swallow-and-log sink for faults that degrade to defaults.
///
/// Emits one `warn!` per distinct site (a value name or a medium path), then
/// stays quiet for that site, so a misbehaving entry read in a loop cannot
/// flood the log.
#[derive(Debug, Default)]
pub struct FailureLog {
    seen: Mutex<HashSet<String>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure at `site`. Returns `true` if this was the first
    /// report for the site and a log line was written.
    pub fn report(&self, site: &str, error: &dyn Display) -> bool {
        let first = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(site.to_string());
        if first {
            warn!(site, %error, "settings access failed; falling back");
        }
        first
    }

    /// Number of distinct sites reported so far.
    pub fn distinct_sites(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_once_per_site() {
        let log = FailureLog::new();
        assert!(log.report("window/bounds", &"bad rectangle"));
        assert!(!log.report("window/bounds", &"bad rectangle"));
        assert!(log.report("window/state", &"bad enum"));
        assert_eq!(log.distinct_sites(), 2);
    }
}
