//! Host blacklist.
//!
//! Hosts are compared exactly as the client presented them: no case folding,
//! no port stripping. `Example.com` and `example.com:80` are distinct entries.

use serde::Serialize;

/// Immutable set of blocked hosts, kept sorted for binary search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Blacklist {
    hosts: Vec<String>,
}

impl Blacklist {
    /// Build a blacklist from hosts in any order. Duplicates collapse.
    pub fn new(mut hosts: Vec<String>) -> Self {
        hosts.sort_unstable();
        hosts.dedup();
        Self { hosts }
    }

    /// Whether requests for `host` must be refused.
    pub fn contains(&self, host: &str) -> bool {
        self.hosts
            .binary_search_by(|entry| entry.as_str().cmp(host))
            .is_ok()
    }

    /// Blocked hosts in ascending order.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl FromIterator<String> for Blacklist {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
