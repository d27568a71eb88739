//! Registry of entities that are deliberately global (not tenant-scoped).
//!
//! Read-only after construction, so it is shared across scan workers
//! without locking.

use std::collections::BTreeSet;

/// Entities exempt from scoping when no configuration overrides them.
pub const DEFAULT_EXEMPT: &[&str] = &[
    "session",
    "account",
    "verificationToken",
    "school",
    "systemSetting",
];

#[derive(Debug, Clone, Default)]
pub struct ExemptionSet {
    names: BTreeSet<String>,
}

impl ExemptionSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| normalize(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_EXEMPT.iter().copied())
    }

    /// True when `entity` names a global entity. Matching ignores case,
    /// `_` and `-`, so model, accessor and table spellings agree.
    pub fn is_exempt(&self, entity: &str) -> bool {
        self.names.contains(&normalize(entity))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_auth_tables() {
        let set = ExemptionSet::defaults();
        assert!(set.is_exempt("session"));
        assert!(set.is_exempt("Session"));
        assert!(set.is_exempt("verification_token"));
        assert!(!set.is_exempt("student"));
        assert_eq!(set.len(), DEFAULT_EXEMPT.len());
    }

    #[test]
    fn test_custom_set_replaces_defaults() {
        let set = ExemptionSet::new(["Country", " plan ", ""]);
        assert!(set.is_exempt("country"));
        assert!(set.is_exempt("PLAN"));
        assert!(!set.is_exempt("session"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_set_exempts_nothing() {
        let set = ExemptionSet::default();
        assert!(set.is_empty());
        assert!(!set.is_exempt("session"));
    }
}
