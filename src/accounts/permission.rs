use std::{borrow::Borrow, collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Stable codename identifying a permission, e.g. `change_user`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(String);

impl PermissionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PermissionCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PermissionCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for PermissionCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry for a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub code: PermissionCode,
    pub name: String,
}

/// Set of permission codes with unique membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionCode>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// Returns `true` if the code was not present yet.
    pub fn insert(&mut self, code: PermissionCode) -> bool {
        self.0.insert(code)
    }

    /// Adds every code of `other`; returns how many were new.
    pub fn extend_from(&mut self, other: &PermissionSet) -> usize {
        let before = self.0.len();
        self.0.extend(other.0.iter().cloned());
        self.0.len() - before
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionCode> {
        self.0.iter()
    }

    pub fn is_superset(&self, other: &PermissionSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|c| c.as_str().to_owned()).collect()
    }
}

impl<C: Into<PermissionCode>> FromIterator<C> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_str_and_unique_membership() {
        let mut set: PermissionSet = ["view_user", "change_user"].into_iter().collect();
        assert!(set.contains("view_user"));
        assert!(!set.contains("delete_user"));
        assert!(!set.insert(PermissionCode::new("view_user")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn extend_counts_only_new_codes() {
        let mut set: PermissionSet = ["a", "b"].into_iter().collect();
        let other: PermissionSet = ["b", "c"].into_iter().collect();
        assert_eq!(set.extend_from(&other), 1);
        assert_eq!(set.extend_from(&other), 0);
        assert_eq!(set.to_strings(), vec!["a", "b", "c"]);
    }

    #[test]
    fn serializes_as_plain_list() {
        let set: PermissionSet = ["b", "a"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
    }
}
