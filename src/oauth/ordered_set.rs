//! Insertion-ordered set of strings used for client scopes and tenant access.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Ordered set of unique strings.
///
/// Keeps first-insertion order, never holds duplicates, and serializes as a
/// plain JSON array. Duplicates in stored data are dropped on load. Equality
/// is order-sensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct OrderedSet(IndexSet<String>);

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` at the end. Returns false if it was already present.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.0.insert(value.into())
    }

    /// Removes `value`, keeping the relative order of the rest.
    /// Returns false if it was absent.
    pub fn remove(&mut self, value: &str) -> bool {
        self.0.shift_remove(value)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> indexmap::set::Iter<'_, String> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl PartialEq for OrderedSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.iter().eq(other.0.iter())
    }
}

impl Eq for OrderedSet {}

impl From<Vec<String>> for OrderedSet {
    fn from(values: Vec<String>) -> Self {
        values.into_iter().collect()
    }
}

impl From<OrderedSet> for Vec<String> {
    fn from(set: OrderedSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for OrderedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for OrderedSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl<'a> IntoIterator for &'a OrderedSet {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut set = OrderedSet::new();
        assert!(set.insert("a"));
        assert!(set.insert("b"));
        assert!(!set.insert("a"));
        assert_eq!(set.to_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut set: OrderedSet = ["a", "b", "c", "d"].into_iter().collect();
        assert!(set.remove("b"));
        assert!(!set.remove("b"));
        assert!(!set.remove("missing"));
        assert_eq!(
            set.to_vec(),
            vec!["a".to_string(), "c".to_string(), "d".to_string()]
        );
    }

    #[test]
    fn test_deserialize_drops_duplicates() {
        let set: OrderedSet = serde_json::from_str(r#"["x","y","x","z","y"]"#).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["x","y","z"]"#);
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let ab: OrderedSet = ["a", "b"].into_iter().collect();
        let ba: OrderedSet = ["b", "a"].into_iter().collect();
        assert_ne!(ab, ba);
        assert_eq!(ab, ["a", "b", "a"].into_iter().collect::<OrderedSet>());
    }
}
