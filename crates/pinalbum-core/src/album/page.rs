use serde::{Deserialize, Serialize};

/// The page an album session currently shows and the cache keys that belong to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumPage {
    pub number: u32,
    /// Photo identifiers in album order.
    pub keys: Vec<String>,
}

impl AlbumPage {
    pub fn new(number: u32, keys: Vec<String>) -> Self {
        Self { number, keys }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Drop `keys` from the page, returning how many were members.
    pub fn remove<K: AsRef<str>>(&mut self, keys: &[K]) -> usize {
        let before = self.keys.len();
        self.keys
            .retain(|k| !keys.iter().any(|r| r.as_ref() == k.as_str()));
        before - self.keys.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_keeps_order() {
        let mut page = AlbumPage::new(1, vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(page.remove(&["b", "d", "zz"]), 2);
        assert_eq!(page.keys, vec!["a", "c"]);
        assert!(page.contains("a"));
        assert!(!page.contains("b"));
    }
}
