// cid-blockstore/src/key.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// A path-like datastore key such as `/CIQ...` or `/QA/CIQ...`.
///
/// Keys are always normalized: they start with `/`, have no empty namespaces
/// and no trailing `/` (the root key `/` being the one exception).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(String);

impl Key {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self::with_namespaces(raw.as_ref().split('/'))
    }

    /// The root key, `/`.
    pub fn root() -> Self {
        Key("/".to_string())
    }

    /// Builds a key from its namespaces, skipping empty ones.
    pub fn with_namespaces<I, T>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut out = String::new();
        for ns in namespaces {
            let ns = ns.as_ref();
            if ns.is_empty() {
                continue;
            }
            out.push('/');
            out.push_str(ns);
        }
        if out.is_empty() {
            return Self::root();
        }
        Key(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|ns| !ns.is_empty())
    }

    /// The last namespace (`/a/b` -> `b`). Empty for the root key.
    pub fn name(&self) -> &str {
        self.namespaces().last().unwrap_or("")
    }

    /// Everything but the last namespace. The parent of a top-level key is the root.
    pub fn parent(&self) -> Key {
        let namespaces: Vec<&str> = self.namespaces().collect();
        match namespaces.split_last() {
            Some((_, init)) => Key::with_namespaces(init),
            None => Key::root(),
        }
    }

    /// Appends `other` below this key: `/a`.child(`/b/c`) is `/a/b/c`.
    pub fn child(&self, other: &Key) -> Key {
        if self.is_root() {
            return other.clone();
        }
        if other.is_root() {
            return self.clone();
        }
        Key(format!("{}{}", self.0, other.0))
    }

    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self == other {
            return false;
        }
        if self.is_root() {
            return true;
        }
        other
            .0
            .strip_prefix(&self.0)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Key::new(raw)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Key::new(raw)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_slashes() {
        assert_eq!(Key::new("a//b/").as_str(), "/a/b");
        assert_eq!(Key::new("").as_str(), "/");
        assert_eq!(Key::new("///").as_str(), "/");
        assert_eq!(Key::new("/CIQA").as_str(), "/CIQA");
    }

    #[test]
    fn name_parent_and_child() {
        let key = Key::new("/QA/CIQAQA");
        assert_eq!(key.name(), "CIQAQA");
        assert_eq!(key.parent(), Key::new("/QA"));
        assert_eq!(Key::new("/QA").parent(), Key::root());
        assert_eq!(Key::new("/QA").child(&Key::new("/CIQAQA")), key);
        assert_eq!(Key::root().child(&key), key);
        assert_eq!(Key::root().name(), "");
    }

    #[test]
    fn ancestry() {
        let key = Key::new("/a/b");
        assert!(Key::new("/a").is_ancestor_of(&key));
        assert!(Key::root().is_ancestor_of(&key));
        assert!(!Key::new("/ab").is_ancestor_of(&Key::new("/abc")));
        assert!(!key.is_ancestor_of(&key));
    }

    #[test]
    fn serde_as_string() {
        let key: Key = serde_json::from_str("\"a/b\"").unwrap();
        assert_eq!(key, Key::new("/a/b"));
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"/a/b\"");
    }
}
