//! Key type: a canonical, case-insensitive, slash-delimited address.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A canonical key into the configuration tree.
///
/// A key is a sequence of non-empty segments plus a flag recording whether
/// its textual form ended in a slash. Segments compare case-insensitively but
/// keep the case they were written with, so `Foo/Bar` and `foo/bar` are the
/// same key and each still prints the way it was supplied.
///
/// The trailing slash is significant: `a/` names the root of `a`'s own
/// subtree and is a different key from `a`.
#[derive(Clone, Default)]
pub struct Key {
    segments: Vec<String>,
    trailing_slash: bool,
}

impl Key {
    /// Parse a key string.
    ///
    /// Parsing never fails. Repeated slashes collapse, a leading slash is
    /// dropped and a trailing slash is recorded in the key.
    ///
    /// ```rust
    /// use treeconf_core::Key;
    ///
    /// assert_eq!(Key::new("/a//b"), Key::new("a/b"));
    /// assert_ne!(Key::new("a/"), Key::new("a"));
    /// assert!(Key::new("/").is_root());
    /// ```
    pub fn new(s: &str) -> Self {
        let segments: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let trailing_slash = !segments.is_empty() && s.ends_with('/');
        Key {
            segments,
            trailing_slash,
        }
    }

    /// The root key.
    pub fn root() -> Self {
        Key::default()
    }

    /// Build a key from individual segments.
    ///
    /// Slashes inside a segment split it, so the result is always canonical.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .flat_map(|s| {
                s.as_ref()
                    .split('/')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Key {
            segments,
            trailing_slash: false,
        }
    }

    /// True for the root key.
    pub fn is_root(&self) -> bool {
        self.is_empty()
    }

    /// True if the key has no segments. Only the root has none, so this is
    /// [`Key::is_root`] under the name that pairs with [`Key::len`].
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    /// This key with the trailing-slash flag set or cleared.
    ///
    /// The root never carries the flag.
    #[must_use]
    pub fn with_trailing_slash(&self, trailing_slash: bool) -> Key {
        Key {
            segments: self.segments.clone(),
            trailing_slash: trailing_slash && !self.segments.is_empty(),
        }
    }

    /// Iterate over segments in their original case.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// The `i`th segment as a one-segment key, or the root when out of range.
    pub fn segment(&self, i: usize) -> Key {
        match self.segments.get(i) {
            Some(segment) => Key {
                segments: vec![segment.clone()],
                trailing_slash: false,
            },
            None => Key::root(),
        }
    }

    /// The last segment as a one-segment key, or the root.
    pub fn last_segment(&self) -> Key {
        match self.segments.len() {
            0 => Key::root(),
            n => self.segment(n - 1),
        }
    }

    /// The first `n` segments.
    #[must_use]
    pub fn first(&self, n: usize) -> Key {
        self.range(0, n)
    }

    /// The last `n` segments.
    #[must_use]
    pub fn last(&self, n: usize) -> Key {
        let len = self.len();
        self.range(len.saturating_sub(n), len)
    }

    /// Segments `i..j`, clamped to the key's bounds.
    ///
    /// The trailing-slash flag survives only when the range reaches the end
    /// of the key; an empty range is the root.
    #[must_use]
    pub fn range(&self, i: usize, j: usize) -> Key {
        let len = self.len();
        let j = j.min(len);
        let i = i.min(j);
        if i == j {
            return Key::root();
        }
        Key {
            segments: self.segments[i..j].to_vec(),
            trailing_slash: self.trailing_slash && j == len,
        }
    }

    /// This key without its first `n` segments.
    #[must_use]
    pub fn remove_first(&self, n: usize) -> Key {
        self.range(n, self.len())
    }

    /// This key without its last `n` segments.
    #[must_use]
    pub fn remove_last(&self, n: usize) -> Key {
        self.first(self.len().saturating_sub(n))
    }

    /// Append `other` to this key.
    ///
    /// An empty operand leaves the other side unchanged. Otherwise the result
    /// takes `other`'s trailing-slash flag, replacing this key's.
    #[must_use]
    pub fn join(&self, other: &Key) -> Key {
        if other.is_root() {
            return self.clone();
        }
        if self.is_root() {
            return other.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Key {
            segments,
            trailing_slash: other.trailing_slash,
        }
    }

    /// Prepend `prefix` to this key. Same rules as [`Key::join`].
    #[must_use]
    pub fn prepend(&self, prefix: &Key) -> Key {
        prefix.join(self)
    }

    /// Check whether `prefix` is this key or one of its ancestors.
    ///
    /// Only segments are compared; the trailing-slash flag is ignored.
    pub fn has_prefix(&self, prefix: &Key) -> bool {
        prefix.len() <= self.len()
            && prefix
                .segments
                .iter()
                .zip(&self.segments)
                .all(|(a, b)| segment_eq(a, b))
    }

    /// The part of this key below `prefix`.
    ///
    /// Returns `None` if `prefix` is not a prefix of this key.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Key) -> Option<Key> {
        if self.has_prefix(prefix) {
            Some(self.remove_first(prefix.len()))
        } else {
            None
        }
    }

    /// Match this key against a wildcard pattern.
    ///
    /// A `*` segment in the pattern matches exactly one segment and a `...`
    /// segment matches any number of segments, including none.
    ///
    /// ```rust
    /// use treeconf_core::Key;
    ///
    /// assert!(Key::new("net/eth0/addr").matches(&Key::new("net/*/addr")));
    /// assert!(Key::new("net/eth0/addr").matches(&Key::new(".../addr")));
    /// assert!(!Key::new("net/addr").matches(&Key::new("net/*/addr")));
    /// ```
    pub fn matches(&self, pattern: &Key) -> bool {
        matches_from(&self.segments, &pattern.segments)
    }
}

fn matches_from(segments: &[String], pattern: &[String]) -> bool {
    match pattern.split_first() {
        None => segments.is_empty(),
        Some((p, rest)) if p == "..." => {
            (0..=segments.len()).any(|i| matches_from(&segments[i..], rest))
        }
        Some((p, rest)) => match segments.split_first() {
            Some((s, remaining)) => (p == "*" || segment_eq(p, s)) && matches_from(remaining, rest),
            None => false,
        },
    }
}

fn folded(segment: &str) -> impl Iterator<Item = char> + '_ {
    segment.chars().flat_map(char::to_lowercase)
}

fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    folded(a).cmp(folded(b))
}

fn segment_eq(a: &str, b: &str) -> bool {
    segment_cmp(a, b) == Ordering::Equal
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Segment-wise, case-insensitive. A key sorts before its own trailing-slash
/// form, which sorts before any of its descendants.
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match segment_cmp(a, b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.len()
            .cmp(&other.len())
            .then(self.trailing_slash.cmp(&other.trailing_slash))
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.len().hash(state);
        for segment in &self.segments {
            for c in folded(segment) {
                c.hash(state);
            }
            '/'.hash(state);
        }
        self.trailing_slash.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))?;
        if self.trailing_slash {
            write!(f, "/")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", self.to_string())
    }
}

impl std::ops::Index<usize> for Key {
    type Output = str;

    fn index(&self, i: usize) -> &Self::Output {
        &self.segments[i]
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::new(&s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::new(s)
    }
}

impl FromStr for Key {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Key::new(s))
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Key::new(&s))
    }
}

/// Macro for writing keys inline.
///
/// # Example
///
/// ```rust
/// use treeconf_core::key;
///
/// let k = key!("users/123/name");
/// assert_eq!(k.len(), 3);
/// ```
#[macro_export]
macro_rules! key {
    ($s:expr) => {
        $crate::Key::new($s)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_keys() {
        assert_eq!(Key::new("").len(), 0);
        assert_eq!(Key::new("foo").len(), 1);
        assert_eq!(Key::new("foo/bar").len(), 2);
        assert_eq!(Key::new("foo/bar/baz").len(), 3);
    }

    #[test]
    fn empty_and_single_slash_are_root() {
        assert!(Key::new("").is_root());
        assert!(Key::new("/").is_root());
        assert!(Key::new("///").is_root());
        assert_eq!(Key::new("/"), Key::root());
        assert!(!Key::new("/").has_trailing_slash());
        assert!(Key::root().is_empty());
        assert!(!key!("a/").is_empty());
        assert!(!key!("a/").is_root());
    }

    #[test]
    fn normalize_slashes() {
        assert_eq!(key!("a//b"), key!("a/b"));
        assert_eq!(key!("/foo/bar"), key!("foo/bar"));
        assert_eq!(key!("a//"), key!("a/"));
        assert_eq!(key!("a//").to_string(), "a/");
    }

    #[test]
    fn trailing_slash_is_distinct() {
        let plain = key!("a/b");
        let slashed = key!("a/b/");
        assert_ne!(plain, slashed);
        assert_eq!(
            plain.segments().collect::<Vec<_>>(),
            slashed.segments().collect::<Vec<_>>()
        );
        assert_eq!(Key::new(&plain.to_string()), plain);
        assert_eq!(Key::new(&slashed.to_string()), slashed);
        assert_eq!(slashed.to_string(), "a/b/");
    }

    #[test]
    fn case_insensitive_equality_preserves_case() {
        let upper = key!("Foo/Bar");
        let lower = key!("foo/bar");
        assert_eq!(upper, lower);
        assert_eq!(upper.cmp(&lower), Ordering::Equal);
        assert_eq!(upper.to_string(), "Foo/Bar");
        assert_eq!(lower.to_string(), "foo/bar");
    }

    #[test]
    fn hash_agrees_with_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(key!("Foo/BAR"));
        set.insert(key!("foo/bar"));
        set.insert(key!("foo/bar/"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ordering() {
        assert!(key!("a/b") < key!("a/c"));
        assert!(key!("a/c") < key!("b/a"));
        assert!(key!("a") < key!("a/"));
        assert!(key!("a/") < key!("a/b"));
        assert!(key!("") < key!("a"));
        assert!(key!("ABC") < key!("abd"));
    }

    #[test]
    fn segment_access() {
        let k = key!("a/B/c/");
        assert_eq!(k.segment(1), key!("b"));
        assert_eq!(k.segment(1).to_string(), "B");
        assert!(k.segment(3).is_root());
        assert_eq!(&k[2], "c");
        assert_eq!(k.last_segment().to_string(), "c");
        assert!(Key::root().last_segment().is_root());
    }

    #[test]
    fn slicing_is_clamped() {
        let k = key!("a/b/c/d");
        assert_eq!(k.first(2).to_string(), "a/b");
        assert_eq!(k.first(10), k);
        assert_eq!(k.last(1).to_string(), "d");
        assert_eq!(k.last(10), k);
        assert_eq!(k.range(1, 3).to_string(), "b/c");
        assert!(k.range(3, 1).is_root());
        assert!(k.range(7, 9).is_root());
        assert_eq!(k.remove_first(1).to_string(), "b/c/d");
        assert!(k.remove_first(9).is_root());
        assert_eq!(k.remove_last(3).to_string(), "a");
        assert!(k.remove_last(9).is_root());
    }

    #[test]
    fn slicing_keeps_trailing_slash_only_at_the_end() {
        let k = key!("a/b/c/");
        assert_eq!(k.last(2).to_string(), "b/c/");
        assert_eq!(k.first(2).to_string(), "a/b");
        assert_eq!(k.first(3).to_string(), "a/b/c/");
        assert_eq!(k.remove_first(1).to_string(), "b/c/");
        assert_eq!(k.remove_last(1).to_string(), "a/b");
    }

    #[test]
    fn join_rules() {
        assert_eq!(key!("foo/bar").join(&key!("baz/qux")).to_string(), "foo/bar/baz/qux");
        assert_eq!(key!("foo/").join(&key!("bar")).to_string(), "foo/bar");
        assert_eq!(key!("foo").join(&key!("bar/")).to_string(), "foo/bar/");
        assert_eq!(key!("foo/").join(&Key::root()).to_string(), "foo/");
        assert_eq!(Key::root().join(&key!("bar/")).to_string(), "bar/");
        assert_eq!(key!("b").prepend(&key!("a")).to_string(), "a/b");
    }

    #[test]
    fn has_prefix_works() {
        let k = key!("foo/bar/baz");
        assert!(k.has_prefix(&key!("")));
        assert!(k.has_prefix(&key!("FOO")));
        assert!(k.has_prefix(&key!("foo/bar")));
        assert!(k.has_prefix(&key!("foo/bar/baz")));
        assert!(k.has_prefix(&key!("foo/bar/")));
        assert!(!k.has_prefix(&key!("bar")));
        assert!(!k.has_prefix(&key!("foo/bar/baz/qux")));
    }

    #[test]
    fn strip_prefix_works() {
        let k = key!("foo/bar/baz/");
        assert_eq!(k.strip_prefix(&key!("foo")), Some(key!("bar/baz/")));
        assert_eq!(k.strip_prefix(&key!("Foo/Bar")), Some(key!("baz/")));
        assert_eq!(k.strip_prefix(&key!("foo/bar/baz")), Some(Key::root()));
        assert_eq!(k.strip_prefix(&key!("other")), None);
    }

    #[test]
    fn wildcard_matching() {
        assert!(key!("a/b/c").matches(&key!("a/*/c")));
        assert!(key!("a/b/c").matches(&key!("...")));
        assert!(Key::root().matches(&key!("...")));
        assert!(key!("a/b/c").matches(&key!("a/...")));
        assert!(key!("a").matches(&key!("a/...")));
        assert!(key!("A/x/y/C").matches(&key!("a/.../c")));
        assert!(!key!("a/b").matches(&key!("a/*/c")));
        assert!(!key!("a/b/c/d").matches(&key!("a/*/c")));
    }

    #[test]
    fn from_segments_splits_slashes() {
        let k = Key::from_segments(["a", "b/c", ""]);
        assert_eq!(k, key!("a/b/c"));
        assert!(!k.has_trailing_slash());
    }

    #[test]
    fn with_trailing_slash_never_applies_to_root() {
        assert!(!Key::root().with_trailing_slash(true).has_trailing_slash());
        assert_eq!(key!("a").with_trailing_slash(true), key!("a/"));
        assert_eq!(key!("a/").with_trailing_slash(false), key!("a"));
    }

    #[test]
    fn parse_is_infallible() {
        let k: Key = "x//y/".parse().unwrap();
        assert_eq!(k, key!("x/y/"));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&key!("a/B/")).unwrap();
        assert_eq!(json, "\"a/B/\"");
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key!("a/b/"));
    }

    #[test]
    fn debug_shows_text() {
        assert_eq!(format!("{:?}", key!("foo/bar")), "Key(\"foo/bar\")");
    }
}
