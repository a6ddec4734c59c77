use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PathError;
use crate::names::{validate_container_name, validate_segment};

/// Hierarchical address of a resource: container, directories, name.
///
/// The first segment is always the container. A path with a single segment
/// addresses the container itself; longer paths address a directory or
/// binary whose name is the last segment.
///
/// Paths are normalized on parse: leading and trailing separators are
/// ignored, so `"aip/x/"` and `"aip/x"` are the same path.
///
/// Ordering is segment-wise lexicographic, which keeps every descendant of a
/// path contiguous right after it in an ordered map.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath {
    segments: Vec<String>,
}

impl StoragePath {
    /// Separator used by the textual form.
    pub const SEPARATOR: char = '/';

    /// Parse the textual `/`-separated form.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim_matches(Self::SEPARATOR);
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        Self::from_segments(trimmed.split(Self::SEPARATOR))
    }

    /// Build a path from individual segments, validating each one.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let Some(container) = segments.first() else {
            return Err(PathError::Empty);
        };
        validate_container_name(container)?;
        for segment in &segments[1..] {
            validate_segment(segment)?;
        }
        Ok(Self { segments })
    }

    /// The path of a container.
    pub fn container(name: &str) -> Result<Self, PathError> {
        validate_container_name(name)?;
        Ok(Self {
            segments: vec![name.to_string()],
        })
    }

    /// A direct child of this path.
    pub fn child(&self, name: &str) -> Result<Self, PathError> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// Append several segments at once.
    pub fn join<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, PathError> {
        let mut segments = self.segments.clone();
        for name in names {
            validate_segment(name.as_ref())?;
            segments.push(name.as_ref().to_string());
        }
        Ok(Self { segments })
    }

    /// Name of the container this path lives in.
    pub fn container_name(&self) -> &str {
        &self.segments[0]
    }

    /// Directory segments between the container and the resource name.
    ///
    /// Empty for containers and for direct children of a container.
    pub fn directory_path(&self) -> &[String] {
        if self.segments.len() <= 2 {
            &[]
        } else {
            &self.segments[1..self.segments.len() - 1]
        }
    }

    /// Terminal resource name (the container name for container paths).
    pub fn name(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// `true` if this path addresses a container.
    pub fn is_container(&self) -> bool {
        self.segments.len() == 1
    }

    /// All segments, container first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (1 for a container).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The enclosing path, or `None` for a container.
    pub fn parent(&self) -> Option<Self> {
        if self.is_container() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// `true` if `self` equals `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &StoragePath) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }

    /// `true` if `self` lies strictly beneath `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &StoragePath) -> bool {
        self.segments.len() > ancestor.segments.len() && self.starts_with(ancestor)
    }

    /// Segments of `self` below `ancestor`, if `self` starts with it.
    pub fn relative_to(&self, ancestor: &StoragePath) -> Option<&[String]> {
        if self.starts_with(ancestor) {
            Some(&self.segments[ancestor.segments.len()..])
        } else {
            None
        }
    }

    /// Move `self` from under `from` to the same relative place under `to`.
    ///
    /// Returns `None` when `self` is not beneath `from`.
    pub fn rebase(&self, from: &StoragePath, to: &StoragePath) -> Option<Self> {
        let rest = self.relative_to(from)?;
        let mut segments = to.segments.clone();
        segments.extend(rest.iter().cloned());
        Some(Self { segments })
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoragePath({self})")
    }
}

impl FromStr for StoragePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoragePath> for String {
    fn from(path: StoragePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Parsing and normalization
    // -----------------------------------------------------------------------

    #[test]
    fn parse_splits_segments() {
        let p = path("aip/abc/metadata/descriptive/dm.xml");
        assert_eq!(p.container_name(), "aip");
        assert_eq!(p.directory_path(), ["abc", "metadata", "descriptive"]);
        assert_eq!(p.name(), "dm.xml");
        assert_eq!(p.depth(), 5);
        assert!(!p.is_container());
    }

    #[test]
    fn trailing_separator_is_ignored() {
        assert_eq!(path("aip/x/"), path("aip/x"));
        assert_eq!(path("/aip/x"), path("aip/x"));
    }

    #[test]
    fn container_path_names_itself() {
        let p = path("aip");
        assert!(p.is_container());
        assert_eq!(p.name(), "aip");
        assert!(p.directory_path().is_empty());
        assert!(p.parent().is_none());
    }

    #[test]
    fn empty_and_malformed_paths_are_rejected() {
        assert_eq!(StoragePath::parse(""), Err(PathError::Empty));
        assert_eq!(StoragePath::parse("///"), Err(PathError::Empty));
        assert!(StoragePath::parse("aip//x").is_err());
        assert!(StoragePath::parse("aip/../x").is_err());
        assert!(StoragePath::parse("bad container/x").is_err());
    }

    #[test]
    fn from_segments_requires_one_segment() {
        let none: Vec<String> = vec![];
        assert_eq!(StoragePath::from_segments(none), Err(PathError::Empty));
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    #[test]
    fn child_and_parent_are_inverse() {
        let base = path("aip/abc");
        let child = base.child("aip.json").unwrap();
        assert_eq!(child.to_string(), "aip/abc/aip.json");
        assert_eq!(child.parent().unwrap(), base);
    }

    #[test]
    fn join_validates_every_segment() {
        let base = path("aip");
        assert!(base.join(&["a", "b"]).is_ok());
        assert!(base.join(&["a", ""]).is_err());
    }

    #[test]
    fn descendant_checks() {
        let root = path("aip/abc");
        let deep = path("aip/abc/representations/r1");
        assert!(deep.starts_with(&root));
        assert!(deep.is_descendant_of(&root));
        assert!(root.starts_with(&root));
        assert!(!root.is_descendant_of(&root));
        // Name prefix is not path prefix.
        assert!(!path("aip/abcd").starts_with(&root));
    }

    #[test]
    fn rebase_moves_relative_part() {
        let from = path("src/a");
        let to = path("dst/b/c");
        let p = path("src/a/x/y.txt");
        assert_eq!(p.rebase(&from, &to).unwrap(), path("dst/b/c/x/y.txt"));
        assert_eq!(from.rebase(&from, &to).unwrap(), to);
        assert!(path("other/x").rebase(&from, &to).is_none());
    }

    #[test]
    fn descendants_sort_after_ancestor() {
        let mut paths = vec![path("a/b/c"), path("a/c"), path("a/b"), path("a")];
        paths.sort();
        assert_eq!(paths, vec![path("a"), path("a/b"), path("a/b/c"), path("a/c")]);
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    #[test]
    fn serde_uses_textual_form() {
        let p = path("job/j1.json");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"job/j1.json\"");
        let back: StoragePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<StoragePath>("\"\"").is_err());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn segment_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-][a-zA-Z0-9_. -]{0,15}"
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(
            container in "[a-z0-9_-]{1,12}",
            rest in proptest::collection::vec(segment_strategy(), 0..6),
        ) {
            let mut segments = vec![container];
            segments.extend(rest);
            let p = StoragePath::from_segments(segments.clone()).unwrap();
            let reparsed = StoragePath::parse(&p.to_string()).unwrap();
            prop_assert_eq!(reparsed.segments(), segments.as_slice());
            prop_assert_eq!(&reparsed, &p);
            let with_slash = format!("{p}/");
            prop_assert_eq!(StoragePath::parse(&with_slash).unwrap(), p);
        }

        #[test]
        fn every_child_is_descendant(
            container in "[a-z0-9]{1,8}",
            name in segment_strategy(),
        ) {
            let parent = StoragePath::container(&container).unwrap();
            let child = parent.child(&name).unwrap();
            prop_assert!(child.is_descendant_of(&parent));
            prop_assert_eq!(child.parent().unwrap(), parent);
        }
    }
}
