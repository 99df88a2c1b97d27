use std::fmt::{Display, Formatter};

use crate::firestore::error::{invalid_argument, FirestoreResult};

/// Slash separated path addressing a collection or a document.
///
/// Collections live at odd depths (`users`, `users/alice/posts`) and documents
/// at even depths (`users/alice`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `path`, ignoring leading and trailing slashes.
    pub fn from_string(path: &str) -> FirestoreResult<Self> {
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::from_segments(Vec::<String>::new()));
        }
        if trimmed.contains("//") {
            return Err(invalid_argument(format!(
                "Found empty segment in resource path '{path}'"
            )));
        }
        Ok(Self::from_segments(trimmed.split('/')))
    }

    /// Parses `path` and requires it to name a collection.
    pub fn collection(path: &str) -> FirestoreResult<Self> {
        let resource = Self::from_string(path)?;
        if !resource.is_collection() {
            return Err(invalid_argument(format!(
                "'{path}' is not a collection path (expected an odd number of segments)"
            )));
        }
        Ok(resource)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_collection(&self) -> bool {
        self.segments.len() % 2 == 1
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn without_last(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn canonical_string(&self) -> String {
        self.segments.join("/")
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}
