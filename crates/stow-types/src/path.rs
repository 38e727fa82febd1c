//! Virtual path normalization.
//!
//! A virtual path is the client-chosen name under which content versions are
//! tracked. Input may use `/` or `\` as separators, in any quantity:
//!
//! - Separators are collapsed and leading/trailing separators are stripped
//! - Segments `.` and `..` are rejected, so a path can never resolve outside
//!   the metadata root
//! - Segments must not contain NUL
//! - At least one segment is required

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const SEPARATORS: &[char] = &['/', '\\'];

/// A normalized virtual path: a non-empty sequence of non-empty segments.
///
/// # Examples
///
/// ```
/// use stow_types::VirtualPath;
///
/// let path = VirtualPath::parse("\\segundo/caminho\\de//teste").unwrap();
/// assert_eq!(path.to_string(), "segundo/caminho/de/teste");
/// assert!(VirtualPath::parse("a/../b").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    /// Normalize a raw client-supplied path.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let segments: Vec<String> = raw
            .split(SEPARATORS)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        if segments.is_empty() {
            return Err(invalid(raw, "path has no segments"));
        }

        for segment in &segments {
            if segment == "." || segment == ".." {
                return Err(invalid(raw, "relative segments are not allowed"));
            }
            if segment.contains('\0') {
                return Err(invalid(raw, "segment contains NUL"));
            }
        }

        Ok(Self { segments })
    }

    /// The normalized segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last segment.
    pub fn file_name(&self) -> &str {
        // parse() guarantees at least one segment
        &self.segments[self.segments.len() - 1]
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

fn invalid(raw: &str, reason: &str) -> TypeError {
    TypeError::InvalidPath {
        path: raw.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Debug for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPath({self})")
    }
}

impl std::str::FromStr for VirtualPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VirtualPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VirtualPath> for String {
    fn from(p: VirtualPath) -> Self {
        p.to_string()
    }
}
