use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{ContentDigest, WeakDigest};

/// One observed content state of a virtual path.
///
/// Serialized with the field names of the on-disk history format
/// (`md5`, `sha512`, optional `createdAt`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(rename = "md5")]
    pub weak: WeakDigest,
    #[serde(rename = "sha512")]
    pub strong: ContentDigest,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl VersionRecord {
    pub fn new(weak: WeakDigest, strong: ContentDigest) -> Self {
        Self {
            weak,
            strong,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Whether this record describes the same content as `strong`.
    ///
    /// Only the strong digest is compared; the weak digest is informational.
    pub fn same_content(&self, strong: &ContentDigest) -> bool {
        self.strong == *strong
    }
}

/// Ordered version history of one virtual path.
///
/// Insertion order is chronological and the last record is the current
/// version. [`MetadataDocument::push_if_changed`] never appends a record
/// whose strong digest equals the current one, so the history has no two
/// consecutive records of the same content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataDocument {
    records: Vec<VersionRecord>,
}

impl MetadataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current version, if anything has been written.
    pub fn latest(&self) -> Option<&VersionRecord> {
        self.records.last()
    }

    /// Append `record` unless it matches the current version.
    ///
    /// Returns `true` if the document changed.
    pub fn push_if_changed(&mut self, record: VersionRecord) -> bool {
        if let Some(last) = self.latest() {
            if last.same_content(&record.strong) {
                return false;
            }
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<VersionRecord>> for MetadataDocument {
    fn from(records: Vec<VersionRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a MetadataDocument {
    type Item = &'a VersionRecord;
    type IntoIter = std::slice::Iter<'a, VersionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
