use super::hashing::fingerprint_entries;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The helper group an entry is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    /// Plain files, byte-serialized by the file transfer helper.
    Files,
    /// Named preference sets, serialized by the preference transfer helper.
    Preferences,
}

impl Group {
    /// Returns the key the group is registered under.
    pub fn key(&self) -> &'static str {
        match self {
            Group::Files => "files",
            Group::Preferences => "preferences",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single path selected for backup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The group tag this entry belongs to.
    pub group: Group,
    /// Path relative to the declared root, or the preference set name.
    pub path: String,
}

impl ManifestEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            group: Group::Files,
            path: path.into(),
        }
    }

    pub fn preference(name: impl Into<String>) -> Self {
        Self {
            group: Group::Preferences,
            path: name.into(),
        }
    }
}

/// A node the walker could not read. The walk continues past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkWarning {
    /// Path of the node as seen by the walker.
    pub path: String,
    /// The underlying error message.
    pub message: String,
}

/// The set of entries discovered under a data directory.
///
/// Insertion order follows directory listing order, which the platform does
/// not define. Compare manifests with [`Manifest::same_entries`] or
/// [`Manifest::fingerprint`], never by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<WalkWarning>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn warn(&mut self, path: String, message: String) {
        self.warnings.push(WalkWarning { path, message });
    }

    /// Appends all entries and warnings of `other`.
    pub fn extend(&mut self, other: Manifest) {
        self.entries.extend(other.entries);
        self.warnings.extend(other.warnings);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> &[WalkWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the paths registered under `group`, in manifest order.
    pub fn paths(&self, group: Group) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.group == group)
            .map(|e| e.path.as_str())
            .collect()
    }

    /// Returns an order-independent view of the entries.
    pub fn entry_set(&self) -> BTreeSet<&ManifestEntry> {
        self.entries.iter().collect()
    }

    /// Compares two manifests by entry set, ignoring order and warnings.
    pub fn same_entries(&self, other: &Manifest) -> bool {
        self.entry_set() == other.entry_set()
    }

    /// Calculates a SHA-256 digest over the sorted entry set.
    pub fn fingerprint(&self) -> String {
        fingerprint_entries(self.entry_set())
    }
}
