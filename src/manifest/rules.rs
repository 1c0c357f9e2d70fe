use serde::{Deserialize, Serialize};

/// Default name of the preferences subtree in an application data directory.
pub const DEFAULT_PREFERENCES_DIR: &str = "shared_prefs";
/// Default suffix carried by preference files on disk.
pub const DEFAULT_PREFERENCE_SUFFIX: &str = ".xml";

/// What to do with a file in the preferences subtree that lacks the suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuffixPolicy {
    /// The file is not a preference set and is left out of the manifest.
    #[default]
    Skip,
    /// The file name is registered as a preference set as-is.
    KeepUnmodified,
}

/// Inclusion and exclusion rules applied while walking a data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRules {
    /// Name of the top-level subtree listed as preference sets.
    pub preferences_dir: String,
    /// Suffix stripped from preference file names.
    pub preference_suffix: String,
    /// Policy for preference files without the suffix.
    pub missing_suffix: SuffixPolicy,
    /// Entry names skipped at every depth (e.g. `cache`, `lib`).
    pub excluded: Vec<String>,
}

impl Default for ManifestRules {
    fn default() -> Self {
        Self {
            preferences_dir: DEFAULT_PREFERENCES_DIR.to_string(),
            preference_suffix: DEFAULT_PREFERENCE_SUFFIX.to_string(),
            missing_suffix: SuffixPolicy::default(),
            excluded: Vec::new(),
        }
    }
}

impl ManifestRules {
    /// Returns true if entries with this name are never included.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| e == name)
    }

    /// Returns true if a top-level directory with this name holds preferences.
    pub fn is_preferences_dir(&self, name: &str) -> bool {
        name == self.preferences_dir
    }

    /// Derives the preference set name from a file name in the preferences subtree.
    ///
    /// The suffix is stripped because the preference transfer helper re-adds it.
    /// Returns `None` when the file is not a preference set.
    pub fn preference_name(&self, file_name: &str) -> Option<String> {
        if self.preference_suffix.is_empty() {
            return Some(file_name.to_string());
        }

        match file_name.strip_suffix(self.preference_suffix.as_str()) {
            Some("") => None,
            Some(stem) => Some(stem.to_string()),
            None => match self.missing_suffix {
                SuffixPolicy::Skip => None,
                SuffixPolicy::KeepUnmodified => Some(file_name.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that the suffix is stripped from preference file names.
    #[test]
    fn test_preference_name_strips_suffix() {
        let rules = ManifestRules::default();
        assert_eq!(rules.preference_name("foo.xml"), Some("foo".to_string()));
        assert_eq!(
            rules.preference_name("com.example_preferences.xml"),
            Some("com.example_preferences".to_string())
        );
    }

    /// Tests that only the trailing suffix is stripped.
    #[test]
    fn test_preference_name_strips_once() {
        let rules = ManifestRules::default();
        assert_eq!(rules.preference_name("a.xml.xml"), Some("a.xml".to_string()));
    }

    /// Tests the default policy for files without the suffix.
    #[test]
    fn test_preference_name_skips_missing_suffix() {
        let rules = ManifestRules::default();
        assert_eq!(rules.preference_name("notes.txt"), None);
        assert_eq!(rules.preference_name("foo"), None);
    }

    /// Tests the pass-through policy for files without the suffix.
    #[test]
    fn test_preference_name_keeps_missing_suffix() {
        let rules = ManifestRules {
            missing_suffix: SuffixPolicy::KeepUnmodified,
            ..ManifestRules::default()
        };
        assert_eq!(rules.preference_name("foo"), Some("foo".to_string()));
        assert_eq!(rules.preference_name("foo.xml"), Some("foo".to_string()));
    }

    /// Tests that a file named exactly like the suffix never yields an empty name.
    #[test]
    fn test_preference_name_rejects_empty_stem() {
        let rules = ManifestRules {
            missing_suffix: SuffixPolicy::KeepUnmodified,
            ..ManifestRules::default()
        };
        assert_eq!(rules.preference_name(".xml"), None);
    }

    /// Tests exclusion matching by exact name.
    #[test]
    fn test_is_excluded() {
        let rules = ManifestRules {
            excluded: vec!["cache".to_string(), "lib".to_string()],
            ..ManifestRules::default()
        };
        assert!(rules.is_excluded("cache"));
        assert!(rules.is_excluded("lib"));
        assert!(!rules.is_excluded("cache2"));
        assert!(!rules.is_excluded("databases"));
    }

    /// Tests that the policy serializes in snake case.
    #[test]
    fn test_suffix_policy_serialization() {
        let json = serde_json::to_string(&SuffixPolicy::KeepUnmodified).unwrap();
        assert_eq!(json, r#""keep_unmodified""#);
        let parsed: SuffixPolicy = serde_json::from_str(r#""skip""#).unwrap();
        assert_eq!(parsed, SuffixPolicy::Skip);
    }
}
