pub mod builder;
pub mod entry;
pub(crate) mod hashing;
pub mod rules;
pub(crate) mod walk;


pub use builder::ManifestBuilder;
pub use entry::{Group, Manifest, ManifestEntry, WalkWarning};
pub use rules::{ManifestRules, SuffixPolicy, DEFAULT_PREFERENCES_DIR, DEFAULT_PREFERENCE_SUFFIX};
