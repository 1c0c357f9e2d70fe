// Eidos by Bryan Emmanuel

use super::entry::{Group, Manifest};
use super::rules::ManifestRules;
use super::walk::{list_preferences, record, walk_files};
use std::fs;
use std::path::Path;

/// Builds manifests of an application data directory.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    rules: ManifestRules,
}

impl ManifestBuilder {
    pub fn new(rules: ManifestRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ManifestRules {
        &self.rules
    }

    /// Builds the manifest of a data directory.
    ///
    /// Plain files directly under `root` and every file below its
    /// subdirectories are registered as files relative to `root`. The
    /// preferences subtree is listed as preference sets instead.
    ///
    /// A missing or unreadable `root` yields an empty manifest.
    pub fn build(&self, root: &Path) -> Manifest {
        if !root.is_dir() {
            log::info!("Data directory {:?} not found, nothing to back up.", root);
            return Manifest::new();
        }

        let mut manifest = self.collect_files(root, root);

        let preferences = root.join(&self.rules.preferences_dir);
        let is_real_dir = fs::symlink_metadata(&preferences).is_ok_and(|m| m.is_dir());
        if is_real_dir && !self.rules.is_excluded(&self.rules.preferences_dir) {
            manifest.extend(self.collect_preferences(&preferences));
        }

        log::info!(
            "Built manifest of {:?}: {} file(s), {} preference set(s), {} warning(s)",
            root,
            manifest.paths(Group::Files).len(),
            manifest.paths(Group::Preferences).len(),
            manifest.warnings().len()
        );
        manifest
    }

    /// Collects every file below `dir` with paths relative to `base`.
    ///
    /// `base` must be `dir` itself or one of its ancestors. For a tree holding
    /// `b/c`, collecting `b` relative to its parent yields `b/c`, and relative
    /// to `b` yields `c`.
    pub fn collect_files(&self, dir: &Path, base: &Path) -> Manifest {
        let mut manifest = Manifest::new();

        if dir.strip_prefix(base).is_err() {
            record(&mut manifest, dir, format!("not located under {:?}", base));
            return manifest;
        }

        if !dir.is_dir() {
            log::debug!("{:?} is not a directory, no files collected", dir);
            return manifest;
        }

        walk_files(dir, base, &self.rules, &mut manifest);
        manifest
    }

    /// Lists `dir` as a preferences subtree.
    pub fn collect_preferences(&self, dir: &Path) -> Manifest {
        let mut manifest = Manifest::new();
        if dir.is_dir() {
            list_preferences(dir, &self.rules, &mut manifest);
        }
        manifest
    }
}
