// Eidos by Bryan Emmanuel

use super::entry::{Manifest, ManifestEntry};
use super::rules::ManifestRules;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// How the walker treats a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    File,
    Dir,
    /// Sockets, devices, symlinked directories and the like. Never listed.
    Other,
}

/// Classifies an entry without following symlinked directories.
///
/// A symlink whose target is a regular file counts as a file. Any other
/// symlink is reported as `Other`, so the walk can never loop.
pub(crate) fn classify(entry: &DirEntry) -> io::Result<NodeKind> {
    if entry.path_is_symlink() {
        let target = fs::metadata(entry.path())?;
        if target.is_file() {
            return Ok(NodeKind::File);
        }
        log::debug!("Not descending into symlink {:?}", entry.path());
        return Ok(NodeKind::Other);
    }

    let file_type = entry.file_type();
    if file_type.is_file() {
        Ok(NodeKind::File)
    } else if file_type.is_dir() {
        Ok(NodeKind::Dir)
    } else {
        Ok(NodeKind::Other)
    }
}

/// Logs a per-node failure and records it on the manifest.
pub(crate) fn record(manifest: &mut Manifest, path: &Path, message: String) {
    log::warn!("Skipping {:?}: {}", path, message);
    manifest.warn(path.to_string_lossy().to_string(), message);
}

/// Records a walk error. A node that vanished mid-walk is not a failure.
fn record_walk_error(manifest: &mut Manifest, dir: &Path, err: walkdir::Error) {
    let path = err.path().unwrap_or(dir).to_path_buf();
    if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::NotFound) {
        log::debug!("{:?} vanished or never existed", path);
        return;
    }
    record(manifest, &path, err.to_string());
}

/// Returns true for the preferences directory directly below `base`.
fn is_base_preferences_dir(entry: &DirEntry, base: &Path, rules: &ManifestRules) -> bool {
    entry.file_type().is_dir()
        && entry
            .path()
            .strip_prefix(base)
            .is_ok_and(|relative| relative.to_str().is_some_and(|r| rules.is_preferences_dir(r)))
}

/// Walks everything below `dir`, adding each plain file with its path
/// relative to `base`.
///
/// Excluded names are pruned with their whole subtree, and so is the
/// preferences directory directly below `base`. Names that are not UTF-8
/// are reported and skipped, together with anything below them.
pub(crate) fn walk_files(dir: &Path, base: &Path, rules: &ManifestRules, manifest: &mut Manifest) {
    let mut walker = WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            let excluded = e.file_name().to_str().is_some_and(|n| rules.is_excluded(n));
            if excluded {
                log::debug!("Excluded {:?}", e.path());
            }
            !excluded && !is_base_preferences_dir(e, base, rules)
        });

    while let Some(result) = walker.next() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                record_walk_error(manifest, dir, e);
                continue;
            }
        };

        if entry.file_name().to_str().is_none() {
            record(
                manifest,
                entry.path(),
                format!("name is not valid UTF-8: {:?}", entry.file_name()),
            );
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        match classify(&entry) {
            Ok(NodeKind::File) => match entry.path().strip_prefix(base) {
                Ok(relative) => {
                    manifest.push(ManifestEntry::file(relative.to_string_lossy().to_string()))
                }
                Err(_) => record(manifest, entry.path(), format!("not located under {:?}", base)),
            },
            Ok(NodeKind::Dir) | Ok(NodeKind::Other) => {}
            Err(e) => record(manifest, entry.path(), e.to_string()),
        }
    }
}

/// Lists the direct children of a preferences directory as preference sets.
///
/// Two files mapping to the same set name, such as `foo.xml` and `foo` when
/// unsuffixed files are kept, register the set once and record a warning.
pub(crate) fn list_preferences(dir: &Path, rules: &ManifestRules, manifest: &mut Manifest) {
    let mut seen: HashSet<String> = HashSet::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1);

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                record_walk_error(manifest, dir, e);
                continue;
            }
        };

        let Some(file_name) = entry.file_name().to_str() else {
            record(
                manifest,
                entry.path(),
                format!("name is not valid UTF-8: {:?}", entry.file_name()),
            );
            continue;
        };
        if rules.is_excluded(file_name) {
            continue;
        }

        match classify(&entry) {
            Ok(NodeKind::File) => match rules.preference_name(file_name) {
                Some(name) if seen.contains(&name) => record(
                    manifest,
                    entry.path(),
                    format!("duplicate preference set name {:?}", name),
                ),
                Some(name) => {
                    seen.insert(name.clone());
                    manifest.push(ManifestEntry::preference(name));
                }
                None => log::debug!(
                    "{:?} lacks the {:?} suffix, not a preference set",
                    entry.path(),
                    rules.preference_suffix
                ),
            },
            Ok(_) => log::debug!("Ignoring non-file {:?} in preferences", entry.path()),
            Err(e) => record(manifest, entry.path(), e.to_string()),
        }
    }
}
