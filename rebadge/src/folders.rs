use filetime::FileTime;
use ubyte::ToByteUnit;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use rbcore::charter::Global;
use crate::error::RebadgeError;

///
/// Filesystem plumbing for the runner: crawling the input tree, exclusion matching and
/// materialising output files with their timestamps intact.
///

///
/// Every regular file beneath root, honouring the hidden-file policy and the exclusion
/// patterns. Returned sorted by path - for consistent behaviour.
///
pub fn files_beneath(root: &Path, global: &Global) -> Vec<PathBuf> {
    let skip_hidden = global.skip_hidden();
    let mut files = vec!();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(move |entry| !(skip_hidden && hidden(entry)));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let name = entry.file_name().to_string_lossy().to_string();

                if excluded(&name, global.file_exclusions()) {
                    log::debug!("Skipping excluded file {}", entry.path().to_canonical_string());
                    continue
                }

                files.push(entry.into_path());
            },
            Ok(_) => {},
            Err(err) => log::warn!("Skipping unreadable entry: {}", err),
        }
    }

    files.sort();
    files
}

fn hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

///
/// Exclusion patterns come in four shapes: exact names, *.ext suffixes, prefix* and
/// *substring*. Matching is case-insensitive.
///
pub fn excluded(filename: &str, patterns: &[String]) -> bool {
    let name = filename.to_lowercase();

    patterns.iter().any(|pattern| {
        let pattern = pattern.to_lowercase();

        match (pattern.starts_with('*'), pattern.ends_with('*'), pattern.len()) {
            (true, true, len) if len >= 2 => name.contains(&pattern[1..len - 1]),
            (true, false, _) => name.ends_with(&pattern[1..]),
            (false, true, len) => name.starts_with(&pattern[..len - 1]),
            _ => name == pattern,
        }
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Materialised {
    Copied,
    Moved,
}

///
/// Put the renamed file in place, by copy or by rename, keeping access and modification
/// times. A rename across filesystems falls back to copy-and-remove.
///
pub fn materialise(source: &Path, destination: &Path, duplicate: bool)
    -> Result<Materialised, RebadgeError> {

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| RebadgeError::CannotCreateDir { path: parent.to_canonical_string(), source })?;
    }

    let metadata = fs::metadata(source)?;

    if duplicate {
        fs::copy(source, destination).map_err(|err| RebadgeError::CannotCopyFile {
            path: source.to_canonical_string(),
            destination: destination.to_canonical_string(),
            source: err })?;

        restore_times(destination, &metadata);
        log::debug!("Copied {} ({})", destination.to_canonical_string(), metadata.len().bytes());
        return Ok(Materialised::Copied)
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(Materialised::Moved),
        Err(rename_err) => {
            // Probably crossing a filesystem boundary - copy, restore times, remove.
            log::debug!("Rename failed ({}), copying instead", rename_err);

            fs::copy(source, destination).map_err(|err| RebadgeError::CannotMoveFile {
                path: source.to_canonical_string(),
                destination: destination.to_canonical_string(),
                source: err })?;

            restore_times(destination, &metadata);

            fs::remove_file(source).map_err(|err| RebadgeError::CannotMoveFile {
                path: source.to_canonical_string(),
                destination: destination.to_canonical_string(),
                source: err })?;

            Ok(Materialised::Moved)
        },
    }
}

///
/// Restore atime/mtime from the source metadata. Failure is logged, never fatal.
///
fn restore_times(path: &Path, metadata: &fs::Metadata) {
    let atime = FileTime::from_last_access_time(metadata);
    let mtime = FileTime::from_last_modification_time(metadata);

    if let Err(err) = filetime::set_file_times(path, atime, mtime) {
        log::warn!("Unable to restore timestamps on {}: {}", path.to_canonical_string(), err);
    }
}

///
/// Returns a canonicalised path if possible, otherwise just the lossy form.
///
pub trait ToCanonicalString: std::fmt::Debug {
    fn to_canonical_string(&self) -> String;
}

impl ToCanonicalString for Path {
    fn to_canonical_string(&self) -> String {
        match self.canonicalize() {
            Ok(path) => path.to_string_lossy().into(),
            Err(_) => self.to_string_lossy().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn exact_and_wildcard_exclusions() {
        let patterns = patterns(&["*.tmp", "~$*", "*backup*", "Thumbs.db"]);

        assert!(excluded("notes.tmp", &patterns));
        assert!(excluded("~$report.docx", &patterns));
        assert!(excluded("old-BACKUP-2023.zip", &patterns));
        assert!(excluded("thumbs.db", &patterns));

        assert!(!excluded("notes.tmp.pdf", &patterns));
        assert!(!excluded("report.docx", &patterns));
    }

    #[test]
    fn no_patterns_excludes_nothing() {
        assert!(!excluded("anything.tmp", &[]));
    }
}
