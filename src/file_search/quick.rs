use chrono::{DateTime, Utc};
use std::env;
use std::fs;
use std::path::Path;

use super::error::{FilterError, ScanError};
use super::predicates::{DateRange, NamePattern, SizeRange};
use super::types::FileMatch;
use crate::logging::{detail, event};

/// Files directly inside `dir` whose name matches `pattern` and whose size
/// and modification time fall in the given ranges. Does not recurse.
pub fn quick_search(
    dir: &Path,
    pattern: &NamePattern,
    size: SizeRange,
    modified: DateRange,
) -> Result<Vec<FileMatch>, ScanError> {
    size.validate()?;
    modified.validate()?;
    if !dir.is_dir() {
        return Err(if dir.exists() {
            FilterError::RootNotDirectory(dir.to_path_buf())
        } else {
            FilterError::RootNotFound(dir.to_path_buf())
        }
        .into());
    }

    let entries = fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                detail!("Skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        let name = entry.file_name();
        if !pattern.is_match(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let Some(file) = regular_file(&path) else {
            continue;
        };
        if size.contains(file.size()) && modified.contains(file.last_modified()) {
            matches.push(file);
        }
    }

    matches.sort_by(|a, b| a.path().cmp(b.path()));
    event!(
        "Quick search for '{}' in {}: {} match(es)",
        pattern.source(),
        dir.display(),
        matches.len()
    );
    Ok(matches)
}

/// The file at `path`, if it exists and is a regular file.
pub fn locate_file(path: &Path) -> Option<FileMatch> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().ok()?.join(path)
    };
    let found = regular_file(&absolute);
    if found.is_none() {
        event!(warn, "No file at {}", absolute.display());
    }
    found
}

fn regular_file(path: &Path) -> Option<FileMatch> {
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(FileMatch::new(
        path,
        metadata.len(),
        metadata.modified().ok().map(DateTime::<Utc>::from),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), b"short").unwrap();
        fs::write(dir.path().join("Report.TXT"), vec![b'x'; 2048]).unwrap();
        fs::write(dir.path().join("notes.txt.bak"), b"old").unwrap();
        fs::create_dir(dir.path().join("nested.txt")).unwrap();
        fs::write(dir.path().join("nested.txt").join("deep.txt"), b"deep").unwrap();
        dir
    }

    #[test]
    fn matches_only_top_level_files() {
        let dir = fixture();
        let pattern = NamePattern::from_glob("*.txt").unwrap();
        let found = quick_search(dir.path(), &pattern, SizeRange::default(), DateRange::default())
            .unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|m| m.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"notes.txt".to_string()));
        assert!(names.contains(&"Report.TXT".to_string()));
    }

    #[test]
    fn size_filter_applies() {
        let dir = fixture();
        let pattern = NamePattern::from_glob("*.txt").unwrap();
        let found =
            quick_search(dir.path(), &pattern, SizeRange::at_least(1024), DateRange::default())
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size(), 2048);
    }

    #[test]
    fn glob_alternatives_and_classes_match() {
        let dir = TempDir::new().unwrap();
        for name in ["a.txt", "b.log", "c.csv", "file1.bin", "fileA.bin"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let either = NamePattern::from_glob("*.{txt,log}").unwrap();
        let found =
            quick_search(dir.path(), &either, SizeRange::default(), DateRange::default()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].path().ends_with("a.txt"));
        assert!(found[1].path().ends_with("b.log"));

        let digit = NamePattern::from_glob("file[0-9].bin").unwrap();
        let found =
            quick_search(dir.path(), &digit, SizeRange::default(), DateRange::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].path().ends_with("file1.bin"));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = fixture();
        let pattern = NamePattern::from_glob("*").unwrap();
        let result = quick_search(
            &dir.path().join("absent"),
            &pattern,
            SizeRange::default(),
            DateRange::default(),
        );
        assert!(matches!(
            result,
            Err(ScanError::InvalidRequest(FilterError::RootNotFound(_)))
        ));
    }

    #[test]
    fn locate_file_ignores_directories() {
        let dir = fixture();
        assert!(locate_file(&dir.path().join("notes.txt")).is_some());
        assert!(locate_file(&dir.path().join("nested.txt")).is_none());
        assert!(locate_file(&dir.path().join("missing.txt")).is_none());
    }
}
