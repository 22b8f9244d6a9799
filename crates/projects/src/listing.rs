//! Enumeration of the immediate subdirectories of a directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    types::SubdirectoryEntry,
};

/// List the immediate child directories of `dir`, sorted by name.
///
/// Names are compared by their raw bytes, so ordering is case-sensitive
/// and independent of locale (`"Zeta"` sorts before `"alpha"`). Symlinks
/// are not followed: a link to a directory is not listed.
///
/// Children whose entry or file type cannot be read are skipped with a
/// warning. Only failing to open or read `dir` itself is an error.
pub fn list_subdirectories(dir: &Path) -> Result<Vec<SubdirectoryEntry>> {
    let read_dir = fs::read_dir(dir).map_err(|e| Error::directory_unreadable(dir, e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            },
        };
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {
                entries.push(SubdirectoryEntry::from_path(entry.path()));
            },
            Ok(_) => {},
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "cannot determine file type, skipping");
            },
        }
    }

    entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    debug!(dir = %dir.display(), count = entries.len(), "listed subdirectories");
    Ok(entries)
}

/// Run [`list_subdirectories`] on the blocking thread pool.
pub(crate) async fn list_subdirectories_blocking(
    dir: PathBuf,
) -> Result<Vec<SubdirectoryEntry>> {
    let path = dir.clone();
    match tokio::task::spawn_blocking(move || list_subdirectories(&dir)).await {
        Ok(result) => result,
        Err(e) => Err(Error::directory_unreadable(path, std::io::Error::other(e))),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[SubdirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn lists_only_directories_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("beta")).unwrap();
        fs::create_dir(root.join("alpha")).unwrap();
        fs::create_dir(root.join("Gamma")).unwrap();
        fs::write(root.join("notes.txt"), "not a project").unwrap();

        let entries = list_subdirectories(root).unwrap();
        assert_eq!(names(&entries), vec!["Gamma", "alpha", "beta"]);
        assert_eq!(entries[1].path, root.join("alpha"));
    }

    #[test]
    fn empty_directory_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_subdirectories(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn nested_directories_are_not_listed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("outer").join("inner")).unwrap();

        let entries = list_subdirectories(tmp.path()).unwrap();
        assert_eq!(names(&entries), vec!["outer"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_to_directories_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real"), tmp.path().join("link")).unwrap();

        let entries = list_subdirectories(tmp.path()).unwrap();
        assert_eq!(names(&entries), vec!["real"]);
    }

    #[test]
    fn missing_directory_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");

        let err = list_subdirectories(&missing).unwrap_err();
        match err {
            Error::DirectoryUnreadable { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn file_path_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            list_subdirectories(&file),
            Err(Error::DirectoryUnreadable { .. })
        ));
    }

    #[tokio::test]
    async fn blocking_variant_matches() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("one")).unwrap();

        let entries = list_subdirectories_blocking(tmp.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(names(&entries), vec!["one"]);
    }
}
