use std::{fs, io, path::Path};

use {
    tracing::{debug, warn},
    walkdir::WalkDir,
};

use crate::error::{Error, Result};

/// Move the directory `from` to `to`.
///
/// Uses a rename when possible. When `from` and `to` live on different
/// filesystems the tree is copied and the source removed afterwards. A copy
/// that fails is removed again and `from` is left untouched. Once the copy
/// is complete the move counts as done: if the source cannot be removed
/// entirely, what is left of it stays in place and is logged.
pub(crate) fn move_entry(from: &Path, to: &Path) -> Result<()> {
    relocate(from, to, |from, to| fs::rename(from, to), |from| fs::remove_dir_all(from))
}

fn relocate<R, D>(from: &Path, to: &Path, rename: R, remove_source: D) -> Result<()>
where
    R: FnOnce(&Path, &Path) -> io::Result<()>,
    D: FnOnce(&Path) -> io::Result<()>,
{
    match rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying instead");
            copy_tree(from, to).map_err(|e| Error::move_failed(from, to, e))?;
            if let Err(e) = remove_source(from) {
                warn!(
                    from = %from.display(),
                    to = %to.display(),
                    error = %e,
                    "copied project but could not fully remove the original"
                );
            }
            Ok(())
        },
        Err(e) => Err(Error::move_failed(from, to, e)),
    }
}

/// Copy the tree at `from` to the new directory `to`. Nothing is left at
/// `to` on failure.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    // Fails when something appeared at `to` since the caller checked.
    fs::create_dir(to)?;
    if let Err(e) = copy_contents(from, to) {
        let _ = fs::remove_dir_all(to);
        return Err(e);
    }
    Ok(())
}

fn copy_contents(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let target = to.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}
