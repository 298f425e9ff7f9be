//! Guarded removal of whole directory trees, used by full cache clears and
//! resolver invalidation.

use camino::{Utf8Component, Utf8Path};
use std::fs;
use std::io::{self, ErrorKind};

/// What a guarded removal found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Removal {
    Removed,
    Missing,
}

/// Removes the tree at `path`, treating a missing tree as success.
///
/// Paths that name no directory (empty, `.`, or the filesystem root) or
/// that climb through `..` are refused with [`ErrorKind::InvalidInput`]
/// before anything is touched.
pub(crate) fn remove_tree(path: &Utf8Path) -> io::Result<Removal> {
    check_removable(path)?;
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(Removal::Removed),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Removal::Missing),
        Err(err) => Err(err),
    }
}

fn check_removable(path: &Utf8Path) -> io::Result<()> {
    let mut named = 0_usize;
    for component in path.components() {
        match component {
            Utf8Component::ParentDir => return Err(refusal(path, "it climbs through `..`")),
            Utf8Component::Normal(_) => named += 1,
            Utf8Component::Prefix(_) | Utf8Component::RootDir | Utf8Component::CurDir => {}
        }
    }
    if named == 0 {
        return Err(refusal(path, "it names no directory"));
    }
    Ok(())
}

fn refusal(path: &Utf8Path, why: &str) -> io::Error {
    io::Error::new(
        ErrorKind::InvalidInput,
        format!("refusing to remove {path:?}: {why}"),
    )
}
