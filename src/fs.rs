//! Shared filesystem helpers: capability-scoped directory creation and the
//! temp-then-rename commit used for every artifact write.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs::Dir};
use color_eyre::eyre::{Context, Result};
use std::fs;
use std::io::{self, ErrorKind, Write};
use tempfile::{Builder, NamedTempFile};

use crate::artifact::ArtifactId;

/// Creates `path` and any missing parents.
///
/// Creation goes through a capability handle on the path's anchor: the
/// filesystem root for absolute paths, the working directory otherwise.
/// An existing directory is not an error.
pub(crate) fn ensure_dir_exists(path: &Utf8Path) -> Result<()> {
    let (anchor, relative) = match path.strip_prefix("/") {
        Ok(rest) => ("/", rest),
        Err(_) => (".", path),
    };
    if relative.as_str().is_empty() {
        return Ok(());
    }

    let base = Dir::open_ambient_dir(anchor, ambient_authority())
        .with_context(|| format!("open {anchor} to create {path}"))?;
    match base.create_dir_all(relative) {
        Err(err) if err.kind() != ErrorKind::AlreadyExists => {
            Err(err).with_context(|| format!("create {path}"))
        }
        _ => Ok(()),
    }
}

/// Returns `true` when a regular file exists at `path`.
///
/// Final paths are only ever created by rename, so presence implies the file
/// is complete.
pub(crate) fn is_committed_file(path: &Utf8Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file())
}

/// Opens a hidden temporary file for `id` inside `dir`.
pub(crate) fn temp_file_for(id: ArtifactId, dir: &Utf8Path) -> io::Result<NamedTempFile> {
    Builder::new()
        .prefix(&id.temp_prefix())
        .suffix(".tmp")
        .tempfile_in(dir)
}

/// Writes `payload` to a temporary file beside `target` and renames it into
/// place.
///
/// The rename is the only operation that creates `target`, so readers see
/// either nothing or the complete payload. The temporary file is removed on
/// every error path when the handle drops.
pub(crate) fn write_atomic(id: ArtifactId, target: &Utf8Path, payload: &[u8]) -> io::Result<()> {
    let dir = parent_dir(target);
    let mut staged = temp_file_for(id, dir)?;
    staged.write_all(payload)?;
    staged.as_file().sync_all()?;
    staged.persist(target).map_err(|err| err.error)?;
    Ok(())
}

/// Copies `source` into `target` through a temporary file in the target's
/// directory, so the copy completes before `target` appears.
pub(crate) fn copy_atomic(id: ArtifactId, source: &Utf8Path, target: &Utf8Path) -> io::Result<u64> {
    let dir = parent_dir(target);
    let mut staged = temp_file_for(id, dir)?;
    let mut reader = fs::File::open(source)?;
    let copied = io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(target).map_err(|err| err.error)?;
    Ok(copied)
}

/// Removes leftover temporary files for `id` in `dir`.
///
/// Returns the number of files removed. Missing directories and files that
/// vanish mid-scan are not errors.
pub(crate) fn remove_stray_temps(id: ArtifactId, dir: &Utf8Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    let prefix = id.temp_prefix();
    let mut removed = 0;
    for dir_entry in entries {
        let entry = dir_entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(name.starts_with(&prefix) && name.ends_with(".tmp")) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
    }
    Ok(removed)
}

fn parent_dir(target: &Utf8Path) -> &Utf8Path {
    match target.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}
