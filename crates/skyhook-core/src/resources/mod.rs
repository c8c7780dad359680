//! Local resource manifests for application uploads
//!
//! A resource manifest lists every file of an application source together
//! with its SHA-1 digest, size and permission bits. The platform compares
//! the manifest against its own cache so unchanged files are never sent
//! again; only the remainder ends up in the upload archive built by
//! [`archive`].
//!
//! Sources come in two shapes:
//! - a directory, walked recursively with VCS metadata skipped
//! - a prebuilt zip archive, read entry by entry
//!
//! Symlinks are rejected in both, as are archive entries whose path is
//! absolute or escapes the archive root.

pub mod archive;

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use futures::stream::{self, StreamExt, TryStreamExt};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::client::Resource;
use crate::error::ActionError;

pub use archive::{zip_archive_resources, zip_directory_resources};

/// Maximum number of files digested at the same time.
pub const DIGEST_CONCURRENCY: usize = 8;

/// Entry names never uploaded from a directory source.
pub const IGNORED_NAMES: &[&str] = &[".git", ".hg", ".svn", "_darcs", ".DS_Store"];

/// Permission bits used when a source carries none.
const DEFAULT_MODE: u32 = 0o644;

const SYMLINK_MODE: u32 = 0o120000;
const FILE_TYPE_MASK: u32 = 0o170000;

/// A file found while walking a directory source, not yet digested.
#[derive(Debug)]
struct PendingFile {
    relative: String,
    absolute: PathBuf,
    mode: u32,
}

/// Build the manifest of a directory source, sorted by path.
pub async fn gather_directory_resources(dir: &Path) -> Result<Vec<Resource>, ActionError> {
    let root = dir.to_path_buf();
    let files = tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        walk_directory(&root, "", &mut files)?;
        Ok::<_, anyhow::Error>(files)
    })
    .await
    .map_err(ActionError::resource)?
    .map_err(resource_error)?;

    debug!(dir = %dir.display(), files = files.len(), "digesting directory");

    stream::iter(files)
        .map(|file| async move {
            tokio::task::spawn_blocking(move || digest_file(file))
                .await
                .map_err(ActionError::resource)?
                .map_err(resource_error)
        })
        .buffered(DIGEST_CONCURRENCY)
        .try_collect()
        .await
}

/// Build the manifest of a prebuilt zip archive, sorted by path.
pub async fn gather_archive_resources(zip_path: &Path) -> Result<Vec<Resource>, ActionError> {
    let path = zip_path.to_path_buf();
    tokio::task::spawn_blocking(move || read_archive_manifest(&path))
        .await
        .map_err(ActionError::resource)?
        .map_err(resource_error)
}

/// Resources of `all` that are not in `matched`, compared by path and digest.
pub fn unmatched(all: &[Resource], matched: &[Resource]) -> Vec<Resource> {
    let known: HashSet<(&str, &str)> = matched
        .iter()
        .map(|r| (r.path.as_str(), r.checksum.as_str()))
        .collect();

    all.iter()
        .filter(|r| !known.contains(&(r.path.as_str(), r.checksum.as_str())))
        .cloned()
        .collect()
}

pub(crate) fn resource_error(err: anyhow::Error) -> ActionError {
    ActionError::Resource(format!("{:#}", err))
}

fn walk_directory(dir: &Path, base: &str, files: &mut Vec<PendingFile>) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut sorted_entries: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if IGNORED_NAMES.contains(&name_str.as_ref()) {
            continue;
        }

        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", entry.path().display()))?;

        if ty.is_dir() {
            walk_directory(&entry.path(), &rel_path, files)?;
        } else if ty.is_file() {
            let metadata = entry
                .metadata()
                .with_context(|| format!("Failed to stat file: {}", entry.path().display()))?;
            files.push(PendingFile {
                relative: rel_path,
                absolute: entry.path(),
                mode: permission_bits(&metadata),
            });
        } else if ty.is_symlink() {
            anyhow::bail!("Symlinks are not supported: {}", entry.path().display());
        } else {
            anyhow::bail!(
                "Unsupported filesystem entry type: {}",
                entry.path().display()
            );
        }
    }

    Ok(())
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &fs::Metadata) -> u32 {
    DEFAULT_MODE
}

fn digest_file(file: PendingFile) -> anyhow::Result<Resource> {
    let mut reader = fs::File::open(&file.absolute)
        .with_context(|| format!("Failed to open file: {}", file.absolute.display()))?;
    let (checksum, size_in_bytes) = sha1_stream(&mut reader)
        .with_context(|| format!("Failed to read file: {}", file.absolute.display()))?;

    Ok(Resource {
        path: file.relative,
        checksum,
        size_in_bytes,
        mode: file.mode,
    })
}

fn read_archive_manifest(zip_path: &Path) -> anyhow::Result<Vec<Resource>> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("Failed to open archive: {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive: {}", zip_path.display()))?;

    let mut resources = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;

        if entry.is_dir() {
            continue;
        }
        let path = archive_entry_path(entry.name(), entry.enclosed_name().is_some())?;

        let mode = entry.unix_mode().unwrap_or(DEFAULT_MODE);
        if mode & FILE_TYPE_MASK == SYMLINK_MODE {
            anyhow::bail!("Symlinks are not supported in archives: {}", path);
        }

        let (checksum, size_in_bytes) = sha1_stream(&mut entry)
            .with_context(|| format!("Failed to read zip entry: {}", path))?;

        resources.push(Resource {
            path,
            checksum,
            size_in_bytes,
            mode: mode & 0o777,
        });
    }

    resources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(resources)
}

/// Normalise an archive entry name, refusing names that leave the root.
pub(crate) fn archive_entry_path(name: &str, enclosed: bool) -> anyhow::Result<String> {
    let normalized = name.replace('\\', "/");
    if !enclosed || normalized.starts_with('/') || normalized.split('/').any(|part| part == "..")
    {
        anyhow::bail!("Unsafe path in archive: {}", name);
    }
    Ok(normalized)
}

/// Hex SHA-1 and length of everything `reader` yields, read in chunks.
fn sha1_stream(reader: &mut impl Read) -> io::Result<(String, u64)> {
    let mut hasher = Sha1::new();
    let size = io::copy(reader, &mut hasher)?;
    Ok((hex::encode(hasher.finalize()), size))
}
