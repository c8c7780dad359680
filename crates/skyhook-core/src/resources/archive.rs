//! Upload archive construction.
//!
//! Both builders produce an in-memory zip holding exactly the given
//! resources. They are called again for every upload attempt, so a retried
//! upload never reuses a partially consumed body.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;

use super::{archive_entry_path, resource_error};
use crate::client::Resource;
use crate::error::ActionError;

/// Zip the listed files of a directory source.
pub async fn zip_directory_resources(
    dir: &Path,
    resources: &[Resource],
) -> Result<Vec<u8>, ActionError> {
    let root = dir.to_path_buf();
    let resources = resources.to_vec();
    tokio::task::spawn_blocking(move || {
        write_zip(&resources, |resource| {
            let relative = archive_entry_path(&resource.path, true)?;
            let path = root.join(&relative);
            fs::read(&path).with_context(|| format!("Failed to read file: {}", path.display()))
        })
    })
    .await
    .map_err(ActionError::resource)?
    .map_err(resource_error)
}

/// Zip the listed entries of a prebuilt archive.
pub async fn zip_archive_resources(
    zip_path: &Path,
    resources: &[Resource],
) -> Result<Vec<u8>, ActionError> {
    let source = zip_path.to_path_buf();
    let resources = resources.to_vec();
    tokio::task::spawn_blocking(move || {
        let file = fs::File::open(&source)
            .with_context(|| format!("Failed to open archive: {}", source.display()))?;
        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("Failed to read zip archive: {}", source.display()))?;

        write_zip(&resources, |resource| {
            let mut entry = archive
                .by_name(&resource.path)
                .with_context(|| format!("Archive entry missing: {}", resource.path))?;
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .with_context(|| format!("Failed to read zip entry: {}", resource.path))?;
            Ok(content)
        })
    })
    .await
    .map_err(ActionError::resource)?
    .map_err(resource_error)
}

fn write_zip(
    resources: &[Resource],
    mut read: impl FnMut(&Resource) -> anyhow::Result<Vec<u8>>,
) -> anyhow::Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for resource in resources {
        let content = read(resource)?;
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(resource.mode);
        zip.start_file(resource.path.as_str(), options)
            .with_context(|| format!("Failed to add archive entry: {}", resource.path))?;
        zip.write_all(&content)
            .with_context(|| format!("Failed to write archive entry: {}", resource.path))?;
    }

    let cursor = zip.finish().context("Failed to finish upload archive")?;
    Ok(cursor.into_inner())
}
