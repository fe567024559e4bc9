//! ZIP bundling for batch downloads.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// One file to place in the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub media_id: Uuid,
    pub filename: String,
    pub data: Bytes,
}

/// Sanitize filename for archive entry to prevent path traversal.
/// Extracts only the base name (strips path components like `../`).
fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    Path::new(&filename.replace('\\', "/"))
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// `name.ext` -> `name (1).ext`, `name (2).ext`, ... until unused.
fn unique_entry_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (name.clone(), None),
    };

    let mut n = 1;
    loop {
        let candidate = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Create a ZIP archive from already-downloaded media.
pub fn create_zip_archive(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        let mut used = HashSet::new();

        for entry in entries {
            let safe_filename = unique_entry_name(
                sanitize_archive_filename(&entry.filename, &format!("unnamed_{}", entry.media_id)),
                &mut used,
            );

            zip.start_file(&safe_filename, options)
                .with_context(|| format!("Failed to add file to ZIP: {}", safe_filename))?;
            zip.write_all(&entry.data)
                .with_context(|| format!("Failed to write file data to ZIP: {}", safe_filename))?;
        }

        zip.finish().context("Failed to finalize ZIP archive")?;
    }

    Ok(buffer)
}
