//! Report payload archives.
//!
//! A report payload is a zip of the files produced by the analysis. The
//! store extracts it into a fresh private directory per call; the returned
//! [`ExtractedReport`] owns that directory and removes it on drop.

use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ArchiveError;
use crate::model::ReportId;

/// Prefix of every extraction directory.
const EXTRACT_PREFIX: &str = "reportq-";

/// Extracts report payloads under a configurable working root.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    work_directory: PathBuf,
}

impl ArchiveStore {
    pub fn new<P: AsRef<Path>>(work_directory: P) -> Self {
        Self {
            work_directory: work_directory.as_ref().to_path_buf(),
        }
    }

    /// Store rooted in the system temp directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    /// Extracts `payload` into a newly allocated directory.
    ///
    /// The payload is only read; calling this twice yields two independent
    /// directories with the same content.
    pub fn extract(&self, id: ReportId, payload: &[u8]) -> Result<ExtractedReport, ArchiveError> {
        let _span = tracing::debug_span!("archive.extract", report_id = %id).entered();

        std::fs::create_dir_all(&self.work_directory).map_err(|e| ArchiveError::Io {
            path: self.work_directory.clone(),
            source: e,
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{EXTRACT_PREFIX}{id}-"))
            .tempdir_in(&self.work_directory)
            .map_err(|e| ArchiveError::Io {
                path: self.work_directory.clone(),
                source: e,
            })?;

        let mut archive = ZipArchive::new(Cursor::new(payload))
            .map_err(|e| zip_error(id, dir.path(), e))?;
        archive
            .extract(dir.path())
            .map_err(|e| zip_error(id, dir.path(), e))?;

        let entries = list_entries(dir.path())?;
        log::debug!(
            "Extracted report {} into {} ({} entries)",
            id,
            dir.path().display(),
            entries.len()
        );

        Ok(ExtractedReport { id, dir, entries })
    }
}

fn zip_error(id: ReportId, path: &Path, err: ZipError) -> ArchiveError {
    match err {
        ZipError::Io(source) if is_malformed_data(&source) => ArchiveError::ArchiveCorrupt {
            id,
            reason: source.to_string(),
        },
        ZipError::Io(source) => ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => ArchiveError::ArchiveCorrupt {
            id,
            reason: other.to_string(),
        },
    }
}

/// Kinds the zip reader reports for malformed entry data, as opposed to
/// filesystem failures while writing the extracted files.
fn is_malformed_data(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput | ErrorKind::UnexpectedEof
    )
}

fn list_entries(dir: &Path) -> Result<Vec<String>, ArchiveError> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            entry
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .map_err(|e| ArchiveError::Io {
                    path: dir.to_path_buf(),
                    source: e.into(),
                })
        })
        .collect()
}

/// A decompressed report payload. Dropping it deletes the directory.
#[derive(Debug)]
pub struct ExtractedReport {
    id: ReportId,
    dir: TempDir,
    entries: Vec<String>,
}

impl ExtractedReport {
    pub fn report_id(&self) -> ReportId {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Names of the top-level files and directories, sorted.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Every extracted file, relative to [`Self::path`], sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        WalkDir::new(self.dir.path())
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(self.dir.path())
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    /// Deletes the directory now, reporting any failure.
    pub fn close(self) -> Result<(), ArchiveError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| ArchiveError::Io { path, source: e })
    }
}

/// Zips the content of `dir` into an in-memory payload, entries sorted by name.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ArchiveError::Pack(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| ArchiveError::Pack(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(|e| ArchiveError::Pack(e.to_string()))?;
        } else if entry.file_type().is_file() {
            let content = std::fs::read(entry.path()).map_err(|e| ArchiveError::Io {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            writer
                .start_file(name, options)
                .map_err(|e| ArchiveError::Pack(e.to_string()))?;
            writer.write_all(&content).map_err(|e| ArchiveError::Io {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| ArchiveError::Pack(e.to_string()))?;
    Ok(cursor.into_inner())
}
