//! Archive extraction

use crate::error::{DemoError, Result};
use std::fs::File;
use std::path::Path;

/// Archive extraction collaborator
pub trait ArchiveExtractor: Send + Sync {
    /// Unpack every entry of `archive` under `destination`, returning the entry count
    fn extract(&self, archive: &Path, destination: &Path) -> Result<usize>;
}

/// Zip extractor; existing files at entry paths are overwritten
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<usize> {
        let file =
            File::open(archive).map_err(|e| DemoError::file_io_error("open archive", archive, &e))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| DemoError::archive_error(archive, e))?;
        let entries = zip.len();

        tracing::debug!(
            archive = %archive.display(),
            destination = %destination.display(),
            entries,
            "Extracting archive"
        );

        // Entry names escaping the destination are rejected by the zip crate.
        zip.extract(destination)
            .map_err(|e| DemoError::archive_error(archive, e))?;

        Ok(entries)
    }
}
