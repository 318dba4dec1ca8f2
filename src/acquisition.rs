//! Idempotent asset acquisition
//!
//! Check, then fetch, then (for archives) extract and delete the archive.
//! Whatever happens, a failed acquisition leaves nothing at the asset's local
//! path, so the next run retries instead of trusting a half-written file.

use crate::asset::{Asset, AssetKind, Necessity};
use crate::download::{file_sha256, AssetFetcher};
use crate::error::{DemoError, Result};
use crate::extract::ArchiveExtractor;
use crate::report::Console;
use crate::tracing_config::spans;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// Result of acquiring one asset
#[derive(Debug)]
pub enum AcquisitionOutcome {
    /// Local path existed; nothing was fetched
    AlreadyAvailable,
    /// Asset was fetched (and extracted) during this call
    Fetched,
    /// Asset is still missing
    Failed(DemoError),
}

impl AcquisitionOutcome {
    /// Whether the asset can be used
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Whether this outcome must end the run under `necessity`
    #[must_use]
    pub fn aborts_run(&self, necessity: Necessity) -> bool {
        necessity == Necessity::Required && !self.is_available()
    }
}

/// Runs acquisitions against a project root
pub struct AssetAcquirer {
    root: PathBuf,
    fetcher: Box<dyn AssetFetcher>,
    extractor: Box<dyn ArchiveExtractor>,
}

impl AssetAcquirer {
    pub fn new(
        root: impl Into<PathBuf>,
        fetcher: Box<dyn AssetFetcher>,
        extractor: Box<dyn ArchiveExtractor>,
    ) -> Self {
        Self {
            root: root.into(),
            fetcher,
            extractor,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make `asset` present under the root
    ///
    /// Failures are reported on `console` and returned as
    /// [`AcquisitionOutcome::Failed`]; the caller applies `necessity`.
    pub async fn acquire(
        &self,
        asset: &Asset,
        necessity: Necessity,
        console: &mut Console,
    ) -> AcquisitionOutcome {
        let span = spans::acquisition(&asset.name, &necessity.to_string());
        async move {
            if asset.is_satisfied(&self.root) {
                tracing::debug!(path = %asset.local_path.display(), "Asset already present");
                return AcquisitionOutcome::AlreadyAvailable;
            }

            match self.fetch_and_place(asset, console).await {
                Ok(()) => AcquisitionOutcome::Fetched,
                Err(e) => {
                    tracing::warn!(error = %e, necessity = %necessity, "Acquisition failed");
                    AcquisitionOutcome::Failed(e)
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn fetch_and_place(&self, asset: &Asset, console: &mut Console) -> Result<()> {
        let download_path = self.root.join(asset.download_path());
        console.line(format!("Downloading {}...", asset.download_path().display()));

        if let Err(e) = self.fetcher.fetch(&asset.source, &download_path).await {
            console.line(format!("Download failed: {}", e));
            remove_leftover(&download_path);
            return Err(e);
        }

        if let Err(e) = Self::verify(asset, &download_path) {
            console.line(format!("Download failed: {}", e));
            remove_leftover(&download_path);
            return Err(e);
        }
        console.line(format!("Downloaded {}", asset.download_path().display()));

        if let AssetKind::Archive { .. } = &asset.kind {
            console.line(format!("Extracting {}...", asset.inline_name()));
            let extracted = self.unpack(asset, &download_path);
            remove_leftover(&download_path);
            if let Err(e) = extracted {
                console.line(format!("Extraction failed: {}", e));
                return Err(e);
            }
            console.line(format!("{} ready!", asset.name));
        }

        Ok(())
    }

    fn verify(asset: &Asset, download_path: &Path) -> Result<()> {
        let Some(expected) = asset.sha256.as_deref() else {
            return Ok(());
        };
        let actual = file_sha256(download_path)?;
        if actual.eq_ignore_ascii_case(expected) {
            return Ok(());
        }
        Err(DemoError::integrity_error(download_path, expected, &actual))
    }

    /// Extract and check the archive produced the asset's local path
    ///
    /// On failure, anything extracted at the local path is removed again; it
    /// did not exist before this acquisition started.
    fn unpack(&self, asset: &Asset, archive: &Path) -> Result<()> {
        let local_path = self.root.join(&asset.local_path);
        let result = self
            .extractor
            .extract(archive, &self.root)
            .and_then(|entries| {
                tracing::debug!(entries, "Archive extracted");
                if local_path.exists() {
                    Ok(())
                } else {
                    Err(DemoError::archive_error(
                        archive,
                        format!("archive does not contain '{}'", asset.local_path.display()),
                    ))
                }
            });

        if result.is_err() {
            remove_leftover(&local_path);
        }
        result
    }
}

impl std::fmt::Debug for AssetAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetAcquirer")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Best-effort removal of a file or directory created during acquisition
fn remove_leftover(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };
    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "Failed to clean up");
    }
}
