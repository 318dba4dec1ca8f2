//! Asset downloading over HTTP
//!
//! This module provides async downloading of assets with progress reporting,
//! optional SHA-256 verification, and atomic placement: bytes are streamed into
//! a temporary file next to the destination and only renamed into place once
//! the transfer finished. A failed download never leaves a file at the
//! destination path.

use crate::asset::{AssetSource, GOOGLE_DRIVE_DOWNLOAD_URL};
use crate::error::{DemoError, Result};
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Remote fetch collaborator
///
/// Implementations must not leave anything at `destination` when they fail.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch `source` into `destination`, creating parent directories as needed
    async fn fetch(&self, source: &AssetSource, destination: &Path) -> Result<()>;
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    /// Set message for progress indicator
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => drop(msg),
        }
    }

    /// Set length for progress indicator
    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    /// Set position for progress indicator
    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    /// Remove the indicator from the terminal
    pub fn finish_and_clear(&self) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_and_clear(),
            Self::NoOp => {},
        }
    }
}

/// `reqwest`-backed fetcher
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    show_progress: bool,
    drive_endpoint: String,
}

impl HttpFetcher {
    /// Create a new fetcher
    ///
    /// `timeout` bounds each whole request; `None` waits indefinitely.
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(timeout: Option<Duration>, show_progress: bool) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DemoError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            show_progress,
            drive_endpoint: GOOGLE_DRIVE_DOWNLOAD_URL.to_string(),
        })
    }

    /// Serve Google Drive sources from another endpoint, e.g. a mirror
    #[must_use]
    pub fn with_drive_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.drive_endpoint = endpoint.into();
        self
    }

    /// Create a progress indicator for download reporting
    fn create_progress_indicator(&self) -> ProgressIndicator {
        if !self.show_progress {
            return ProgressIndicator::NoOp;
        }

        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    /// Send the request, retrying once past the Google Drive confirmation page
    async fn open(&self, source: &AssetSource) -> Result<Response> {
        let url = source.download_url_via(&self.drive_endpoint);
        let response = self.get(&url).await?;

        if !is_html(&response) {
            return Ok(response);
        }

        let Some(confirmed) = source.confirmed_download_url_via(&self.drive_endpoint) else {
            return Err(DemoError::network_error(
                format!("Expected a file from {} but received an HTML page", url),
                "unexpected content type",
            ));
        };

        tracing::debug!(url = %confirmed, "Retrying past download confirmation page");
        let response = self.get(&confirmed).await?;
        if is_html(&response) {
            return Err(DemoError::network_error(
                format!(
                    "{} is not publicly downloadable (received an HTML page)",
                    source
                ),
                "unexpected content type",
            ));
        }
        Ok(response)
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DemoError::network_error(format!("Failed to download {}", url), e))?;

        if !response.status().is_success() {
            return Err(DemoError::network_error(
                format!("HTTP error {} for {}", response.status(), url),
                "non-success status",
            ));
        }
        Ok(response)
    }

    /// Stream a response body into `local_path`
    async fn write_body(
        response: Response,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<u64> {
        let total_size = response.content_length();
        if let Some(total) = total_size {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| DemoError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| DemoError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| DemoError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
            if total_size.is_none() {
                progress.set_message(format!("{:.1} MB", downloaded as f64 / 1_048_576.0));
            }
        }

        file.flush()
            .await
            .map_err(|e| DemoError::file_io_error("flush file", local_path, &e))?;

        Ok(downloaded)
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, source: &AssetSource, destination: &Path) -> Result<()> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .map_err(|e| DemoError::file_io_error("create directory", parent, &e))?;

        // Removed on drop unless persisted, so every early return cleans up.
        let temp_path = partial_download_path(parent)?;

        let progress = self.create_progress_indicator();
        progress.set_message(
            destination
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let result = async {
            let response = self.open(source).await?;
            Self::write_body(response, &temp_path, &progress).await
        }
        .await;
        progress.finish_and_clear();
        let downloaded = result?;

        temp_path.persist(destination).map_err(|e| {
            DemoError::file_io_error("move download into place", destination, &e.error)
        })?;

        tracing::debug!(
            bytes = downloaded,
            destination = %destination.display(),
            "Download finished"
        );
        Ok(())
    }
}

/// Reserve a temporary file in `dir` for an in-flight download
fn partial_download_path(dir: &Path) -> Result<TempPath> {
    tempfile::Builder::new()
        .prefix(".pad-download-")
        .suffix(".part")
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
        .map_err(|e| DemoError::file_io_error("create temporary download file", dir, &e))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"))
}

/// Verify the integrity of a downloaded file using SHA-256
///
/// Returns `Ok(true)` when no digest is expected or the digest matches.
pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
    let Some(expected) = expected_hash else {
        return Ok(true);
    };

    let mut file = fs::File::open(file_path)
        .map_err(|e| DemoError::file_io_error("read file for verification", file_path, &e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|e| DemoError::file_io_error("read file for verification", file_path, &e))?;
    let actual_hash = format!("{:x}", hasher.finalize());

    if actual_hash.eq_ignore_ascii_case(expected) {
        Ok(true)
    } else {
        tracing::warn!(
            path = %file_path.display(),
            expected = %expected,
            actual = %actual_hash,
            "File integrity check failed"
        );
        Ok(false)
    }
}

/// Compute the lowercase hex SHA-256 of a file
pub fn file_sha256(file_path: &Path) -> Result<String> {
    let mut file = fs::File::open(file_path)
        .map_err(|e| DemoError::file_io_error("open file for hashing", file_path, &e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|e| DemoError::file_io_error("hash file", file_path, &e))?;
    Ok(format!("{:x}", hasher.finalize()))
}
