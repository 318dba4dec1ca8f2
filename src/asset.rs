//! Remote asset descriptions
//!
//! An [`Asset`] names a remote source and the local path that proves it is
//! present. Acquisition (see [`crate::acquisition`]) is skipped whenever that
//! local path already exists.

use crate::error::{DemoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Google Drive direct download endpoint
pub const GOOGLE_DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc";

/// Where an asset is fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetSource {
    /// Shared Google Drive file, addressed by its file id
    GoogleDrive { file_id: String },
    /// Plain HTTP(S) URL
    Url { url: String },
}

impl AssetSource {
    /// Google Drive source for a file id
    pub fn google_drive<S: Into<String>>(file_id: S) -> Self {
        Self::GoogleDrive {
            file_id: file_id.into(),
        }
    }

    /// Plain URL source
    pub fn url<S: Into<String>>(url: S) -> Self {
        Self::Url { url: url.into() }
    }

    /// URL for the first download attempt
    #[must_use]
    pub fn download_url(&self) -> String {
        self.download_url_via(GOOGLE_DRIVE_DOWNLOAD_URL)
    }

    /// First download URL, with Google Drive files served from `drive_endpoint`
    #[must_use]
    pub fn download_url_via(&self, drive_endpoint: &str) -> String {
        match self {
            Self::GoogleDrive { file_id } => {
                format!("{}?id={}&export=download", drive_endpoint, file_id)
            },
            Self::Url { url } => url.clone(),
        }
    }

    /// URL that skips the interstitial page Google Drive serves for large files
    #[must_use]
    pub fn confirmed_download_url(&self) -> Option<String> {
        self.confirmed_download_url_via(GOOGLE_DRIVE_DOWNLOAD_URL)
    }

    /// Confirmed download URL against `drive_endpoint`
    #[must_use]
    pub fn confirmed_download_url_via(&self, drive_endpoint: &str) -> Option<String> {
        match self {
            Self::GoogleDrive { .. } => Some(format!(
                "{}&confirm=t",
                self.download_url_via(drive_endpoint)
            )),
            Self::Url { .. } => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::GoogleDrive { file_id } if file_id.trim().is_empty() => Err(
                DemoError::invalid_config("Google Drive file id cannot be empty"),
            ),
            Self::Url { url } if !(url.starts_with("http://") || url.starts_with("https://")) => {
                Err(DemoError::invalid_config(format!(
                    "Unsupported asset URL: {}. Only http(s) URLs are supported.",
                    url
                )))
            },
            _ => Ok(()),
        }
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoogleDrive { file_id } => write!(f, "gdrive:{}", file_id),
            Self::Url { url } => write!(f, "{}", url),
        }
    }
}

/// How a fetched asset lands on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetKind {
    /// Zip archive downloaded to `archive`, unpacked into the root, then deleted
    Archive { archive: PathBuf },
    /// File downloaded straight to the asset's local path
    SingleFile,
}

/// Whether a failed acquisition stops the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Necessity {
    /// Failure aborts the run
    Required,
    /// Failure only skips the step that needs the asset
    BestEffort,
}

impl fmt::Display for Necessity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// A remote file or archive the demo needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Human-readable name used in console messages
    pub name: String,
    /// Remote reference
    pub source: AssetSource,
    /// Path, relative to the project root, whose existence satisfies the asset
    pub local_path: PathBuf,
    /// Archive or single file
    pub kind: AssetKind,
    /// Expected SHA-256 of the downloaded file, lowercase hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl Asset {
    /// Describe a single-file asset such as a model checkpoint
    pub fn single_file<N, P>(name: N, source: AssetSource, local_path: P) -> Self
    where
        N: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            source,
            local_path: local_path.into(),
            kind: AssetKind::SingleFile,
            sha256: None,
        }
    }

    /// Describe a zip archive that unpacks to `local_path`
    pub fn archive<N, P, A>(name: N, source: AssetSource, local_path: P, archive: A) -> Self
    where
        N: Into<String>,
        P: Into<PathBuf>,
        A: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            source,
            local_path: local_path.into(),
            kind: AssetKind::Archive {
                archive: archive.into(),
            },
            sha256: None,
        }
    }

    /// Attach an expected SHA-256 digest to verify after download
    #[must_use]
    pub fn with_sha256<S: Into<String>>(mut self, digest: S) -> Self {
        self.sha256 = Some(digest.into().to_lowercase());
        self
    }

    /// Name for use mid-sentence: "Test images" becomes "test images",
    /// acronyms such as "ERFNet model" are left alone
    #[must_use]
    pub fn inline_name(&self) -> String {
        let mut chars = self.name.chars();
        match (chars.next(), chars.next()) {
            (Some(first), Some(second)) if !second.is_uppercase() => {
                first.to_lowercase().chain(self.name.chars().skip(1)).collect()
            },
            _ => self.name.clone(),
        }
    }

    /// Whether the asset is archive-typed
    #[must_use]
    pub fn is_archive(&self) -> bool {
        matches!(self.kind, AssetKind::Archive { .. })
    }

    /// Path the fetcher writes to, relative to the root
    #[must_use]
    pub fn download_path(&self) -> &Path {
        match &self.kind {
            AssetKind::Archive { archive } => archive,
            AssetKind::SingleFile => &self.local_path,
        }
    }

    /// Whether the asset is already present under `root`
    #[must_use]
    pub fn is_satisfied(&self, root: &Path) -> bool {
        root.join(&self.local_path).exists()
    }

    /// Check the description is usable
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DemoError::invalid_config("Asset name cannot be empty"));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(DemoError::invalid_config(format!(
                "Asset '{}' has an empty local path",
                self.name
            )));
        }
        if let AssetKind::Archive { archive } = &self.kind {
            if archive.as_os_str().is_empty() || archive == &self.local_path {
                return Err(DemoError::invalid_config(format!(
                    "Asset '{}' needs an archive path distinct from its local path",
                    self.name
                )));
            }
        }
        if let Some(digest) = &self.sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(DemoError::invalid_config(format!(
                    "Asset '{}' has a malformed SHA-256 digest: {}",
                    self.name, digest
                )));
            }
        }
        self.source.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inline_name_keeps_acronyms() {
        let images = Asset::archive("Test images", AssetSource::google_drive("a"), "d", "d.zip");
        let model = Asset::single_file("ERFNet model", AssetSource::google_drive("b"), "m.pt");
        assert_eq!(images.inline_name(), "test images");
        assert_eq!(model.inline_name(), "ERFNet model");
    }

    #[test]
    fn test_google_drive_urls() {
        let source = AssetSource::google_drive("16-Q_jZYc9IIKUEHhClSTwZI4ClMeVvQS");
        assert_eq!(
            source.download_url(),
            "https://drive.google.com/uc?id=16-Q_jZYc9IIKUEHhClSTwZI4ClMeVvQS&export=download"
        );
        assert_eq!(
            source.confirmed_download_url().as_deref(),
            Some("https://drive.google.com/uc?id=16-Q_jZYc9IIKUEHhClSTwZI4ClMeVvQS&export=download&confirm=t")
        );
    }

    #[test]
    fn test_google_drive_urls_via_custom_endpoint() {
        let source = AssetSource::google_drive("abc");
        assert_eq!(
            source.download_url_via("http://127.0.0.1:8080/uc"),
            "http://127.0.0.1:8080/uc?id=abc&export=download"
        );
        assert_eq!(
            source
                .confirmed_download_url_via("http://127.0.0.1:8080/uc")
                .as_deref(),
            Some("http://127.0.0.1:8080/uc?id=abc&export=download&confirm=t")
        );
        assert_eq!(
            AssetSource::url("https://example.com/m.pt").download_url_via("http://ignored/uc"),
            "https://example.com/m.pt"
        );
    }

    #[test]
    fn test_plain_url_has_no_confirmation() {
        let source = AssetSource::url("https://example.com/model.pt");
        assert_eq!(source.download_url(), "https://example.com/model.pt");
        assert!(source.confirmed_download_url().is_none());
    }

    #[test]
    fn test_download_path_depends_on_kind() {
        let archive = Asset::archive(
            "Test images",
            AssetSource::google_drive("abc"),
            "PAD_test_images",
            "PAD_test_images.zip",
        );
        assert!(archive.is_archive());
        assert_eq!(archive.download_path(), Path::new("PAD_test_images.zip"));

        let file = Asset::single_file(
            "ERFNet model",
            AssetSource::google_drive("def"),
            "checkpoints/erfnet_baseline_culane_20210204.pt",
        );
        assert!(!file.is_archive());
        assert_eq!(
            file.download_path(),
            Path::new("checkpoints/erfnet_baseline_culane_20210204.pt")
        );
    }

    #[test]
    fn test_satisfaction_follows_local_path() {
        let root = TempDir::new().unwrap();
        let asset = Asset::single_file("model", AssetSource::google_drive("x"), "model.pt");
        assert!(!asset.is_satisfied(root.path()));

        std::fs::write(root.path().join("model.pt"), b"weights").unwrap();
        assert!(asset.is_satisfied(root.path()));
    }

    #[test]
    fn test_validation_rejects_bad_descriptions() {
        let same_paths = Asset::archive("imgs", AssetSource::google_drive("x"), "a", "a");
        assert!(same_paths.validate().is_err());

        let empty_id = Asset::single_file("m", AssetSource::google_drive(" "), "m.pt");
        assert!(empty_id.validate().is_err());

        let ftp = Asset::single_file("m", AssetSource::url("ftp://host/m.pt"), "m.pt");
        assert!(ftp.validate().is_err());

        let short_digest =
            Asset::single_file("m", AssetSource::google_drive("x"), "m.pt").with_sha256("abc");
        assert!(short_digest.validate().is_err());

        let good = Asset::single_file("m", AssetSource::google_drive("x"), "m.pt")
            .with_sha256("A".repeat(64));
        assert!(good.validate().is_ok());
        assert_eq!(good.sha256.as_deref(), Some("a".repeat(64).as_str()));
    }

    #[test]
    fn test_asset_json_shape() {
        let asset = Asset::archive(
            "Test images",
            AssetSource::google_drive("abc"),
            "PAD_test_images",
            "PAD_test_images.zip",
        );
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["source"]["type"], "google_drive");
        assert_eq!(json["kind"]["type"], "archive");
        assert!(json.get("sha256").is_none());

        let back: Asset = serde_json::from_value(json).unwrap();
        assert_eq!(back, asset);
    }
}
