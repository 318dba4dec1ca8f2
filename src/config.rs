//! Configuration types for the demo workflow
//!
//! [`DemoConfig::default`] reproduces the stock PAD demo. A JSON file can
//! override any subset of fields; missing fields keep their defaults.

use crate::asset::{Asset, AssetSource, GOOGLE_DRIVE_DOWNLOAD_URL};
use crate::error::{DemoError, Result};
use crate::invocation::{ImageVisualization, VideoVisualization};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Assets the demo acquires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTable {
    /// Test images archive, needed by both visualizations
    pub test_images: Asset,
    /// CULane checkpoint for the image visualization
    pub culane_model: Asset,
    /// TuSimple checkpoint for the optional video visualization
    pub tusimple_model: Asset,
}

impl Default for AssetTable {
    fn default() -> Self {
        Self {
            test_images: Asset::archive(
                "Test images",
                AssetSource::google_drive("1XQvBS1uoHeIgUv7oDQ4Vp1tWYi0oAGhU"),
                "PAD_test_images",
                "PAD_test_images.zip",
            ),
            culane_model: Asset::single_file(
                "ERFNet model",
                AssetSource::google_drive("16-Q_jZYc9IIKUEHhClSTwZI4ClMeVvQS"),
                "checkpoints/erfnet_baseline_culane_20210204.pt",
            ),
            tusimple_model: Asset::single_file(
                "TuSimple model",
                AssetSource::google_drive("1rLWDP_dkIQ7sBsCEzJi8T7ET1EPghhJJ"),
                "checkpoints/erfnet_baseline_tusimple_20210424.pt",
            ),
        }
    }
}

/// Full configuration of one demo run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Project root every relative path resolves against
    pub root: PathBuf,
    /// File that must exist in `root`
    pub marker_file: String,
    /// Directories created before any download
    pub output_dirs: Vec<PathBuf>,
    /// Interpreter used to launch the visualization scripts
    pub python: String,
    pub assets: AssetTable,
    pub image_visualization: ImageVisualization,
    pub video_visualization: VideoVisualization,
    /// Endpoint serving Google Drive sources
    pub google_drive_endpoint: String,
    /// Per-request download timeout in seconds; unset waits indefinitely
    pub fetch_timeout_secs: Option<u64>,
    /// Draw download progress bars
    pub show_progress: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            marker_file: "main_landet.py".to_string(),
            output_dirs: vec![PathBuf::from("checkpoints"), PathBuf::from("demo_results")],
            python: "python".to_string(),
            assets: AssetTable::default(),
            image_visualization: ImageVisualization::default(),
            video_visualization: VideoVisualization::default(),
            google_drive_endpoint: GOOGLE_DRIVE_DOWNLOAD_URL.to_string(),
            fetch_timeout_secs: None,
            show_progress: true,
        }
    }
}

impl DemoConfig {
    /// Create a builder for custom configuration
    pub fn builder() -> DemoConfigBuilder {
        DemoConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this structure
    /// - Resulting configuration fails [`Self::validate`]
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DemoError::file_io_error("read configuration file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            DemoError::invalid_config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Download timeout as a [`Duration`]
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty marker file name or interpreter
    /// - Zero fetch timeout
    /// - Google Drive endpoint that is not an http(s) URL
    /// - Any asset description is invalid
    pub fn validate(&self) -> Result<()> {
        if self.marker_file.trim().is_empty() {
            return Err(DemoError::invalid_config("Marker file name cannot be empty"));
        }
        if self.python.trim().is_empty() {
            return Err(DemoError::invalid_config("Interpreter cannot be empty"));
        }
        if self.fetch_timeout_secs == Some(0) {
            return Err(DemoError::invalid_config(
                "Fetch timeout must be at least 1 second",
            ));
        }
        if !(self.google_drive_endpoint.starts_with("http://")
            || self.google_drive_endpoint.starts_with("https://"))
        {
            return Err(DemoError::invalid_config(format!(
                "Google Drive endpoint must be an http(s) URL: {}",
                self.google_drive_endpoint
            )));
        }
        if self.image_visualization.script.as_os_str().is_empty()
            || self.video_visualization.script.as_os_str().is_empty()
        {
            return Err(DemoError::invalid_config(
                "Visualization script paths cannot be empty",
            ));
        }
        self.assets.test_images.validate()?;
        self.assets.culane_model.validate()?;
        self.assets.tusimple_model.validate()?;
        Ok(())
    }
}

/// Builder for `DemoConfig`
#[derive(Debug, Default)]
pub struct DemoConfigBuilder {
    config: DemoConfig,
}

impl DemoConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from a file
    pub fn from_config(config: DemoConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.root = root.into();
        self
    }

    #[must_use]
    pub fn python<S: Into<String>>(mut self, python: S) -> Self {
        self.config.python = python.into();
        self
    }

    #[must_use]
    pub fn marker_file<S: Into<String>>(mut self, marker: S) -> Self {
        self.config.marker_file = marker.into();
        self
    }

    #[must_use]
    pub fn assets(mut self, assets: AssetTable) -> Self {
        self.config.assets = assets;
        self
    }

    #[must_use]
    pub fn fetch_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<DemoConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
