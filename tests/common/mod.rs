//! Shared fixtures for the demo workflow tests
//!
//! Stand-in fetcher and runner record every call so tests can assert on what
//! the pipeline did and did not touch.

#![allow(dead_code)]

use async_trait::async_trait;
use pad_lane_demo::{
    AssetFetcher, AssetSource, CapturedOutput, CommandRunner, DemoConfig, DemoError, DemoPipeline,
    ExternalInvocation, Result, ZipExtractor,
};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const IMAGE_SCRIPT: &str = "tools/vis/lane_img_dir.py";
pub const VIDEO_SCRIPT: &str = "tools/vis/lane_video.py";
pub const IMAGE_OUTPUT_DIR: &str = "demo_results/culane_visualization";
pub const VIDEO_OUTPUT: &str = "demo_results/tusimple_prediction.avi";
pub const VIDEO_INPUT: &str = "PAD_test_images/lane_test_images/tusimple_val_1min.avi";
pub const CULANE_CHECKPOINT: &str = "checkpoints/erfnet_baseline_culane_20210204.pt";
pub const TUSIMPLE_CHECKPOINT: &str = "checkpoints/erfnet_baseline_tusimple_20210424.pt";

/// Empty directory that looks like a PAD checkout
pub fn pad_root() -> TempDir {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("main_landet.py"), b"# PAD entry point\n").unwrap();
    root
}

/// PAD root with test images and both checkpoints already in place
pub fn provisioned_root(with_video_input: bool) -> TempDir {
    let root = pad_root();
    let frames = root
        .path()
        .join("PAD_test_images/lane_test_images/05171008_0748.MP4");
    fs::create_dir_all(&frames).unwrap();
    fs::write(frames.join("00000.jpg"), b"jpg").unwrap();
    if with_video_input {
        fs::write(root.path().join(VIDEO_INPUT), b"avi").unwrap();
    }
    fs::create_dir_all(root.path().join("checkpoints")).unwrap();
    fs::write(root.path().join(CULANE_CHECKPOINT), b"culane").unwrap();
    fs::write(root.path().join(TUSIMPLE_CHECKPOINT), b"tusimple").unwrap();
    root
}

/// In-memory zip with the given entries
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Zip laid out like the published PAD test image archive
pub fn test_images_zip(with_video_input: bool) -> Vec<u8> {
    let mut entries: Vec<(&str, &[u8])> = vec![
        (
            "PAD_test_images/lane_test_images/05171008_0748.MP4/00000.jpg",
            b"jpg",
        ),
        (
            "PAD_test_images/lane_test_images/05171008_0748.MP4/00030.jpg",
            b"jpg",
        ),
    ];
    if with_video_input {
        entries.push((VIDEO_INPUT, b"avi"));
    }
    zip_bytes(&entries)
}

pub fn test_images_url() -> String {
    DemoConfig::default().assets.test_images.source.download_url()
}

pub fn culane_url() -> String {
    DemoConfig::default().assets.culane_model.source.download_url()
}

pub fn tusimple_url() -> String {
    DemoConfig::default().assets.tusimple_model.source.download_url()
}

/// Fetcher serving canned bytes per URL; unknown URLs fail
#[derive(Clone, Default)]
pub struct RecordingFetcher {
    responses: Arc<HashMap<String, Vec<u8>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingFetcher {
    pub fn serving(responses: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            responses: Arc::new(responses.into_iter().collect()),
            calls: Arc::default(),
        }
    }

    /// Fetcher whose every request fails
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for RecordingFetcher {
    async fn fetch(&self, source: &AssetSource, destination: &Path) -> Result<()> {
        let url = source.download_url();
        self.calls.lock().unwrap().push(url.clone());
        match self.responses.get(&url) {
            Some(bytes) => {
                fs::create_dir_all(destination.parent().unwrap()).unwrap();
                fs::write(destination, bytes).unwrap();
                Ok(())
            },
            None => Err(DemoError::network_error(
                format!("Failed to download from {}", url),
                "connection refused",
            )),
        }
    }
}

/// Canned behaviour of one script
#[derive(Clone, Debug, Default)]
pub struct ScriptBehavior {
    pub success: bool,
    pub stderr: String,
    /// Files created relative to the working directory
    pub creates: Vec<PathBuf>,
}

impl ScriptBehavior {
    pub fn succeeds_creating<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            success: true,
            stderr: String::new(),
            creates: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fails_with(stderr: &str) -> Self {
        Self {
            success: false,
            stderr: stderr.to_string(),
            creates: Vec::new(),
        }
    }
}

/// Runner that records invocations instead of spawning them
#[derive(Clone, Default)]
pub struct RecordingRunner {
    scripts: Arc<HashMap<String, ScriptBehavior>>,
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl RecordingRunner {
    pub fn with_scripts(scripts: Vec<(&str, ScriptBehavior)>) -> Self {
        Self {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(name, behavior)| (name.to_string(), behavior))
                    .collect(),
            ),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scripts_run(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|(_, args)| args.first().cloned())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        invocation: &ExternalInvocation,
        working_dir: &Path,
    ) -> Result<CapturedOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((invocation.program().to_string(), invocation.args().to_vec()));

        let script = invocation.args().first().cloned().unwrap_or_default();
        let behavior = self.scripts.get(&script).cloned().unwrap_or_default();
        for file in &behavior.creates {
            let path = working_dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"out").unwrap();
        }

        Ok(CapturedOutput {
            success: behavior.success,
            code: Some(if behavior.success { 0 } else { 1 }),
            stdout: String::new(),
            stderr: behavior.stderr,
        })
    }
}

/// Pipeline over `root` with recording collaborators and a real zip extractor
pub fn pipeline(root: &Path, fetcher: &RecordingFetcher, runner: &RecordingRunner) -> DemoPipeline {
    let config = DemoConfig::builder()
        .root(root)
        .show_progress(false)
        .build()
        .unwrap();
    DemoPipeline::new(
        config,
        Box::new(fetcher.clone()),
        Box::new(ZipExtractor),
        Box::new(runner.clone()),
    )
}

/// Names of the image outputs `count` frames would produce
pub fn frame_outputs(count: usize) -> Vec<PathBuf> {
    (1..=count)
        .map(|i| Path::new(IMAGE_OUTPUT_DIR).join(format!("frame_{:02}.jpg", i)))
        .collect()
}
