//! Demo workflow runner
//!
//! Runs the fixed sequence preflight → test images → CULane model → image
//! visualization → (optional) TuSimple model + video visualization → summary.
//! Each step decides locally whether to continue: required acquisitions end
//! the run, the visualizations and the video step never do.

use crate::acquisition::{AcquisitionOutcome, AssetAcquirer};
use crate::asset::{Asset, Necessity};
use crate::config::DemoConfig;
use crate::download::{AssetFetcher, HttpFetcher};
use crate::error::{DemoError, Result};
use crate::extract::{ArchiveExtractor, ZipExtractor};
use crate::invocation::{self, CommandRunner, InvocationResult, ProcessRunner, PREVIEW_LIMIT};
use crate::preflight;
use crate::report::Console;
use crate::tracing_config::{events, spans};
use std::fmt;
use tracing::Instrument;

/// States of a demo run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Start,
    PreflightOk,
    PreflightFailed,
    ImagesAcquired,
    ImagesFailed,
    ModelAcquired,
    ModelFailed,
    ImageVisDone,
    VideoGateChecked,
    VideoVisAttempted,
    VideoSkipped,
    ReportDone,
}

impl RunStage {
    /// Whether the run stops in this stage
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PreflightFailed | Self::ImagesFailed | Self::ModelFailed | Self::ReportDone
        )
    }

    /// Whether this stage ends the run unsuccessfully
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::PreflightFailed | Self::ImagesFailed | Self::ModelFailed
        )
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::PreflightOk => "preflight-ok",
            Self::PreflightFailed => "preflight-failed",
            Self::ImagesAcquired => "images-acquired",
            Self::ImagesFailed => "images-failed",
            Self::ModelAcquired => "model-acquired",
            Self::ModelFailed => "model-failed",
            Self::ImageVisDone => "image-vis-done",
            Self::VideoGateChecked => "video-gate-checked",
            Self::VideoVisAttempted => "video-vis-attempted",
            Self::VideoSkipped => "video-skipped",
            Self::ReportDone => "report-done",
        };
        f.write_str(name)
    }
}

/// Why the optional video step did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSkipReason {
    /// The video file is not part of the extracted test images
    InputMissing,
    /// The TuSimple checkpoint could not be acquired
    CheckpointUnavailable,
}

/// What happened to the optional video step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    /// The run ended before the video gate
    NotReached,
    Skipped(VideoSkipReason),
    Attempted(InvocationResult),
}

/// Record of one demo run
#[derive(Debug)]
pub struct RunReport {
    /// Every stage entered, in order
    pub stages: Vec<RunStage>,
    /// Result of the image visualization, if it ran
    pub image_result: Option<InvocationResult>,
    pub video: VideoOutcome,
    /// Error that ended the run early
    pub failure: Option<DemoError>,
}

impl RunReport {
    fn new() -> Self {
        let mut report = Self {
            stages: Vec::new(),
            image_result: None,
            video: VideoOutcome::NotReached,
            failure: None,
        };
        report.enter(RunStage::Start);
        report
    }

    fn enter(&mut self, stage: RunStage) {
        events::stage(&stage);
        self.stages.push(stage);
    }

    fn fail(mut self, stage: RunStage, error: DemoError) -> Self {
        self.enter(stage);
        self.failure = Some(error);
        self
    }

    /// Last stage entered
    #[must_use]
    pub fn final_stage(&self) -> RunStage {
        self.stages.last().copied().unwrap_or(RunStage::Start)
    }

    /// Whether the run got through to the summary
    #[must_use]
    pub fn completed(&self) -> bool {
        self.final_stage() == RunStage::ReportDone
    }

    /// Whether the run passed through `stage`
    #[must_use]
    pub fn visited(&self, stage: RunStage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Demo workflow over injected collaborators
pub struct DemoPipeline {
    config: DemoConfig,
    acquirer: AssetAcquirer,
    runner: Box<dyn CommandRunner>,
}

impl DemoPipeline {
    /// Pipeline with explicit collaborators
    pub fn new(
        config: DemoConfig,
        fetcher: Box<dyn AssetFetcher>,
        extractor: Box<dyn ArchiveExtractor>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        let acquirer = AssetAcquirer::new(config.root.clone(), fetcher, extractor);
        Self {
            config,
            acquirer,
            runner,
        }
    }

    /// Pipeline downloading over HTTP, unpacking zips and spawning processes
    ///
    /// # Errors
    /// - Invalid configuration
    /// - HTTP client cannot be created
    pub fn from_config(config: DemoConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config.fetch_timeout(), config.show_progress)?
            .with_drive_endpoint(config.google_drive_endpoint.clone());
        Ok(Self::new(
            config,
            Box::new(fetcher),
            Box::new(ZipExtractor),
            Box::new(ProcessRunner),
        ))
    }

    #[must_use]
    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    /// Run the whole demo, writing operator messages to `console`
    pub async fn run(&self, console: &mut Console) -> RunReport {
        let span = spans::session(&self.config.root);
        let report = self.run_stages(console).instrument(span).await;
        console.flush();
        report
    }

    async fn run_stages(&self, console: &mut Console) -> RunReport {
        let mut report = RunReport::new();
        let config = &self.config;
        let root = config.root.as_path();

        console.line("=== Simple Lane Detection Demo ===");

        if let Err(e) = preflight::verify_root(root, &config.marker_file) {
            console.line(
                "Error: Please run this from the pytorch-auto-drive root directory \
                 (or pass --root <PAD_ROOT>)",
            );
            console.line(format!("  {}", e));
            return report.fail(RunStage::PreflightFailed, e);
        }
        if let Err(e) = preflight::prepare_output_dirs(root, &config.output_dirs) {
            console.line(format!("Error: {}", e));
            return report.fail(RunStage::PreflightFailed, e);
        }
        report.enter(RunStage::PreflightOk);

        let images = &config.assets.test_images;
        if let Some(e) = self.acquire_required(1, images, console).await {
            console.line(format!("Failed to download {}", images.inline_name()));
            return report.fail(RunStage::ImagesFailed, e);
        }
        report.enter(RunStage::ImagesAcquired);

        let model = &config.assets.culane_model;
        if let Some(e) = self.acquire_required(2, model, console).await {
            console.line("Failed to download model");
            return report.fail(RunStage::ModelFailed, e);
        }
        report.enter(RunStage::ModelAcquired);

        console.section("3. Running lane detection visualization...");
        let image_result = self.run_image_visualization(console).await;
        report.image_result = Some(image_result);
        report.enter(RunStage::ImageVisDone);

        console.section("4. Running video visualization (optional)...");
        report.enter(RunStage::VideoGateChecked);
        let video = self.run_video_step(console).await;
        let video_stage = if matches!(video, VideoOutcome::Attempted(_)) {
            RunStage::VideoVisAttempted
        } else {
            RunStage::VideoSkipped
        };
        report.video = video;
        report.enter(video_stage);

        self.print_summary(console);
        report.enter(RunStage::ReportDone);
        report
    }

    /// Acquire a required asset, returning the error if the run must stop
    async fn acquire_required(
        &self,
        step: usize,
        asset: &Asset,
        console: &mut Console,
    ) -> Option<DemoError> {
        if !asset.is_satisfied(self.acquirer.root()) {
            console.section(format!("{}. Downloading {}...", step, asset.inline_name()));
        }
        let outcome = self
            .acquirer
            .acquire(asset, Necessity::Required, console)
            .await;
        match outcome {
            AcquisitionOutcome::AlreadyAvailable => {
                console.line(format!("{}. {} already available", step, asset.name));
                None
            },
            AcquisitionOutcome::Fetched => None,
            AcquisitionOutcome::Failed(e) => Some(e),
        }
    }

    async fn run_image_visualization(&self, console: &mut Console) -> InvocationResult {
        let vis = &self.config.image_visualization;
        let command = vis.invocation(&self.config.python);
        console.line(format!("Running: {}", command.command_line()));

        let result = invocation::execute(self.runner.as_ref(), &command, &self.config.root).await;
        if result.succeeded() {
            console.line("✅ Visualization completed successfully!");
            console.line(format!("Results saved to: {}", vis.save_path.display()));
            if let Some(listing) = &result.outputs {
                for line in listing.summary_lines(PREVIEW_LIMIT) {
                    console.line(line);
                }
            }
        } else {
            console.line("❌ Visualization failed:");
            console.block(&result.stderr);
        }
        result
    }

    async fn run_video_step(&self, console: &mut Console) -> VideoOutcome {
        let vis = &self.config.video_visualization;
        let root = &self.config.root;

        if !root.join(&vis.video_path).exists() {
            tracing::debug!(path = %vis.video_path.display(), "No video input, skipping");
            return VideoOutcome::Skipped(VideoSkipReason::InputMissing);
        }

        let model = &self.config.assets.tusimple_model;
        match self
            .acquirer
            .acquire(model, Necessity::BestEffort, console)
            .await
        {
            AcquisitionOutcome::AlreadyAvailable => {
                console.line(format!("{} already available", model.name));
            },
            AcquisitionOutcome::Fetched => {},
            AcquisitionOutcome::Failed(e) => {
                tracing::info!(error = %e, "Skipping video visualization");
                return VideoOutcome::Skipped(VideoSkipReason::CheckpointUnavailable);
            },
        }

        let command = vis.invocation(&self.config.python);
        console.line(format!("Running: {}", command.command_line()));
        let result = invocation::execute(self.runner.as_ref(), &command, root).await;
        if result.succeeded() {
            console.line(format!(
                "✅ Video visualization completed: {}",
                vis.save_path.display()
            ));
        } else {
            console.line("Video visualization failed (this is optional)");
            tracing::debug!(stderr = %result.stderr, "Video visualization stderr");
        }
        VideoOutcome::Attempted(result)
    }

    fn print_summary(&self, console: &mut Console) {
        let config = &self.config;
        let video_output = &config.video_visualization.save_path;

        console.section("=== Demo completed! ===");
        console.line("Check the results in:");
        console.line(format!(
            "  - Images: {}",
            config.image_visualization.save_path.display()
        ));
        if config.root.join(video_output).exists() {
            console.line(format!("  - Video: {}", video_output.display()));
        }

        console.section("Next steps:");
        console.line("1. Open the generated images to see lane detection results");
        console.line("2. Try different models with the full lane_detection_demo.py script");
        console.line(format!(
            "3. Run evaluation with: {} main_landet.py --test --config=... --checkpoint=...",
            config.python
        ));
    }
}

impl fmt::Debug for DemoPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoPipeline")
            .field("config", &self.config)
            .field("acquirer", &self.acquirer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_stages() {
        for stage in [
            RunStage::PreflightFailed,
            RunStage::ImagesFailed,
            RunStage::ModelFailed,
        ] {
            assert!(stage.is_terminal());
            assert!(stage.is_failure());
        }
        assert!(RunStage::ReportDone.is_terminal());
        assert!(!RunStage::ReportDone.is_failure());
        assert!(!RunStage::ImageVisDone.is_terminal());
        assert!(!RunStage::VideoSkipped.is_terminal());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(RunStage::PreflightOk.to_string(), "preflight-ok");
        assert_eq!(RunStage::VideoVisAttempted.to_string(), "video-vis-attempted");
    }

    #[test]
    fn test_report_starts_at_start() {
        let report = RunReport::new();
        assert_eq!(report.stages, vec![RunStage::Start]);
        assert_eq!(report.final_stage(), RunStage::Start);
        assert!(!report.completed());
        assert_eq!(report.video, VideoOutcome::NotReached);
    }

    #[test]
    fn test_failed_report_keeps_error() {
        let report = RunReport::new().fail(
            RunStage::PreflightFailed,
            DemoError::preflight("'main_landet.py' not found"),
        );
        assert_eq!(report.final_stage(), RunStage::PreflightFailed);
        assert!(report.visited(RunStage::Start));
        assert!(report.failure.is_some());
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let config = DemoConfig {
            python: String::new(),
            ..DemoConfig::default()
        };
        assert!(DemoPipeline::from_config(config).is_err());
    }
}
