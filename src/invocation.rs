//! External program invocation
//!
//! The visualization tools are separate programs. This module models one call
//! as an [`ExternalInvocation`] (program + ordered arguments + declared output),
//! runs it through a [`CommandRunner`], and folds the captured output into an
//! immutable [`InvocationResult`]. Tests substitute the runner so nothing is
//! spawned.

use crate::error::{DemoError, Result};
use crate::tracing_config::spans;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::Instrument;
use walkdir::WalkDir;

/// Number of output entries echoed after a successful run
pub const PREVIEW_LIMIT: usize = 5;

/// What the program is expected to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// A directory filled with result files
    Directory(PathBuf),
    /// A single result file
    File(PathBuf),
}

impl OutputTarget {
    /// Declared path, relative to the working directory
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::File(path) => path,
        }
    }
}

/// One external command, built right before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInvocation {
    program: String,
    args: Vec<String>,
    output: OutputTarget,
}

impl ExternalInvocation {
    pub fn new<S: Into<String>>(program: S, output: OutputTarget) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output,
        }
    }

    /// Append a positional argument
    #[must_use]
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a `--name=value` flag
    #[must_use]
    pub fn flag_value(self, name: &str, value: impl fmt::Display) -> Self {
        self.arg(format!("--{}={}", name, value))
    }

    /// Append a bare `--name` flag
    #[must_use]
    pub fn flag(self, name: &str) -> Self {
        self.arg(format!("--{}", name))
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    /// Space-joined command line for display
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Argument bindings for the image-directory visualization tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageVisualization {
    pub script: PathBuf,
    pub image_path: PathBuf,
    pub image_suffix: String,
    pub save_path: PathBuf,
    pub config: PathBuf,
    pub checkpoint: PathBuf,
    /// Draw predictions rather than ground truth
    pub pred: bool,
    pub mixed_precision: bool,
}

impl Default for ImageVisualization {
    fn default() -> Self {
        Self {
            script: PathBuf::from("tools/vis/lane_img_dir.py"),
            image_path: PathBuf::from("PAD_test_images/lane_test_images/05171008_0748.MP4"),
            image_suffix: ".jpg".to_string(),
            save_path: PathBuf::from("demo_results/culane_visualization"),
            config: PathBuf::from("configs/lane_detection/baseline/erfnet_culane.py"),
            checkpoint: PathBuf::from("checkpoints/erfnet_baseline_culane_20210204.pt"),
            pred: true,
            mixed_precision: true,
        }
    }
}

impl ImageVisualization {
    /// Build the invocation run through `interpreter`
    #[must_use]
    pub fn invocation(&self, interpreter: &str) -> ExternalInvocation {
        let mut invocation =
            ExternalInvocation::new(interpreter, OutputTarget::Directory(self.save_path.clone()))
                .arg(self.script.display().to_string())
                .flag_value("image-path", self.image_path.display())
                .flag_value("image-suffix", &self.image_suffix)
                .flag_value("save-path", self.save_path.display());
        if self.pred {
            invocation = invocation.flag("pred");
        }
        invocation = invocation
            .flag_value("config", self.config.display())
            .flag_value("checkpoint", self.checkpoint.display());
        if self.mixed_precision {
            invocation = invocation.flag("mixed-precision");
        }
        invocation
    }
}

/// Argument bindings for the video visualization tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoVisualization {
    pub script: PathBuf,
    pub video_path: PathBuf,
    pub save_path: PathBuf,
    pub config: PathBuf,
    pub checkpoint: PathBuf,
}

impl Default for VideoVisualization {
    fn default() -> Self {
        Self {
            script: PathBuf::from("tools/vis/lane_video.py"),
            video_path: PathBuf::from("PAD_test_images/lane_test_images/tusimple_val_1min.avi"),
            save_path: PathBuf::from("demo_results/tusimple_prediction.avi"),
            config: PathBuf::from("configs/lane_detection/baseline/erfnet_tusimple.py"),
            checkpoint: PathBuf::from("checkpoints/erfnet_baseline_tusimple_20210424.pt"),
        }
    }
}

impl VideoVisualization {
    /// Build the invocation run through `interpreter`
    #[must_use]
    pub fn invocation(&self, interpreter: &str) -> ExternalInvocation {
        ExternalInvocation::new(interpreter, OutputTarget::File(self.save_path.clone()))
            .arg(self.script.display().to_string())
            .flag_value("video-path", self.video_path.display())
            .flag_value("save-path", self.save_path.display())
            .flag_value("config", self.config.display())
            .flag_value("checkpoint", self.checkpoint.display())
    }
}

/// Raw outcome of running a program to completion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapturedOutput {
    pub success: bool,
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Executes external invocations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` with `working_dir` as its current directory and wait for it
    ///
    /// # Errors
    /// Returns [`DemoError::Launch`] when the program cannot be started.
    async fn run(
        &self,
        invocation: &ExternalInvocation,
        working_dir: &Path,
    ) -> Result<CapturedOutput>;
}

/// Runs invocations as child processes, capturing stdout and stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &ExternalInvocation,
        working_dir: &Path,
    ) -> Result<CapturedOutput> {
        tracing::debug!(
            program = %invocation.program(),
            working_dir = %working_dir.display(),
            "Spawning external program"
        );

        let output = tokio::process::Command::new(invocation.program())
            .args(invocation.args())
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DemoError::launch_error(invocation.program(), e))?;

        Ok(CapturedOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Exit status of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
    Succeeded,
    Failed { code: Option<i32> },
    /// Program never started; the reason is kept in the result's stderr
    LaunchFailed,
}

/// Sorted names found directly inside an output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputListing {
    entries: Vec<String>,
}

impl OutputListing {
    pub fn new(mut entries: Vec<String>) -> Self {
        entries.sort();
        Self { entries }
    }

    /// List `dir`, or `None` if it does not exist
    pub fn scan(dir: &Path) -> Result<Option<Self>> {
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let io_error = e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walk error")
                });
                DemoError::file_io_error("list output directory", dir, &io_error)
            })?;
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(Some(Self::new(entries)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// First `limit` entries
    #[must_use]
    pub fn preview(&self, limit: usize) -> &[String] {
        self.entries.get(..limit.min(self.entries.len())).unwrap_or(&[])
    }

    /// Entries not shown by [`Self::preview`]
    #[must_use]
    pub fn remaining(&self, limit: usize) -> usize {
        self.entries.len().saturating_sub(limit)
    }

    /// Console lines summarizing the listing
    #[must_use]
    pub fn summary_lines(&self, limit: usize) -> Vec<String> {
        let mut lines = Vec::with_capacity(limit + 2);
        lines.push(format!("Generated {} visualization files:", self.len()));
        lines.extend(self.preview(limit).iter().map(|name| format!("  - {}", name)));
        let remaining = self.remaining(limit);
        if remaining > 0 {
            lines.push(format!("  ... and {} more", remaining));
        }
        lines
    }
}

/// Immutable record of one executed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub command_line: String,
    pub status: InvocationStatus,
    pub stdout: String,
    pub stderr: String,
    /// Listing of a directory output after success
    pub outputs: Option<OutputListing>,
}

impl InvocationResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }
}

/// Run `invocation` once and record what happened
///
/// Launch failures are folded into the result rather than returned, so the
/// caller decides whether the step is fatal.
pub async fn execute(
    runner: &dyn CommandRunner,
    invocation: &ExternalInvocation,
    working_dir: &Path,
) -> InvocationResult {
    let span = spans::invocation(invocation.program(), invocation.output().path());
    execute_in_span(runner, invocation, working_dir)
        .instrument(span)
        .await
}

async fn execute_in_span(
    runner: &dyn CommandRunner,
    invocation: &ExternalInvocation,
    working_dir: &Path,
) -> InvocationResult {
    let command_line = invocation.command_line();
    let captured = match runner.run(invocation, working_dir).await {
        Ok(captured) => captured,
        Err(e) => {
            tracing::warn!(error = %e, "External program could not be launched");
            return InvocationResult {
                command_line,
                status: InvocationStatus::LaunchFailed,
                stdout: String::new(),
                stderr: e.to_string(),
                outputs: None,
            };
        },
    };

    if !captured.success {
        tracing::debug!(code = ?captured.code, "External program failed");
        return InvocationResult {
            command_line,
            status: InvocationStatus::Failed {
                code: captured.code,
            },
            stdout: captured.stdout,
            stderr: captured.stderr,
            outputs: None,
        };
    }

    let outputs = match invocation.output() {
        OutputTarget::Directory(dir) => match OutputListing::scan(&working_dir.join(dir)) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list output directory");
                None
            },
        },
        OutputTarget::File(_) => None,
    };

    InvocationResult {
        command_line,
        status: InvocationStatus::Succeeded,
        stdout: captured.stdout,
        stderr: captured.stderr,
        outputs,
    }
}
