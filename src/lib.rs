#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # PAD Lane Detection Demo
//!
//! Runs the PyTorch Auto Drive (PAD) lane detection demo against a checkout
//! of the PAD repository: fetches the test images and ERFNet checkpoints when
//! they are missing, then drives the PAD visualization scripts and summarizes
//! what they produced.
//!
//! ## Workflow
//!
//! 1. **Preflight**: the root must contain `main_landet.py`; output
//!    directories are created.
//! 2. **Test images** (required): archive fetched, extracted, deleted.
//! 3. **CULane checkpoint** (required).
//! 4. **Image visualization**: `tools/vis/lane_img_dir.py`, failure is reported
//!    but does not end the run.
//! 5. **Video visualization** (optional): only when the video input exists and
//!    the TuSimple checkpoint can be acquired.
//! 6. **Summary** of result locations and next steps.
//!
//! Every acquisition is idempotent. An asset whose local path exists is never
//! fetched again, and a failed acquisition leaves nothing at that path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pad_lane_demo::{Console, DemoConfig, DemoPipeline};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = DemoConfig::builder()
//!     .root("/path/to/pytorch-auto-drive")
//!     .python("python3")
//!     .build()?;
//!
//! let pipeline = DemoPipeline::from_config(config)?;
//! let mut console = Console::stdout();
//! let report = pipeline.run(&mut console).await;
//! println!("finished in stage {}", report.final_stage());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing with stand-in collaborators
//!
//! Network access, archive extraction and process spawning sit behind the
//! [`AssetFetcher`], [`ArchiveExtractor`] and [`CommandRunner`] traits;
//! [`DemoPipeline::new`] accepts any implementation of each.
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bars and tracing
//!   subscriber setup
//! - `tracing-json`: JSON log output for the CLI

pub mod acquisition;
pub mod asset;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod invocation;
pub mod pipeline;
pub mod preflight;
pub mod report;
pub mod tracing_config;

pub use acquisition::{AcquisitionOutcome, AssetAcquirer};
pub use asset::{Asset, AssetKind, AssetSource, Necessity};
pub use config::{AssetTable, DemoConfig, DemoConfigBuilder};
pub use download::{file_sha256, verify_file_integrity, AssetFetcher, HttpFetcher};
pub use error::{DemoError, Result};
pub use extract::{ArchiveExtractor, ZipExtractor};
pub use invocation::{
    execute, CapturedOutput, CommandRunner, ExternalInvocation, ImageVisualization,
    InvocationResult, InvocationStatus, OutputListing, OutputTarget, ProcessRunner,
    VideoVisualization, PREVIEW_LIMIT,
};
pub use pipeline::{DemoPipeline, RunReport, RunStage, VideoOutcome, VideoSkipReason};
pub use report::{Console, SharedBuffer};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
