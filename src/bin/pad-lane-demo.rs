//! PAD Lane Detection Demo CLI
//!
//! Fetches the demo assets into a PyTorch Auto Drive checkout and runs its
//! lane detection visualization scripts.

#[cfg(feature = "cli")]
use pad_lane_demo::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<std::process::ExitCode> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
