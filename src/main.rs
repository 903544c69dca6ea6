use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use hand_align::{run_batch, AnnotationProvider, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let config = cli.pipeline_config();
    config.validate().context("invalid configuration")?;

    // The provider is acquired once for the whole batch and dropped after
    // it, never re-created per frame.
    let mut provider = AnnotationProvider::load(&cli.landmarks)
        .with_context(|| format!("failed to load landmark annotations {:?}", cli.landmarks))?;
    info!("landmark annotations cover {} frames", provider.len());

    let output_dir = cli.output_dir();
    let summary = run_batch(&cli.input, &output_dir, &mut provider, &config)
        .with_context(|| format!("batch failed for input directory {:?}", cli.input))?;

    eprintln!(
        "Wrote {} normalized frames to {:?} ({} skipped)",
        summary.written, output_dir, summary.skipped
    );

    Ok(())
}
