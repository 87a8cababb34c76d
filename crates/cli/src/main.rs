//! CLI tool for converting an HTML slide deck to PowerPoint.

mod pipeline;

use anyhow::{bail, Context, Result};
use clap::Parser;
use deck_core::{ConvertConfig, ViewportPreset};
use deck_render::ChromeSession;
use std::path::{Path, PathBuf};
use url::Url;

/// Convert an HTML slide deck into a screenshot deck and an editable deck.
#[derive(Parser, Debug)]
#[command(name = "html2pptx")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input HTML document; every `.slide` element becomes one slide
    input: PathBuf,

    /// Slide viewport: standard (1200x675) or hd (1280x720)
    #[arg(long, default_value = "standard")]
    viewport: ViewportPreset,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let input = std::path::absolute(&args.input)
        .with_context(|| format!("Failed to resolve {}", args.input.display()))?;
    if !input.exists() {
        bail!(deck_core::Error::InputNotFound(input));
    }

    let uri = Url::from_file_path(&input)
        .map_err(|_| anyhow::anyhow!("Cannot build a file URI for {}", input.display()))?;
    let config = ConvertConfig::new().with_viewport(args.viewport);

    // both decks land in the working directory, not next to the input
    let screenshot_path = output_path(&input, "");
    let editable_path = output_path(&input, "_editable");

    println!("Generating {}...", screenshot_path.display());
    run_pass(&config, uri.as_str(), |session| {
        pipeline::generate_screenshot_deck(session, &config, &screenshot_path)
    })?;

    println!("Generating {}...", editable_path.display());
    run_pass(&config, uri.as_str(), |session| {
        pipeline::generate_editable_deck(session, &config, &editable_path)
    })?;

    println!("Done.");
    Ok(())
}

/// Run one generation pass in a fresh browser session.
///
/// The session is closed when this returns, whatever the pass did.
fn run_pass<F>(config: &ConvertConfig, uri: &str, pass: F) -> Result<()>
where
    F: FnOnce(&ChromeSession) -> Result<usize>,
{
    let mut session = ChromeSession::launch(config).context("Failed to start the browser")?;
    session
        .open(uri)
        .with_context(|| format!("Failed to load {}", uri))?;

    let slides = pass(&session)?;
    log::debug!("Pass finished with {} slides", slides);
    Ok(())
}

/// `<input stem><suffix>.pptx`, relative to the working directory.
fn output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    PathBuf::from(format!("{}{}.pptx", stem, suffix))
}
