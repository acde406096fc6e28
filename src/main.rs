use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod codec;
mod compositor;
mod config;
mod constants;
mod error;
mod overlay;
mod panel;
mod playlist;
mod slideshow;

use crate::config::FrameConfig;
use crate::panel::{Panel, PreviewPanel, SerialPanel};
use crate::slideshow::Slideshow;

/// Photo frame slideshow for USB-serial LCD panels.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Serial port override (defaults to display.port from the config)
    #[arg(long)]
    port: Option<String>,

    /// Write frames as PNG files into this directory instead of a panel
    #[arg(long, value_name = "DIR")]
    preview: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FrameConfig::load_or_default(&cli.config);
    init_tracing(&config);

    let mut panel: Box<dyn Panel> = match &cli.preview {
        Some(dir) => Box::new(PreviewPanel::new(dir.clone())),
        None => {
            let port = cli.port.clone().unwrap_or_else(|| config.display.port.clone());
            Box::new(SerialPanel::new(port.into(), config.display.format))
        }
    };
    panel.initialize().context("failed to initialize display")?;
    if let Err(err) = panel.set_brightness(config.display.brightness) {
        warn!("could not set brightness: {err}");
    }

    let slideshow = Slideshow::start(cli.config, panel).context("failed to start slideshow")?;
    slideshow.wait();
    Ok(())
}

fn init_tracing(config: &FrameConfig) {
    let level = if config.debug.enabled { config.debug.level.as_str() } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
