//! File logging setup

use std::fs::{self, File};

use anyhow::{Context, Result};
use log::info;
use simplelog::{Config, WriteLogger};

use crate::settings::ViewerSettings;

/// Installs a file logger at the configured level. Fails if a global
/// logger is already installed.
pub fn init(settings: &ViewerSettings) -> Result<()> {
    let path = settings.resolve_log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {parent:?}"))?;
    }
    let file = File::create(&path).with_context(|| format!("Failed to create log file {path:?}"))?;

    WriteLogger::init(settings.level_filter(), Config::default(), file)
        .context("Failed to install logger")?;

    info!("Logging to {path:?}");
    Ok(())
}
