//! Settings resolution for the CLI

use anyhow::{Context, Result};
use stack_lib::StackSettings;
use std::path::Path;
use tracing::debug;

/// Load stack settings from an optional file and the process environment
pub fn load_settings(path: Option<&Path>) -> Result<StackSettings> {
    let settings = match path {
        Some(path) => StackSettings::load(Some(path))
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => StackSettings::load(None).context("Failed to load settings from environment")?,
    };

    debug!(
        stack = %settings.stack_name,
        environment = %settings.environment.uri(),
        dedicated_worker_pool = settings.application.use_dedicated_worker_pool,
        "Settings loaded"
    );
    Ok(settings)
}
