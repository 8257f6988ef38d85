//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_unlock;
pub use validate::run_validate;

use std::path::Path;

use config_loader::ConfigLoader;
use contracts::UnlockBlueprint;
use tracing::info;

use crate::error::{CliError, Result};

/// Load the blueprint at `path`, or the built-in defaults when no path is given
pub(crate) fn load_blueprint(path: Option<&Path>) -> Result<UnlockBlueprint> {
    let Some(path) = path else {
        info!("No configuration file given, using built-in defaults");
        return Ok(UnlockBlueprint::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    info!(config = %path.display(), "Loading configuration");
    Ok(ConfigLoader::load_from_path(path)?)
}
