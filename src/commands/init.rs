//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;
use tracing::info;

/// Write the default configuration and create the database with the default collection
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.save()?;

    let db = MetaDb::connect(&config).await?;
    db.get_or_create_collection(&config.default_collection)
        .await?;

    info!("Initialized clickpath at {:?}", config.paths.base_dir);
    Ok(config)
}
