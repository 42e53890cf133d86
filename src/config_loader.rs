use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info};
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    config.validate()?;

    for (name, nets) in &config.pools {
        debug!("Pool '{}': {} base prefix(es)", name, nets.len());
    }

    Ok(config)
}

/// Load the configuration file if one was given, else the built-in defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using default address pools");
            Ok(Config::default())
        }
    }
}
