use std::path::Path;

use clap::{Arg, Command};
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};

use super::{defaults, Config, ConfigError};

const CONFIG_FILE: &str = "gateway.toml";

pub fn initialize_configuration() -> Config {
    load_configuration().expect("Failed to load configuration")
}

fn load_configuration() -> Result<Config, ConfigError> {
    // Parse CLI arguments for custom config file
    let matches = Command::new("Triplestore Gateway")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file (.toml format)"),
        )
        .get_matches();

    let custom_config_path = matches.get_one::<String>("config").map(String::as_str);

    // Build configuration with layered sources (priority: lowest to highest)
    let mut figment = Figment::from(Serialized::defaults(defaults::config()));

    if Path::new(CONFIG_FILE).exists() {
        figment = figment.merge(Toml::file(CONFIG_FILE));
    }

    // If a custom config file is provided, merge it with highest priority
    if let Some(config_path) = custom_config_path {
        tracing::info!("Loading custom config file: {}", config_path);
        figment = figment.merge(Toml::file(config_path));
    }

    let config: Config = figment.extract().map_err(Box::new)?;

    tracing::info!("Configuration loaded successfully");

    Ok(config)
}
