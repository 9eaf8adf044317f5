//! Show or initialize the configuration file.

use lapse_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, init: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    if init {
        config.save()?;
        println!("Config written: {}", path.display());
    } else if path.exists() {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file: {} (not present, using defaults)", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
