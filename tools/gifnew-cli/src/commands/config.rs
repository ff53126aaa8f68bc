//! Show or initialize the configuration file.

use gifnew_common::config::{config_file_path, AppConfig};

pub fn run(init: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    if init {
        if path.exists() {
            return Err(anyhow::anyhow!(
                "Config already exists at {}",
                path.display()
            ));
        }
        AppConfig::default()
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to write config: {e}"))?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let config = AppConfig::load();
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
