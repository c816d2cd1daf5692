//! `toolstream config`: configuration display.

use toolstream_config::AppConfig;

pub fn run(current: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !current {
        println!(
            "# Default configuration; save as {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        println!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{config:#?}");
    if !config.has_api_key() {
        eprintln!("Warning: no API key set (TOOLSTREAM_API_KEY or OPENAI_API_KEY)");
    }
    Ok(())
}
