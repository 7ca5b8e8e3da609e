pub mod chat;
pub mod knowledge;
pub mod onboard;
pub mod serve;

use cbtsim_config::AppConfig;

/// Load and validate the config file.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate().map_err(|e| format!("Invalid config: {e}"))?;
    Ok(config)
}

/// Print setup instructions and fail if no API key is configured.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() || config.default_provider == "ollama" {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export OPENAI_API_KEY=sk-...");
    eprintln!("    export OPENROUTER_API_KEY=sk-or-v1-...");
    eprintln!("    export CBTSIM_API_KEY=sk-...");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
