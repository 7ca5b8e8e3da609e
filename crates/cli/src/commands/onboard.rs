//! `cbtsim onboard` — First-time setup.

use cbtsim_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let knowledge_dir = config_dir.join("knowledge");

    println!("cbtsim — First-Time Setup");
    println!("=========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !knowledge_dir.exists() {
        std::fs::create_dir_all(&knowledge_dir)?;
        println!("✅ Created knowledge directory: {}", knowledge_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Set OPENAI_API_KEY or add api_key to {}", config_path.display());
        println!("   2. Run: cbtsim knowledge seed");
        println!("   3. Run: cbtsim chat\n");
    }

    Ok(())
}
