//! `agora onboard` — First-time setup.

use agora_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Agora — First-Time Setup");
    println!("========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("Edit it manually or delete and re-run onboard.\n");
    } else {
        let default_toml = AppConfig::default_toml();
        std::fs::write(&config_path, &default_toml)?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("  1. Add upstream API keys under [upstreams.<agent>] (or set");
        println!("     AGORA_<AGENT>_API_KEY environment variables)");
        println!("  2. Run: agora serve");
    }

    Ok(())
}
