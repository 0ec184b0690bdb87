//! `agora agents` — List the registered agents and their policies.

use agora_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = agora_adapters::build_registry(&config)?;

    if registry.is_empty() {
        println!("No agents enabled. Check the [[agents]] entries in your config.");
        return Ok(());
    }

    println!("Registered agents ({}):\n", registry.len());
    for descriptor in registry.descriptors() {
        println!("  {}", descriptor.id);
        println!("    {}", descriptor.description);
        println!(
            "    timeout: {}s · retries: {} · cache ttl: {}s",
            descriptor.timeout.as_secs(),
            descriptor.retry_count,
            descriptor.cache_ttl.as_secs()
        );
        println!();
    }

    Ok(())
}
