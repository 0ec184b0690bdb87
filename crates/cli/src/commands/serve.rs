//! `agora serve` — Start the HTTP gateway.

use agora_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Agora Gateway");
    println!("  Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Agents: {}",
        config
            .agents
            .iter()
            .filter(|a| a.enabled)
            .map(|a| a.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    agora_gateway::start(config).await?;

    Ok(())
}
