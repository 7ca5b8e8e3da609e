//! `cbtsim serve` — Start the HTTP gateway.

use super::{load_config, require_api_key};

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;
    require_api_key(&config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("cbtsim gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} via {}", config.default_model, config.default_provider);

    cbtsim_gateway::start(config).await?;

    Ok(())
}
