use delegation_core::{
    config::AppConfig,
    events::TokenStandard,
    reader::{ChainReader, HttpClient, ReaderCache},
    types::Address,
};
use serde_json::json;
use std::sync::Arc;

pub enum ReaderCommand {
    BlockInterval { network: String, endpoints: Vec<String>, precise: bool },
    ClockMode { network: String, governor: Address },
    Quorum { network: String, governor: Address, token: Address, standard: TokenStandard },
}

fn build_reader(config: &AppConfig) -> anyhow::Result<ChainReader> {
    let http = HttpClient::with_config(config.http_client_config())?;
    Ok(ChainReader::new(
        Arc::new(http),
        config.network_registry(),
        Arc::new(ReaderCache::new()),
        config.reader_settings(),
    ))
}

pub async fn handle_reader_command(config: &AppConfig, command: ReaderCommand) -> anyhow::Result<()> {
    let reader = build_reader(config)?;

    let output = match command {
        ReaderCommand::BlockInterval { network, endpoints, precise } => {
            let seconds = reader.block_interval(&network, &endpoints, precise).await?;
            json!({ "network": network, "block_interval_seconds": seconds })
        }
        ReaderCommand::ClockMode { network, governor } => {
            let mode = reader.clock_mode(&network, &governor).await?;
            json!({ "network": network, "governor": governor.to_string(), "clock_mode": mode })
        }
        ReaderCommand::Quorum { network, governor, token, standard } => {
            let info = reader.quorum(&network, &governor, &token, standard).await?;
            json!({
                "network": network,
                "governor": governor.to_string(),
                "clock_mode": info.clock_mode,
                "quorum": info.quorum.to_string(),
                "decimals": info.decimals,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
