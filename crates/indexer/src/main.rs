use clap::{Parser, Subcommand};
use delegation_core::{config::AppConfig, events::TokenStandard, types::Address};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
use commands::{handle_reader_command, handle_replay, ReaderCommand};

#[derive(Parser)]
#[command(name = "delegate-indexer")]
#[command(about = "Delegation ledger replay and governance chain queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode and apply a JSON-lines file of raw logs to the ledger
    Replay {
        /// File with one `eth_getLogs` object (plus `blockTimestamp`) per line
        #[arg(long)]
        events: String,

        /// Ledger database URL (defaults to `store.database_url`)
        #[arg(long, env = "DATABASE_URL")]
        database: Option<String>,

        /// Token standard (defaults to `token.standard`)
        #[arg(long)]
        standard: Option<TokenStandard>,
    },

    /// Mean block interval across endpoints
    BlockInterval {
        #[arg(long)]
        network: String,

        /// Extra endpoint, tried before configured and built-in ones (repeatable)
        #[arg(long = "endpoint")]
        endpoints: Vec<String>,

        /// Return the unrounded mean
        #[arg(long)]
        precise: bool,
    },

    /// Governor clock mode
    ClockMode {
        #[arg(long)]
        network: String,

        #[arg(long)]
        governor: Address,
    },

    /// Governor quorum and token decimals
    Quorum {
        #[arg(long)]
        network: String,

        #[arg(long)]
        governor: Address,

        #[arg(long)]
        token: Address,

        #[arg(long, default_value = "erc20")]
        standard: TokenStandard,
    },
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("warn,delegation_core={level},delegate_indexer={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    config.validate().map_err(anyhow::Error::msg)?;
    init_logging(&config);

    match cli.command {
        Commands::Replay { events, database, standard } => {
            let database_url = database.unwrap_or_else(|| config.store.database_url.clone());
            let standard = standard.unwrap_or(config.token.standard);
            handle_replay(&events, &database_url, standard).await?;
        }
        Commands::BlockInterval { network, endpoints, precise } => {
            handle_reader_command(&config, ReaderCommand::BlockInterval { network, endpoints, precise })
                .await?;
        }
        Commands::ClockMode { network, governor } => {
            handle_reader_command(&config, ReaderCommand::ClockMode { network, governor }).await?;
        }
        Commands::Quorum { network, governor, token, standard } => {
            handle_reader_command(&config, ReaderCommand::Quorum {
                network,
                governor,
                token,
                standard,
            })
            .await?;
        }
    }

    Ok(())
}
