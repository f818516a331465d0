//! Bridge client CLI
//!
//! Thin command-line front end over [`bridge_client::BridgeSession`]:
//!
//! - `tokens` - list bridgeable tokens and balances on a chain
//! - `transfer` - deposit on the source chain (phase 1)
//! - `claim` - claim a deposit on the destination chain (phase 2)
//! - `resume` - claim every journaled deposit still waiting on a chain
//! - `history` - query the transaction history service

use alloy::primitives::{Address, B256};
use clap::{Parser, Subcommand};
use eyre::{eyre, Result};
use tracing::{debug, info};

use bridge_client::evm::parse_signer;
use bridge_client::evm::tokens::{to_token_units, token_decimals};
use bridge_client::{
    BridgeConfig, BridgeError, BridgeSession, ChainId, ChainRegistry, HistoryClient, SagaJournal,
    SessionSettings,
};

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Lock/mint/burn/claim bridge client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a .env file
    #[arg(long, global = true, default_value = ".env")]
    env_file: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List bridgeable tokens with the wallet's balances
    Tokens {
        #[arg(long)]
        chain: u64,
    },

    /// Deposit tokens on the source chain
    Transfer {
        /// Source chain id
        #[arg(long)]
        chain: u64,

        /// Token address on the source chain
        #[arg(long)]
        token: Address,

        /// Human-readable amount (e.g. "1.5")
        #[arg(long)]
        amount: String,

        /// Destination chain id
        #[arg(long)]
        to_chain: u64,

        /// Recipient on the destination chain (defaults to the wallet)
        #[arg(long)]
        recipient: Option<Address>,
    },

    /// Claim a mined deposit on the destination chain
    Claim {
        /// Deposit transaction hash
        #[arg(long)]
        tx: B256,

        /// Chain the deposit was made on
        #[arg(long)]
        from_chain: u64,

        /// Destination chain id
        #[arg(long)]
        chain: u64,
    },

    /// Claim all pending journaled deposits addressed to a chain
    Resume {
        #[arg(long)]
        chain: u64,
    },

    /// Show the wallet's transfer history
    History {
        #[arg(long)]
        chain: Option<u64>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = BridgeConfig::load_from_file(&cli.env_file)?;
    debug!(config = ?config, "Configuration loaded");

    let registry = ChainRegistry::load(&config.registry_path)?;
    info!(chains = ?registry.chain_ids(), "Chain registry loaded");

    let signer = parse_signer(config.require_private_key()?)?;
    let journal = SagaJournal::open(&config.journal_path).map_err(user_facing)?;
    debug!(path = %journal.path().display(), pending = journal.pending().len(), "Saga journal ready");
    let session = BridgeSession::new(registry, SessionSettings::from(&config), journal);

    match cli.command {
        Commands::Tokens { chain } => {
            session
                .select(ChainId(chain), signer)
                .await
                .map_err(user_facing)?;
            let tokens = session.refresh_catalog().await.map_err(user_facing)?;
            if tokens.is_empty() {
                println!("No bridgeable tokens on chain {}", chain);
            }
            for token in tokens.iter() {
                println!(
                    "{:<10} {:<30} {} balance={}",
                    token.symbol, token.name, token.address, token.balance
                );
            }
        }

        Commands::Transfer {
            chain,
            token,
            amount,
            to_chain,
            recipient,
        } => {
            session
                .select(ChainId(chain), signer)
                .await
                .map_err(user_facing)?;
            let handle = session.handle().await.map_err(user_facing)?;
            let decimals = token_decimals(&handle.provider(), token)
                .await
                .map_err(user_facing)?;
            let raw = to_token_units(&amount, decimals).map_err(user_facing)?;

            // seed the token index so the deposit record carries name/symbol
            if let Err(err) = session.refresh_catalog().await {
                debug!(error = %err, "Catalog refresh before transfer failed");
            }

            let (mined, record) = session
                .transfer(token, raw, ChainId(to_chain), recipient)
                .await
                .map_err(user_facing)?;
            println!("Deposit mined: {}", mined.transaction_hash);
            println!("Source event:  {} ({})", record.source, record.event.kind());
            println!(
                "Claim it with: bridge-cli claim --tx {} --from-chain {} --chain {}",
                mined.transaction_hash, chain, to_chain
            );
        }

        Commands::Claim {
            tx,
            from_chain,
            chain,
        } => {
            let records = session
                .recover_deposits(ChainId(from_chain), tx)
                .await
                .map_err(user_facing)?;
            let records: Vec<_> = records
                .into_iter()
                .filter(|r| r.event.to_chain_id() == ChainId(chain))
                .collect();
            if records.is_empty() {
                return Err(eyre!("Transaction {} has no deposit to chain {}", tx, chain));
            }

            session
                .select(ChainId(chain), signer)
                .await
                .map_err(user_facing)?;
            for record in records {
                let mined = session.receive(&record).await.map_err(user_facing)?;
                println!("{} claimed in {}", record.source, mined.transaction_hash);
            }
        }

        Commands::Resume { chain } => {
            session
                .select(ChainId(chain), signer)
                .await
                .map_err(user_facing)?;
            let results = session.resume().await.map_err(user_facing)?;
            if results.is_empty() {
                println!("Nothing to claim on chain {}", chain);
            }
            for (source, result) in results {
                match result {
                    Ok(mined) => println!("{} claimed in {}", source, mined.transaction_hash),
                    Err(err) => println!("{} failed: {}", source, err.user_message()),
                }
            }
        }

        Commands::History { chain } => {
            let base = config
                .history_url
                .clone()
                .ok_or_else(|| eyre!("BRIDGE_HISTORY_URL environment variable is required"))?;
            let client = HistoryClient::new(base).map_err(user_facing)?;
            let transactions = client
                .transactions(signer.address(), chain.map(ChainId))
                .await
                .map_err(user_facing)?;
            println!("{}", serde_json::to_string_pretty(&transactions)?);
        }
    }

    Ok(())
}

/// Log the full error, report the short message
fn user_facing(err: BridgeError) -> eyre::Report {
    debug!(error = %err, "Operation failed");
    eyre!(err.user_message())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_client=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}
