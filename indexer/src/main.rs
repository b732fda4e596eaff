//! Entrypoint for the `lorre` binary: parses CLI args, loads layered
//! configuration, wires up the process-wide pool/HTTP client, and hands off
//! to `IndexerLoop::run`.

use clap::Parser;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use lorre::db::{build_pool, IndexedDataOps};
use lorre::eth::{EthBlocksProcessor, EthIndexerLoop};
use lorre::processors::{
    AccountsProcessor, AccountsResetHandler, BakersProcessor, BlocksProcessor, FeeAggregator,
    RightsProcessor,
};
use lorre::token_registry::TokenRegistry;
use lorre::tns::TnsResolver;
use lorre::{ConfigError, IndexerLoop};
use lorre_common::config::{
    ignore_process_failures_from_env, BatchConfig, BlockRightsFetchingConfig, DbConfig,
    IndexerConfig, NodeConfig,
};
use lorre_node_client::tezos::TezosNodeClient;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "lorre", about = "Tezos block indexer")]
struct Cli {
    /// The network to index, e.g. `mainnet`.
    network: Option<String>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,

    /// Path to a TOML config file layered under defaults and environment.
    #[arg(long, default_value = "lorre.toml")]
    config: String,
}

fn default_config(network: String) -> IndexerConfig {
    IndexerConfig {
        network,
        node: NodeConfig::default(),
        batch: BatchConfig::default(),
        block_rights_fetching: BlockRightsFetchingConfig::default(),
        db: DbConfig {
            url: "postgres://localhost/lorre".to_string(),
            max_connections: 10,
        },
        fetch_mode: Default::default(),
        bootstrap_window: 0,
        sleep_interval: Duration::from_secs(15),
        bootup_retry_interval: Duration::from_secs(5),
        bootup_connection_check_timeout: Duration::from_secs(5),
        fee_update_interval: 10,
        number_of_fees_averaged: 100,
        ignore_process_failures: false,
        tns_contract: None,
        token_registry: Vec::new(),
        reset_events: Vec::new(),
    }
}

fn load_config(cli: &Cli) -> Result<IndexerConfig, ConfigError> {
    let network = cli
        .network
        .clone()
        .ok_or_else(|| ConfigError::MissingArgument("network".to_string()))?;

    let mut config: IndexerConfig = Figment::new()
        .merge(Serialized::defaults(default_config(network)))
        .merge(Toml::file(&cli.config))
        .merge(Env::prefixed("LORRE_"))
        .extract()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    config.ignore_process_failures =
        ignore_process_failures_from_env(std::env::var("LORRE_FAILURE_IGNORE").ok().as_deref());

    Ok(config)
}

fn init_tracing(verbosity: &clap_verbosity_flag::Verbosity) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            verbosity
                .log_level()
                .map(|l| l.to_string().to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
        )
    });
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.verbosity);

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(target: "lorre::main", error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(target: "lorre::main", error = %e, "indexer terminated with an error");
        std::process::exit(1);
    }
}

async fn run(config: IndexerConfig) -> anyhow::Result<()> {
    let pool = build_pool(&config.db.url, config.db.max_connections)?;
    let node: Arc<dyn lorre_node_client::NodeClient> = Arc::new(TezosNodeClient::new(
        config.node.base_url.clone(),
        config.node.call_deadline,
        config.node.retry_count,
    ));

    let data_ops = IndexedDataOps::new(pool.clone());
    let token_registry = TokenRegistry::new(config.token_registry.clone());
    let tns_resolver = TnsResolver::new(config.tns_contract.clone());

    let blocks_processor = BlocksProcessor::new(pool.clone(), token_registry, tns_resolver);
    let accounts_processor = AccountsProcessor::new(pool.clone(), config.batch.accounts_size);
    let bakers_processor = BakersProcessor::new(pool.clone(), config.batch.accounts_size);
    let rights_processor =
        RightsProcessor::new(pool.clone(), config.block_rights_fetching.lookahead_cycles);
    let reset_handler = AccountsResetHandler::new(pool.clone());
    let fee_aggregator = FeeAggregator::new(pool.clone(), config.number_of_fees_averaged);

    let reset_events = config.reset_events.clone();
    let indexer_loop = IndexerLoop::new(
        node,
        config,
        data_ops,
        blocks_processor,
        accounts_processor,
        bakers_processor,
        rights_processor,
        reset_handler,
        fee_aggregator,
    );

    indexer_loop.run(&reset_events).await?;
    Ok(())
}

// Not wired into the default run; kept here so `cargo build` exercises the
// Ethereum-family module end to end. See §10.6.
#[allow(dead_code)]
async fn run_eth_demo(
    node: Arc<dyn lorre_node_client::ethereum::EthNodeClient>,
    pool: lorre::db::DbPool,
    token_registry: Vec<lorre_common::config::TokenRegistryEntry>,
) -> anyhow::Result<()> {
    let processor = EthBlocksProcessor::new(pool, TokenRegistry::new(token_registry));
    let loop_ = EthIndexerLoop::new(
        node,
        processor,
        lorre_common::config::FetchMode::Newest,
        25,
        8,
        0,
        Duration::from_secs(15),
    );
    loop_.run(None).await?;
    Ok(())
}
