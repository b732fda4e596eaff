//! Entrypoint for the `conseil-api` binary: parses CLI args, loads layered
//! configuration, builds the sqlx pool and metadata/query services, and
//! binds the axum listener.

use clap::Parser;
use conseil_api::config::ApiConfig;
use conseil_api::http::{router, AppState};
use conseil_api::metadata_service::MetadataService;
use conseil_api::query::engine::AttributeQueryEngine;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "conseil-api", about = "Metadata-aware blockchain query API")]
struct Cli {
    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,

    /// Path to a TOML config file layered under defaults and environment.
    #[arg(long, default_value = "conseil.toml")]
    config: String,
}

fn load_config(cli: &Cli) -> Result<ApiConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ApiConfig::default()))
        .merge(Toml::file(&cli.config))
        .merge(Env::prefixed("CONSEIL_"))
        .extract()
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
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.verbosity);

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(target: "conseil::main", error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect(&config.db.url)
        .await?;

    let metadata = Arc::new(MetadataService::new(config.overrides.clone()));
    let engine = Arc::new(AttributeQueryEngine::new(
        pool,
        metadata.clone(),
        config.max_rows,
        config.query_timeout,
    ));
    let api_keys: HashSet<String> = config.api_keys.into_iter().collect();

    let app = router(AppState { metadata, engine }, api_keys);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(target: "conseil::main", addr = %config.listen_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
