//! Configuration structs shared by the indexer and the metadata API.
//!
//! Loading them (layered defaults -> TOML file -> environment via `figment`)
//! and wiring them up from `clap` arguments is a binary-level concern; these
//! types are the plain, `Deserialize`-able shape both sides agree on.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which blocks `BlockFetchPlanner` should cover this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FetchMode {
    /// Cover `(L_db, L_head]`; if `L_db` is unknown, bootstrap from `L_head - window`.
    #[default]
    Newest,
    /// Cover `[0, L_head]`.
    Everything,
    /// Cover `(L_head - n, L_head]`, optionally anchored on `head_hash`.
    Custom { n: u64, head_hash: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub base_url: String,
    pub retry_count: u32,
    #[serde(with = "duration_millis")]
    pub call_deadline: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8732".to_string(),
            retry_count: 5,
            call_deadline: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub page_size: u32,
    pub accounts_size: u32,
    pub node_requests_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            accounts_size: 50,
            node_requests_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRightsFetchingConfig {
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    #[serde(with = "duration_secs")]
    pub init_delay: Duration,
    pub lookahead_cycles: u32,
}

impl Default for BlockRightsFetchingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            init_delay: Duration::from_secs(30),
            lookahead_cycles: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

/// The full set of knobs `IndexerLoop` and its processors are built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub network: String,
    pub node: NodeConfig,
    pub batch: BatchConfig,
    pub block_rights_fetching: BlockRightsFetchingConfig,
    pub db: DbConfig,
    pub fetch_mode: FetchMode,
    /// Window used to bootstrap `Newest` mode when `L_db` is unknown.
    pub bootstrap_window: u64,
    #[serde(with = "duration_secs")]
    pub sleep_interval: Duration,
    #[serde(with = "duration_secs")]
    pub bootup_retry_interval: Duration,
    #[serde(with = "duration_secs")]
    pub bootup_connection_check_timeout: Duration,
    pub fee_update_interval: u64,
    pub number_of_fees_averaged: u32,
    /// Sourced from `LORRE_FAILURE_IGNORE` at startup; never re-read afterwards.
    pub ignore_process_failures: bool,
    pub tns_contract: Option<String>,
    pub token_registry: Vec<TokenRegistryEntry>,
    pub reset_events: Vec<crate::domain::ResetEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRegistryEntry {
    pub contract: String,
    pub standard: TokenStandard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStandard {
    Erc20,
    Fa12,
    Fa2,
}

/// Parses the `LORRE_FAILURE_IGNORE` environment variable per §6: `"true"` /
/// `"yes"` (case-insensitive) enable it, anything else (including unset) does not.
pub fn ignore_process_failures_from_env(raw: Option<&str>) -> bool {
    matches!(
        raw.map(str::to_lowercase).as_deref(),
        Some("true") | Some("yes")
    )
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_process_failures_accepts_true_and_yes_case_insensitively() {
        assert!(ignore_process_failures_from_env(Some("true")));
        assert!(ignore_process_failures_from_env(Some("TRUE")));
        assert!(ignore_process_failures_from_env(Some("yes")));
        assert!(ignore_process_failures_from_env(Some("Yes")));
    }

    #[test]
    fn ignore_process_failures_rejects_everything_else() {
        assert!(!ignore_process_failures_from_env(None));
        assert!(!ignore_process_failures_from_env(Some("")));
        assert!(!ignore_process_failures_from_env(Some("1")));
        assert!(!ignore_process_failures_from_env(Some("false")));
    }

    #[test]
    fn fetch_mode_defaults_to_newest() {
        assert_eq!(FetchMode::default(), FetchMode::Newest);
    }
}
