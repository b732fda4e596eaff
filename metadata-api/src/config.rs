//! Layered configuration for the `conseil-api` binary (§10.1).

use crate::overrides::OverrideTree;
use lorre_common::config::DbConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub listen_addr: String,
    pub db: DbConfig,
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub overrides: OverrideTree,
    pub max_rows: u32,
    #[serde(with = "duration_secs")]
    pub query_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            db: DbConfig {
                url: "postgres://localhost/lorre".to_string(),
                max_connections: 10,
            },
            api_keys: Vec::new(),
            overrides: Default::default(),
            max_rows: 10_000,
            query_timeout: Duration::from_secs(10),
        }
    }
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
