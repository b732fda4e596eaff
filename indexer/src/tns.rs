//! Applies Tezos Name Service mappings found in a block's logs (§4.3 step 4).
//!
//! Absence of a configured TNS contract is logged once at construction and
//! treated as "disabled" from then on — not re-checked per block.

use lorre_common::domain::{Log, TnsEntry};

const TNS_REGISTER_ENTRYPOINT: &str = "name_registered";

pub struct TnsResolver {
    contract: Option<String>,
}

impl TnsResolver {
    pub fn new(contract: Option<String>) -> Self {
        if contract.is_none() {
            tracing::info!(
                target: "lorre::tns",
                "no tns_contract configured; TNS mapping is disabled for this run"
            );
        }
        Self { contract }
    }

    pub fn is_enabled(&self) -> bool {
        self.contract.is_some()
    }

    /// Extracts `TnsEntry` rows from one block's logs, given the block's level.
    pub fn resolve(&self, block_level: i64, logs: &[Log]) -> Vec<TnsEntry> {
        let Some(contract) = &self.contract else {
            return Vec::new();
        };
        logs.iter()
            .filter(|log| &log.address == contract)
            .filter_map(|log| {
                if log.topics.first().map(String::as_str) != Some(TNS_REGISTER_ENTRYPOINT) {
                    return None;
                }
                let name = log.topics.get(1)?.clone();
                let account_id = log.topics.get(2)?.clone();
                Some(TnsEntry {
                    name,
                    account_id,
                    block_level,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(address: &str, topics: Vec<&str>) -> Log {
        Log {
            block_hash: "B".into(),
            op_index: 0,
            log_index: 0,
            address: address.to_string(),
            topics: topics.into_iter().map(str::to_string).collect(),
            data: String::new(),
        }
    }

    #[test]
    fn disabled_without_a_configured_contract() {
        let resolver = TnsResolver::new(None);
        assert!(!resolver.is_enabled());
        let logs = vec![log(
            "KT1tns",
            vec!["name_registered", "alice.tez", "tz1alice"],
        )];
        assert!(resolver.resolve(10, &logs).is_empty());
    }

    #[test]
    fn extracts_name_registration_from_the_configured_contract() {
        let resolver = TnsResolver::new(Some("KT1tns".to_string()));
        let logs = vec![log(
            "KT1tns",
            vec!["name_registered", "alice.tez", "tz1alice"],
        )];
        let entries = resolver.resolve(10, &logs);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "alice.tez");
        assert_eq!(entries[0].account_id, "tz1alice");
        assert_eq!(entries[0].block_level, 10);
    }

    #[test]
    fn ignores_logs_from_other_contracts() {
        let resolver = TnsResolver::new(Some("KT1tns".to_string()));
        let logs = vec![log(
            "KT1other",
            vec!["name_registered", "bob.tez", "tz1bob"],
        )];
        assert!(resolver.resolve(10, &logs).is_empty());
    }
}
