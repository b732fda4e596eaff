//! Matches indexed logs against the configured token contract registry
//! (§4.3 step 3), producing `TokenTransfer` and `TokenBalance` rows.
//!
//! ERC-20-style contracts are matched on the standard `Transfer(address,address,uint256)`
//! topic0; FA1.2/FA2 contracts are matched on the Micheline entrypoint name carried
//! in `topics[0]` by this workspace's Tezos log normalization.

use lorre_common::config::{TokenRegistryEntry, TokenStandard};
use lorre_common::domain::{Log, TokenBalance, TokenTransfer};

const ERC20_TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
const FA_TRANSFER_ENTRYPOINT: &str = "transfer";
const FA_BALANCE_OF_ENTRYPOINT: &str = "balance_of";

pub struct TokenRegistry {
    entries: Vec<TokenRegistryEntry>,
}

impl TokenRegistry {
    pub fn new(entries: Vec<TokenRegistryEntry>) -> Self {
        Self { entries }
    }

    fn standard_for(&self, contract: &str) -> Option<TokenStandard> {
        self.entries
            .iter()
            .find(|e| e.contract.eq_ignore_ascii_case(contract))
            .map(|e| e.standard)
    }

    /// Scans one block's logs for token contract calls, grouped into
    /// transfers and balance probes per the configured registry.
    pub fn match_logs(&self, logs: &[Log]) -> (Vec<TokenTransfer>, Vec<TokenBalance>) {
        let mut transfers = Vec::new();
        let mut balances = Vec::new();
        for log in logs {
            let Some(standard) = self.standard_for(&log.address) else {
                continue;
            };
            match standard {
                TokenStandard::Erc20 => {
                    if let Some(transfer) = erc20_transfer(log) {
                        transfers.push(transfer);
                    }
                }
                TokenStandard::Fa12 | TokenStandard::Fa2 => {
                    if let Some(transfer) = fa_transfer(log) {
                        transfers.push(transfer);
                    } else if let Some(balance) = fa_balance(log) {
                        balances.push(balance);
                    }
                }
            }
        }
        (transfers, balances)
    }
}

fn erc20_transfer(log: &Log) -> Option<TokenTransfer> {
    if log.topics.first().map(String::as_str) != Some(ERC20_TRANSFER_TOPIC) {
        return None;
    }
    let from = log.topics.get(1)?.clone();
    let to = log.topics.get(2)?.clone();
    Some(TokenTransfer {
        block_hash: log.block_hash.clone(),
        op_index: log.op_index,
        log_index: log.log_index,
        contract: log.address.clone(),
        from,
        to,
        amount: log.data.clone(),
    })
}

fn fa_transfer(log: &Log) -> Option<TokenTransfer> {
    if log.topics.first().map(String::as_str) != Some(FA_TRANSFER_ENTRYPOINT) {
        return None;
    }
    let from = log.topics.get(1)?.clone();
    let to = log.topics.get(2)?.clone();
    Some(TokenTransfer {
        block_hash: log.block_hash.clone(),
        op_index: log.op_index,
        log_index: log.log_index,
        contract: log.address.clone(),
        from,
        to,
        amount: log.data.clone(),
    })
}

fn fa_balance(log: &Log) -> Option<TokenBalance> {
    if log.topics.first().map(String::as_str) != Some(FA_BALANCE_OF_ENTRYPOINT) {
        return None;
    }
    let account_id = log.topics.get(1)?.clone();
    Some(TokenBalance {
        contract: log.address.clone(),
        account_id,
        block_level: 0,
        balance: log.data.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<TokenRegistryEntry> {
        vec![
            TokenRegistryEntry {
                contract: "0xErc20".to_string(),
                standard: TokenStandard::Erc20,
            },
            TokenRegistryEntry {
                contract: "KT1fa2".to_string(),
                standard: TokenStandard::Fa2,
            },
        ]
    }

    #[test]
    fn matches_erc20_transfer_topic() {
        let registry = TokenRegistry::new(entries());
        let log = Log {
            block_hash: "B".into(),
            op_index: 0,
            log_index: 0,
            address: "0xErc20".into(),
            topics: vec![
                ERC20_TRANSFER_TOPIC.to_string(),
                "0xfrom".into(),
                "0xto".into(),
            ],
            data: "0x64".into(),
        };
        let (transfers, balances) = registry.match_logs(&[log]);
        assert_eq!(transfers.len(), 1);
        assert!(balances.is_empty());
        assert_eq!(transfers[0].from, "0xfrom");
    }

    #[test]
    fn matches_fa2_balance_probe() {
        let registry = TokenRegistry::new(entries());
        let log = Log {
            block_hash: "B".into(),
            op_index: 0,
            log_index: 0,
            address: "KT1fa2".into(),
            topics: vec![FA_BALANCE_OF_ENTRYPOINT.to_string(), "tz1acct".into()],
            data: "1000".into(),
        };
        let (transfers, balances) = registry.match_logs(&[log]);
        assert!(transfers.is_empty());
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].account_id, "tz1acct");
    }

    #[test]
    fn ignores_logs_from_unregistered_contracts() {
        let registry = TokenRegistry::new(entries());
        let log = Log {
            block_hash: "B".into(),
            op_index: 0,
            log_index: 0,
            address: "KT1unknown".into(),
            topics: vec![FA_TRANSFER_ENTRYPOINT.to_string()],
            data: "".into(),
        };
        let (transfers, balances) = registry.match_logs(&[log]);
        assert!(transfers.is_empty());
        assert!(balances.is_empty());
    }
}
