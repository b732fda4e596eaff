//! Row types and their explicit, hand-written mappings to/from the domain
//! model (`lorre_common::domain`). One small struct + one `From` impl per
//! pair, per §9 ("no runtime reflection").

use super::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use lorre_common::domain as dom;

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = blocks)]
pub struct BlockRow {
    pub hash: String,
    pub level: i64,
    pub predecessor_hash: String,
    pub timestamp: DateTime<Utc>,
    pub protocol: String,
    pub baker: String,
    pub metadata_blob: serde_json::Value,
}

impl From<&dom::Block> for BlockRow {
    fn from(b: &dom::Block) -> Self {
        BlockRow {
            hash: b.hash.clone(),
            level: b.level,
            predecessor_hash: b.predecessor_hash.clone(),
            timestamp: b.timestamp,
            protocol: b.protocol.clone(),
            baker: b.baker.clone(),
            metadata_blob: b.metadata_blob.clone(),
        }
    }
}

impl From<BlockRow> for dom::Block {
    fn from(r: BlockRow) -> Self {
        dom::Block {
            hash: r.hash,
            level: r.level,
            predecessor_hash: r.predecessor_hash,
            timestamp: r.timestamp,
            protocol: r.protocol,
            baker: r.baker,
            metadata_blob: r.metadata_blob,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = transactions)]
pub struct TransactionRow {
    pub block_hash: String,
    pub op_index: i32,
    pub source: String,
    pub destination: Option<String>,
    pub fee: i64,
    pub counter: i64,
    pub kind: String,
}

impl From<&dom::Transaction> for TransactionRow {
    fn from(t: &dom::Transaction) -> Self {
        TransactionRow {
            block_hash: t.block_hash.clone(),
            op_index: t.op_index,
            source: t.source.clone(),
            destination: t.destination.clone(),
            fee: t.fee,
            counter: t.counter,
            kind: t.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = receipts)]
pub struct ReceiptRow {
    pub block_hash: String,
    pub op_index: i32,
    pub status: String,
    pub gas_used: Option<i64>,
}

impl From<&dom::Receipt> for ReceiptRow {
    fn from(r: &dom::Receipt) -> Self {
        ReceiptRow {
            block_hash: r.block_hash.clone(),
            op_index: r.op_index,
            status: r.status.clone(),
            gas_used: r.gas_used,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = logs)]
pub struct LogRow {
    pub block_hash: String,
    pub op_index: i32,
    pub log_index: i32,
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

impl From<&dom::Log> for LogRow {
    fn from(l: &dom::Log) -> Self {
        LogRow {
            block_hash: l.block_hash.clone(),
            op_index: l.op_index,
            log_index: l.log_index,
            address: l.address.clone(),
            topics: l.topics.clone(),
            data: l.data.clone(),
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = account_checkpoints)]
pub struct AccountCheckpointRow {
    pub account_id: String,
    pub block_level: i64,
    pub block_hash: String,
    pub cycle: i32,
}

impl From<&dom::AccountCheckpoint> for AccountCheckpointRow {
    fn from(c: &dom::AccountCheckpoint) -> Self {
        AccountCheckpointRow {
            account_id: c.account_id.clone(),
            block_level: c.block_level,
            block_hash: c.block_hash.clone(),
            cycle: c.cycle,
        }
    }
}

impl From<AccountCheckpointRow> for dom::AccountCheckpoint {
    fn from(r: AccountCheckpointRow) -> Self {
        dom::AccountCheckpoint {
            account_id: r.account_id,
            block_level: r.block_level,
            block_hash: r.block_hash,
            cycle: r.cycle,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = baker_checkpoints)]
pub struct BakerCheckpointRow {
    pub baker_id: String,
    pub block_level: i64,
    pub block_hash: String,
    pub cycle: i32,
}

impl From<&dom::BakerCheckpoint> for BakerCheckpointRow {
    fn from(c: &dom::BakerCheckpoint) -> Self {
        BakerCheckpointRow {
            baker_id: c.baker_id.clone(),
            block_level: c.block_level,
            block_hash: c.block_hash.clone(),
            cycle: c.cycle,
        }
    }
}

impl From<BakerCheckpointRow> for dom::BakerCheckpoint {
    fn from(r: BakerCheckpointRow) -> Self {
        dom::BakerCheckpoint {
            baker_id: r.baker_id,
            block_level: r.block_level,
            block_hash: r.block_hash,
            cycle: r.cycle,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = account_snapshots)]
pub struct AccountSnapshotRow {
    pub account_id: String,
    pub block_level: i64,
    pub balance: i64,
    pub delegate: Option<String>,
    pub counter: i64,
}

impl From<&dom::AccountSnapshot> for AccountSnapshotRow {
    fn from(s: &dom::AccountSnapshot) -> Self {
        AccountSnapshotRow {
            account_id: s.account_id.clone(),
            block_level: s.block_level,
            balance: s.balance,
            delegate: s.delegate.clone(),
            counter: s.counter,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = baker_snapshots)]
pub struct BakerSnapshotRow {
    pub baker_id: String,
    pub block_level: i64,
    pub staking_balance: i64,
    pub delegated_balance: i64,
    pub deactivated: bool,
}

impl From<&dom::BakerSnapshot> for BakerSnapshotRow {
    fn from(s: &dom::BakerSnapshot) -> Self {
        BakerSnapshotRow {
            baker_id: s.baker_id.clone(),
            block_level: s.block_level,
            staking_balance: s.staking_balance,
            delegated_balance: s.delegated_balance,
            deactivated: s.deactivated,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = rights)]
pub struct RightsRow {
    pub level: i64,
    pub cycle: i32,
    pub delegate: String,
    pub slot: i32,
    pub kind: String,
    pub estimated_time: Option<DateTime<Utc>>,
}

fn right_kind_str(kind: dom::RightKind) -> &'static str {
    match kind {
        dom::RightKind::Baking => "baking",
        dom::RightKind::Endorsing => "endorsing",
    }
}

impl From<&dom::RightsRow> for RightsRow {
    fn from(r: &dom::RightsRow) -> Self {
        RightsRow {
            level: r.level,
            cycle: r.cycle,
            delegate: r.delegate.clone(),
            slot: r.slot,
            kind: right_kind_str(r.kind).to_string(),
            estimated_time: r.estimated_time,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = reset_events)]
pub struct ResetEventRow {
    pub protocol: String,
    pub activation_level: i64,
    pub kind: String,
    pub applied: bool,
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = token_transfers)]
pub struct TokenTransferRow {
    pub block_hash: String,
    pub op_index: i32,
    pub log_index: i32,
    pub contract: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: String,
}

impl From<&dom::TokenTransfer> for TokenTransferRow {
    fn from(t: &dom::TokenTransfer) -> Self {
        TokenTransferRow {
            block_hash: t.block_hash.clone(),
            op_index: t.op_index,
            log_index: t.log_index,
            contract: t.contract.clone(),
            from_account: t.from.clone(),
            to_account: t.to.clone(),
            amount: t.amount.clone(),
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = token_balances)]
pub struct TokenBalanceRow {
    pub contract: String,
    pub account_id: String,
    pub block_level: i64,
    pub balance: String,
}

impl From<&dom::TokenBalance> for TokenBalanceRow {
    fn from(b: &dom::TokenBalance) -> Self {
        TokenBalanceRow {
            contract: b.contract.clone(),
            account_id: b.account_id.clone(),
            block_level: b.block_level,
            balance: b.balance.clone(),
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = fee_aggregates)]
pub struct FeeAggregateRow {
    pub kind: String,
    pub mean: i64,
    pub high: i64,
    pub low: i64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = tns_entries)]
pub struct TnsEntryRow {
    pub name: String,
    pub account_id: String,
    pub block_level: i64,
}

impl From<&dom::TnsEntry> for TnsEntryRow {
    fn from(e: &dom::TnsEntry) -> Self {
        TnsEntryRow {
            name: e.name.clone(),
            account_id: e.account_id.clone(),
            block_level: e.block_level,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = eth_blocks)]
pub struct EthBlockRow {
    pub hash: String,
    pub number: i64,
    pub parent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub miner: String,
}

impl From<&dom::EthBlock> for EthBlockRow {
    fn from(b: &dom::EthBlock) -> Self {
        EthBlockRow {
            hash: b.hash.clone(),
            number: b.number,
            parent_hash: b.parent_hash.clone(),
            timestamp: b.timestamp,
            miner: b.miner.clone(),
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = eth_account_checkpoints)]
pub struct EthAccountCheckpointRow {
    pub account_id: String,
    pub block_number: i64,
    pub block_hash: String,
}

impl From<&dom::EthAccountCheckpoint> for EthAccountCheckpointRow {
    fn from(c: &dom::EthAccountCheckpoint) -> Self {
        EthAccountCheckpointRow {
            account_id: c.account_id.clone(),
            block_number: c.block_number,
            block_hash: c.block_hash.clone(),
        }
    }
}

impl From<EthAccountCheckpointRow> for dom::EthAccountCheckpoint {
    fn from(r: EthAccountCheckpointRow) -> Self {
        dom::EthAccountCheckpoint {
            account_id: r.account_id,
            block_number: r.block_number,
            block_hash: r.block_hash,
        }
    }
}

#[derive(Debug, Clone, Insertable, Queryable, PartialEq)]
#[diesel(table_name = eth_accounts)]
pub struct EthAccountRow {
    pub account_id: String,
    pub block_number: i64,
    pub balance: String,
    pub nonce: i64,
}

impl From<&dom::EthAccount> for EthAccountRow {
    fn from(a: &dom::EthAccount) -> Self {
        EthAccountRow {
            account_id: a.account_id.clone(),
            block_number: a.block_number,
            balance: a.balance.clone(),
            nonce: a.nonce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_row_round_trips_through_domain_block() {
        let block = dom::Block {
            hash: "BLxyz".into(),
            level: 7,
            predecessor_hash: "BLabc".into(),
            timestamp: Utc::now(),
            protocol: "PtAtLas".into(),
            baker: "tz1baker".into(),
            metadata_blob: serde_json::json!({"k": "v"}),
        };
        let row = BlockRow::from(&block);
        let back: dom::Block = row.into();
        assert_eq!(back, block);
    }

    #[test]
    fn right_kind_str_is_stable() {
        assert_eq!(right_kind_str(dom::RightKind::Baking), "baking");
        assert_eq!(right_kind_str(dom::RightKind::Endorsing), "endorsing");
    }
}
