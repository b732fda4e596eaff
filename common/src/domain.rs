//! Plain domain types shared by the node client, the indexer, and the metadata API.
//!
//! These mirror the physical rows described in the data model but carry no
//! persistence-layer annotations; `indexer::db::models` maps them onto `diesel`
//! `Queryable`/`Insertable` structs for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity is `hash`; `level` is strictly increasing within a fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    pub level: i64,
    pub predecessor_hash: String,
    pub timestamp: DateTime<Utc>,
    pub protocol: String,
    pub baker: String,
    pub metadata_blob: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub block_hash: String,
    pub op_index: i32,
    pub source: String,
    pub destination: Option<String>,
    pub fee: i64,
    pub counter: i64,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub block_hash: String,
    pub op_index: i32,
    pub status: String,
    pub gas_used: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub block_hash: String,
    pub op_index: i32,
    pub log_index: i32,
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// A pending work item: `account_id` must be re-snapshotted at `block_level`.
/// Multiple rows per account are allowed; processing collapses to the latest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCheckpoint {
    pub account_id: String,
    pub block_level: i64,
    pub block_hash: String,
    pub cycle: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakerCheckpoint {
    pub baker_id: String,
    pub block_level: i64,
    pub block_hash: String,
    pub cycle: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub block_level: i64,
    pub balance: i64,
    pub delegate: Option<String>,
    pub counter: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakerSnapshot {
    pub baker_id: String,
    pub block_level: i64,
    pub staking_balance: i64,
    pub delegated_balance: i64,
    pub deactivated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RightKind {
    Baking,
    Endorsing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightsRow {
    pub level: i64,
    pub cycle: i32,
    pub delegate: String,
    pub slot: i32,
    pub kind: RightKind,
    pub estimated_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetKind {
    AccountsRefresh,
}

/// Declares that all accounts must be re-fetched at `activation_level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetEvent {
    pub protocol: String,
    pub activation_level: i64,
    pub kind: ResetKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub block_hash: String,
    pub op_index: i32,
    pub log_index: i32,
    pub contract: String,
    pub from: String,
    pub to: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub contract: String,
    pub account_id: String,
    pub block_level: i64,
    pub balance: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeOperationKind {
    Transaction,
    Origination,
    Delegation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAggregate {
    pub kind: FeeOperationKind,
    pub mean: i64,
    pub high: i64,
    pub low: i64,
    pub computed_at: DateTime<Utc>,
}

/// The transactions, receipts, and logs belonging to one block, fetched and
/// persisted together with it (§4.3 step 1: "single write transaction").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockOperations {
    pub transactions: Vec<Transaction>,
    pub receipts: Vec<Receipt>,
    pub logs: Vec<Log>,
}

/// Simplified Ethereum-family shape (§10.6): no bakers, rights, or TNS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthBlock {
    pub hash: String,
    pub number: i64,
    pub parent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub miner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthAccountCheckpoint {
    pub account_id: String,
    pub block_number: i64,
    pub block_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthAccount {
    pub account_id: String,
    pub block_number: i64,
    pub balance: String,
    pub nonce: i64,
}

/// A TNS (Tezos Names Service) name -> account mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TnsEntry {
    pub name: String,
    pub account_id: String,
    pub block_level: i64,
}
