//! A JSON-RPC client for Tezos-family nodes.
//!
//! Per §9 ("Implicit typeclass derivation / conversion"), wire payloads are
//! decoded into small `Raw*` structs and mapped explicitly onto the domain
//! types with a `TryFrom` impl per pair — no derive-based reflection.

use crate::error::ClientError;
use crate::retry::with_retries;
use crate::{chunk_range, BlockId, NodeClient, Page};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use lorre_common::domain::{
    AccountSnapshot, BakerSnapshot, Block, BlockOperations, Log, Receipt, RightKind, RightsRow,
    Transaction,
};
use serde::Deserialize;
use std::time::Duration;

pub struct TezosNodeClient {
    http: reqwest::Client,
    base_url: String,
    retry_count: u32,
}

impl TezosNodeClient {
    pub fn new(base_url: impl Into<String>, call_deadline: Duration, retry_count: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(call_deadline)
            .build()
            .expect("reqwest client builds with a valid timeout");
        Self {
            http,
            base_url: base_url.into(),
            retry_count,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        with_retries(self.retry_count, || async {
            let resp = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| ClientError::NetworkError(e.to_string()))?;
            if resp.status().is_server_error() {
                return Err(ClientError::NetworkError(format!(
                    "{} returned {}",
                    url,
                    resp.status()
                )));
            }
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| ClientError::NetworkError(e.to_string()))?;
            serde_json::from_slice(&bytes)
                .map_err(|e| ClientError::DecodeError(format!("{url}: {e}")))
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    hash: String,
    level: RawLevel,
    predecessor: String,
    header: RawHeader,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    level: i64,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    timestamp: DateTime<Utc>,
    proto: String,
    baker: String,
}

impl TryFrom<RawBlock> for Block {
    type Error = ClientError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        Ok(Block {
            hash: raw.hash,
            level: raw.level.level,
            predecessor_hash: raw.predecessor,
            timestamp: raw.header.timestamp,
            protocol: raw.header.proto,
            baker: raw.header.baker,
            metadata_blob: raw.metadata,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    account_id: String,
    balance: i64,
    delegate: Option<String>,
    counter: i64,
}

impl RawAccount {
    fn into_snapshot(self, block_level: i64) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.account_id,
            block_level,
            balance: self.balance,
            delegate: self.delegate,
            counter: self.counter,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRight {
    level: i64,
    cycle: i32,
    delegate: String,
    slot: i32,
}

#[derive(Debug, Deserialize)]
struct RawDelegate {
    staking_balance: i64,
    delegated_balance: i64,
    deactivated: bool,
}

impl RawDelegate {
    fn into_snapshot(self, baker_id: String, block_level: i64) -> BakerSnapshot {
        BakerSnapshot {
            baker_id,
            block_level,
            staking_balance: self.staking_balance,
            delegated_balance: self.delegated_balance,
            deactivated: self.deactivated,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    op_index: i32,
    source: String,
    destination: Option<String>,
    fee: i64,
    counter: i64,
    kind: String,
    status: String,
    gas_used: Option<i64>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    log_index: i32,
    address: String,
    topics: Vec<String>,
    data: String,
}

fn into_block_operations(block_hash: &str, raw: Vec<RawOperation>) -> BlockOperations {
    let mut ops = BlockOperations::default();
    for op in raw {
        ops.transactions.push(Transaction {
            block_hash: block_hash.to_string(),
            op_index: op.op_index,
            source: op.source,
            destination: op.destination,
            fee: op.fee,
            counter: op.counter,
            kind: op.kind,
        });
        ops.receipts.push(Receipt {
            block_hash: block_hash.to_string(),
            op_index: op.op_index,
            status: op.status,
            gas_used: op.gas_used,
        });
        for log in op.logs {
            ops.logs.push(Log {
                block_hash: block_hash.to_string(),
                op_index: op.op_index,
                log_index: log.log_index,
                address: log.address,
                topics: log.topics,
                data: log.data,
            });
        }
    }
    ops
}

fn block_path(id: &BlockId) -> String {
    match id {
        BlockId::Hash(h) => format!("/chains/main/blocks/{h}"),
        BlockId::Level(l) => format!("/chains/main/blocks/{l}"),
    }
}

#[async_trait]
impl NodeClient for TezosNodeClient {
    async fn get_block(&self, id: BlockId) -> Result<Block, ClientError> {
        let raw: RawBlock = self.get_json(&block_path(&id)).await?;
        raw.try_into()
    }

    async fn get_block_head(&self) -> Result<Block, ClientError> {
        let raw: RawBlock = self.get_json("/chains/main/blocks/head").await?;
        raw.try_into()
    }

    async fn get_block_operations(&self, block_hash: &str) -> Result<BlockOperations, ClientError> {
        let path = format!("/chains/main/blocks/{block_hash}/operations");
        let raw: Vec<RawOperation> = self.get_json(&path).await?;
        Ok(into_block_operations(block_hash, raw))
    }

    fn get_blocks_range<'a>(
        &'a self,
        from: i64,
        to: i64,
        page_size: u32,
        concurrency: usize,
    ) -> BoxStream<'a, Result<Page, ClientError>> {
        let chunks = chunk_range(from, to, page_size);
        stream::iter(chunks)
            .map(move |(start, end)| async move {
                let mut page = Vec::with_capacity((end - start + 1) as usize);
                for level in start..=end {
                    page.push(self.get_block(BlockId::Level(level)).await?);
                }
                Ok(page)
            })
            .buffered(concurrency.max(1))
            .boxed()
    }

    async fn get_accounts_at(
        &self,
        level: i64,
        ids: &[String],
    ) -> Result<Vec<AccountSnapshot>, ClientError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let path = format!("/chains/main/blocks/{level}/context/contracts/{id}");
            let raw: RawAccount = self.get_json(&path).await?;
            out.push(raw.into_snapshot(level));
        }
        Ok(out)
    }

    async fn get_bakers_at(
        &self,
        level: i64,
        ids: &[String],
    ) -> Result<Vec<BakerSnapshot>, ClientError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let path = format!("/chains/main/blocks/{level}/context/delegates/{id}");
            let raw: RawDelegate = self.get_json(&path).await?;
            out.push(raw.into_snapshot(id.clone(), level));
        }
        Ok(out)
    }

    async fn get_baking_rights(&self, cycle: i32) -> Result<Vec<RightsRow>, ClientError> {
        let path = format!("/chains/main/blocks/head/helpers/baking_rights?cycle={cycle}");
        let raw: Vec<RawRight> = self.get_json(&path).await?;
        Ok(raw
            .into_iter()
            .map(|r| RightsRow {
                level: r.level,
                cycle: r.cycle,
                delegate: r.delegate,
                slot: r.slot,
                kind: RightKind::Baking,
                estimated_time: None,
            })
            .collect())
    }

    async fn get_endorsing_rights(&self, cycle: i32) -> Result<Vec<RightsRow>, ClientError> {
        let path = format!("/chains/main/blocks/head/helpers/endorsing_rights?cycle={cycle}");
        let raw: Vec<RawRight> = self.get_json(&path).await?;
        Ok(raw
            .into_iter()
            .map(|r| RightsRow {
                level: r.level,
                cycle: r.cycle,
                delegate: r.delegate,
                slot: r.slot,
                kind: RightKind::Endorsing,
                estimated_time: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_block_maps_onto_domain_block() {
        let raw = RawBlock {
            hash: "BLxyz".to_string(),
            level: RawLevel { level: 42 },
            predecessor: "BLabc".to_string(),
            header: RawHeader {
                timestamp: Utc::now(),
                proto: "PtAtLas".to_string(),
                baker: "tz1baker".to_string(),
            },
            metadata: serde_json::json!({}),
        };
        let block: Block = raw.try_into().unwrap();
        assert_eq!(block.hash, "BLxyz");
        assert_eq!(block.level, 42);
        assert_eq!(block.predecessor_hash, "BLabc");
        assert_eq!(block.baker, "tz1baker");
    }

    #[test]
    fn into_block_operations_derives_receipts_and_logs_from_one_operation() {
        let raw = vec![RawOperation {
            op_index: 0,
            source: "tz1source".to_string(),
            destination: Some("tz1dest".to_string()),
            fee: 100,
            counter: 7,
            kind: "transaction".to_string(),
            status: "applied".to_string(),
            gas_used: Some(1000),
            logs: vec![RawLog {
                log_index: 0,
                address: "KT1contract".to_string(),
                topics: vec!["Transfer".to_string()],
                data: "0x01".to_string(),
            }],
        }];
        let ops = into_block_operations("BLxyz", raw);
        assert_eq!(ops.transactions.len(), 1);
        assert_eq!(ops.receipts.len(), 1);
        assert_eq!(ops.logs.len(), 1);
        assert_eq!(ops.transactions[0].block_hash, "BLxyz");
        assert_eq!(ops.receipts[0].status, "applied");
        assert_eq!(ops.logs[0].address, "KT1contract");
    }

    #[test]
    fn block_path_distinguishes_hash_and_level() {
        assert_eq!(block_path(&BlockId::Level(5)), "/chains/main/blocks/5");
        assert_eq!(
            block_path(&BlockId::Hash("BLxyz".to_string())),
            "/chains/main/blocks/BLxyz"
        );
    }
}
