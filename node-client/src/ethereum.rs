//! A thin JSON-RPC 2.0 client for Ethereum-family nodes, backing the
//! simplified `EthIndexerLoop` of §10.6. Unlike Tezos' REST-shaped node API,
//! Ethereum nodes speak JSON-RPC 2.0 proper (`method` + positional `params`),
//! so the request framing here is genuinely different, not just a relabeling.

use crate::error::ClientError;
use crate::retry::with_retries;
use crate::chunk_range;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use lorre_common::domain::{EthAccount, EthBlock, Log};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub type EthPage = Vec<EthBlock>;

#[async_trait]
pub trait EthNodeClient: Send + Sync {
    async fn get_block_by_number(&self, number: i64) -> Result<EthBlock, ClientError>;

    async fn get_block_number(&self) -> Result<i64, ClientError>;

    /// The logs emitted within `block_hash`, used for token registry
    /// matching (§10.6 mirrors `BlocksProcessor` step 3).
    async fn get_logs(&self, block_hash: &str) -> Result<Vec<Log>, ClientError>;

    async fn get_accounts_at(
        &self,
        block_number: i64,
        ids: &[String],
    ) -> Result<Vec<EthAccount>, ClientError>;

    fn get_blocks_range<'a>(
        &'a self,
        from: i64,
        to: i64,
        page_size: u32,
        concurrency: usize,
    ) -> BoxStream<'a, Result<EthPage, ClientError>>;
}

pub struct EthereumNodeClient {
    http: reqwest::Client,
    url: String,
    retry_count: u32,
    next_id: std::sync::atomic::AtomicU64,
}

impl EthereumNodeClient {
    pub fn new(url: impl Into<String>, call_deadline: Duration, retry_count: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(call_deadline)
            .build()
            .expect("reqwest client builds with a valid timeout");
        Self {
            http,
            url: url.into(),
            retry_count,
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        with_retries(self.retry_count, || async {
            let resp = self
                .http
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ClientError::NetworkError(e.to_string()))?;
            if resp.status().is_server_error() {
                return Err(ClientError::NetworkError(format!(
                    "{} returned {}",
                    self.url,
                    resp.status()
                )));
            }
            let envelope: JsonRpcResponse = resp
                .json()
                .await
                .map_err(|e| ClientError::DecodeError(e.to_string()))?;
            if let Some(err) = envelope.error {
                return Err(ClientError::DecodeError(format!(
                    "rpc error {}: {}",
                    err.code, err.message
                )));
            }
            envelope
                .result
                .ok_or_else(|| ClientError::DecodeError("missing result".to_string()))
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawEthBlock {
    hash: String,
    number: String,
    #[serde(rename = "parentHash")]
    parent_hash: String,
    timestamp: String,
    miner: String,
}

#[derive(Debug, Deserialize)]
struct RawEthLog {
    address: String,
    topics: Vec<String>,
    data: String,
    #[serde(rename = "logIndex")]
    log_index: String,
    #[serde(rename = "transactionIndex")]
    transaction_index: String,
}

fn parse_hex_i64(s: &str) -> Result<i64, ClientError> {
    i64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ClientError::DecodeError(format!("invalid hex quantity {s}: {e}")))
}

impl TryFrom<RawEthBlock> for EthBlock {
    type Error = ClientError;

    fn try_from(raw: RawEthBlock) -> Result<Self, Self::Error> {
        let number = parse_hex_i64(&raw.number)?;
        let timestamp = parse_hex_i64(&raw.timestamp)?;
        Ok(EthBlock {
            hash: raw.hash,
            number,
            parent_hash: raw.parent_hash,
            timestamp: Utc
                .timestamp_opt(timestamp, 0)
                .single()
                .ok_or_else(|| ClientError::DecodeError(format!("invalid timestamp {timestamp}")))?,
            miner: raw.miner,
        })
    }
}

#[async_trait]
impl EthNodeClient for EthereumNodeClient {
    async fn get_block_by_number(&self, number: i64) -> Result<EthBlock, ClientError> {
        let hex = format!("0x{number:x}");
        let raw = self.call("eth_getBlockByNumber", json!([hex, false])).await?;
        let raw: RawEthBlock = serde_json::from_value(raw)
            .map_err(|e| ClientError::DecodeError(e.to_string()))?;
        raw.try_into()
    }

    async fn get_block_number(&self) -> Result<i64, ClientError> {
        let raw = self.call("eth_blockNumber", json!([])).await?;
        let hex: String =
            serde_json::from_value(raw).map_err(|e| ClientError::DecodeError(e.to_string()))?;
        parse_hex_i64(&hex)
    }

    async fn get_logs(&self, block_hash: &str) -> Result<Vec<Log>, ClientError> {
        let raw = self
            .call("eth_getLogs", json!([{ "blockHash": block_hash }]))
            .await?;
        let raw_logs: Vec<RawEthLog> =
            serde_json::from_value(raw).map_err(|e| ClientError::DecodeError(e.to_string()))?;
        raw_logs
            .into_iter()
            .map(|l| {
                Ok(Log {
                    block_hash: block_hash.to_string(),
                    op_index: parse_hex_i64(&l.transaction_index)? as i32,
                    log_index: parse_hex_i64(&l.log_index)? as i32,
                    address: l.address,
                    topics: l.topics,
                    data: l.data,
                })
            })
            .collect()
    }

    async fn get_accounts_at(
        &self,
        block_number: i64,
        ids: &[String],
    ) -> Result<Vec<EthAccount>, ClientError> {
        let tag = format!("0x{block_number:x}");
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let balance_hex = self
                .call("eth_getBalance", json!([id, tag]))
                .await
                .and_then(|v| {
                    serde_json::from_value::<String>(v)
                        .map_err(|e| ClientError::DecodeError(e.to_string()))
                })?;
            let nonce_hex = self
                .call("eth_getTransactionCount", json!([id, tag]))
                .await
                .and_then(|v| {
                    serde_json::from_value::<String>(v)
                        .map_err(|e| ClientError::DecodeError(e.to_string()))
                })?;
            out.push(EthAccount {
                account_id: id.clone(),
                block_number,
                balance: balance_hex,
                nonce: parse_hex_i64(&nonce_hex)?,
            });
        }
        Ok(out)
    }

    fn get_blocks_range<'a>(
        &'a self,
        from: i64,
        to: i64,
        page_size: u32,
        concurrency: usize,
    ) -> BoxStream<'a, Result<EthPage, ClientError>> {
        let chunks = chunk_range(from, to, page_size);
        stream::iter(chunks)
            .map(move |(start, end)| async move {
                let mut page = Vec::with_capacity((end - start + 1) as usize);
                for number in start..=end {
                    page.push(self.get_block_by_number(number).await?);
                }
                Ok(page)
            })
            .buffered(concurrency.max(1))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_i64_accepts_0x_prefixed_quantities() {
        assert_eq!(parse_hex_i64("0x10").unwrap(), 16);
        assert_eq!(parse_hex_i64("0x0").unwrap(), 0);
    }

    #[test]
    fn parse_hex_i64_rejects_garbage() {
        assert!(parse_hex_i64("not-hex").is_err());
    }

    #[test]
    fn raw_eth_block_maps_onto_domain_eth_block() {
        let raw = RawEthBlock {
            hash: "0xabc".to_string(),
            number: "0x64".to_string(),
            parent_hash: "0xdef".to_string(),
            timestamp: "0x5f5e100".to_string(),
            miner: "0xminer".to_string(),
        };
        let block: EthBlock = raw.try_into().unwrap();
        assert_eq!(block.number, 100);
        assert_eq!(block.hash, "0xabc");
    }
}
