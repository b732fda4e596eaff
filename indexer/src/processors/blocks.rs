//! `BlocksProcessor` (§4.3): commits one page of blocks, fanning each block
//! out into transactions/receipts/logs, account/baker checkpoints, token
//! registry matches, and TNS entries — all within one write transaction per
//! block, so a partial failure never leaves a block half-committed.

use crate::db::models::{
    AccountCheckpointRow, BakerCheckpointRow, BlockRow, LogRow, ReceiptRow, TnsEntryRow,
    TokenBalanceRow, TokenTransferRow, TransactionRow,
};
use crate::db::schema::{
    account_checkpoints, baker_checkpoints, blocks, logs, receipts, tns_entries,
    token_balances, token_transfers, transactions,
};
use crate::db::{run_blocking, DbError, DbPool};
use crate::error::ProcessingError;
use crate::token_registry::TokenRegistry;
use crate::tns::TnsResolver;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::PgConnection;
use lorre_common::domain::{AccountCheckpoint, BakerCheckpoint, Block};
use lorre_node_client::NodeClient;

pub struct BlocksProcessor {
    pool: DbPool,
    token_registry: TokenRegistry,
    tns_resolver: TnsResolver,
}

impl BlocksProcessor {
    pub fn new(pool: DbPool, token_registry: TokenRegistry, tns_resolver: TnsResolver) -> Self {
        Self {
            pool,
            token_registry,
            tns_resolver,
        }
    }

    /// Persists one page of blocks, in the order given (the caller — the
    /// single-permit page stage of §5 — guarantees level-ascending order).
    /// Returns the number of blocks committed.
    pub async fn process_blocks_page(
        &self,
        page: &[Block],
        node: &dyn NodeClient,
    ) -> Result<usize, ProcessingError> {
        let mut committed = 0;
        for block in page {
            let ops = node.get_block_operations(&block.hash).await?;
            let block = block.clone();
            let token_transfers = self.token_registry.match_logs(&ops.logs);
            let tns_entries = self.tns_resolver.resolve(block.level, &ops.logs);

            let outcome = run_blocking(self.pool.clone(), {
                let block = block.clone();
                move |conn| {
                    conn.transaction(|conn| {
                        commit_block(
                            conn,
                            &block,
                            &ops.transactions,
                            &ops.receipts,
                            &ops.logs,
                            token_transfers,
                            tns_entries,
                        )
                    })
                }
            })
            .await
            .map_err(|e: DbError| ProcessingError::BlocksProcessingFailed {
                message: format!("committing block {} (level {})", block.hash, block.level),
                cause: Box::new(e),
            })?;

            tracing::debug!(
                target: "lorre::blocks_processor",
                level = block.level,
                hash = %block.hash,
                account_checkpoints = outcome.account_checkpoints,
                baker_checkpoints = outcome.baker_checkpoints,
                "committed block"
            );
            committed += 1;
        }
        Ok(committed)
    }
}

struct CommitOutcome {
    account_checkpoints: usize,
    baker_checkpoints: usize,
}

fn commit_block(
    conn: &mut PgConnection,
    block: &Block,
    txs: &[lorre_common::domain::Transaction],
    receipt_rows: &[lorre_common::domain::Receipt],
    log_rows: &[lorre_common::domain::Log],
    (transfer_rows, balance_rows): (
        Vec<lorre_common::domain::TokenTransfer>,
        Vec<lorre_common::domain::TokenBalance>,
    ),
    tns_rows: Vec<lorre_common::domain::TnsEntry>,
) -> diesel::QueryResult<CommitOutcome> {
    diesel::insert_into(blocks::table)
        .values(BlockRow::from(block))
        .on_conflict(blocks::hash)
        .do_nothing()
        .execute(conn)?;

    if !txs.is_empty() {
        let rows: Vec<TransactionRow> = txs.iter().map(TransactionRow::from).collect();
        diesel::insert_into(transactions::table)
            .values(rows)
            .on_conflict((transactions::block_hash, transactions::op_index))
            .do_nothing()
            .execute(conn)?;
    }

    if !receipt_rows.is_empty() {
        let rows: Vec<ReceiptRow> = receipt_rows.iter().map(ReceiptRow::from).collect();
        diesel::insert_into(receipts::table)
            .values(rows)
            .on_conflict((receipts::block_hash, receipts::op_index))
            .do_nothing()
            .execute(conn)?;
    }

    if !log_rows.is_empty() {
        let rows: Vec<LogRow> = log_rows.iter().map(LogRow::from).collect();
        diesel::insert_into(logs::table)
            .values(rows)
            .on_conflict((logs::block_hash, logs::op_index, logs::log_index))
            .do_nothing()
            .execute(conn)?;
    }

    let account_checkpoint_rows: Vec<AccountCheckpointRow> =
        account_checkpoints_for(block, txs)
            .iter()
            .map(AccountCheckpointRow::from)
            .collect();
    if !account_checkpoint_rows.is_empty() {
        diesel::insert_into(account_checkpoints::table)
            .values(&account_checkpoint_rows)
            .on_conflict((
                account_checkpoints::account_id,
                account_checkpoints::block_level,
                account_checkpoints::block_hash,
            ))
            .do_nothing()
            .execute(conn)?;
    }

    let baker_checkpoint_rows: Vec<BakerCheckpointRow> = baker_checkpoints_for(block)
        .iter()
        .map(BakerCheckpointRow::from)
        .collect();
    if !baker_checkpoint_rows.is_empty() {
        diesel::insert_into(baker_checkpoints::table)
            .values(&baker_checkpoint_rows)
            .on_conflict((
                baker_checkpoints::baker_id,
                baker_checkpoints::block_level,
                baker_checkpoints::block_hash,
            ))
            .do_nothing()
            .execute(conn)?;
    }

    if !transfer_rows.is_empty() {
        let rows: Vec<TokenTransferRow> = transfer_rows.iter().map(TokenTransferRow::from).collect();
        diesel::insert_into(token_transfers::table)
            .values(rows)
            .on_conflict((
                token_transfers::block_hash,
                token_transfers::op_index,
                token_transfers::log_index,
            ))
            .do_nothing()
            .execute(conn)?;
    }

    if !balance_rows.is_empty() {
        let rows: Vec<TokenBalanceRow> = balance_rows
            .iter()
            .map(|b| TokenBalanceRow::from(&lorre_common::domain::TokenBalance {
                block_level: block.level,
                ..b.clone()
            }))
            .collect();
        diesel::insert_into(token_balances::table)
            .values(rows)
            .on_conflict((
                token_balances::contract,
                token_balances::account_id,
                token_balances::block_level,
            ))
            .do_update()
            .set(token_balances::balance.eq(excluded(token_balances::balance)))
            .execute(conn)?;
    }

    if !tns_rows.is_empty() {
        let rows: Vec<TnsEntryRow> = tns_rows.iter().map(TnsEntryRow::from).collect();
        diesel::insert_into(tns_entries::table)
            .values(rows)
            .on_conflict(tns_entries::name)
            .do_update()
            .set((
                tns_entries::account_id.eq(excluded(tns_entries::account_id)),
                tns_entries::block_level.eq(excluded(tns_entries::block_level)),
            ))
            .execute(conn)?;
    }

    Ok(CommitOutcome {
        account_checkpoints: account_checkpoint_rows.len(),
        baker_checkpoints: baker_checkpoint_rows.len(),
    })
}

/// Every account appearing as a transaction's source or destination (§4.3 step 2).
fn account_checkpoints_for(
    block: &Block,
    txs: &[lorre_common::domain::Transaction],
) -> Vec<AccountCheckpoint> {
    let mut ids: Vec<String> = Vec::new();
    for tx in txs {
        ids.push(tx.source.clone());
        if let Some(dest) = &tx.destination {
            ids.push(dest.clone());
        }
    }
    ids.sort();
    ids.dedup();
    ids.into_iter()
        .map(|account_id| AccountCheckpoint {
            account_id,
            block_level: block.level,
            block_hash: block.hash.clone(),
            cycle: cycle_for_level(block.level),
        })
        .collect()
}

/// The block's producer is the only baker a block itself attributes (rights
/// fetching surfaces future bakers separately via `RightsProcessor`).
fn baker_checkpoints_for(block: &Block) -> Vec<BakerCheckpoint> {
    vec![BakerCheckpoint {
        baker_id: block.baker.clone(),
        block_level: block.level,
        block_hash: block.hash.clone(),
        cycle: cycle_for_level(block.level),
    }]
}

/// Tezos cycles are fixed-size level windows; the boundary itself is a
/// protocol parameter, but callers in this workspace only need a stable,
/// monotonic grouping key, so a constant blocks-per-cycle is assumed.
const BLOCKS_PER_CYCLE: i64 = 8192;

pub(crate) fn cycle_for_level(level: i64) -> i32 {
    (level / BLOCKS_PER_CYCLE) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lorre_common::domain::Transaction;

    fn block(level: i64, hash: &str) -> Block {
        Block {
            hash: hash.to_string(),
            level,
            predecessor_hash: "pred".to_string(),
            timestamp: Utc::now(),
            protocol: "PtAtLas".to_string(),
            baker: "tz1baker".to_string(),
            metadata_blob: serde_json::json!({}),
        }
    }

    #[test]
    fn account_checkpoints_dedupe_source_and_destination() {
        let b = block(100, "BLhash");
        let txs = vec![
            Transaction {
                block_hash: "BLhash".into(),
                op_index: 0,
                source: "tz1a".into(),
                destination: Some("tz1b".into()),
                fee: 10,
                counter: 1,
                kind: "transaction".into(),
            },
            Transaction {
                block_hash: "BLhash".into(),
                op_index: 1,
                source: "tz1a".into(),
                destination: Some("tz1c".into()),
                fee: 10,
                counter: 2,
                kind: "transaction".into(),
            },
        ];
        let checkpoints = account_checkpoints_for(&b, &txs);
        let ids: Vec<&str> = checkpoints.iter().map(|c| c.account_id.as_str()).collect();
        assert_eq!(ids, vec!["tz1a", "tz1b", "tz1c"]);
    }

    #[test]
    fn baker_checkpoint_is_the_blocks_producer() {
        let b = block(8193, "BLhash");
        let checkpoints = baker_checkpoints_for(&b);
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].baker_id, "tz1baker");
        assert_eq!(checkpoints[0].cycle, 1);
    }

    #[test]
    fn cycle_for_level_divides_by_blocks_per_cycle() {
        assert_eq!(cycle_for_level(0), 0);
        assert_eq!(cycle_for_level(8191), 0);
        assert_eq!(cycle_for_level(8192), 1);
    }
}
