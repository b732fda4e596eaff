//! `EthBlocksProcessor` (§10.6): the simplified Ethereum-family mirror of
//! `BlocksProcessor`. No bakers, rights, or TNS — token registry matching is
//! the only sub-stream shared with the Tezos side.

use crate::db::models::{EthAccountCheckpointRow, EthBlockRow};
use crate::db::schema::{eth_account_checkpoints, eth_blocks, token_balances, token_transfers};
use crate::db::{run_blocking, DbError, DbPool};
use crate::error::ProcessingError;
use crate::token_registry::TokenRegistry;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::PgConnection;
use lorre_common::domain::{EthAccountCheckpoint, EthBlock};
use lorre_node_client::ethereum::EthNodeClient;

pub struct EthBlocksProcessor {
    pool: DbPool,
    token_registry: TokenRegistry,
}

impl EthBlocksProcessor {
    pub fn new(pool: DbPool, token_registry: TokenRegistry) -> Self {
        Self {
            pool,
            token_registry,
        }
    }

    pub async fn process_blocks_page(
        &self,
        page: &[EthBlock],
        node: &dyn EthNodeClient,
    ) -> Result<usize, ProcessingError> {
        let mut committed = 0;
        for block in page {
            let logs = node.get_logs(&block.hash).await?;
            let (transfers, balances) = self.token_registry.match_logs(&logs);
            let checkpoints = account_checkpoints_for(block, &transfers);

            run_blocking(self.pool.clone(), {
                let block = block.clone();
                move |conn| {
                    conn.transaction(|conn| {
                        commit_block(conn, &block, transfers, balances, checkpoints)
                    })
                }
            })
            .await
            .map_err(|e: DbError| ProcessingError::BlocksProcessingFailed {
                message: format!("committing eth block {} (number {})", block.hash, block.number),
                cause: Box::new(e),
            })?;
            committed += 1;
        }
        Ok(committed)
    }
}

fn account_checkpoints_for(
    block: &EthBlock,
    transfers: &[lorre_common::domain::TokenTransfer],
) -> Vec<EthAccountCheckpoint> {
    let mut ids: Vec<String> = Vec::new();
    for t in transfers {
        ids.push(t.from.clone());
        ids.push(t.to.clone());
    }
    ids.sort();
    ids.dedup();
    ids.into_iter()
        .map(|account_id| EthAccountCheckpoint {
            account_id,
            block_number: block.number,
            block_hash: block.hash.clone(),
        })
        .collect()
}

fn commit_block(
    conn: &mut PgConnection,
    block: &EthBlock,
    transfers: Vec<lorre_common::domain::TokenTransfer>,
    balances: Vec<lorre_common::domain::TokenBalance>,
    checkpoints: Vec<EthAccountCheckpoint>,
) -> diesel::QueryResult<()> {
    diesel::insert_into(eth_blocks::table)
        .values(EthBlockRow::from(block))
        .on_conflict(eth_blocks::hash)
        .do_nothing()
        .execute(conn)?;

    if !transfers.is_empty() {
        let rows: Vec<crate::db::models::TokenTransferRow> =
            transfers.iter().map(crate::db::models::TokenTransferRow::from).collect();
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

    if !balances.is_empty() {
        let rows: Vec<crate::db::models::TokenBalanceRow> = balances
            .iter()
            .map(|b| {
                crate::db::models::TokenBalanceRow::from(&lorre_common::domain::TokenBalance {
                    block_level: block.number,
                    ..b.clone()
                })
            })
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

    if !checkpoints.is_empty() {
        let rows: Vec<EthAccountCheckpointRow> =
            checkpoints.iter().map(EthAccountCheckpointRow::from).collect();
        diesel::insert_into(eth_account_checkpoints::table)
            .values(rows)
            .on_conflict((
                eth_account_checkpoints::account_id,
                eth_account_checkpoints::block_number,
                eth_account_checkpoints::block_hash,
            ))
            .do_nothing()
            .execute(conn)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn block() -> EthBlock {
        EthBlock {
            hash: "0xblock".to_string(),
            number: 100,
            parent_hash: "0xparent".to_string(),
            timestamp: Utc::now(),
            miner: "0xminer".to_string(),
        }
    }

    #[test]
    fn account_checkpoints_dedupe_from_and_to() {
        let transfers = vec![
            lorre_common::domain::TokenTransfer {
                block_hash: "0xblock".into(),
                op_index: 0,
                log_index: 0,
                contract: "0xtoken".into(),
                from: "0xa".into(),
                to: "0xb".into(),
                amount: "0x1".into(),
            },
            lorre_common::domain::TokenTransfer {
                block_hash: "0xblock".into(),
                op_index: 0,
                log_index: 1,
                contract: "0xtoken".into(),
                from: "0xa".into(),
                to: "0xc".into(),
                amount: "0x2".into(),
            },
        ];
        let checkpoints = account_checkpoints_for(&block(), &transfers);
        let ids: Vec<&str> = checkpoints.iter().map(|c| c.account_id.as_str()).collect();
        assert_eq!(ids, vec!["0xa", "0xb", "0xc"]);
    }
}
