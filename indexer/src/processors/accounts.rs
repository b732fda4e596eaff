//! `AccountsProcessor` (§4.4): drains pending `AccountCheckpoint` rows,
//! collapsing to the latest `(level, block_hash)` per account, fetches
//! fresh state from the node, and persists snapshots.

use crate::db::models::{AccountCheckpointRow, AccountSnapshotRow};
use crate::db::schema::{account_checkpoints, account_snapshots};
use crate::db::{run_blocking, DbPool};
use crate::error::ProcessingError;
use diesel::prelude::*;
use lorre_common::domain::AccountCheckpoint;
use lorre_node_client::NodeClient;
use std::collections::HashMap;

pub struct AccountsProcessor {
    pool: DbPool,
    accounts_batch_size: u32,
}

impl AccountsProcessor {
    pub fn new(pool: DbPool, accounts_batch_size: u32) -> Self {
        Self {
            pool,
            accounts_batch_size,
        }
    }

    /// Processes every pending checkpoint, returning the number of accounts
    /// snapshotted. A node failure surfaces before any checkpoint is deleted.
    pub async fn process_checkpoints(
        &self,
        node: &dyn NodeClient,
    ) -> Result<usize, ProcessingError> {
        let pending = load_checkpoints(self.pool.clone()).await?;
        let collapsed = collapse_to_latest(pending);
        if collapsed.is_empty() {
            return Ok(0);
        }

        let mut processed = 0;
        for batch in collapsed.chunks(self.accounts_batch_size.max(1) as usize) {
            let by_level: HashMap<i64, Vec<&Collapsed>> =
                batch.iter().fold(HashMap::new(), |mut acc, c| {
                    acc.entry(c.winner.block_level).or_default().push(c);
                    acc
                });
            for (level, entries) in by_level {
                let ids: Vec<String> = entries.iter().map(|c| c.winner.account_id.clone()).collect();
                let snapshots = node
                    .get_accounts_at(level, &ids)
                    .await
                    .map_err(|e| ProcessingError::AccountsProcessingFailed(Box::new(e)))?;
                // Delete every row that was loaded into `pending` for these
                // ids, not only the collapsed winner — otherwise older
                // checkpoint rows collapsed away survive forever (§3, §8).
                let consumed: Vec<AccountCheckpoint> = entries
                    .iter()
                    .flat_map(|c| c.all_rows.iter().cloned())
                    .collect();
                persist_and_delete(self.pool.clone(), snapshots, consumed)
                    .await
                    .map_err(|e| ProcessingError::AccountsProcessingFailed(Box::new(e)))?;
                processed += ids.len();
            }
        }
        Ok(processed)
    }
}

async fn load_checkpoints(pool: DbPool) -> Result<Vec<AccountCheckpoint>, crate::db::DbError> {
    run_blocking(pool, |conn| {
        let rows: Vec<AccountCheckpointRow> = account_checkpoints::table.load(conn)?;
        Ok(rows.into_iter().map(AccountCheckpoint::from).collect())
    })
    .await
}

/// One account's collapsed work item: the checkpoint to fetch state for
/// (`winner`, the highest `(block_level, block_hash)`), and every pending
/// row for that account that was loaded this cycle (`all_rows`) — all of
/// which must be deleted once `winner` is processed, per §3's invariant that
/// every `AccountCheckpoint` row is eventually consumed or carried over.
struct Collapsed {
    winner: AccountCheckpoint,
    all_rows: Vec<AccountCheckpoint>,
}

/// Groups pending checkpoints by `account_id`, picking the one with the
/// highest `block_level` (ties broken by `block_hash`) as the snapshot
/// target, while retaining the full group for deletion.
fn collapse_to_latest(checkpoints: Vec<AccountCheckpoint>) -> Vec<Collapsed> {
    let mut groups: HashMap<String, Vec<AccountCheckpoint>> = HashMap::new();
    for checkpoint in checkpoints {
        groups
            .entry(checkpoint.account_id.clone())
            .or_default()
            .push(checkpoint);
    }
    let mut out: Vec<Collapsed> = groups
        .into_iter()
        .map(|(account_id, all_rows)| {
            let winner = all_rows
                .iter()
                .max_by(|a, b| (a.block_level, &a.block_hash).cmp(&(b.block_level, &b.block_hash)))
                .cloned()
                .unwrap_or_else(|| unreachable!("group for {account_id} is never empty"));
            Collapsed { winner, all_rows }
        })
        .collect();
    out.sort_by(|a, b| a.winner.account_id.cmp(&b.winner.account_id));
    out
}

async fn persist_and_delete(
    pool: DbPool,
    snapshots: Vec<lorre_common::domain::AccountSnapshot>,
    consumed: Vec<AccountCheckpoint>,
) -> Result<(), crate::db::DbError> {
    run_blocking(pool, move |conn| {
        conn.transaction(|conn| {
            if !snapshots.is_empty() {
                let rows: Vec<AccountSnapshotRow> =
                    snapshots.iter().map(AccountSnapshotRow::from).collect();
                diesel::insert_into(account_snapshots::table)
                    .values(rows)
                    .on_conflict((account_snapshots::account_id, account_snapshots::block_level))
                    .do_nothing()
                    .execute(conn)?;
            }
            for c in &consumed {
                diesel::delete(
                    account_checkpoints::table
                        .filter(account_checkpoints::account_id.eq(&c.account_id))
                        .filter(account_checkpoints::block_level.eq(c.block_level))
                        .filter(account_checkpoints::block_hash.eq(&c.block_hash)),
                )
                .execute(conn)?;
            }
            Ok(())
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(account_id: &str, level: i64, hash: &str) -> AccountCheckpoint {
        AccountCheckpoint {
            account_id: account_id.to_string(),
            block_level: level,
            block_hash: hash.to_string(),
            cycle: 0,
        }
    }

    #[test]
    fn collapse_keeps_highest_level_per_account() {
        let checkpoints = vec![
            checkpoint("tz1a", 100, "B100"),
            checkpoint("tz1a", 105, "B105"),
            checkpoint("tz1b", 102, "B102"),
        ];
        let collapsed = collapse_to_latest(checkpoints);
        assert_eq!(collapsed.len(), 2);
        let a = collapsed
            .iter()
            .find(|c| c.winner.account_id == "tz1a")
            .unwrap();
        assert_eq!(a.winner.block_level, 105);
    }

    #[test]
    fn collapse_retains_every_superseded_row_for_deletion() {
        let checkpoints = vec![
            checkpoint("tz1a", 100, "B100"),
            checkpoint("tz1a", 105, "B105"),
        ];
        let collapsed = collapse_to_latest(checkpoints);
        let a = collapsed
            .iter()
            .find(|c| c.winner.account_id == "tz1a")
            .unwrap();
        assert_eq!(a.all_rows.len(), 2);
    }

    #[test]
    fn collapse_is_empty_for_empty_input() {
        assert!(collapse_to_latest(Vec::new()).is_empty());
    }
}
