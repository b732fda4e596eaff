//! `BakersProcessor` (§4.4): the delegate-side mirror of `AccountsProcessor`.

use crate::db::models::{BakerCheckpointRow, BakerSnapshotRow};
use crate::db::schema::{baker_checkpoints, baker_snapshots};
use crate::db::{run_blocking, DbPool};
use crate::error::ProcessingError;
use diesel::prelude::*;
use lorre_common::domain::BakerCheckpoint;
use lorre_node_client::NodeClient;
use std::collections::HashMap;

pub struct BakersProcessor {
    pool: DbPool,
    bakers_batch_size: u32,
}

impl BakersProcessor {
    pub fn new(pool: DbPool, bakers_batch_size: u32) -> Self {
        Self {
            pool,
            bakers_batch_size,
        }
    }

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
        for batch in collapsed.chunks(self.bakers_batch_size.max(1) as usize) {
            let by_level: HashMap<i64, Vec<&Collapsed>> =
                batch.iter().fold(HashMap::new(), |mut acc, c| {
                    acc.entry(c.winner.block_level).or_default().push(c);
                    acc
                });
            for (level, entries) in by_level {
                let ids: Vec<String> = entries.iter().map(|c| c.winner.baker_id.clone()).collect();
                let snapshots = node
                    .get_bakers_at(level, &ids)
                    .await
                    .map_err(|e| ProcessingError::BakersProcessingFailed(Box::new(e)))?;
                // Delete every row loaded into `pending` for these ids, not
                // only the collapsed winner (§3, §8).
                let consumed: Vec<BakerCheckpoint> = entries
                    .iter()
                    .flat_map(|c| c.all_rows.iter().cloned())
                    .collect();
                persist_and_delete(self.pool.clone(), snapshots, consumed)
                    .await
                    .map_err(|e| ProcessingError::BakersProcessingFailed(Box::new(e)))?;
                processed += ids.len();
            }
        }
        Ok(processed)
    }
}

async fn load_checkpoints(pool: DbPool) -> Result<Vec<BakerCheckpoint>, crate::db::DbError> {
    run_blocking(pool, |conn| {
        let rows: Vec<BakerCheckpointRow> = baker_checkpoints::table.load(conn)?;
        Ok(rows.into_iter().map(BakerCheckpoint::from).collect())
    })
    .await
}

/// One baker's collapsed work item, mirroring
/// `accounts::Collapsed` — `winner` is fetched, `all_rows` is deleted.
struct Collapsed {
    winner: BakerCheckpoint,
    all_rows: Vec<BakerCheckpoint>,
}

fn collapse_to_latest(checkpoints: Vec<BakerCheckpoint>) -> Vec<Collapsed> {
    let mut groups: HashMap<String, Vec<BakerCheckpoint>> = HashMap::new();
    for checkpoint in checkpoints {
        groups.entry(checkpoint.baker_id.clone()).or_default().push(checkpoint);
    }
    let mut out: Vec<Collapsed> = groups
        .into_iter()
        .map(|(baker_id, all_rows)| {
            let winner = all_rows
                .iter()
                .max_by(|a, b| (a.block_level, &a.block_hash).cmp(&(b.block_level, &b.block_hash)))
                .cloned()
                .unwrap_or_else(|| unreachable!("group for {baker_id} is never empty"));
            Collapsed { winner, all_rows }
        })
        .collect();
    out.sort_by(|a, b| a.winner.baker_id.cmp(&b.winner.baker_id));
    out
}

async fn persist_and_delete(
    pool: DbPool,
    snapshots: Vec<lorre_common::domain::BakerSnapshot>,
    consumed: Vec<BakerCheckpoint>,
) -> Result<(), crate::db::DbError> {
    run_blocking(pool, move |conn| {
        conn.transaction(|conn| {
            if !snapshots.is_empty() {
                let rows: Vec<BakerSnapshotRow> =
                    snapshots.iter().map(BakerSnapshotRow::from).collect();
                diesel::insert_into(baker_snapshots::table)
                    .values(rows)
                    .on_conflict((baker_snapshots::baker_id, baker_snapshots::block_level))
                    .do_nothing()
                    .execute(conn)?;
            }
            for c in &consumed {
                diesel::delete(
                    baker_checkpoints::table
                        .filter(baker_checkpoints::baker_id.eq(&c.baker_id))
                        .filter(baker_checkpoints::block_level.eq(c.block_level))
                        .filter(baker_checkpoints::block_hash.eq(&c.block_hash)),
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

    fn checkpoint(baker_id: &str, level: i64, hash: &str) -> BakerCheckpoint {
        BakerCheckpoint {
            baker_id: baker_id.to_string(),
            block_level: level,
            block_hash: hash.to_string(),
            cycle: 0,
        }
    }

    #[test]
    fn collapse_keeps_highest_level_per_baker() {
        let checkpoints = vec![
            checkpoint("tz1baker", 100, "B100"),
            checkpoint("tz1baker", 110, "B110"),
        ];
        let collapsed = collapse_to_latest(checkpoints);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].winner.block_level, 110);
        assert_eq!(collapsed[0].all_rows.len(), 2);
    }
}
