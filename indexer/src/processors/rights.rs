//! `RightsProcessor` (§4.5): fetches upcoming baking/endorsing rights on a
//! timer, derives rights from freshly indexed blocks, and backfills
//! `estimated_time` once the corresponding block is indexed.

use crate::db::models::{BakerCheckpointRow, RightsRow as RightsRowModel};
use crate::db::schema::{baker_checkpoints, rights};
use crate::db::{run_blocking, DbError, DbPool};
use diesel::prelude::*;
use diesel::upsert::excluded;
use lorre_common::domain::{BakerCheckpoint, Block, RightKind, RightsRow};
use lorre_node_client::{ClientError, NodeClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn wrap_client_error(e: ClientError) -> DbError {
    DbError::Query(diesel::result::Error::QueryBuilderError(Box::new(e)))
}

pub struct RightsProcessor {
    pool: DbPool,
    lookahead_cycles: u32,
    /// Guards `write_future_rights` against overlapping ticks (§9: "guard
    /// re-entrancy with a running flag so consecutive ticks cannot overlap").
    running: Arc<AtomicBool>,
}

impl RightsProcessor {
    pub fn new(pool: DbPool, lookahead_cycles: u32) -> Self {
        Self {
            pool,
            lookahead_cycles,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Periodic task body: fetches and upserts rights for the next
    /// `lookahead_cycles` cycles starting at `current_cycle`. A tick that
    /// finds the previous one still running is skipped, not queued.
    pub async fn write_future_rights(
        &self,
        node: &dyn NodeClient,
        current_cycle: i32,
    ) -> Result<usize, DbError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                target: "lorre::rights_processor",
                "previous writeFutureRights tick still running; skipping this one"
            );
            return Ok(0);
        }
        let result = self.write_future_rights_inner(node, current_cycle).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn write_future_rights_inner(
        &self,
        node: &dyn NodeClient,
        current_cycle: i32,
    ) -> Result<usize, DbError> {
        let mut rows = Vec::new();
        for cycle in current_cycle..current_cycle + self.lookahead_cycles as i32 {
            rows.extend(
                node.get_baking_rights(cycle)
                    .await
                    .map_err(wrap_client_error)?,
            );
            rows.extend(
                node.get_endorsing_rights(cycle)
                    .await
                    .map_err(wrap_client_error)?,
            );
        }
        upsert_rights(self.pool.clone(), rows).await
    }

    /// Derives rights from pages already committed by `BlocksProcessor`: a
    /// baking-right row for each block's own producer, plus the actual
    /// baking/endorsing rights holders for that block's level, fetched from
    /// the node per cycle covered by the page. Every delegate named by those
    /// rights is also checkpointed (§4.3 step 2: "every baker mentioned in
    /// rights/endorsements goes to `BakerCheckpoint`"), not only the block's
    /// producer.
    pub async fn process_baking_and_endorsing_rights(
        &self,
        blocks: &[Block],
        node: &dyn NodeClient,
    ) -> Result<usize, DbError> {
        if blocks.is_empty() {
            return Ok(0);
        }

        let mut rows: Vec<RightsRow> = blocks
            .iter()
            .map(|b| RightsRow {
                level: b.level,
                cycle: super::blocks::cycle_for_level(b.level),
                delegate: b.baker.clone(),
                slot: 0,
                kind: RightKind::Baking,
                estimated_time: Some(b.timestamp),
            })
            .collect();
        let mut checkpoints: Vec<BakerCheckpoint> = blocks
            .iter()
            .map(|b| BakerCheckpoint {
                baker_id: b.baker.clone(),
                block_level: b.level,
                block_hash: b.hash.clone(),
                cycle: super::blocks::cycle_for_level(b.level),
            })
            .collect();

        let mut cycles: Vec<i32> = blocks
            .iter()
            .map(|b| super::blocks::cycle_for_level(b.level))
            .collect();
        cycles.sort_unstable();
        cycles.dedup();

        for cycle in cycles {
            let mut participants = node
                .get_baking_rights(cycle)
                .await
                .map_err(wrap_client_error)?;
            participants.extend(
                node.get_endorsing_rights(cycle)
                    .await
                    .map_err(wrap_client_error)?,
            );
            for right in participants {
                let Some(b) = blocks.iter().find(|b| b.level == right.level) else {
                    continue;
                };
                checkpoints.push(BakerCheckpoint {
                    baker_id: right.delegate.clone(),
                    block_level: b.level,
                    block_hash: b.hash.clone(),
                    cycle: right.cycle,
                });
                rows.push(right);
            }
        }

        // Postgres errors if a single `ON CONFLICT DO UPDATE` statement would
        // touch the same row twice; collapse duplicate (level, delegate,
        // kind) rights before upserting.
        let mut by_key: HashMap<(i64, String, u8), RightsRow> = HashMap::new();
        for row in rows {
            by_key.insert((row.level, row.delegate.clone(), row.kind as u8), row);
        }
        let rows: Vec<RightsRow> = by_key.into_values().collect();

        upsert_checkpoints(self.pool.clone(), checkpoints).await?;
        upsert_rights(self.pool.clone(), rows).await
    }

    /// Backfills `estimated_time` for rights rows whose block has since been
    /// indexed, matching on `(level, delegate, kind)`.
    pub async fn update_rights_timestamps(&self) -> Result<usize, DbError> {
        run_blocking(self.pool.clone(), |conn| {
            diesel::sql_query(
                "UPDATE rights SET estimated_time = blocks.timestamp \
                 FROM blocks WHERE rights.level = blocks.level \
                 AND rights.estimated_time IS NULL",
            )
            .execute(conn)
        })
        .await
    }
}

async fn upsert_checkpoints(pool: DbPool, rows: Vec<BakerCheckpoint>) -> Result<usize, DbError> {
    if rows.is_empty() {
        return Ok(0);
    }
    run_blocking(pool, move |conn| {
        let models: Vec<BakerCheckpointRow> = rows.iter().map(BakerCheckpointRow::from).collect();
        diesel::insert_into(baker_checkpoints::table)
            .values(&models)
            .on_conflict((
                baker_checkpoints::baker_id,
                baker_checkpoints::block_level,
                baker_checkpoints::block_hash,
            ))
            .do_nothing()
            .execute(conn)
    })
    .await
}

async fn upsert_rights(pool: DbPool, rows: Vec<RightsRow>) -> Result<usize, DbError> {
    if rows.is_empty() {
        return Ok(0);
    }
    run_blocking(pool, move |conn| {
        let models: Vec<RightsRowModel> = rows.iter().map(RightsRowModel::from).collect();
        diesel::insert_into(rights::table)
            .values(&models)
            .on_conflict((rights::level, rights::delegate, rights::kind))
            .do_update()
            .set((
                rights::slot.eq(excluded(rights::slot)),
                rights::estimated_time.eq(excluded(rights::estimated_time)),
            ))
            .execute(conn)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_flag_starts_clear() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!flag.load(Ordering::SeqCst));
    }
}
