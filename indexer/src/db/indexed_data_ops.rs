//! `IndexedDataOps`: read-side helpers over the persisted blocks/accounts,
//! used by `BlockFetchPlanner` (to find `L_db`) and `AccountsResetHandler`
//! (to enumerate accounts for a wholesale refresh).

use super::pool::{run_blocking, DbError, DbPool};
use super::schema::{account_checkpoints, account_snapshots, blocks};
use diesel::dsl::max;
use diesel::prelude::*;

#[derive(Clone)]
pub struct IndexedDataOps {
    pool: DbPool,
}

impl IndexedDataOps {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// `L_db`: the highest persisted block level, or `None` if the table is empty.
    pub async fn latest_level(&self) -> Result<Option<i64>, DbError> {
        run_blocking(self.pool.clone(), |conn| {
            blocks::table.select(max(blocks::level)).first(conn)
        })
        .await
    }

    /// The hash stored for `level`, used to detect a reorged head (§11).
    pub async fn hash_at_level(&self, level: i64) -> Result<Option<String>, DbError> {
        run_blocking(self.pool.clone(), move |conn| {
            blocks::table
                .select(blocks::hash)
                .filter(blocks::level.eq(level))
                .first(conn)
                .optional()
        })
        .await
    }

    pub async fn block_exists(&self, hash: &str) -> Result<bool, DbError> {
        let hash = hash.to_string();
        run_blocking(self.pool.clone(), move |conn| {
            diesel::select(diesel::dsl::exists(
                blocks::table.filter(blocks::hash.eq(hash)),
            ))
            .get_result(conn)
        })
        .await
    }

    /// Every account this indexing run has ever observed, used to seed a
    /// full refresh when a `ResetEvent` fires.
    pub async fn known_account_ids(&self) -> Result<Vec<String>, DbError> {
        run_blocking(self.pool.clone(), |conn| {
            let mut ids: Vec<String> = account_snapshots::table
                .select(account_snapshots::account_id)
                .distinct()
                .load(conn)?;
            let checkpointed: Vec<String> = account_checkpoints::table
                .select(account_checkpoints::account_id)
                .distinct()
                .load(conn)?;
            ids.extend(checkpointed);
            ids.sort();
            ids.dedup();
            Ok(ids)
        })
        .await
    }
}
