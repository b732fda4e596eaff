//! `AccountsResetHandler` (§4.6): applies protocol-upgrade-driven wholesale
//! account refreshes by seeding synthetic checkpoints for every known
//! account at the event's activation level.

use crate::db::models::AccountCheckpointRow;
use crate::db::schema::{account_checkpoints, reset_events};
use crate::db::{run_blocking, DbError, DbPool, IndexedDataOps};
use crate::error::ProcessingError;
use crate::processors::blocks::cycle_for_level;
use diesel::prelude::*;
use lorre_common::domain::{AccountCheckpoint, ResetEvent};

pub struct AccountsResetHandler {
    pool: DbPool,
    data_ops: IndexedDataOps,
}

impl AccountsResetHandler {
    pub fn new(pool: DbPool) -> Self {
        let data_ops = IndexedDataOps::new(pool.clone());
        Self { pool, data_ops }
    }

    /// Events already marked `applied` in storage, as `ResetEvent`s.
    pub async fn load_applied(&self) -> Result<Vec<ResetEvent>, DbError> {
        use crate::db::schema::reset_events;
        use lorre_common::domain::ResetKind;

        run_blocking(self.pool.clone(), |conn| {
            let rows: Vec<(String, i64)> = reset_events::table
                .filter(reset_events::applied.eq(true))
                .select((reset_events::protocol, reset_events::activation_level))
                .load(conn)?;
            Ok(rows
                .into_iter()
                .map(|(protocol, activation_level)| ResetEvent {
                    protocol,
                    activation_level,
                    kind: ResetKind::AccountsRefresh,
                })
                .collect())
        })
        .await
    }

    /// Attempts to apply every event in `events`; returns the ones that
    /// could not be applied this cycle (§4.6 step 3, "`UnhandledResetEvents`").
    /// Callers retry the *same* set next iteration until each succeeds.
    pub async fn apply_unhandled_accounts_resets(
        &self,
        events: &[ResetEvent],
    ) -> Result<Vec<ResetEvent>, ProcessingError> {
        let mut unhandled = Vec::new();
        for event in events {
            match self.apply_one(event).await {
                Ok(true) => {}
                Ok(false) => unhandled.push(event.clone()),
                Err(e) => {
                    tracing::warn!(
                        target: "lorre::reset_handler",
                        protocol = %event.protocol,
                        activation_level = event.activation_level,
                        error = %e,
                        "failed to apply reset event this cycle"
                    );
                    unhandled.push(event.clone());
                }
            }
        }
        Ok(unhandled)
    }

    /// Returns `Ok(true)` if applied, `Ok(false)` if the activation block
    /// has not been indexed yet (retry next cycle).
    async fn apply_one(&self, event: &ResetEvent) -> Result<bool, ProcessingError> {
        let Some(block_hash) = self
            .data_ops
            .hash_at_level(event.activation_level)
            .await?
        else {
            return Ok(false);
        };
        let account_ids = self.data_ops.known_account_ids().await?;
        let cycle = cycle_for_level(event.activation_level);
        let checkpoints: Vec<AccountCheckpoint> = account_ids
            .into_iter()
            .map(|account_id| AccountCheckpoint {
                account_id,
                block_level: event.activation_level,
                block_hash: block_hash.clone(),
                cycle,
            })
            .collect();
        persist_checkpoints_and_mark_applied(self.pool.clone(), event.clone(), checkpoints).await?;
        Ok(true)
    }
}

/// Events whose `activation_level <= l_db` and not yet marked applied
/// (§4.6 step 1). A pure function so it is cheaply unit-tested without a pool.
pub fn unprocessed_reset_request_levels<'a>(
    configured: &'a [ResetEvent],
    applied: &[ResetEvent],
    l_db: Option<i64>,
) -> Vec<&'a ResetEvent> {
    let Some(l_db) = l_db else {
        return Vec::new();
    };
    configured
        .iter()
        .filter(|e| e.activation_level <= l_db)
        .filter(|e| !applied.iter().any(|a| a.activation_level == e.activation_level))
        .collect()
}

async fn persist_checkpoints_and_mark_applied(
    pool: DbPool,
    event: ResetEvent,
    checkpoints: Vec<AccountCheckpoint>,
) -> Result<(), DbError> {
    run_blocking(pool, move |conn| {
        conn.transaction(|conn| {
            if !checkpoints.is_empty() {
                let rows: Vec<AccountCheckpointRow> =
                    checkpoints.iter().map(AccountCheckpointRow::from).collect();
                diesel::insert_into(account_checkpoints::table)
                    .values(rows)
                    .on_conflict((
                        account_checkpoints::account_id,
                        account_checkpoints::block_level,
                        account_checkpoints::block_hash,
                    ))
                    .do_nothing()
                    .execute(conn)?;
            }
            diesel::insert_into(reset_events::table)
                .values(crate::db::models::ResetEventRow {
                    protocol: event.protocol.clone(),
                    activation_level: event.activation_level,
                    kind: "accounts_refresh".to_string(),
                    applied: true,
                })
                .on_conflict((reset_events::protocol, reset_events::activation_level))
                .do_update()
                .set(reset_events::applied.eq(true))
                .execute(conn)?;
            Ok(())
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorre_common::domain::ResetKind;

    fn event(level: i64) -> ResetEvent {
        ResetEvent {
            protocol: "PtAtLas".to_string(),
            activation_level: level,
            kind: ResetKind::AccountsRefresh,
        }
    }

    #[test]
    fn unprocessed_levels_excludes_events_above_l_db() {
        let configured = vec![event(100), event(200)];
        let pending = unprocessed_reset_request_levels(&configured, &[], Some(150));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].activation_level, 100);
    }

    #[test]
    fn unprocessed_levels_excludes_already_applied() {
        let configured = vec![event(100)];
        let applied = vec![event(100)];
        let pending = unprocessed_reset_request_levels(&configured, &applied, Some(150));
        assert!(pending.is_empty());
    }

    #[test]
    fn unprocessed_levels_empty_without_l_db() {
        let configured = vec![event(100)];
        assert!(unprocessed_reset_request_levels(&configured, &[], None).is_empty());
    }
}
