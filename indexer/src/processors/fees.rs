//! `FeeAggregator` (§4.7): every `feeUpdateInterval` main-loop iterations,
//! computes mean/high/low fee statistics over the most recent
//! `numberOfFeesAveraged` operations per kind and persists the aggregate.

use crate::db::models::FeeAggregateRow;
use crate::db::schema::{blocks, transactions};
use crate::db::{run_blocking, DbError, DbPool};
use chrono::Utc;
use diesel::prelude::*;
use lorre_common::domain::FeeOperationKind;

pub struct FeeAggregator {
    pool: DbPool,
    number_of_fees_averaged: u32,
}

impl FeeAggregator {
    pub fn new(pool: DbPool, number_of_fees_averaged: u32) -> Self {
        Self {
            pool,
            number_of_fees_averaged,
        }
    }

    /// Runs the aggregation if `iteration` lands on a `feeUpdateInterval`
    /// boundary; otherwise a no-op. Iteration 0 never triggers a run.
    pub async fn maybe_aggregate(
        &self,
        iteration: u64,
        fee_update_interval: u64,
    ) -> Result<Option<usize>, DbError> {
        if fee_update_interval == 0 || iteration == 0 || !iteration.is_multiple_of(fee_update_interval) {
            return Ok(None);
        }
        let mut persisted = 0;
        for kind in [
            FeeOperationKind::Transaction,
            FeeOperationKind::Origination,
            FeeOperationKind::Delegation,
        ] {
            if self.aggregate_one(kind).await? {
                persisted += 1;
            }
        }
        Ok(Some(persisted))
    }

    async fn aggregate_one(&self, kind: FeeOperationKind) -> Result<bool, DbError> {
        let limit = self.number_of_fees_averaged.max(1) as i64;
        let kind_str = kind_str(kind);
        let fees: Vec<i64> = run_blocking(self.pool.clone(), move |conn| {
            transactions::table
                .inner_join(blocks::table.on(transactions::block_hash.eq(blocks::hash)))
                .select(transactions::fee)
                .filter(transactions::kind.eq(kind_str))
                .order((blocks::level.desc(), transactions::op_index.desc()))
                .limit(limit)
                .load(conn)
        })
        .await?;

        let Some(stats) = fee_stats(&fees) else {
            return Ok(false);
        };
        let row = FeeAggregateRow {
            kind: kind_str.to_string(),
            mean: stats.mean,
            high: stats.high,
            low: stats.low,
            computed_at: Utc::now(),
        };
        run_blocking(self.pool.clone(), move |conn| {
            diesel::insert_into(crate::db::schema::fee_aggregates::table)
                .values(row)
                .execute(conn)
        })
        .await?;
        Ok(true)
    }
}

fn kind_str(kind: FeeOperationKind) -> &'static str {
    match kind {
        FeeOperationKind::Transaction => "transaction",
        FeeOperationKind::Origination => "origination",
        FeeOperationKind::Delegation => "delegation",
    }
}

struct FeeStats {
    mean: i64,
    high: i64,
    low: i64,
}

fn fee_stats(fees: &[i64]) -> Option<FeeStats> {
    if fees.is_empty() {
        return None;
    }
    let sum: i64 = fees.iter().sum();
    let mean = sum / fees.len() as i64;
    let high = *fees.iter().max().unwrap();
    let low = *fees.iter().min().unwrap();
    Some(FeeStats { mean, high, low })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_stats_computes_mean_high_low() {
        let stats = fee_stats(&[10, 20, 30]).unwrap();
        assert_eq!(stats.mean, 20);
        assert_eq!(stats.high, 30);
        assert_eq!(stats.low, 10);
    }

    #[test]
    fn fee_stats_none_for_empty_input() {
        assert!(fee_stats(&[]).is_none());
    }

    #[test]
    fn kind_str_is_stable() {
        assert_eq!(kind_str(FeeOperationKind::Transaction), "transaction");
        assert_eq!(kind_str(FeeOperationKind::Origination), "origination");
        assert_eq!(kind_str(FeeOperationKind::Delegation), "delegation");
    }
}
