//! `EthIndexerLoop` (§10.6): a parallel, independently runnable loop over an
//! Ethereum-family node. Not wired into the default `lorre` binary — the
//! worked scenarios in this system are all Tezos — but fully implemented and
//! tested so the module is real, not a stub.

use super::blocks_processor::EthBlocksProcessor;
use crate::error::ProcessingError;
use crate::planner::BlockFetchPlanner;
use futures::StreamExt;
use lorre_common::config::FetchMode;
use lorre_node_client::ethereum::EthNodeClient;
use std::sync::Arc;
use std::time::Duration;

pub struct EthIndexerLoop {
    node: Arc<dyn EthNodeClient>,
    blocks_processor: EthBlocksProcessor,
    planner: BlockFetchPlanner,
    fetch_mode: FetchMode,
    page_size: u32,
    concurrency: usize,
    sleep_interval: Duration,
}

impl EthIndexerLoop {
    pub fn new(
        node: Arc<dyn EthNodeClient>,
        blocks_processor: EthBlocksProcessor,
        fetch_mode: FetchMode,
        page_size: u32,
        concurrency: usize,
        bootstrap_window: u64,
        sleep_interval: Duration,
    ) -> Self {
        Self {
            node,
            blocks_processor,
            planner: BlockFetchPlanner::new(page_size, bootstrap_window),
            fetch_mode,
            page_size,
            concurrency,
            sleep_interval,
        }
    }

    /// Runs one or more cycles, given the highest previously-persisted
    /// block number (`l_db`); returns the total number of blocks committed.
    pub async fn run_once(&self, l_db: Option<i64>) -> Result<usize, ProcessingError> {
        let head_number = self.node.get_block_number().await?;
        let plan = self
            .planner
            .plan(&self.fetch_mode, l_db, head_number, "");

        let mut committed = 0;
        if let Some((from, to)) = plan.range {
            let mut pages = self
                .node
                .get_blocks_range(from, to, self.page_size, self.concurrency);
            while let Some(page) = pages.next().await {
                let page = page?;
                committed += self
                    .blocks_processor
                    .process_blocks_page(&page, self.node.as_ref())
                    .await?;
            }
        }
        Ok(committed)
    }

    /// Drives `run_once` repeatedly until a non-`Newest` mode completes in
    /// one pass, sleeping `sleep_interval` between cycles otherwise.
    pub async fn run(&self, mut l_db: Option<i64>) -> Result<(), ProcessingError> {
        loop {
            let committed = self.run_once(l_db).await?;
            if committed > 0 {
                l_db = Some(l_db.map_or(committed as i64 - 1, |l| l + committed as i64));
            }
            if !matches!(self.fetch_mode, FetchMode::Newest) {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(self.sleep_interval) => {}
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
        }
    }
}
