//! `IndexerLoop` (§4.8): connectivity check, the tail/catch-up cycle, and the
//! failure policy that decides whether a processing error is recoverable.

use crate::db::IndexedDataOps;
use crate::error::ProcessingError;
use crate::processors::{
    reset::unprocessed_reset_request_levels, AccountsProcessor, AccountsResetHandler,
    BakersProcessor, BlocksProcessor, FeeAggregator, RightsProcessor,
};
use crate::planner::BlockFetchPlanner;
use futures::StreamExt;
use lorre_common::config::{FetchMode, IndexerConfig};
use lorre_common::domain::ResetEvent;
use lorre_node_client::NodeClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct IndexerLoop {
    node: Arc<dyn NodeClient>,
    config: IndexerConfig,
    planner: BlockFetchPlanner,
    data_ops: IndexedDataOps,
    blocks_processor: BlocksProcessor,
    accounts_processor: AccountsProcessor,
    bakers_processor: BakersProcessor,
    rights_processor: Arc<RightsProcessor>,
    reset_handler: AccountsResetHandler,
    fee_aggregator: FeeAggregator,
}

impl IndexerLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: Arc<dyn NodeClient>,
        config: IndexerConfig,
        data_ops: IndexedDataOps,
        blocks_processor: BlocksProcessor,
        accounts_processor: AccountsProcessor,
        bakers_processor: BakersProcessor,
        rights_processor: RightsProcessor,
        reset_handler: AccountsResetHandler,
        fee_aggregator: FeeAggregator,
    ) -> Self {
        let planner = BlockFetchPlanner::new(config.batch.page_size, config.bootstrap_window);
        Self {
            node,
            config,
            planner,
            data_ops,
            blocks_processor,
            accounts_processor,
            bakers_processor,
            rights_processor: Arc::new(rights_processor),
            reset_handler,
            fee_aggregator,
        }
    }

    /// Runs until cancellation (Ctrl-C/SIGTERM) or, for non-`Newest` fetch
    /// modes, until the one-shot pass completes.
    pub async fn run(&self, configured_resets: &[ResetEvent]) -> Result<(), ProcessingError> {
        self.check_connection().await;

        let shutdown = Arc::new(AtomicBool::new(false));
        let rights_task = self.spawn_rights_fetch_task(shutdown.clone());

        // No cross-process carry-over store exists for unhandled reset events;
        // a fresh process starts with none and re-derives `due` from storage.
        let mut carried_over: Vec<ResetEvent> = Vec::new();
        let mut iteration: u64 = 0;
        let result = loop {
            iteration += 1;
            match self.run_cycle(configured_resets, &carried_over, iteration).await {
                Ok(next_carried) => carried_over = next_carried,
                Err(e) => {
                    if self.config.ignore_process_failures {
                        tracing::error!(
                            target: "lorre::indexer_loop",
                            error = %e,
                            "cycle failed; ignoreProcessFailures is set, continuing"
                        );
                    } else {
                        break Err(e);
                    }
                }
            }

            if !matches!(self.config.fetch_mode, FetchMode::Newest) {
                break Ok(());
            }
            if shutdown.load(Ordering::SeqCst) {
                break Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.sleep_interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(target: "lorre::indexer_loop", "shutdown signal received");
                    break Ok(());
                }
            }
        };

        self.termination_sequence(shutdown, rights_task).await;
        result
    }

    async fn check_connection(&self) {
        loop {
            let probe = tokio::time::timeout(
                self.config.bootup_connection_check_timeout,
                self.node.get_block_head(),
            )
            .await;
            match probe {
                Ok(Ok(_)) => return,
                Ok(Err(e)) => tracing::warn!(
                    target: "lorre::indexer_loop",
                    error = %e,
                    "node connection check failed"
                ),
                Err(_) => tracing::warn!(
                    target: "lorre::indexer_loop",
                    "node connection check timed out"
                ),
            }
            tokio::time::sleep(self.config.bootup_retry_interval).await;
        }
    }

    async fn run_cycle(
        &self,
        configured_resets: &[ResetEvent],
        carried_over: &[ResetEvent],
        iteration: u64,
    ) -> Result<Vec<ResetEvent>, ProcessingError> {
        let l_db = self.data_ops.latest_level().await?;
        let applied = self.reset_handler.load_applied().await?;
        let due: Vec<ResetEvent> = unprocessed_reset_request_levels(configured_resets, &applied, l_db)
            .into_iter()
            .cloned()
            .collect();
        let mut to_apply = carried_over.to_vec();
        for event in due {
            if !to_apply
                .iter()
                .any(|e| e.activation_level == event.activation_level)
            {
                to_apply.push(event);
            }
        }
        let unhandled = self
            .reset_handler
            .apply_unhandled_accounts_resets(&to_apply)
            .await?;

        let head = self.node.get_block_head().await?;
        let plan = self
            .planner
            .plan(&self.config.fetch_mode, l_db, head.level, &head.hash);

        if let Some((from, to)) = plan.range {
            let mut pages = self.node.get_blocks_range(
                from,
                to,
                self.config.batch.page_size,
                self.config.batch.node_requests_concurrency,
            );
            // Pipeline parallelism 1 (§5): pages are awaited strictly in
            // order, one at a time, preserving cross-page level ordering.
            while let Some(page) = pages.next().await {
                let page = page?;
                self.blocks_processor
                    .process_blocks_page(&page, self.node.as_ref())
                    .await?;
                self.rights_processor
                    .process_baking_and_endorsing_rights(&page, self.node.as_ref())
                    .await
                    .map_err(ProcessingError::from)?;
                self.accounts_processor
                    .process_checkpoints(self.node.as_ref())
                    .await?;
                self.bakers_processor
                    .process_checkpoints(self.node.as_ref())
                    .await?;
            }
        }

        self.fee_aggregator
            .maybe_aggregate(iteration, self.config.fee_update_interval)
            .await
            .map_err(ProcessingError::from)?;

        self.rights_processor
            .update_rights_timestamps()
            .await
            .map_err(ProcessingError::from)?;

        Ok(unhandled)
    }

    fn spawn_rights_fetch_task(
        &self,
        shutdown: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()> {
        let rights_processor = self.rights_processor.clone();
        let node = self.node.clone();
        let data_ops = self.data_ops.clone();
        let init_delay = self.config.block_rights_fetching.init_delay;
        let interval = self.config.block_rights_fetching.interval;
        tokio::spawn(async move {
            tokio::time::sleep(init_delay).await;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                let current_cycle = match Self::current_cycle(&data_ops, node.as_ref()).await {
                    Ok(cycle) => cycle,
                    Err(e) => {
                        tracing::warn!(
                            target: "lorre::rights_processor",
                            error = %e,
                            "could not determine current cycle for writeFutureRights tick"
                        );
                        continue;
                    }
                };
                if let Err(e) = rights_processor
                    .write_future_rights(node.as_ref(), current_cycle)
                    .await
                {
                    tracing::warn!(
                        target: "lorre::rights_processor",
                        error = %e,
                        "writeFutureRights tick failed"
                    );
                }
            }
        })
    }

    /// The cycle `writeFutureRights` should start looking ahead from: derived
    /// from the latest persisted level, falling back to the node's head level
    /// when nothing has been indexed yet.
    async fn current_cycle(
        data_ops: &IndexedDataOps,
        node: &dyn NodeClient,
    ) -> Result<i32, ProcessingError> {
        let level = match data_ops.latest_level().await? {
            Some(l) => l,
            None => node.get_block_head().await?.level,
        };
        Ok(crate::processors::blocks::cycle_for_level(level))
    }

    /// §5: finishes the in-flight page (the caller of `run` already awaited
    /// that), then tears down the shared resources and awaits the
    /// background rights-fetch task.
    async fn termination_sequence(
        &self,
        shutdown: Arc<AtomicBool>,
        rights_task: tokio::task::JoinHandle<()>,
    ) {
        shutdown.store(true, Ordering::SeqCst);
        rights_task.abort();
        let _ = rights_task.await;
        tracing::info!(target: "lorre::indexer_loop", "termination sequence complete");
    }
}
