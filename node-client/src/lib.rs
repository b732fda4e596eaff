pub mod error;
pub mod ethereum;
mod retry;
pub mod tezos;

pub use error::ClientError;

use async_trait::async_trait;
use futures::stream::BoxStream;
use lorre_common::domain::{AccountSnapshot, BakerSnapshot, Block, BlockOperations, RightsRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Hash(String),
    Level(i64),
}

/// A page of blocks in ascending level order, as delivered by a streaming
/// endpoint. `BlockFetchPlanner` decides the level ranges; `NodeClient` only
/// promises no gap *within* one page.
pub type Page = Vec<Block>;

/// Batched JSON-RPC access to a Tezos- or Ethereum-family node. See §4.1.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn get_block(&self, id: BlockId) -> Result<Block, ClientError>;

    async fn get_block_head(&self) -> Result<Block, ClientError>;

    /// The transactions, receipts, and logs for `block_hash`, fetched as a
    /// single call so `BlocksProcessor` can commit them together.
    async fn get_block_operations(&self, block_hash: &str) -> Result<BlockOperations, ClientError>;

    /// Lazily fetches `[from, to]` in pages of at most `page_size`, run with
    /// up to `concurrency` requests in flight, yielded in ascending order.
    fn get_blocks_range<'a>(
        &'a self,
        from: i64,
        to: i64,
        page_size: u32,
        concurrency: usize,
    ) -> BoxStream<'a, Result<Page, ClientError>>;

    async fn get_accounts_at(
        &self,
        level: i64,
        ids: &[String],
    ) -> Result<Vec<AccountSnapshot>, ClientError>;

    async fn get_bakers_at(
        &self,
        level: i64,
        ids: &[String],
    ) -> Result<Vec<BakerSnapshot>, ClientError>;

    async fn get_baking_rights(&self, cycle: i32) -> Result<Vec<RightsRow>, ClientError>;

    async fn get_endorsing_rights(&self, cycle: i32) -> Result<Vec<RightsRow>, ClientError>;
}

/// Splits an inclusive `[from, to]` range into ascending, non-overlapping,
/// at-most-`page_size`-wide chunks. Shared by the Tezos and Ethereum clients,
/// and by `BlockFetchPlanner` for progress-reporting totals.
pub fn chunk_range(from: i64, to: i64, page_size: u32) -> Vec<(i64, i64)> {
    if from > to {
        return Vec::new();
    }
    let page_size = page_size.max(1) as i64;
    let mut chunks = Vec::new();
    let mut start = from;
    while start <= to {
        let end = (start + page_size - 1).min(to);
        chunks.push((start, end));
        start = end + 1;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_range_splits_into_ascending_non_overlapping_pages() {
        let chunks = chunk_range(101, 110, 4);
        assert_eq!(chunks, vec![(101, 104), (105, 108), (109, 110)]);
    }

    #[test]
    fn chunk_range_single_page_when_smaller_than_page_size() {
        assert_eq!(chunk_range(5, 5, 10), vec![(5, 5)]);
    }

    #[test]
    fn chunk_range_empty_when_from_after_to() {
        assert!(chunk_range(10, 5, 4).is_empty());
    }
}
