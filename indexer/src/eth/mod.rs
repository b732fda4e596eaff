pub mod blocks_processor;
pub mod indexer_loop;

pub use blocks_processor::EthBlocksProcessor;
pub use indexer_loop::EthIndexerLoop;
