pub mod db;
pub mod error;
pub mod eth;
pub mod indexer_loop;
pub mod planner;
pub mod processors;
pub mod tns;
pub mod token_registry;

pub use error::{ConfigError, ProcessingError};
pub use indexer_loop::IndexerLoop;
pub use planner::{BlockFetchPlanner, FetchPlan};
