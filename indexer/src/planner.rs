//! `BlockFetchPlanner` (§4.2): decides which blocks to fetch this cycle given
//! the configured `FetchMode`, the latest persisted level, and the node head.

use lorre_common::config::FetchMode;
use lorre_node_client::chunk_range;

/// An inclusive level range to fetch, plus the page count used for progress
/// reporting. Empty when there is nothing new to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub range: Option<(i64, i64)>,
    pub total_pages: usize,
}

impl FetchPlan {
    fn empty() -> Self {
        FetchPlan {
            range: None,
            total_pages: 0,
        }
    }

    fn from_range(from: i64, to: i64, page_size: u32) -> Self {
        if from > to {
            return Self::empty();
        }
        let pages = chunk_range(from, to, page_size).len();
        FetchPlan {
            range: Some((from, to)),
            total_pages: pages,
        }
    }
}

pub struct BlockFetchPlanner {
    page_size: u32,
    bootstrap_window: u64,
}

impl BlockFetchPlanner {
    pub fn new(page_size: u32, bootstrap_window: u64) -> Self {
        Self {
            page_size,
            bootstrap_window,
        }
    }

    /// `l_db`: highest persisted level, if any. `l_head`: the node's current
    /// head level. `head_hash`: the node's current head hash, used only to
    /// detect `Custom(n)` anchor divergence (§4.2, §11).
    pub fn plan(
        &self,
        mode: &FetchMode,
        l_db: Option<i64>,
        l_head: i64,
        head_hash: &str,
    ) -> FetchPlan {
        match mode {
            FetchMode::Newest => {
                let from = match l_db {
                    Some(l) => l + 1,
                    None => (l_head as i128 - self.bootstrap_window as i128).max(0) as i64,
                };
                FetchPlan::from_range(from, l_head, self.page_size)
            }
            FetchMode::Everything => FetchPlan::from_range(0, l_head, self.page_size),
            FetchMode::Custom { n, head_hash: anchor } => {
                if let Some(anchor_hash) = anchor {
                    if anchor_hash != head_hash {
                        tracing::warn!(
                            target: "lorre::planner",
                            configured = %anchor_hash,
                            actual = %head_hash,
                            "head_hash anchor diverged from node head; falling back to current head (§11)"
                        );
                    }
                }
                let from = (l_head as i128 - *n as i128 + 1).max(0) as i64;
                FetchPlan::from_range(from, l_head, self.page_size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_mode_covers_l_db_exclusive_to_l_head() {
        let planner = BlockFetchPlanner::new(1, 0);
        let plan = planner.plan(&FetchMode::Newest, Some(100), 103, "head-hash");
        assert_eq!(plan.range, Some((101, 103)));
        assert_eq!(plan.total_pages, 3);
    }

    #[test]
    fn newest_mode_bootstraps_from_window_when_l_db_unknown() {
        let planner = BlockFetchPlanner::new(10, 50);
        let plan = planner.plan(&FetchMode::Newest, None, 200, "head-hash");
        assert_eq!(plan.range, Some((150, 200)));
    }

    #[test]
    fn newest_mode_bootstraps_from_zero_when_window_exceeds_head() {
        let planner = BlockFetchPlanner::new(10, 1000);
        let plan = planner.plan(&FetchMode::Newest, None, 5, "head-hash");
        assert_eq!(plan.range, Some((0, 5)));
    }

    #[test]
    fn newest_mode_empty_when_caught_up() {
        let planner = BlockFetchPlanner::new(10, 0);
        let plan = planner.plan(&FetchMode::Newest, Some(103), 103, "head-hash");
        assert_eq!(plan.range, None);
        assert_eq!(plan.total_pages, 0);
    }

    #[test]
    fn everything_mode_covers_zero_to_head() {
        let planner = BlockFetchPlanner::new(100, 0);
        let plan = planner.plan(&FetchMode::Everything, Some(999999), 250, "head-hash");
        assert_eq!(plan.range, Some((0, 250)));
    }

    #[test]
    fn custom_mode_covers_last_n_blocks() {
        let planner = BlockFetchPlanner::new(10, 0);
        let plan = planner.plan(
            &FetchMode::Custom { n: 5, head_hash: None },
            None,
            100,
            "head-hash",
        );
        assert_eq!(plan.range, Some((96, 100)));
    }

    #[test]
    fn custom_mode_falls_back_to_current_head_on_anchor_divergence() {
        let planner = BlockFetchPlanner::new(10, 0);
        let plan = planner.plan(
            &FetchMode::Custom {
                n: 3,
                head_hash: Some("stale-hash".to_string()),
            },
            None,
            50,
            "current-hash",
        );
        assert_eq!(plan.range, Some((48, 50)));
    }
}
