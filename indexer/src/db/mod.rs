pub mod indexed_data_ops;
pub mod models;
pub mod pool;
pub mod schema;

pub use indexed_data_ops::IndexedDataOps;
pub use pool::{build_pool, run_blocking, DbConn, DbError, DbPool};
