pub mod config;
pub mod error;
pub mod http;
pub mod metadata_service;
pub mod overrides;
pub mod query;
pub mod schema;
