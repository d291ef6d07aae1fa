pub mod api;
pub mod config;
pub mod entities;
pub mod extractor;
pub mod fetcher;
pub mod pipeline;
pub mod query;
pub mod scheduler;
pub mod store;
