pub mod analytics;
pub mod binance;
pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod model;
pub mod tick_store;
