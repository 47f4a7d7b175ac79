pub mod app;
pub mod awards;
pub mod config;
pub mod error;
pub mod export;
pub mod http_client;
pub mod ingest;
pub mod medal;
pub mod nadeo;
pub mod players;
pub mod remote;
pub mod standings;
pub mod store;
