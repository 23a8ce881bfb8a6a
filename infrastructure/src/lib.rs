pub mod api_client;
pub mod config;
pub mod export;
pub mod kv_store;
