pub mod calendar_store_client;
pub mod config;
pub mod error;
pub mod event_mapper;
