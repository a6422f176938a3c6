pub mod api;
pub mod cluster;
pub mod config;
pub mod executor;
pub mod humanize;
pub mod observability;
pub mod storage;
