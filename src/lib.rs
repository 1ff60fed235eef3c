pub mod config;
pub mod fs;
pub mod humanize;
pub mod observability;
pub mod poller;
pub mod retry;
pub mod sequence;
pub mod sharder;
pub mod store;
pub mod stream;
