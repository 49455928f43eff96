pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod preview;
pub mod rate_limit;
pub mod state;
