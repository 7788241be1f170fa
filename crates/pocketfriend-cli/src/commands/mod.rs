pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod deals;
pub mod favorites;
pub mod notifications;
