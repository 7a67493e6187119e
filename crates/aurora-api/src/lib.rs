//! HTTP gateway for Aurora job commands.

pub mod config;
pub mod server;
