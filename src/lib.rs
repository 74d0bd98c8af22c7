pub mod access;
pub mod config;
pub mod error;
pub mod listing;
pub mod paths;
pub mod preview;
pub mod server;
pub mod stream;
pub mod upload;
