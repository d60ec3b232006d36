pub mod backup;
pub mod config;
pub mod database;
pub mod error;
pub mod log;
pub mod upload;
