pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod export;
pub mod import;
pub mod logging;
pub mod models;
pub mod query;
pub mod session;
pub mod table;

pub use db::Database;
