#[path = "config/mod.rs"]
pub mod config_mod;
pub use config_mod as config;
pub mod artifact_store;
pub mod csv;
pub mod db;
pub mod spreadsheet;
