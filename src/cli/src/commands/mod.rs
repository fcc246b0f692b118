pub mod asset;
pub mod bench;
pub mod config;
pub mod health;
