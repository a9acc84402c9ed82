pub mod config;
pub mod database;
pub mod error;
pub mod router;
pub mod schema;
pub mod service;
pub mod utils;
