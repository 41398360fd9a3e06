pub mod app;
pub mod config;
pub mod database;
pub mod device;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod services;
pub mod types;
