pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod types;

#[cfg(test)]
pub mod testing;
