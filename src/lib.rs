pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod distributor;
pub mod error;
pub mod handlers;
pub mod kv;
pub mod middleware;
pub mod resolver;
pub mod services;
pub mod storage;
pub mod types;
pub mod vault;

#[cfg(test)]
pub mod testing;
