pub mod api;
pub mod config;
pub mod database;
pub mod media;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod server;
pub mod services;
pub mod storage;
pub mod tasks;
pub mod utils;
