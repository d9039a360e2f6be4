pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod models;
pub mod storage;
pub mod upstream;
