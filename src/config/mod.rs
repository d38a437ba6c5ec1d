// src/config/mod.rs
pub mod app;
pub mod sources;

pub use app::AppConfig;
