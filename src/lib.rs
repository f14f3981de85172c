pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod scoring;
pub mod telemetry;
