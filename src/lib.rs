// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app;
pub mod app_dirs;
pub mod client;
pub mod config;
pub mod engine;
pub mod history;
pub mod metrics;
pub mod orchestrator;
pub mod runtime;
pub mod session;
pub mod ui;
pub mod words;
