//! Library half of the `mindscope` binary: configuration loading, component
//! wiring and command dispatch.

pub mod app;
pub mod commands;
pub mod config;

pub use commands::{Cli, Command, render_traces, run};
pub use config::MindscopeConfig;
