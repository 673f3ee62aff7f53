pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod lock;
pub mod logging;
pub mod mail;
pub mod orchestrator;
pub mod pipeline;
pub mod rotate;
pub mod signal_handler;
pub mod types;
pub mod util;
