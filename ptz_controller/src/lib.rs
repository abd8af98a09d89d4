pub mod command_executor;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
