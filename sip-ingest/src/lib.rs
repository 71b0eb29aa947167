pub mod cli;
mod http;
pub mod kafka;
pub mod load_config;
pub mod notify;
pub mod registry;
pub mod upload;

pub use cli::{run, Cli, Commands};
