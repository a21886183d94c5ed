mod config;
mod context;
mod error;

pub use config::*;
pub use context::ImportSummary;
pub use error::ConfigError;
