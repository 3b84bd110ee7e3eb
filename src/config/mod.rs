pub mod env;
mod loader;

pub use env::{AppConfig, ConfigError, DirectoryConfig, FeedConfig, LoggingConfig, SchedulerConfig};
pub use loader::load_config;
