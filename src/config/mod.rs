#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{ChildrenCommand, CliConfig, Command, EventsCommand, OutputFormat};
pub use toml_config::TomlConfig;
