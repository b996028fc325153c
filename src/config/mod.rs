// Configuration management module
// TOML settings under the base directory, overlaid with Azure environment variables

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AzureConfig, Config, ConfigError, OllamaConfig, ProviderKind, RequestConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}
