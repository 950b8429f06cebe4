// Configuration management module
// TOML settings, API key secrets and the interactive setup flow

pub mod interactive;
pub mod secrets;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use secrets::Secrets;
pub use settings::{
    Config, ConfigError, DocumentConfig, EmbeddingConfig, HttpConfig, KNOWN_CHAT_MODELS,
    LlmConfig, PromptConfig, SessionConfig, VectorStoreConfig,
};

/// Resolve the configuration directory: explicit override first, then the default location
#[inline]
pub fn resolve_config_dir(
    override_dir: Option<&std::path::Path>,
) -> Result<std::path::PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Config::default_config_dir(),
    }
}
