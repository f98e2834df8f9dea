// Configuration management module
// TOML settings stored in the application home directory

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DocumentsConfig, EmbeddingConfig, EmbeddingProvider, IndexConfig,
    OllamaConfig,
};

/// Resolve the home directory, preferring an explicit override
#[inline]
pub fn resolve_home(home: Option<&std::path::Path>) -> Result<std::path::PathBuf, ConfigError> {
    match home {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_home(),
    }
}
