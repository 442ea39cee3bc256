use crate::config::defaults::{default_config, default_patterns};
use crate::config::types::Config;
use crate::error::{DenvError, Result};
use std::path::Path;

/// Parse a config file from the given path.
pub fn parse_config_file(path: &Path) -> Result<Config> {
	let content = std::fs::read_to_string(path).map_err(|source| DenvError::ConfigReadError {
		path: path.to_path_buf(),
		source,
	})?;

	parse_config_str(&content, path)
}

/// Parse a config from a string (useful for testing).
///
/// An empty pattern list means "use the built-in patterns".
pub fn parse_config_str(content: &str, path: &Path) -> Result<Config> {
	let mut config: Config =
		toml::from_str(content).map_err(|source| DenvError::ConfigParseError {
			path: path.to_path_buf(),
			source,
		})?;

	if config.patterns.is_empty() {
		config.patterns = default_patterns();
	}

	Ok(config)
}

/// Load the config at `path`, or the built-in defaults if the file is absent.
pub fn load_config(path: &Path) -> Result<Config> {
	if !path.exists() {
		tracing::debug!(path = %path.display(), "no config file, using defaults");
		return Ok(default_config());
	}
	parse_config_file(path)
}

/// Write `config` as TOML, creating parent directories as needed.
pub fn write_config(path: &Path, config: &Config) -> Result<()> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(|source| DenvError::CreateDirError {
			path: parent.to_path_buf(),
			source,
		})?;
	}
	let content = toml::to_string_pretty(config)
		.map_err(|source| DenvError::ConfigSerializeError { source })?;
	std::fs::write(path, content).map_err(|source| DenvError::WriteError {
		path: path.to_path_buf(),
		source,
	})
}
