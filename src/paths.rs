//! On-disk layout of the denv home directory.
//!
//! ```text
//! <home>/config.toml
//! <home>/<project>/hooks/
//! <home>/<project>-<env>/ports.json
//! <home>/<project>-<env>/runtime.json
//! <home>/<project>-<env>/sessions/<id>.lock
//! ```

use crate::error::{DenvError, Result};
use std::path::{Path, PathBuf};

/// Name of the rule configuration file inside the home directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolved denv home directory.
///
/// Every component takes its directories from a `Paths` value instead of
/// consulting the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
	home: PathBuf,
}

impl Paths {
	pub fn new(home: impl Into<PathBuf>) -> Self {
		Paths { home: home.into() }
	}

	/// Resolve the home directory from an explicit override, falling back to
	/// `~/.denv`.
	pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
		match explicit {
			Some(home) if !home.as_os_str().is_empty() => Ok(Paths::new(home)),
			_ => {
				let user_home = dirs::home_dir().ok_or(DenvError::HomeDirectoryNotFound)?;
				Ok(Paths::new(user_home.join(".denv")))
			}
		}
	}

	pub fn home(&self) -> &Path {
		&self.home
	}

	pub fn config_file(&self) -> PathBuf {
		self.home.join(CONFIG_FILE)
	}

	/// Directory shared by every environment of a project.
	pub fn project_dir(&self, project: &str) -> PathBuf {
		self.home.join(project)
	}

	/// Private directory of one environment.
	pub fn environment_dir(&self, project: &str, env: &str) -> PathBuf {
		self.home.join(environment_dir_name(project, env))
	}
}

/// Directory name used for an environment: `<project>-<env>`.
pub fn environment_dir_name(project: &str, env: &str) -> String {
	format!("{}-{}", project, env)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layout() {
		let paths = Paths::new("/tmp/denv-home");
		assert_eq!(paths.config_file(), Path::new("/tmp/denv-home/config.toml"));
		assert_eq!(paths.project_dir("myapp"), Path::new("/tmp/denv-home/myapp"));
		assert_eq!(
			paths.environment_dir("myapp", "dev"),
			Path::new("/tmp/denv-home/myapp-dev")
		);
	}

	#[test]
	fn test_resolve_prefers_explicit_home() {
		let paths = Paths::resolve(Some(PathBuf::from("/custom/home"))).unwrap();
		assert_eq!(paths.home(), Path::new("/custom/home"));
	}

	#[test]
	fn test_resolve_empty_override_falls_back() {
		let paths = Paths::resolve(Some(PathBuf::new())).unwrap();
		assert!(paths.home().ends_with(".denv"));
	}
}
