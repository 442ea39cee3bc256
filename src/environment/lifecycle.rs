use crate::environment::runtime::{Runtime, load_runtime};
use crate::error::{DenvError, Result};
use crate::paths::Paths;
use crate::session::active_session_count;
use std::path::{Path, PathBuf};

/// An environment directory found under the denv home.
#[derive(Debug, Clone)]
pub struct EnvironmentEntry {
	/// Directory name, `<project>-<env>`.
	pub name: String,
	pub dir: PathBuf,
	pub runtime: Runtime,
}

impl EnvironmentEntry {
	pub fn active_sessions(&self) -> usize {
		active_session_count(&self.runtime)
	}
}

/// Environments under the home directory, optionally limited to one project.
///
/// Only directories holding a readable runtime record count as environments.
pub fn list_environments(paths: &Paths, project: Option<&str>) -> Result<Vec<EnvironmentEntry>> {
	let entries = match std::fs::read_dir(paths.home()) {
		Ok(entries) => entries,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
		Err(source) => {
			return Err(DenvError::StateReadError {
				path: paths.home().to_path_buf(),
				source,
			});
		}
	};

	let mut found = Vec::new();
	for entry in entries.filter_map(|e| e.ok()) {
		let dir = entry.path();
		if !dir.is_dir() {
			continue;
		}
		let runtime = match load_runtime(&dir) {
			Ok(Some(runtime)) => runtime,
			Ok(None) => continue,
			Err(e) => {
				tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable environment");
				continue;
			}
		};
		if project.is_some_and(|p| p != runtime.project) {
			continue;
		}
		found.push(EnvironmentEntry {
			name: entry.file_name().to_string_lossy().to_string(),
			dir,
			runtime,
		});
	}

	found.sort_by(|a, b| a.name.cmp(&b.name));
	Ok(found)
}

/// Delete an environment directory, refusing while any session is alive.
pub fn remove_environment(env_dir: &Path) -> Result<()> {
	if !env_dir.is_dir() {
		return Err(DenvError::EnvironmentNotFound {
			name: env_dir
				.file_name()
				.map(|n| n.to_string_lossy().to_string())
				.unwrap_or_else(|| env_dir.display().to_string()),
		});
	}

	let active = load_runtime(env_dir)?
		.map(|runtime| active_session_count(&runtime))
		.unwrap_or(0);
	if active > 0 {
		tracing::warn!(dir = %env_dir.display(), active, "refusing to remove environment");
		return Err(DenvError::ActiveSessionsPresent { count: active });
	}

	std::fs::remove_dir_all(env_dir).map_err(|source| DenvError::RemoveError {
		path: env_dir.to_path_buf(),
		source,
	})?;
	tracing::info!(dir = %env_dir.display(), "environment removed");
	Ok(())
}

/// Remove every environment without a live session. Returns the names of
/// the removed environments.
pub fn remove_inactive(paths: &Paths) -> Result<Vec<String>> {
	let mut removed = Vec::new();
	for entry in list_environments(paths, None)? {
		match remove_environment(&entry.dir) {
			Ok(()) => removed.push(entry.name),
			Err(DenvError::ActiveSessionsPresent { .. }) => {}
			Err(e) => return Err(e),
		}
	}
	Ok(removed)
}
