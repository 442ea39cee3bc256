use crate::config::Action;
use crate::environment::runtime::{Override, load_runtime};
use crate::error::{DenvError, Result};
use crate::rules::{extract_url_ports, parse_port};
use crate::session::{SessionRegistry, process_exists};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One port mapping and the variables that reference the original port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
	pub original: u16,
	pub mapped: u16,
	pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
	pub id: String,
	pub pid: u32,
	pub active: bool,
	/// A lock file for the session exists under `sessions/`.
	pub locked: bool,
}

/// Snapshot of an environment for display.
#[derive(Debug, Clone)]
pub struct EnvironmentStatus {
	pub project: String,
	pub environment: String,
	pub env_dir: PathBuf,
	pub ports: Vec<PortMapping>,
	/// Overrides grouped by the action that produced them, sorted by name.
	pub port_variables: Vec<(String, Override)>,
	pub url_rewrites: Vec<(String, Override)>,
	pub isolated_paths: Vec<(String, Override)>,
	pub sessions: Vec<SessionStatus>,
	/// Lock files with no session in the runtime record.
	pub stray_locks: Vec<String>,
}

impl EnvironmentStatus {
	pub fn active_sessions(&self) -> usize {
		self.sessions.iter().filter(|s| s.active).count()
	}
}

/// Load the status of the environment stored in `env_dir`.
pub fn environment_status(env_dir: &Path) -> Result<EnvironmentStatus> {
	let runtime = load_runtime(env_dir)?.ok_or_else(|| DenvError::EnvironmentNotFound {
		name: env_dir
			.file_name()
			.map(|n| n.to_string_lossy().to_string())
			.unwrap_or_else(|| env_dir.display().to_string()),
	})?;

	let ports = runtime
		.ports
		.iter()
		.map(|(&original, &mapped)| PortMapping {
			original,
			mapped,
			variables: runtime
				.overrides
				.iter()
				.filter(|(_, over)| references_port(over, original))
				.map(|(name, _)| name.clone())
				.collect(),
		})
		.collect();

	let mut port_variables = Vec::new();
	let mut url_rewrites = Vec::new();
	let mut isolated_paths = Vec::new();
	for (name, over) in &runtime.overrides {
		let entry = (name.clone(), over.clone());
		match over.rule {
			Action::RandomPort => port_variables.push(entry),
			Action::RewritePorts => url_rewrites.push(entry),
			Action::Isolate => isolated_paths.push(entry),
			Action::Keep => {}
		}
	}

	let locks: BTreeSet<String> = SessionRegistry::new(env_dir)
		.list_sessions()
		.into_iter()
		.collect();
	let sessions = runtime
		.sessions
		.values()
		.map(|session| SessionStatus {
			id: session.id.clone(),
			pid: session.pid,
			active: process_exists(session.pid),
			locked: locks.contains(&session.id),
		})
		.collect();
	let stray_locks = locks
		.into_iter()
		.filter(|id| !runtime.sessions.contains_key(id))
		.collect();

	Ok(EnvironmentStatus {
		project: runtime.project,
		environment: runtime.environment,
		env_dir: env_dir.to_path_buf(),
		ports,
		port_variables,
		url_rewrites,
		isolated_paths,
		sessions,
		stray_locks,
	})
}

fn references_port(over: &Override, port: u16) -> bool {
	match over.rule {
		Action::RandomPort => parse_port(&over.original) == Some(port),
		Action::RewritePorts => extract_url_ports(&over.original).contains(&port),
		Action::Keep | Action::Isolate => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::environment::{Runtime, Session, save_runtime};
	use chrono::Utc;

	fn over(original: &str, current: &str, rule: Action) -> Override {
		Override {
			original: original.to_string(),
			current: current.to_string(),
			rule,
		}
	}

	#[test]
	fn test_status_groups_overrides_and_names_port_users() {
		let temp_dir = tempfile::tempdir().unwrap();
		let mut runtime = Runtime::new("app", "dev");
		runtime.ports.insert(3000, 33000);
		runtime.ports.insert(5432, 35432);
		runtime.overrides.insert(
			"APP_PORT".to_string(),
			over("3000", "33000", Action::RandomPort),
		);
		runtime.overrides.insert(
			"API_URL".to_string(),
			over("http://localhost:3000/v1", "http://localhost:33000/v1", Action::RewritePorts),
		);
		runtime.overrides.insert(
			"DATABASE_URL".to_string(),
			over("postgres://localhost:5432/db", "postgres://localhost:35432/db", Action::RewritePorts),
		);
		runtime.overrides.insert(
			"CACHE_DIR".to_string(),
			over("/var/cache", "/env/cache", Action::Isolate),
		);
		save_runtime(temp_dir.path(), &runtime).unwrap();

		let status = environment_status(temp_dir.path()).unwrap();

		assert_eq!(status.project, "app");
		assert_eq!(
			status.ports,
			vec![
				PortMapping {
					original: 3000,
					mapped: 33000,
					variables: vec!["API_URL".to_string(), "APP_PORT".to_string()],
				},
				PortMapping {
					original: 5432,
					mapped: 35432,
					variables: vec!["DATABASE_URL".to_string()],
				},
			]
		);
		assert_eq!(status.port_variables.len(), 1);
		assert_eq!(status.url_rewrites.len(), 2);
		assert_eq!(status.isolated_paths[0].0, "CACHE_DIR");
	}

	#[cfg(unix)]
	#[test]
	fn test_status_reports_sessions_and_stray_locks() {
		let temp_dir = tempfile::tempdir().unwrap();
		let registry = SessionRegistry::new(temp_dir.path());
		let mut runtime = Runtime::new("app", "dev");

		let handle = registry.create_session(None, std::process::id()).unwrap();
		registry.register(&mut runtime, handle.record());
		runtime.sessions.insert(
			"gone".to_string(),
			Session {
				id: "gone".to_string(),
				pid: 999_999_999,
				started: Utc::now(),
				tty: None,
			},
		);
		save_runtime(temp_dir.path(), &runtime).unwrap();
		std::fs::write(registry.lock_path("leftover"), "").unwrap();

		let status = environment_status(temp_dir.path()).unwrap();

		assert_eq!(status.sessions.len(), 2);
		assert_eq!(status.active_sessions(), 1);
		let live = status.sessions.iter().find(|s| s.id == handle.id).unwrap();
		assert!(live.active && live.locked);
		let gone = status.sessions.iter().find(|s| s.id == "gone").unwrap();
		assert!(!gone.active && !gone.locked);
		assert_eq!(status.stray_locks, vec!["leftover".to_string()]);
	}

	#[test]
	fn test_status_of_missing_environment() {
		let temp_dir = tempfile::tempdir().unwrap();
		let result = environment_status(&temp_dir.path().join("app-none"));
		assert!(matches!(result, Err(DenvError::EnvironmentNotFound { .. })));
	}
}
