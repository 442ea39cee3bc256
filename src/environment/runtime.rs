use crate::config::Action;
use crate::error::{DenvError, Result};
use crate::ports::PortTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the runtime record inside an environment directory.
pub const RUNTIME_FILE: &str = "runtime.json";

/// A variable whose value a rule changed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Override {
	pub original: String,
	pub current: String,
	pub rule: Action,
}

/// A shell process attached to an environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
	pub id: String,
	pub pid: u32,
	pub started: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tty: Option<String>,
}

/// Persisted state of one environment (`runtime.json`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Runtime {
	pub created: DateTime<Utc>,
	pub project: String,
	pub environment: String,
	#[serde(default)]
	pub ports: PortTable,
	#[serde(default)]
	pub overrides: BTreeMap<String, Override>,
	#[serde(default)]
	pub sessions: BTreeMap<String, Session>,
}

impl Runtime {
	pub fn new(project: &str, environment: &str) -> Self {
		Runtime {
			created: Utc::now(),
			project: project.to_string(),
			environment: environment.to_string(),
			ports: PortTable::new(),
			overrides: BTreeMap::new(),
			sessions: BTreeMap::new(),
		}
	}
}

pub fn runtime_path(env_dir: &Path) -> PathBuf {
	env_dir.join(RUNTIME_FILE)
}

/// Load the runtime record of an environment; `None` if it has none yet.
pub fn load_runtime(env_dir: &Path) -> Result<Option<Runtime>> {
	let path = runtime_path(env_dir);
	let content = match std::fs::read_to_string(&path) {
		Ok(content) => content,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(source) => return Err(DenvError::StateReadError { path, source }),
	};
	let runtime = serde_json::from_str(&content)
		.map_err(|source| DenvError::StateParseError { path, source })?;
	Ok(Some(runtime))
}

/// Overwrite the runtime record of an environment.
pub fn save_runtime(env_dir: &Path, runtime: &Runtime) -> Result<()> {
	let path = runtime_path(env_dir);
	let data = serde_json::to_string_pretty(runtime).map_err(|source| {
		DenvError::StateSerializeError {
			path: path.clone(),
			source,
		}
	})?;
	std::fs::write(&path, data).map_err(|source| DenvError::WriteError { path, source })
}
