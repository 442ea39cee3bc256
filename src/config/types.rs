use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Top-level configuration from `<home>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
	/// Project directory path -> project name override.
	#[serde(default)]
	pub projects: BTreeMap<String, String>,

	/// Rules for transforming environment variables.
	/// First matching pattern wins.
	#[serde(default)]
	pub patterns: Vec<PatternRule>,
}

/// What to do with a variable whose name matched a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	/// Leave the value untouched.
	Keep,
	/// Replace a bare port number with its mapped port.
	RandomPort,
	/// Replace `:<port>` occurrences inside a local endpoint URL.
	RewritePorts,
	/// Redirect a path's leaf name under the environment directory.
	Isolate,
}

impl Action {
	pub fn as_str(&self) -> &'static str {
		match self {
			Action::Keep => "keep",
			Action::RandomPort => "random_port",
			Action::RewritePorts => "rewrite_ports",
			Action::Isolate => "isolate",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A pattern and the action applied to variables it matches.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternRule {
	/// One or more glob patterns separated by `|`, e.g. `"*_PORT | PORT"`.
	pub pattern: String,

	pub action: Action,

	/// Allocation range `[min, max]` for `random_port`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub range: Option<[u16; 2]>,

	/// Base directory for `isolate`. `${DENV_ENV}` expands to the
	/// environment directory.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base: Option<String>,

	/// Literal values a `keep` rule is restricted to.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub only_if: Vec<String>,
}

impl PatternRule {
	pub fn new(pattern: &str, action: Action) -> Self {
		PatternRule {
			pattern: pattern.to_string(),
			action,
			range: None,
			base: None,
			only_if: Vec::new(),
		}
	}

	pub fn with_range(mut self, min: u16, max: u16) -> Self {
		self.range = Some([min, max]);
		self
	}

	pub fn with_base(mut self, base: &str) -> Self {
		self.base = Some(base.to_string());
		self
	}

	pub fn with_only_if(mut self, values: &[&str]) -> Self {
		self.only_if = values.iter().map(|v| v.to_string()).collect();
		self
	}
}

impl Config {
	/// Allocation range of the first `random_port` rule that declares one.
	pub fn port_range(&self) -> Option<(u16, u16)> {
		self.patterns
			.iter()
			.filter(|p| p.action == Action::RandomPort)
			.find_map(|p| p.range.map(|[min, max]| (min, max)))
	}

	/// Project name for a working directory: an explicit `[projects]` entry,
	/// else the directory's own name.
	pub fn project_name_for(&self, dir: &Path) -> String {
		match self.project_override(dir) {
			Some(name) => name.to_string(),
			None => directory_project_name(dir),
		}
	}

	/// The `[projects]` entry for `dir`, if any.
	pub fn project_override(&self, dir: &Path) -> Option<&str> {
		self.projects
			.get(dir.to_string_lossy().as_ref())
			.map(String::as_str)
	}

	pub fn set_project_override(&mut self, dir: &Path, name: &str) {
		self.projects
			.insert(dir.to_string_lossy().to_string(), name.to_string());
	}

	/// Drop the `[projects]` entry for `dir`. Returns whether one existed.
	pub fn unset_project_override(&mut self, dir: &Path) -> bool {
		self.projects
			.remove(dir.to_string_lossy().as_ref())
			.is_some()
	}
}

/// Project name derived from a directory alone.
pub fn directory_project_name(dir: &Path) -> String {
	dir.file_name()
		.map(|n| n.to_string_lossy().to_string())
		.unwrap_or_else(|| "unknown".to_string())
}
