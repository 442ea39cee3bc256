use std::path::PathBuf;

/// Errors from denv's library operations.
///
/// Filesystem variants carry the path involved. The `denv` binary adds
/// command context on top with `anyhow`.
#[derive(Debug, thiserror::Error)]
pub enum DenvError {
	#[error("Failed to read config file: {path}")]
	ConfigReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParseError {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to serialize config")]
	ConfigSerializeError {
		#[source]
		source: toml::ser::Error,
	},

	#[error("Failed to write file: {path}")]
	WriteError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to read state file: {path}")]
	StateReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse JSON state file: {path}")]
	StateParseError {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("Failed to serialize JSON state file: {path}")]
	StateSerializeError {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("Failed to create directory: {path}")]
	CreateDirError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to remove environment directory: {path}")]
	RemoveError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Lock operation failed: {path}")]
	LockError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Invalid session id '{id}': must not contain path separators")]
	InvalidSessionId { id: String },

	#[error("Failed to signal process {pid}")]
	SignalError {
		pid: u32,
		#[source]
		source: std::io::Error,
	},

	#[error("Could not acquire a session lock after {attempts} attempts")]
	LockContention { attempts: usize },

	#[error("No free port in range {min}-{max}")]
	AllocationExhausted { min: u16, max: u16 },

	#[error("Cannot remove environment with {count} active session(s)")]
	ActiveSessionsPresent { count: usize },

	#[error("Already in denv environment '{name}'; exit it before entering another")]
	AlreadyInEnvironment { name: String },

	#[error("Environment '{name}' does not exist")]
	EnvironmentNotFound { name: String },

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

/// Result type alias using DenvError.
pub type Result<T> = std::result::Result<T, DenvError>;
