use crate::config::Config;
use crate::environment::runtime::{Override, Runtime, load_runtime, save_runtime};
use crate::error::{DenvError, Result};
use crate::paths::Paths;
use crate::ports::{PortAllocator, PortTable};
use crate::rules::{EnvSnapshot, apply_rules, collect_used_ports};
use crate::session::{SessionHandle, SessionRegistry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Variable that marks a shell as already inside an environment.
pub const ENV_NAME_VAR: &str = "DENV_ENV_NAME";

/// Inputs for entering an environment.
#[derive(Debug)]
pub struct PrepareRequest<'a> {
	pub paths: &'a Paths,
	pub config: &'a Config,
	pub project: &'a str,
	pub env_name: &'a str,

	/// Environment of the invoking shell.
	pub env: &'a EnvSnapshot,

	/// Process that the new session belongs to.
	pub pid: u32,

	/// Optional prefix for the session id.
	pub label: Option<&'a str>,
}

/// Everything a caller needs to start an isolated shell.
#[derive(Debug)]
pub struct Prepared {
	pub project: String,
	pub env_name: String,
	pub env_dir: PathBuf,
	pub project_dir: PathBuf,
	pub session: SessionHandle,
	pub ports: PortTable,
	pub overrides: BTreeMap<String, Override>,

	/// Final variable set: the transformed snapshot plus denv's own variables.
	pub variables: EnvSnapshot,
}

/// Enter an environment.
///
/// Allocates a port for every port the snapshot references, registers a
/// session, applies the rules and saves the runtime record.
pub fn prepare(req: &PrepareRequest) -> Result<Prepared> {
	if let Some(current) = req.env.get(ENV_NAME_VAR).filter(|v| !v.is_empty()) {
		return Err(DenvError::AlreadyInEnvironment {
			name: current.clone(),
		});
	}

	let env_dir = req.paths.environment_dir(req.project, req.env_name);
	let project_dir = req.paths.project_dir(req.project);
	create_dir(&env_dir)?;
	create_dir(&project_dir.join("hooks"))?;

	let mut runtime =
		load_runtime(&env_dir)?.unwrap_or_else(|| Runtime::new(req.project, req.env_name));

	let mut allocator = PortAllocator::open(&env_dir);
	if let Some((min, max)) = req.config.port_range() {
		allocator.set_range(min, max);
	}
	if !runtime.ports.is_empty() {
		allocator.initialize_with_ports(&runtime.ports)?;
	}

	for port in collect_used_ports(req.env, &req.config.patterns) {
		if runtime.ports.contains_key(&port) {
			continue;
		}
		let mapped = allocator.get_port(port)?;
		runtime.ports.insert(port, mapped);
	}

	let registry = SessionRegistry::new(&env_dir);
	let session = registry.create_session(req.label, req.pid)?;
	registry.register(&mut runtime, session.record());

	let outcome = apply_rules(req.env, &req.config.patterns, &runtime.ports, &env_dir);
	runtime.overrides = outcome.overrides.clone();
	save_runtime(&env_dir, &runtime)?;

	tracing::info!(
		project = req.project,
		env = req.env_name,
		session = %session.id,
		ports = runtime.ports.len(),
		overrides = runtime.overrides.len(),
		"environment prepared"
	);

	let mut variables = outcome.env;
	variables.extend(core_variables(
		req.paths,
		req.project,
		req.env_name,
		Some(&session.id),
	));
	variables.extend(port_variables(&runtime.ports));

	Ok(Prepared {
		project: req.project.to_string(),
		env_name: req.env_name.to_string(),
		env_dir,
		project_dir,
		session,
		ports: runtime.ports,
		overrides: runtime.overrides,
		variables,
	})
}

/// denv's own variables describing the active environment.
pub fn core_variables(
	paths: &Paths,
	project: &str,
	env_name: &str,
	session_id: Option<&str>,
) -> EnvSnapshot {
	let mut vars = EnvSnapshot::new();
	vars.insert("DENV_HOME".to_string(), display(paths.home()));
	vars.insert(
		"DENV_ENV".to_string(),
		display(&paths.environment_dir(project, env_name)),
	);
	vars.insert("DENV_PROJECT".to_string(), display(&paths.project_dir(project)));
	vars.insert(ENV_NAME_VAR.to_string(), env_name.to_string());
	vars.insert("DENV_PROJECT_NAME".to_string(), project.to_string());
	if let Some(id) = session_id {
		vars.insert("DENV_SESSION".to_string(), id.to_string());
	}
	vars
}

/// `PORT_<n>` and `ORIGINAL_PORT_<n>` for every mapped port.
pub fn port_variables(ports: &PortTable) -> EnvSnapshot {
	let mut vars = EnvSnapshot::new();
	for (original, mapped) in ports {
		vars.insert(format!("PORT_{}", original), mapped.to_string());
		vars.insert(format!("ORIGINAL_PORT_{}", original), original.to_string());
	}
	vars
}

fn display(path: &Path) -> String {
	path.to_string_lossy().to_string()
}

fn create_dir(path: &Path) -> Result<()> {
	std::fs::create_dir_all(path).map_err(|source| DenvError::CreateDirError {
		path: path.to_path_buf(),
		source,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{Action, PatternRule, default_config};

	fn snapshot(pairs: &[(&str, &str)]) -> EnvSnapshot {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	fn request<'a>(
		paths: &'a Paths,
		config: &'a Config,
		env: &'a EnvSnapshot,
	) -> PrepareRequest<'a> {
		PrepareRequest {
			paths,
			config,
			project: "myapp",
			env_name: "dev",
			env,
			pid: std::process::id(),
			label: None,
		}
	}

	#[test]
	fn test_prepare_allocates_and_rewrites() {
		let temp_dir = tempfile::tempdir().unwrap();
		let paths = Paths::new(temp_dir.path());
		let config = default_config();
		let env = snapshot(&[
			("PORT", "3000"),
			("DATABASE_URL", "postgres://localhost:5432/app"),
			("CARGO_HOME", "/home/u/.cargo"),
			("EDITOR", "vim"),
		]);

		let prepared = prepare(&request(&paths, &config, &env)).unwrap();

		let web = prepared.ports[&3000];
		let db = prepared.ports[&5432];
		assert!((30000..=39999).contains(&web));
		assert_eq!(prepared.variables["PORT"], web.to_string());
		assert_eq!(
			prepared.variables["DATABASE_URL"],
			format!("postgres://localhost:{}/app", db)
		);
		assert_eq!(prepared.variables["CARGO_HOME"], "/home/u/.cargo");
		assert_eq!(prepared.variables["EDITOR"], "vim");
		assert_eq!(prepared.variables["PORT_3000"], web.to_string());
		assert_eq!(prepared.variables["ORIGINAL_PORT_3000"], "3000");
		assert_eq!(prepared.variables["DENV_ENV_NAME"], "dev");
		assert_eq!(prepared.variables["DENV_SESSION"], prepared.session.id);
		assert_eq!(prepared.overrides.len(), 2);
		assert!(paths.project_dir("myapp").join("hooks").is_dir());

		let runtime = load_runtime(&prepared.env_dir).unwrap().unwrap();
		assert_eq!(runtime.ports, prepared.ports);
		assert_eq!(runtime.overrides, prepared.overrides);
		assert!(runtime.sessions.contains_key(&prepared.session.id));
	}

	#[test]
	fn test_prepare_reuses_runtime_ports() {
		let temp_dir = tempfile::tempdir().unwrap();
		let paths = Paths::new(temp_dir.path());
		let config = default_config();
		let env = snapshot(&[("PORT", "3000")]);

		let first = prepare(&request(&paths, &config, &env)).unwrap();
		let mapped = first.ports[&3000];
		drop(first);

		let second = prepare(&request(&paths, &config, &env)).unwrap();
		assert_eq!(second.ports[&3000], mapped);
	}

	#[test]
	fn test_prepare_uses_configured_range() {
		let temp_dir = tempfile::tempdir().unwrap();
		let paths = Paths::new(temp_dir.path());
		let config = Config {
			projects: Default::default(),
			patterns: vec![PatternRule::new("*_PORT", Action::RandomPort).with_range(41000, 41999)],
		};
		let env = snapshot(&[("WEB_PORT", "8080")]);

		let prepared = prepare(&request(&paths, &config, &env)).unwrap();
		assert!((41000..=41999).contains(&prepared.ports[&8080]));
	}

	#[test]
	fn test_prepare_refuses_nested_environment() {
		let temp_dir = tempfile::tempdir().unwrap();
		let paths = Paths::new(temp_dir.path());
		let config = default_config();
		let env = snapshot(&[("DENV_ENV_NAME", "other")]);

		match prepare(&request(&paths, &config, &env)) {
			Err(DenvError::AlreadyInEnvironment { name }) => assert_eq!(name, "other"),
			other => panic!("Expected AlreadyInEnvironment, got {other:?}"),
		}
	}

	#[test]
	fn test_port_variables() {
		let ports: PortTable = [(3000, 33000)].into_iter().collect();
		let vars = port_variables(&ports);
		assert_eq!(vars["PORT_3000"], "33000");
		assert_eq!(vars["ORIGINAL_PORT_3000"], "3000");
		assert_eq!(vars.len(), 2);
	}
}
