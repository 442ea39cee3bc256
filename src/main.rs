use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use denv_cli::config::{
	Config, default_config, directory_project_name, load_config, parse_config_file, write_config,
};
use denv_cli::environment::{
	EnvironmentEntry, EnvironmentStatus, PrepareRequest, environment_status, list_environments,
	load_runtime, prepare, remove_environment, remove_inactive, render_exports,
};
use denv_cli::paths::Paths;
use denv_cli::rules::EnvSnapshot;
use denv_cli::session::{SessionRegistry, process_exists};

const DEFAULT_ENV: &str = "default";

#[derive(Parser)]
#[command(name = "denv")]
#[command(
	author,
	version,
	about = "Isolated development environments with private ports, paths and sessions"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	/// denv home directory (defaults to ~/.denv)
	#[arg(long, env = "DENV_HOME", global = true, value_name = "DIR")]
	home: Option<PathBuf>,

	/// Project name (defaults to the configured name or the directory name)
	#[arg(long, global = true)]
	project: Option<String>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Enter an environment: allocate ports, register a session and print the
	/// resulting variables as JSON
	Prepare {
		/// Environment name
		#[arg(default_value = DEFAULT_ENV)]
		env: String,

		/// Process the session belongs to (defaults to the calling shell)
		#[arg(long)]
		pid: Option<u32>,

		/// Prefix for the session id
		#[arg(long)]
		label: Option<String>,
	},
	/// Print shell export lines for an environment
	Export {
		#[arg(default_value = DEFAULT_ENV)]
		env: String,
	},
	/// List every environment with its live sessions and mapped ports
	#[command(visible_alias = "list")]
	Ls,
	/// Show port mappings, overrides and sessions of an environment
	Ps {
		/// Environment name (defaults to the environment of this shell)
		env: Option<String>,
	},
	/// List sessions of the current project's environments
	Sessions {
		/// Remove sessions whose process no longer exists
		#[arg(long)]
		cleanup: bool,

		/// Send SIGTERM to every live session
		#[arg(long, conflicts_with = "cleanup")]
		kill: bool,
	},
	/// End a session and drop it from the environment's record
	EndSession {
		env: String,
		id: String,
	},
	/// Remove an environment's state
	Rm {
		/// Environment name
		#[arg(required_unless_present = "all")]
		env: Option<String>,

		/// Remove every environment without live sessions
		#[arg(long, conflicts_with = "env")]
		all: bool,
	},
	/// Show or override the project name of the current directory
	Project {
		#[command(subcommand)]
		action: Option<ProjectAction>,
	},
	/// Configuration management commands
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand)]
enum ProjectAction {
	/// Use NAME as the project name for the current directory
	Rename { name: String },
	/// Go back to the directory's own name
	Unset,
}

#[derive(Subcommand)]
enum ConfigAction {
	/// Display the effective rule list
	Show,
	/// Check the config file for errors
	Validate,
	/// Write the default configuration to the config file
	Init {
		/// Overwrite an existing config file
		#[arg(long)]
		force: bool,
	},
}

#[derive(Serialize)]
struct PrepareOutput {
	env_path: PathBuf,
	project_path: PathBuf,
	project_name: String,
	env_name: String,
	session_id: String,
	ports: BTreeMap<String, String>,
	overrides: BTreeMap<String, String>,
}

fn main() -> ExitCode {
	denv_cli::logging::init();

	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();
	let paths = Paths::resolve(cli.home).context("Failed to resolve denv home")?;

	match cli.command {
		Commands::Prepare { env, pid, label } => {
			handle_prepare(&paths, cli.project, &env, pid, label.as_deref())
		}
		Commands::Export { env } => handle_export(&paths, cli.project, &env),
		Commands::Ls => handle_ls(&paths),
		Commands::Ps { env } => handle_ps(&paths, cli.project, env.as_deref()),
		Commands::Sessions { cleanup, kill } => handle_sessions(&paths, cli.project, cleanup, kill),
		Commands::EndSession { env, id } => handle_end_session(&paths, cli.project, &env, &id),
		Commands::Rm { env, all } => handle_rm(&paths, cli.project, env.as_deref(), all),
		Commands::Project { action } => handle_project(&paths, action),
		Commands::Config { action } => match action {
			ConfigAction::Show => handle_config_show(&paths),
			ConfigAction::Validate => handle_config_validate(&paths),
			ConfigAction::Init { force } => handle_config_init(&paths, force),
		},
	}
}

fn load_effective_config(paths: &Paths) -> Result<Config> {
	let path = paths.config_file();
	load_config(&path).with_context(|| format!("Failed to load {}", path.display()))
}

fn resolve_project(config: &Config, explicit: Option<String>) -> Result<String> {
	if let Some(project) = explicit {
		return Ok(project);
	}
	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	Ok(config.project_name_for(&cwd))
}

#[cfg(unix)]
fn calling_shell_pid() -> u32 {
	std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn calling_shell_pid() -> u32 {
	std::process::id()
}

fn handle_prepare(
	paths: &Paths,
	project: Option<String>,
	env_name: &str,
	pid: Option<u32>,
	label: Option<&str>,
) -> Result<ExitCode> {
	let config = load_effective_config(paths)?;
	let project = resolve_project(&config, project)?;
	let env: EnvSnapshot = std::env::vars().collect();

	let prepared = prepare(&PrepareRequest {
		paths,
		config: &config,
		project: &project,
		env_name,
		env: &env,
		pid: pid.unwrap_or_else(calling_shell_pid),
		label,
	})
	.with_context(|| format!("Failed to prepare environment '{}'", env_name))?;

	let output = PrepareOutput {
		env_path: prepared.env_dir.clone(),
		project_path: prepared.project_dir.clone(),
		project_name: prepared.project.clone(),
		env_name: prepared.env_name.clone(),
		session_id: prepared.session.id.clone(),
		ports: prepared
			.ports
			.iter()
			.map(|(orig, mapped)| (orig.to_string(), mapped.to_string()))
			.collect(),
		overrides: prepared
			.overrides
			.iter()
			.map(|(key, over)| (key.clone(), over.current.clone()))
			.collect(),
	};

	// The session outlives this process; it is ended by `end-session` or
	// swept once its PID is gone.
	prepared.session.detach();

	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(ExitCode::SUCCESS)
}

fn handle_export(paths: &Paths, project: Option<String>, env_name: &str) -> Result<ExitCode> {
	let config = load_effective_config(paths)?;
	let project = resolve_project(&config, project)?;
	let env_dir = paths.environment_dir(&project, env_name);

	let runtime = load_runtime(&env_dir)
		.with_context(|| format!("Failed to load environment '{}'", env_name))?
		.ok_or_else(|| {
			anyhow::anyhow!(
				"environment '{}' does not exist for project {}",
				env_name,
				project
			)
		})?;

	print!("{}", render_exports(paths, &runtime));
	Ok(ExitCode::SUCCESS)
}

fn handle_ls(paths: &Paths) -> Result<ExitCode> {
	let entries = list_environments(paths, None).context("Failed to list environments")?;
	if entries.is_empty() {
		println!("No denv environments found");
		return Ok(ExitCode::SUCCESS);
	}

	let mut by_project: BTreeMap<&str, Vec<&EnvironmentEntry>> = BTreeMap::new();
	for entry in &entries {
		by_project
			.entry(entry.runtime.project.as_str())
			.or_default()
			.push(entry);
	}

	for (project, envs) in by_project {
		println!("{}", project);
		for entry in envs {
			let active = entry.active_sessions();
			let status = if active > 0 {
				format!("{} active session(s)", active)
			} else {
				"inactive".to_string()
			};
			let ports = match entry.runtime.ports.len() {
				0 => String::new(),
				n => format!(" [{} ports mapped]", n),
			};
			println!("  - {}: {}{}", entry.runtime.environment, status, ports);
		}
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_ps(paths: &Paths, project: Option<String>, env_name: Option<&str>) -> Result<ExitCode> {
	let env_dir = match env_name {
		Some(env_name) => {
			let config = load_effective_config(paths)?;
			let project = resolve_project(&config, project)?;
			paths.environment_dir(&project, env_name)
		}
		None => match std::env::var_os("DENV_ENV").filter(|v| !v.is_empty()) {
			Some(dir) => PathBuf::from(dir),
			None => {
				println!("Not in a denv environment");
				println!("Use 'denv ps <ENV>' to inspect one");
				return Ok(ExitCode::SUCCESS);
			}
		},
	};

	let status = environment_status(&env_dir)
		.with_context(|| format!("Failed to load environment at {}", env_dir.display()))?;
	print_status(paths, &status);
	Ok(ExitCode::SUCCESS)
}

fn print_status(paths: &Paths, status: &EnvironmentStatus) {
	println!("Environment: {}", status.environment);
	println!("Project: {}", status.project);

	if !status.ports.is_empty() {
		println!("\nPort mappings:");
		for mapping in &status.ports {
			let users = if mapping.variables.is_empty() {
				String::new()
			} else {
				format!("  ({})", mapping.variables.join(", "))
			};
			println!("  {} -> {}{}", mapping.original, mapping.mapped, users);
		}
	}

	if !status.port_variables.is_empty() {
		println!("\nPort variables:");
		let width = status
			.port_variables
			.iter()
			.map(|(name, _)| name.len())
			.max()
			.unwrap_or(0);
		for (name, over) in &status.port_variables {
			println!("  {:<width$}: {} -> {}", name, over.original, over.current);
		}
	}

	for (title, overrides) in [
		("URL rewrites", &status.url_rewrites),
		("Isolated paths", &status.isolated_paths),
	] {
		if overrides.is_empty() {
			continue;
		}
		println!("\n{}:", title);
		for (name, over) in overrides {
			println!("  {}:\n    {}\n    -> {}", name, over.original, over.current);
		}
	}

	if !status.sessions.is_empty() {
		println!("\nSessions:");
		for session in &status.sessions {
			let state = if session.active { "active" } else { "orphaned" };
			let lock = if session.locked { "" } else { ", no lock file" };
			println!("  {} (PID {}) - {}{}", session.id, session.pid, state, lock);
		}
	}
	if !status.stray_locks.is_empty() {
		println!("\nLock files without a session: {}", status.stray_locks.join(", "));
	}
	let active = status.active_sessions();
	if active > 0 {
		println!("\nThis environment has {} active session(s)", active);
	}

	println!("\nPaths:");
	println!("  Environment: {}", status.env_dir.display());
	println!("  Project:     {}", paths.project_dir(&status.project).display());
}

fn handle_sessions(
	paths: &Paths,
	project: Option<String>,
	cleanup: bool,
	kill: bool,
) -> Result<ExitCode> {
	let config = load_effective_config(paths)?;
	let project = resolve_project(&config, project)?;

	for entry in list_environments(paths, Some(&project))? {
		if kill {
			let signalled = SessionRegistry::new(&entry.dir)
				.terminate_sessions()
				.with_context(|| format!("Failed to signal sessions in {}", entry.name))?;
			for session in signalled {
				println!("Sent SIGTERM to session {} (PID {})", session.id, session.pid);
			}
			continue;
		}

		if cleanup {
			let cleaned = SessionRegistry::new(&entry.dir)
				.cleanup_orphaned()
				.with_context(|| format!("Failed to clean sessions in {}", entry.name))?;
			if cleaned > 0 {
				println!("Cleaned {} orphaned session(s) in {}", cleaned, entry.name);
			}
			continue;
		}

		if entry.runtime.sessions.is_empty() {
			continue;
		}
		println!("\nSessions in {}:", entry.name);
		for (id, session) in &entry.runtime.sessions {
			let status = if process_exists(session.pid) {
				"active"
			} else {
				"orphaned"
			};
			println!("  - Session {} (PID {}) - {}", id, session.pid, status);
		}
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_end_session(
	paths: &Paths,
	project: Option<String>,
	env_name: &str,
	id: &str,
) -> Result<ExitCode> {
	let config = load_effective_config(paths)?;
	let project = resolve_project(&config, project)?;
	let env_dir = paths.environment_dir(&project, env_name);

	SessionRegistry::new(&env_dir)
		.end_session_by_id(id)
		.with_context(|| format!("Failed to end session {}", id))?;

	println!("Ended session {}", id);
	Ok(ExitCode::SUCCESS)
}

fn handle_rm(
	paths: &Paths,
	project: Option<String>,
	env_name: Option<&str>,
	all: bool,
) -> Result<ExitCode> {
	if all {
		let removed = remove_inactive(paths).context("Failed to remove environments")?;
		if removed.is_empty() {
			println!("No inactive environments found to remove");
		} else {
			println!("Removed {} inactive environment(s):", removed.len());
			for name in removed {
				println!("  - {}", name);
			}
		}
		return Ok(ExitCode::SUCCESS);
	}

	let env_name = env_name.context("environment name required (or use --all)")?;
	let config = load_effective_config(paths)?;
	let project = resolve_project(&config, project)?;

	remove_environment(&paths.environment_dir(&project, env_name))
		.with_context(|| format!("Failed to remove environment '{}'", env_name))?;

	println!("Removed environment '{}' for project {}", env_name, project);
	Ok(ExitCode::SUCCESS)
}

fn handle_project(paths: &Paths, action: Option<ProjectAction>) -> Result<ExitCode> {
	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let config_path = paths.config_file();
	let mut config = load_effective_config(paths)?;
	let detected = directory_project_name(&cwd);

	match action {
		None => match config.project_override(&cwd) {
			Some(name) => println!("Project: {} (overridden from {})", name, detected),
			None => println!("Project: {}", detected),
		},
		Some(ProjectAction::Rename { name }) => {
			let name = name.trim();
			if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
				anyhow::bail!("invalid project name '{}'", name);
			}
			config.set_project_override(&cwd, name);
			write_config(&config_path, &config)
				.with_context(|| format!("Failed to write {}", config_path.display()))?;
			println!("Project renamed to: {}", name);
			println!("Override saved to {}", config_path.display());
		}
		Some(ProjectAction::Unset) => {
			if config.unset_project_override(&cwd) {
				write_config(&config_path, &config)
					.with_context(|| format!("Failed to write {}", config_path.display()))?;
			}
			println!("Project override removed");
			println!("Will use detected name: {}", detected);
		}
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_config_show(paths: &Paths) -> Result<ExitCode> {
	let path = paths.config_file();
	let config = load_effective_config(paths)?;

	println!("# Source: {}", path.display());
	if !path.exists() {
		println!("# (not found, using built-in defaults)");
	}
	println!("# patterns: {}", config.patterns.len());
	println!();

	for (i, rule) in config.patterns.iter().enumerate() {
		println!("  Pattern {}:", i + 1);
		println!("    pattern: {}", rule.pattern);
		println!("    action: {}", rule.action);
		if let Some([min, max]) = rule.range {
			println!("    range: {}-{}", min, max);
		}
		if let Some(ref base) = rule.base {
			println!("    base: {}", base);
		}
		if !rule.only_if.is_empty() {
			println!("    only_if: {}", rule.only_if.join(", "));
		}
		println!();
	}

	for (dir, name) in &config.projects {
		println!("Project override: {} -> {}", dir, name);
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_config_validate(paths: &Paths) -> Result<ExitCode> {
	let path = paths.config_file();
	if !path.exists() {
		println!("No configuration file found; built-in defaults apply.");
		return Ok(ExitCode::SUCCESS);
	}

	match parse_config_file(&path) {
		Ok(config) => {
			println!(
				"Configuration is valid: {} ({} patterns)",
				path.display(),
				config.patterns.len()
			);
			Ok(ExitCode::SUCCESS)
		}
		Err(e) => {
			eprintln!("Configuration error: {:?}", anyhow::Error::from(e));
			Ok(ExitCode::FAILURE)
		}
	}
}

fn handle_config_init(paths: &Paths, force: bool) -> Result<ExitCode> {
	let path = paths.config_file();
	if path.exists() && !force {
		anyhow::bail!("{} already exists. Use --force to overwrite.", path.display());
	}

	write_config(&path, &default_config())
		.with_context(|| format!("Failed to write {}", path.display()))?;

	println!("Created {}", path.display());
	Ok(ExitCode::SUCCESS)
}
