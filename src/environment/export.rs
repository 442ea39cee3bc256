use crate::environment::prepare::{core_variables, port_variables};
use crate::environment::runtime::Runtime;
use crate::paths::Paths;
use std::fmt::Write;

/// Render an environment as POSIX `export` lines, e.g. for direnv.
///
/// Emits denv's own variables, the port helpers, then every recorded
/// override, each group in sorted order.
pub fn render_exports(paths: &Paths, runtime: &Runtime) -> String {
	let mut out = String::new();
	let _ = writeln!(
		out,
		"# denv environment: {}/{}",
		runtime.project, runtime.environment
	);

	let core = core_variables(paths, &runtime.project, &runtime.environment, None);
	for (key, value) in core.iter().chain(port_variables(&runtime.ports).iter()) {
		let _ = writeln!(out, "export {}=\"{}\"", key, escape_shell_value(value));
	}

	if !runtime.overrides.is_empty() {
		let _ = writeln!(out, "\n# Variable overrides");
		for (key, over) in &runtime.overrides {
			let _ = writeln!(out, "export {}=\"{}\"", key, escape_shell_value(&over.current));
		}
	}

	out
}

/// Escape a value for use inside double quotes.
pub fn escape_shell_value(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		if matches!(c, '\\' | '"' | '$' | '`') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Action;
	use crate::environment::Override;

	#[test]
	fn test_escape_shell_value() {
		assert_eq!(escape_shell_value("plain"), "plain");
		assert_eq!(escape_shell_value(r#"a"b"#), r#"a\"b"#);
		assert_eq!(escape_shell_value("$HOME `x` \\"), "\\$HOME \\`x\\` \\\\");
	}

	#[test]
	fn test_render_exports() {
		let paths = Paths::new("/h");
		let mut runtime = Runtime::new("app", "dev");
		runtime.ports.insert(5432, 35432);
		runtime.ports.insert(3000, 33000);
		runtime.overrides.insert(
			"DATABASE_URL".to_string(),
			Override {
				original: "postgres://localhost:5432/db".to_string(),
				current: "postgres://localhost:35432/db".to_string(),
				rule: Action::RewritePorts,
			},
		);

		let out = render_exports(&paths, &runtime);

		assert!(out.starts_with("# denv environment: app/dev\n"));
		assert!(out.contains("export DENV_ENV=\"/h/app-dev\"\n"));
		assert!(out.contains("export DENV_PROJECT=\"/h/app\"\n"));
		assert!(!out.contains("DENV_SESSION"));
		assert!(out.contains("export DATABASE_URL=\"postgres://localhost:35432/db\"\n"));

		let p3000 = out.find("export PORT_3000=\"33000\"").unwrap();
		let p5432 = out.find("export PORT_5432=\"35432\"").unwrap();
		assert!(p3000 < p5432);
	}
}
