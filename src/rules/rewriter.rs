use crate::config::LOCAL_HOSTS;
use crate::ports::PortTable;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

/// Token substituted with the environment directory in an `isolate` base.
pub const ENV_DIR_TOKEN: &str = "${DENV_ENV}";

static PORT_REFERENCE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r":([0-9]+)").expect("static port regex is valid"));

/// Whether a value refers to an endpoint on the local machine.
pub fn is_local_endpoint(value: &str) -> bool {
	LOCAL_HOSTS.iter().any(|host| value.contains(host))
}

/// Parse a bare port number, rejecting anything that is not a `u16`.
pub fn parse_port(value: &str) -> Option<u16> {
	value.parse::<u16>().ok()
}

/// Rewrite every `:<port>` in a local endpoint according to `ports`.
///
/// Values that do not mention a local host are returned unchanged, as are
/// ports with no mapping. Each `:<digits>` run is looked up whole, so `:80`
/// never rewrites the prefix of `:8080`.
pub fn rewrite_url(value: &str, ports: &PortTable) -> String {
	if !is_local_endpoint(value) {
		return value.to_string();
	}

	PORT_REFERENCE
		.replace_all(value, |caps: &Captures| {
			match parse_port(&caps[1]).and_then(|port| ports.get(&port)) {
				Some(mapped) => format!(":{}", mapped),
				None => caps[0].to_string(),
			}
		})
		.into_owned()
}

/// Ports referenced as `:<port>` inside a local endpoint.
pub fn extract_url_ports(value: &str) -> Vec<u16> {
	if !is_local_endpoint(value) {
		return Vec::new();
	}
	PORT_REFERENCE
		.captures_iter(value)
		.filter_map(|caps| parse_port(&caps[1]))
		.collect()
}

/// Redirect the leaf name of `value` under a private base directory.
///
/// The leaf is whatever follows the last `/`, so a value ending in `/` maps
/// to the base itself. `base` defaults to `env_dir`; the `${DENV_ENV}` token
/// inside a configured base expands to `env_dir`. Empty values are left
/// unchanged.
pub fn isolate_path(value: &str, base: Option<&str>, env_dir: &Path) -> String {
	if value.is_empty() {
		return value.to_string();
	}

	let env_dir_str = env_dir.to_string_lossy();
	let base = match base {
		Some(b) if !b.is_empty() => b.replace(ENV_DIR_TOKEN, &env_dir_str),
		_ => env_dir_str.to_string(),
	};
	match value.rsplit('/').next() {
		Some(leaf) if !leaf.is_empty() => Path::new(&base).join(leaf).to_string_lossy().to_string(),
		_ => base,
	}
}
