use crate::config::types::{Action, Config, PatternRule};

/// Hosts that mark a value as pointing at the local machine.
pub const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "0.0.0.0"];

/// Built-in rule list.
///
/// Order matters: tool-specific names are listed before the generic
/// wildcards that would otherwise isolate them.
pub fn default_patterns() -> Vec<PatternRule> {
	vec![
		// Language toolchains
		PatternRule::new(
			"DENV_HOME | CARGO_HOME | RUSTUP_HOME | GOPATH | GOROOT | NVM_DIR | RBENV_ROOT | PYENV_ROOT | PNPM_HOME | SDKMAN_DIR",
			Action::Keep,
		),
		// Package managers
		PatternRule::new(
			"HOMEBREW_PREFIX | HOMEBREW_CELLAR | HOMEBREW_REPOSITORY | NIX_PATH | NIX_USER_PROFILE_DIR",
			Action::Keep,
		),
		PatternRule::new(
			"SOLANA_HOME | KITTY_INSTALLATION_DIR | MINIO_HOME | TMUX_PLUGIN_MANAGER_PATH | BROWSERS_PROFILE_PATH",
			Action::Keep,
		),
		// Shell tooling
		PatternRule::new(
			"ZSH_CACHE_DIR | DOT_PATH | FORGIT_INSTALL_DIR | __MISE_ORIG_PATH | DIRENV_DIR",
			Action::Keep,
		),
		PatternRule::new("*_PORT | PORT", Action::RandomPort).with_range(30000, 39999),
		PatternRule::new("*_ROOT | *_DIR | *_PATH | *_HOME", Action::Isolate)
			.with_base("${DENV_ENV}"),
		PatternRule::new(
			"*_URL | *_URI | *_ENDPOINT | DATABASE_URL | REDIS_URL",
			Action::RewritePorts,
		),
		PatternRule::new(
			"*_KEY | *_TOKEN | *_SECRET | *_PASSWORD | *_CREDENTIAL",
			Action::Keep,
		),
		PatternRule::new("*_HOST | *_HOSTNAME", Action::Keep).with_only_if(&LOCAL_HOSTS),
	]
}

pub fn default_config() -> Config {
	Config {
		projects: Default::default(),
		patterns: default_patterns(),
	}
}
