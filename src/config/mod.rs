//! Configuration loading and parsing for denv.
//!
//! This module handles:
//! - TOML rule file parsing
//! - Built-in default patterns
//! - Project name overrides

pub mod defaults;
pub mod parser;
pub mod types;

pub use defaults::{LOCAL_HOSTS, default_config, default_patterns};
pub use parser::{load_config, parse_config_file, parse_config_str, write_config};
pub use types::{Action, Config, PatternRule, directory_project_name};
