//! Environment variable rules for denv.
//!
//! This module handles:
//! - Glob pattern matching on variable names
//! - Port, URL and path rewriting
//! - Ordered first-match rule application with an override audit

pub mod engine;
pub mod matcher;
pub mod rewriter;

pub use engine::{
	EnvSnapshot, RuleOutcome, apply_rule, apply_rules, collect_used_ports, find_matching_rule,
};
pub use matcher::matches_pattern;
pub use rewriter::{extract_url_ports, is_local_endpoint, isolate_path, parse_port, rewrite_url};
