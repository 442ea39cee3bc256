use crate::config::{Action, PatternRule};
use crate::environment::Override;
use crate::ports::PortTable;
use crate::rules::matcher::matches_pattern;
use crate::rules::rewriter::{extract_url_ports, isolate_path, parse_port, rewrite_url};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Point-in-time copy of a process environment.
pub type EnvSnapshot = BTreeMap<String, String>;

/// Result of applying the rule list to a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
	/// Every input variable, with transformed values where a rule changed them.
	pub env: EnvSnapshot,

	/// Only the variables whose value actually changed.
	pub overrides: BTreeMap<String, Override>,
}

/// Find the first rule whose pattern matches `key`.
pub fn find_matching_rule<'a>(rules: &'a [PatternRule], key: &str) -> Option<&'a PatternRule> {
	rules.iter().find(|rule| matches_pattern(&rule.pattern, key))
}

/// Compute the new value for one variable under `rule`.
///
/// Never fails: unparsable values are passed through unchanged.
pub fn apply_rule(rule: &PatternRule, key: &str, value: &str, ports: &PortTable, env_dir: &Path) -> String {
	match rule.action {
		Action::Keep => {
			if !rule.only_if.is_empty() && !rule.only_if.iter().any(|v| v == value) {
				tracing::debug!(key, value, "keep rule allow-list does not contain value, leaving as is");
			}
			value.to_string()
		}
		Action::RandomPort => match parse_port(value) {
			Some(port) => match ports.get(&port) {
				Some(mapped) => mapped.to_string(),
				None => value.to_string(),
			},
			None => {
				tracing::debug!(key, value, "not a port number, leaving as is");
				value.to_string()
			}
		},
		Action::RewritePorts => rewrite_url(value, ports),
		Action::Isolate => isolate_path(value, rule.base.as_deref(), env_dir),
	}
}

/// Apply `rules` to every variable in `env`.
///
/// The first matching rule decides, even if it is `keep`; variables with no
/// matching rule pass through. Nothing persisted is read or written.
pub fn apply_rules(
	env: &EnvSnapshot,
	rules: &[PatternRule],
	ports: &PortTable,
	env_dir: &Path,
) -> RuleOutcome {
	let mut outcome = RuleOutcome::default();

	for (key, value) in env {
		let new_value = match find_matching_rule(rules, key) {
			Some(rule) => {
				let new_value = apply_rule(rule, key, value, ports, env_dir);
				if new_value != *value {
					outcome.overrides.insert(
						key.clone(),
						Override {
							original: value.clone(),
							current: new_value.clone(),
							rule: rule.action,
						},
					);
				}
				new_value
			}
			None => value.clone(),
		};
		outcome.env.insert(key.clone(), new_value);
	}

	outcome
}

/// Original ports referenced by variables the rules would remap.
pub fn collect_used_ports(env: &EnvSnapshot, rules: &[PatternRule]) -> BTreeSet<u16> {
	let mut ports = BTreeSet::new();

	for (key, value) in env {
		let Some(rule) = find_matching_rule(rules, key) else {
			continue;
		};
		match rule.action {
			Action::RandomPort => ports.extend(parse_port(value)),
			Action::RewritePorts => ports.extend(extract_url_ports(value)),
			Action::Keep | Action::Isolate => {}
		}
	}

	ports
}
