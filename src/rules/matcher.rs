//! Glob-style variable name matching.
//!
//! A pattern is one or more alternatives separated by `|`. Within an
//! alternative, `*` matches any run of characters (including none) and every
//! other character matches itself, so `DB.URL` never matches `DB_URL`.
//! Matching is anchored at both ends and case-sensitive.

/// Check whether `key` matches any `|`-separated alternative in `pattern`.
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
	pattern
		.split('|')
		.map(str::trim)
		.any(|alternative| matches_glob(alternative, key))
}

/// Anchored match of a single alternative.
fn matches_glob(glob: &str, key: &str) -> bool {
	let segments: Vec<&str> = glob.split('*').collect();

	// A single segment means no wildcard.
	let [first, middle @ .., last] = segments.as_slice() else {
		return key == glob;
	};

	let Some(mut remaining) = key.strip_prefix(first) else {
		return false;
	};

	for segment in middle {
		match remaining.find(segment) {
			Some(idx) => remaining = &remaining[idx + segment.len()..],
			None => return false,
		}
	}

	remaining.len() >= last.len() && remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_suffix_wildcard() {
		assert!(matches_pattern("*_PORT", "DB_PORT"));
		assert!(!matches_pattern("*_PORT", "PORT_DB"));
		assert!(!matches_pattern("*_PORT", "PORT"));
	}

	#[test]
	fn test_exact_and_alternatives() {
		assert!(matches_pattern("DATABASE_URL", "DATABASE_URL"));
		assert!(!matches_pattern("DATABASE_URL", "DATABASE_URL2"));
		assert!(matches_pattern("*_PORT|PORT", "PORT"));
		assert!(matches_pattern("*_KEY | *_TOKEN", "AUTH_TOKEN"));
		assert!(matches_pattern("  *_KEY  |*_TOKEN", "API_KEY"));
	}

	#[test]
	fn test_whole_string_not_substring() {
		assert!(!matches_pattern("PORT", "APP_PORT"));
		assert!(!matches_pattern("_HOME", "CARGO_HOME"));
	}

	#[test]
	fn test_case_sensitive() {
		assert!(!matches_pattern("*_PORT", "db_port"));
	}

	#[test]
	fn test_regex_metacharacters_are_literal() {
		assert!(matches_pattern("A.B", "A.B"));
		assert!(!matches_pattern("A.B", "AxB"));
		assert!(matches_pattern("C++_*", "C++_HOME"));
		assert!(!matches_pattern("X+", "XX"));
		assert!(matches_pattern("(*)", "(group)"));
	}

	#[test]
	fn test_inner_and_multiple_wildcards() {
		assert!(matches_pattern("NODE_*_DIR", "NODE_CACHE_DIR"));
		assert!(matches_pattern("*_*_*", "A_B_C"));
		assert!(!matches_pattern("*_*_*", "A_B"));
		assert!(matches_pattern("*", ""));
		assert!(matches_pattern("*", "ANYTHING"));
	}

	#[test]
	fn test_overlapping_prefix_and_suffix() {
		// Prefix and suffix must not share characters.
		assert!(!matches_pattern("AB*BA", "ABA"));
		assert!(matches_pattern("AB*BA", "ABBA"));
	}
}
