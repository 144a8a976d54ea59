//! Identity Matcher + Hub Arbiter (C3): decides whether a newly
//! ingested Work belongs to an existing Hub.

pub mod arbiter;

use crate::config::ScoringConfig;
use crate::domain::Disposition;
use std::collections::HashMap;
use strsim::levenshtein;

/// Keys treated as authoritative identifiers: an exact normalised match
/// on any one of these short-circuits the fuzzy comparison entirely.
const HARD_IDENTIFIER_KEYS: &[&str] = &["isbn", "imdbid", "tmdbid", "ean", "asin", "musicbrainzid", "openlibrary_id"];

const KNOWN_URI_PREFIXES: &[&str] = &["urn:isbn:", "isbn:", "ean:", "asin:", "tt"];

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
	pub similarity: f64,
	pub hard: bool,
	pub matched_ids: Vec<String>,
}

/// Stateless comparator over two canonical-value maps (`key -> value`).
pub struct IdentityMatcher;

impl IdentityMatcher {
	pub fn compare(a: &HashMap<String, String>, b: &HashMap<String, String>) -> MatchResult {
		if let Some(hard) = Self::hard_match(a, b) {
			return hard;
		}
		Self::fuzzy_match(a, b)
	}

	fn hard_match(a: &HashMap<String, String>, b: &HashMap<String, String>) -> Option<MatchResult> {
		let mut matched_ids = Vec::new();
		for key in HARD_IDENTIFIER_KEYS {
			let (Some(av), Some(bv)) = (a.get(*key), b.get(*key)) else {
				continue;
			};
			let (na, nb) = (Self::normalise_identifier(av), Self::normalise_identifier(bv));
			if !na.is_empty() && na == nb {
				matched_ids.push((*key).to_string());
			}
		}
		if matched_ids.is_empty() {
			None
		} else {
			Some(MatchResult {
				similarity: 1.0,
				hard: true,
				matched_ids,
			})
		}
	}

	fn normalise_identifier(raw: &str) -> String {
		let mut value = raw.trim().replace(['-', ' '], "").to_lowercase();
		for prefix in KNOWN_URI_PREFIXES {
			if let Some(stripped) = value.strip_prefix(prefix) {
				value = stripped.to_string();
				break;
			}
		}
		value
	}

	fn fuzzy_match(a: &HashMap<String, String>, b: &HashMap<String, String>) -> MatchResult {
		let mut keys: Vec<&String> = a.keys().filter(|k| b.contains_key(*k)).collect();
		keys.sort();

		if keys.is_empty() {
			return MatchResult {
				similarity: 0.0,
				hard: false,
				matched_ids: Vec::new(),
			};
		}

		let has_title = keys.iter().any(|k| k.as_str() == "title");
		let non_title_count = if has_title { keys.len() - 1 } else { keys.len() };

		let mut total = 0.0;
		for key in &keys {
			let weight = if key.as_str() == "title" {
				0.5
			} else if has_title {
				0.5 / non_title_count as f64
			} else {
				1.0 / non_title_count as f64
			};
			let score = Self::field_similarity(&a[*key], &b[*key]);
			total += weight * score;
		}

		MatchResult {
			similarity: total,
			hard: false,
			matched_ids: Vec::new(),
		}
	}

	fn field_similarity(a: &str, b: &str) -> f64 {
		if a.is_empty() && b.is_empty() {
			return 1.0;
		}
		if a.is_empty() || b.is_empty() {
			return 0.0;
		}
		let max_len = a.chars().count().max(b.chars().count()) as f64;
		if max_len == 0.0 {
			return 1.0;
		}
		1.0 - (levenshtein(a, b) as f64 / max_len)
	}
}

impl MatchResult {
	pub fn disposition(&self, config: &ScoringConfig) -> Disposition {
		if self.similarity >= config.auto_link_threshold {
			Disposition::AutoLinked
		} else if self.similarity >= config.conflict_threshold {
			Disposition::NeedsReview
		} else {
			Disposition::Rejected
		}
	}
}
