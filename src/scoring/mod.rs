//! Weighted-voter scoring engine (C2): reconciles competing metadata
//! claims on one entity into authoritative canonical values.

pub mod error;

use crate::config::ScoringConfig;
use crate::domain::{EntityId, MetadataClaim};
use chrono::{DateTime, Utc};
use error::FieldResolutionError;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ScoringContext {
	pub entity_id: EntityId,
	pub claims: Vec<MetadataClaim>,
	pub provider_weights: HashMap<String, f64>,
	pub provider_field_weights: HashMap<String, HashMap<String, f64>>,
	pub config: ScoringConfig,
}

#[derive(Debug, Clone)]
pub struct FieldScore {
	pub key: String,
	pub value: String,
	pub confidence: f64,
	pub winning_provider_id: Option<String>,
	pub conflicted: bool,
}

#[derive(Debug, Clone)]
pub struct ScoringResult {
	pub entity_id: EntityId,
	pub field_scores: Vec<FieldScore>,
	pub overall_confidence: f64,
	pub scored_at: DateTime<Utc>,
}

/// Stateless; every call is a pure function of its inputs — no
/// randomness, no external I/O.
pub struct ScoringEngine;

impl ScoringEngine {
	pub fn score(ctx: &ScoringContext) -> ScoringResult {
		let scored_at = Utc::now();
		let mut by_key: BTreeMap<String, Vec<&MetadataClaim>> = BTreeMap::new();
		for claim in &ctx.claims {
			by_key.entry(claim.claim_key.to_lowercase()).or_default().push(claim);
		}

		let mut field_scores = Vec::new();
		for (key, claims) in by_key {
			match Self::resolve_field(&key, &claims, ctx, scored_at) {
				Ok(score) => field_scores.push(score),
				Err(err) => {
					debug!("skipping field {:?}: {}", key, err);
				}
			}
		}

		let overall_confidence = if field_scores.is_empty() {
			0.0
		} else {
			field_scores.iter().map(|f| f.confidence).sum::<f64>() / field_scores.len() as f64
		};

		ScoringResult {
			entity_id: ctx.entity_id,
			field_scores,
			overall_confidence,
			scored_at,
		}
	}

	fn resolve_field(
		key: &str,
		claims: &[&MetadataClaim],
		ctx: &ScoringContext,
		scored_at: DateTime<Utc>,
	) -> Result<FieldScore, FieldResolutionError> {
		if claims.is_empty() {
			return Err(FieldResolutionError::Empty);
		}

		if let Some(locked) = Self::most_recent_lock(claims) {
			return Ok(FieldScore {
				key: key.to_string(),
				value: locked.claim_value.clone(),
				confidence: 1.0,
				winning_provider_id: Some(locked.provider_id.clone()),
				conflicted: false,
			});
		}

		let weighted: Vec<(f64, &MetadataClaim)> = claims
			.iter()
			.map(|claim| {
				let effective_weight = Self::effective_weight(&claim.provider_id, key, ctx);
				let stale_factor = Self::stale_factor(claim.claimed_at, scored_at, &ctx.config);
				let raw = (claim.confidence * effective_weight * stale_factor).max(0.0);
				(raw, *claim)
			})
			.collect();

		let total_raw: f64 = weighted.iter().map(|(raw, _)| raw).sum();
		let uniform_share = 1.0 / weighted.len() as f64;

		let mut groups: BTreeMap<String, (f64, &MetadataClaim, f64)> = BTreeMap::new();
		for (raw, claim) in &weighted {
			let normalised_weight = if total_raw > 0.0 { raw / total_raw } else { uniform_share };
			let value_key = claim.claim_value.trim().to_lowercase();
			let entry = groups.entry(value_key).or_insert((0.0, *claim, 0.0));
			entry.0 += normalised_weight;
			if *raw > entry.2 {
				entry.1 = *claim;
				entry.2 = *raw;
			}
		}

		let mut ranked: Vec<(&String, &(f64, &MetadataClaim, f64))> = groups.iter().collect();
		ranked.sort_by(|a, b| b.1 .0.partial_cmp(&a.1 .0).unwrap().then_with(|| a.0.cmp(b.0)));

		let (_, &(winner_total, winner_claim, _)) = ranked[0];
		let runner_up_total = ranked.get(1).map(|(_, (total, _, _))| *total).unwrap_or(0.0);
		let conflicted = winner_total > 0.0 && (runner_up_total / winner_total) >= (1.0 - ctx.config.conflict_epsilon);

		Ok(FieldScore {
			key: key.to_string(),
			value: winner_claim.claim_value.clone(),
			confidence: winner_total,
			winning_provider_id: Some(winner_claim.provider_id.clone()),
			conflicted,
		})
	}

	fn most_recent_lock<'a>(claims: &[&'a MetadataClaim]) -> Option<&'a MetadataClaim> {
		claims
			.iter()
			.filter(|c| c.is_user_locked)
			.max_by(|a, b| a.claimed_at.cmp(&b.claimed_at).then_with(|| a.provider_id.cmp(&b.provider_id)))
			.copied()
	}

	fn effective_weight(provider_id: &str, key: &str, ctx: &ScoringContext) -> f64 {
		ctx.provider_field_weights
			.get(provider_id)
			.and_then(|fields| fields.get(key))
			.copied()
			.or_else(|| ctx.provider_weights.get(provider_id).copied())
			.unwrap_or(1.0)
	}

	fn stale_factor(claimed_at: DateTime<Utc>, scored_at: DateTime<Utc>, config: &ScoringConfig) -> f64 {
		if config.stale_claim_decay_days == 0 {
			return 1.0;
		}
		let age_days = (scored_at - claimed_at).num_days();
		if age_days > config.stale_claim_decay_days as i64 {
			config.stale_claim_decay_factor
		} else {
			1.0
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::{EntityId, WorkId};
	use pretty_assertions::assert_eq;
	use rand::seq::SliceRandom;

	fn claim(provider: &str, key: &str, value: &str, confidence: f64) -> MetadataClaim {
		MetadataClaim {
			id: uuid::Uuid::new_v4(),
			entity_id: EntityId::work(WorkId::new()),
			provider_id: provider.to_string(),
			claim_key: key.to_string(),
			claim_value: value.to_string(),
			confidence,
			claimed_at: Utc::now(),
			is_user_locked: false,
		}
	}

	fn ctx(claims: Vec<MetadataClaim>, weights: &[(&str, f64)]) -> ScoringContext {
		ScoringContext {
			entity_id: EntityId::work(WorkId::new()),
			claims,
			provider_weights: weights.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
			provider_field_weights: HashMap::new(),
			config: ScoringConfig::default(),
		}
	}

	#[test]
	fn empty_claim_set_yields_zero_confidence() {
		let result = ScoringEngine::score(&ctx(vec![], &[]));
		assert_eq!(result.overall_confidence, 0.0);
		assert!(result.field_scores.is_empty());
	}

	#[test]
	fn single_claim_per_field_is_not_conflicted_and_fully_confident() {
		let claims = vec![claim("local-filesystem", "title", "Dune", 1.0)];
		let result = ScoringEngine::score(&ctx(claims, &[("local-filesystem", 1.0)]));
		assert_eq!(result.field_scores.len(), 1);
		let field = &result.field_scores[0];
		assert_eq!(field.value, "Dune");
		assert_eq!(field.confidence, 1.0);
		assert!(!field.conflicted);
	}

	#[test]
	fn two_providers_disagree_without_crossing_conflict_epsilon() {
		// Scenario 2 from spec §8: local weight 1.0/confidence 1.0 vs
		// an external provider at weight 0.7/confidence 1.0.
		let claims = vec![
			claim("local-filesystem", "title", "Dune", 1.0),
			claim("external", "title", "Dune: Book One", 1.0),
		];
		let result = ScoringEngine::score(&ctx(claims, &[("local-filesystem", 1.0), ("external", 0.7)]));
		let field = &result.field_scores[0];
		assert_eq!(field.value, "dune");
		assert!(!field.conflicted);
	}

	#[test]
	fn user_lock_dominates_regardless_of_weight_or_confidence() {
		let mut locked = claim("user", "title", "Dune (Special Edition)", 1.0);
		locked.is_user_locked = true;
		let claims = vec![
			claim("local-filesystem", "title", "Dune", 1.0),
			claim("external", "title", "Dune: Book One", 1.0),
			locked,
		];
		let result = ScoringEngine::score(&ctx(claims, &[("local-filesystem", 1.0), ("external", 0.7)]));
		let field = &result.field_scores[0];
		assert_eq!(field.value, "Dune (Special Edition)");
		assert_eq!(field.confidence, 1.0);
		assert!(!field.conflicted);
	}

	#[test]
	fn user_lock_winner_is_the_most_recently_claimed_lock() {
		let mut older = claim("user", "title", "First Lock", 1.0);
		older.is_user_locked = true;
		older.claimed_at = Utc::now() - chrono::Duration::days(5);
		let mut newer = claim("user", "title", "Second Lock", 1.0);
		newer.is_user_locked = true;

		let result = ScoringEngine::score(&ctx(vec![older, newer], &[]));
		assert_eq!(result.field_scores[0].value, "Second Lock");
	}

	#[test]
	fn all_zero_weights_distribute_uniformly_without_conflict() {
		let claims = vec![
			claim("a", "title", "Dune", 0.0),
			claim("b", "title", "Dune", 0.0),
		];
		let result = ScoringEngine::score(&ctx(claims, &[("a", 0.0), ("b", 0.0)]));
		let field = &result.field_scores[0];
		assert!(!field.conflicted);
		assert_eq!(field.confidence, 1.0);
	}

	#[test]
	fn runner_up_exactly_at_epsilon_boundary_is_conflicted() {
		// winner=1.0, runner-up weight chosen so ratio hits exactly
		// 1 - epsilon (0.95 with the default config).
		let claims = vec![claim("a", "title", "Dune", 0.95), claim("b", "title", "Dune Deluxe", 1.0)];
		let result = ScoringEngine::score(&ctx(claims, &[("a", 1.0), ("b", 1.0)]));
		assert!(result.field_scores[0].conflicted);
	}

	#[test]
	fn stale_decay_days_zero_disables_decay() {
		let mut stale = claim("a", "title", "Dune", 1.0);
		stale.claimed_at = Utc::now() - chrono::Duration::days(10_000);
		let mut c = ctx(vec![stale], &[("a", 1.0)]);
		c.config.stale_claim_decay_days = 0;
		let result = ScoringEngine::score(&c);
		assert_eq!(result.field_scores[0].confidence, 1.0);
	}

	#[test]
	fn stale_claim_is_decayed_when_older_than_threshold() {
		let mut fresh = claim("a", "title", "Dune", 1.0);
		let mut stale = claim("b", "title", "Dune Deluxe", 1.0);
		stale.claimed_at = Utc::now() - chrono::Duration::days(365);
		fresh.claimed_at = Utc::now();
		let result = ScoringEngine::score(&ctx(vec![fresh, stale], &[("a", 1.0), ("b", 1.0)]));
		// fresh raw = 1.0, stale raw = 0.8 -> winner is fresh, and the
		// decayed runner-up keeps the field out of conflict.
		assert_eq!(result.field_scores[0].value, "dune");
		assert!(!result.field_scores[0].conflicted);
	}

	#[test]
	fn scoring_is_deterministic_under_claim_permutation() {
		let mut claims = vec![
			claim("a", "title", "Dune", 0.9),
			claim("b", "title", "Dune Deluxe", 0.3),
			claim("c", "isbn", "9780441013593", 1.0),
			claim("d", "author", "Frank Herbert", 0.8),
		];
		let baseline = ScoringEngine::score(&ctx(claims.clone(), &[]));

		let mut rng = rand::thread_rng();
		for _ in 0..20 {
			claims.shuffle(&mut rng);
			let result = ScoringEngine::score(&ctx(claims.clone(), &[]));
			let mut baseline_sorted = baseline.field_scores.clone();
			let mut result_sorted = result.field_scores.clone();
			baseline_sorted.sort_by(|a, b| a.key.cmp(&b.key));
			result_sorted.sort_by(|a, b| a.key.cmp(&b.key));
			for (b, r) in baseline_sorted.iter().zip(result_sorted.iter()) {
				assert_eq!(b.key, r.key);
				assert_eq!(b.value, r.value);
				assert!((b.confidence - r.confidence).abs() < 1e-9);
				assert_eq!(b.conflicted, r.conflicted);
			}
		}
	}

	#[test]
	fn a_failing_field_does_not_abort_other_fields() {
		let claims = vec![
			claim("a", "title", "Dune", 1.0),
			claim("a", "isbn", "", 0.0),
		];
		let result = ScoringEngine::score(&ctx(claims, &[("a", 1.0)]));
		assert_eq!(result.field_scores.len(), 2);
		assert!(result.field_scores.iter().any(|f| f.key == "title" && f.value == "Dune"));
	}

	#[test]
	fn normalised_weights_sum_to_one_per_field() {
		let claims = vec![
			claim("a", "title", "Dune", 0.3),
			claim("b", "title", "Dune Deluxe", 0.6),
			claim("c", "title", "Dune 2", 0.1),
		];
		let c = ctx(claims.clone(), &[("a", 1.0), ("b", 0.5), ("c", 2.0)]);
		let total_raw: f64 = claims
			.iter()
			.map(|cl| cl.confidence * ScoringEngine::effective_weight(&cl.provider_id, "title", &c))
			.sum();
		let normalised_sum: f64 = claims
			.iter()
			.map(|cl| (cl.confidence * ScoringEngine::effective_weight(&cl.provider_id, "title", &c)) / total_raw)
			.sum();
		assert!((normalised_sum - 1.0).abs() < 1e-9);
	}

	#[test]
	fn case_insensitive_field_grouping() {
		let claims = vec![claim("a", "Title", "Dune", 1.0), claim("b", "TITLE", "Dune", 1.0)];
		let result = ScoringEngine::score(&ctx(claims, &[("a", 1.0), ("b", 1.0)]));
		assert_eq!(result.field_scores.len(), 1);
		assert_eq!(result.field_scores[0].key, "title");
	}
}
