//! Hub arbiter: decides whether a newly chained Work joins, waits for
//! review against, or is rejected from a candidate Hub.

use crate::config::ScoringConfig;
use crate::domain::{Disposition, HubId, WorkId};
use crate::events::{EngineEvent, EventPublisher};
use crate::identity::IdentityMatcher;
use crate::store::{Store, StoreResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ArbiterDecision {
	pub work_id: WorkId,
	pub hub_id: Option<HubId>,
	pub score: f64,
	pub disposition: Disposition,
	pub reason: String,
	pub decided_at: DateTime<Utc>,
}

/// A Hub already holding at least one Work, with that Work's canonical
/// values, as seen by the arbiter.
pub struct CandidateHub {
	pub hub_id: HubId,
	pub member_works: Vec<(WorkId, HashMap<String, String>)>,
}

pub struct HubArbiter {
	store: Arc<Store>,
	events: Arc<dyn EventPublisher>,
}

impl HubArbiter {
	pub fn new(store: Arc<Store>, events: Arc<dyn EventPublisher>) -> Self {
		Self { store, events }
	}

	/// Decides placement of `work_id` (whose own canonical values are
	/// `work_values`) against a set of candidate Hubs. Never creates
	/// Hubs and never mutates Works or Hubs.
	pub async fn decide(
		&self,
		work_id: WorkId,
		work_values: &HashMap<String, String>,
		candidates: &[CandidateHub],
		config: &ScoringConfig,
	) -> StoreResult<ArbiterDecision> {
		let mut best: Option<(HubId, f64, String)> = None;

		for candidate in candidates {
			if candidate.member_works.iter().any(|(id, _)| *id == work_id) {
				continue;
			}

			let mut hub_best: Option<(f64, String)> = None;
			for (other_work_id, other_values) in &candidate.member_works {
				let result = IdentityMatcher::compare(work_values, other_values);
				let reason = if result.hard {
					format!("matched identifiers: {}", result.matched_ids.join(", "))
				} else {
					format!("fuzzy similarity {:.3} against work {}", result.similarity, other_work_id)
				};
				if hub_best.as_ref().map(|(score, _)| result.similarity > *score).unwrap_or(true) {
					hub_best = Some((result.similarity, reason));
				}
			}

			if let Some((score, reason)) = hub_best {
				if best.as_ref().map(|(_, best_score, _)| score > *best_score).unwrap_or(true) {
					best = Some((candidate.hub_id, score, reason));
				}
			}
		}

		let decided_at = Utc::now();
		let decision = match best {
			Some((hub_id, score, reason)) => {
				let disposition = score_to_disposition(score, config);
				ArbiterDecision {
					work_id,
					hub_id: if disposition == Disposition::Rejected { None } else { Some(hub_id) },
					score,
					disposition,
					reason,
					decided_at,
				}
			}
			None => ArbiterDecision {
				work_id,
				hub_id: None,
				score: 0.0,
				disposition: Disposition::Rejected,
				reason: "no candidate hubs".to_string(),
				decided_at,
			},
		};

		let (event_type, event) = match decision.disposition {
			Disposition::AutoLinked => (
				"WORK_AUTO_LINKED",
				EngineEvent::WorkAutoLinked {
					work_id,
					hub_id: decision.hub_id.expect("auto-linked decision always carries a hub"),
					reason: decision.reason.clone(),
				},
			),
			Disposition::NeedsReview => (
				"WORK_NEEDS_REVIEW",
				EngineEvent::WorkNeedsReview {
					work_id,
					hub_id: decision.hub_id.expect("needs-review decision always carries a hub"),
					score: decision.score,
				},
			),
			Disposition::Rejected => (
				"WORK_LINK_REJECTED",
				EngineEvent::WorkLinkRejected {
					work_id,
					reason: decision.reason.clone(),
				},
			),
		};

		self.store.log_event(event_type, "work", &work_id.to_string()).await?;
		self.events.publish(event);

		Ok(decision)
	}
}

fn score_to_disposition(score: f64, config: &ScoringConfig) -> Disposition {
	if score >= config.auto_link_threshold {
		Disposition::AutoLinked
	} else if score >= config.conflict_threshold {
		Disposition::NeedsReview
	} else {
		Disposition::Rejected
	}
}
