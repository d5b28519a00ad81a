use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which matching tier produced a candidate. Ordering is priority: when the
/// same entity surfaces from several tiers, the highest tier wins.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
	Embedding,
	Fuzzy,
	Exact,
}

impl MatchTier {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Exact => "exact",
			Self::Fuzzy => "fuzzy",
			Self::Embedding => "embedding",
		}
	}
}

/// Transient resolution candidate. Produced by the candidate generator,
/// consumed by the arbiter within a single resolution call; never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
	pub entity_key: Uuid,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub match_tier: MatchTier,
	pub score: f32,
}

/// Arbiter verdict for one mention. `reason` is a stable, machine-auditable
/// string suitable for audit logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
	pub resolved: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entity_key: Option<Uuid>,
	pub reason: String,
}

impl Decision {
	pub fn matched(entity_key: Uuid, reason: impl Into<String>) -> Self {
		Self { resolved: true, entity_key: Some(entity_key), reason: reason.into() }
	}

	pub fn unmatched(reason: impl Into<String>) -> Self {
		Self { resolved: false, entity_key: None, reason: reason.into() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tier_priority_orders_exact_highest() {
		assert!(MatchTier::Exact > MatchTier::Fuzzy);
		assert!(MatchTier::Fuzzy > MatchTier::Embedding);
	}

	#[test]
	fn unmatched_decision_carries_no_key() {
		let decision = Decision::unmatched("NO_CANDIDATES");

		assert!(!decision.resolved);
		assert!(decision.entity_key.is_none());
		assert_eq!(decision.reason, "NO_CANDIDATES");
	}
}
