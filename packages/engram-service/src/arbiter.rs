use engram_domain::{
	mention::Mention,
	resolution::{Candidate, Decision, MatchTier},
};

use crate::{Engine, candidates::fuzzy_score};

pub const REASON_NO_CANDIDATES: &str = "NO_CANDIDATES";
pub const REASON_EXACT_NAME: &str = "EXACT_NAME";
pub const REASON_FUZZY_DISTANCE: &str = "FUZZY_DISTANCE";
pub const REASON_EMBEDDING_SIMILARITY: &str = "EMBEDDING_SIMILARITY";
pub const REASON_BELOW_THRESHOLD: &str = "BELOW_THRESHOLD";
pub const REASON_ARBITER_UNAVAILABLE: &str = "ARBITER_UNAVAILABLE";

/// Deterministic rule backend. Given identical `(mention, candidates)`
/// input it always returns the same decision, so resolutions can be
/// replayed in tests and audited from the reason string alone.
///
/// The bias is conservative throughout: merging two distinct real-world
/// entities corrupts provenance silently, while a duplicate node can be
/// reconciled later. Anything below the acceptance thresholds creates.
pub fn rule_decide(cfg: &engram_config::Resolution, candidates: &[Candidate]) -> Decision {
	if candidates.is_empty() {
		return Decision::unmatched(REASON_NO_CANDIDATES);
	}

	if let Some(exact) = candidates.iter().find(|c| c.match_tier == MatchTier::Exact) {
		return Decision::matched(exact.entity_key, format!("{REASON_EXACT_NAME}: {}", exact.name));
	}

	let min_fuzzy_score = fuzzy_score(cfg.accept_fuzzy_distance, cfg.fuzzy_max_distance);

	if let Some(fuzzy) = candidates
		.iter()
		.filter(|c| c.match_tier == MatchTier::Fuzzy && c.score >= min_fuzzy_score)
		.max_by(|a, b| a.score.total_cmp(&b.score))
	{
		return Decision::matched(
			fuzzy.entity_key,
			format!("{REASON_FUZZY_DISTANCE}: {} score={:.3}", fuzzy.name, fuzzy.score),
		);
	}

	if let Some(embedding) = candidates
		.iter()
		.filter(|c| c.match_tier == MatchTier::Embedding && c.score >= cfg.accept_embedding_score)
		.max_by(|a, b| a.score.total_cmp(&b.score))
	{
		return Decision::matched(
			embedding.entity_key,
			format!("{REASON_EMBEDDING_SIMILARITY}: {} score={:.3}", embedding.name, embedding.score),
		);
	}

	let best =
		candidates.iter().map(|c| c.score).max_by(|a, b| a.total_cmp(b)).unwrap_or_default();

	Decision::unmatched(format!("{REASON_BELOW_THRESHOLD}: best_score={best:.3}"))
}

impl Engine {
	/// Arbitration entry point. An unreachable or misbehaving backend is
	/// never fatal: the decision degrades to "create new" with an
	/// auditable reason.
	pub async fn arbitrate(&self, mention: &Mention, candidates: &[Candidate]) -> Decision {
		match self
			.providers
			.arbiter
			.decide(&self.cfg.providers.arbiter, &self.cfg.resolution, mention, candidates)
			.await
		{
			Ok(decision) => decision,
			Err(err) => {
				tracing::warn!(error = %err, mention = %mention.text, "Arbiter unavailable; creating new entity.");

				Decision::unmatched(format!("{REASON_ARBITER_UNAVAILABLE}: {err}"))
			},
		}
	}
}
