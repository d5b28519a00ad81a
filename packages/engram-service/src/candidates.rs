use std::collections::HashSet;

use engram_domain::{
	fuzzy, keys,
	mention::Mention,
	resolution::{Candidate, MatchTier},
};
use engram_storage::nodes;

use crate::{Engine, Result, embedding_version};

/// Score assigned to a fuzzy candidate at a given edit distance; closer
/// names score higher, and the arbiter derives its acceptance threshold
/// through the same mapping.
pub(crate) fn fuzzy_score(distance: u32, max_distance: u32) -> f32 {
	1.0 - distance as f32 / (max_distance + 1) as f32
}

impl Engine {
	/// Runs the three matching tiers concurrently and merges their output
	/// into one tier-prioritized, deduplicated, capped candidate list. A
	/// failing tier degrades to "no candidates from that tier" — the other
	/// tiers can still produce a usable set.
	pub async fn generate_candidates(
		&self,
		user_id: &str,
		mention: &Mention,
		mention_embedding: &[f32],
	) -> Result<Vec<Candidate>> {
		let kind = mention.kind.as_str();
		let name_norm = keys::normalize_name(&mention.text);
		let (exact, fuzzy, embedding) = tokio::join!(
			self.exact_tier(user_id, kind, &name_norm),
			self.fuzzy_tier(user_id, kind, &name_norm),
			self.embedding_tier(user_id, kind, mention_embedding),
		);
		let exact = exact.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Exact candidate tier failed.");

			None
		});
		let fuzzy = fuzzy.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Fuzzy candidate tier failed.");

			Vec::new()
		});
		let embedding = embedding.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Embedding candidate tier failed.");

			Vec::new()
		});

		Ok(merge_candidates(exact, fuzzy, embedding, self.cfg.resolution.candidate_limit))
	}

	async fn exact_tier(
		&self,
		user_id: &str,
		kind: &str,
		name_norm: &str,
	) -> Result<Option<Candidate>> {
		let mut conn = self.db.pool.acquire().await?;
		let node = nodes::find_exact(&mut conn, user_id, kind, name_norm).await?;

		Ok(node.map(|node| Candidate {
			entity_key: node.entity_key,
			name: node.name,
			description: node.description,
			match_tier: MatchTier::Exact,
			score: 1.0,
		}))
	}

	async fn fuzzy_tier(&self, user_id: &str, kind: &str, name_norm: &str) -> Result<Vec<Candidate>> {
		let max_distance = self.cfg.resolution.fuzzy_max_distance;
		let limit = self.cfg.resolution.fuzzy_limit as usize;
		let mut conn = self.db.pool.acquire().await?;
		let names = nodes::list_kind_names(&mut conn, user_id, kind).await?;
		let mut scored: Vec<(u32, Candidate)> = Vec::new();

		for (entity_key, name, description) in names {
			let distance = fuzzy::edit_distance(name_norm, &keys::normalize_name(&name)) as u32;

			if distance > max_distance {
				continue;
			}

			scored.push((distance, Candidate {
				entity_key,
				name,
				description,
				match_tier: MatchTier::Fuzzy,
				score: fuzzy_score(distance, max_distance),
			}));
		}

		scored.sort_by(|a, b| a.0.cmp(&b.0));
		scored.truncate(limit);

		Ok(scored.into_iter().map(|(_, candidate)| candidate).collect())
	}

	async fn embedding_tier(&self, user_id: &str, kind: &str, embedding: &[f32]) -> Result<Vec<Candidate>> {
		if embedding.is_empty() {
			return Ok(Vec::new());
		}

		let vec_text = engram_storage::vector_to_pg(embedding);
		let version = embedding_version(&self.cfg);
		let mut conn = self.db.pool.acquire().await?;
		let hits = nodes::search_by_embedding(
			&mut conn,
			user_id,
			kind,
			&vec_text,
			&version,
			self.cfg.resolution.embedding_min_score,
			self.cfg.resolution.embedding_limit,
		)
		.await?;

		Ok(hits
			.into_iter()
			.map(|hit| Candidate {
				entity_key: hit.node.entity_key,
				name: hit.node.name,
				description: hit.node.description,
				match_tier: MatchTier::Embedding,
				score: hit.similarity,
			})
			.collect())
	}
}

/// Merges tier outputs keeping the first occurrence per entity in priority
/// order exact > fuzzy > embedding, capped at `limit`.
pub(crate) fn merge_candidates(
	exact: Option<Candidate>,
	fuzzy: Vec<Candidate>,
	embedding: Vec<Candidate>,
	limit: u32,
) -> Vec<Candidate> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for candidate in exact.into_iter().chain(fuzzy).chain(embedding) {
		if !seen.insert(candidate.entity_key) {
			continue;
		}

		out.push(candidate);

		if out.len() >= limit as usize {
			break;
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use uuid::Uuid;

	fn candidate(entity_key: Uuid, tier: MatchTier, score: f32) -> Candidate {
		Candidate { entity_key, name: "Alex".to_string(), description: None, match_tier: tier, score }
	}

	#[test]
	fn exact_tier_wins_over_duplicates() {
		let key = Uuid::new_v4();
		let other = Uuid::new_v4();
		let merged = merge_candidates(
			Some(candidate(key, MatchTier::Exact, 1.0)),
			vec![candidate(key, MatchTier::Fuzzy, 0.75)],
			vec![candidate(key, MatchTier::Embedding, 0.9), candidate(other, MatchTier::Embedding, 0.8)],
			20,
		);

		assert_eq!(merged.len(), 2);
		assert_eq!(merged[0].entity_key, key);
		assert_eq!(merged[0].match_tier, MatchTier::Exact);
		assert_eq!(merged[1].entity_key, other);
	}

	#[test]
	fn merge_caps_the_overall_list() {
		let fuzzy: Vec<Candidate> =
			(0..10).map(|_| candidate(Uuid::new_v4(), MatchTier::Fuzzy, 0.5)).collect();
		let embedding: Vec<Candidate> =
			(0..10).map(|_| candidate(Uuid::new_v4(), MatchTier::Embedding, 0.8)).collect();
		let merged = merge_candidates(None, fuzzy, embedding, 5);

		assert_eq!(merged.len(), 5);
		assert!(merged.iter().all(|c| c.match_tier == MatchTier::Fuzzy));
	}

	#[test]
	fn fuzzy_score_decreases_with_distance() {
		assert!(fuzzy_score(0, 3) > fuzzy_score(1, 3));
		assert!(fuzzy_score(1, 3) > fuzzy_score(3, 3));
		assert!((fuzzy_score(1, 3) - 0.75).abs() < f32::EPSILON);
	}
}
