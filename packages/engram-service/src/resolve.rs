use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::JoinSet;
use uuid::Uuid;

use engram_domain::{
	keys,
	kind::NodeKind,
	mention::{self, Mention},
};

use crate::{Engine, Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveRequest {
	pub user_id: String,
	pub conversation_id: String,
	#[serde(default = "default_added_by")]
	pub added_by: String,
	pub mentions: Vec<Mention>,
}

fn default_added_by() -> String {
	"ingestion".to_string()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionOp {
	Created,
	Resolved,
	Rejected,
	Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityOutcome {
	pub mention_text: String,
	pub kind: NodeKind,
	pub op: ResolutionOp,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entity_key: Option<Uuid>,
	pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResolveResponse {
	pub created_entities: Vec<EntityOutcome>,
	pub resolved_entities: Vec<EntityOutcome>,
	pub failed_entities: Vec<EntityOutcome>,
}

impl Engine {
	/// Resolves a batch of mentions, one concurrent task per mention. Tasks
	/// are independent; a per-entity failure lands in `failed_entities`
	/// without aborting its siblings, and the whole batch is safely
	/// re-runnable because creation keys are deterministic and note
	/// provenance rows are idempotent.
	pub async fn resolve_batch(&self, req: ResolveRequest) -> Result<ResolveResponse> {
		let ResolveRequest { user_id, conversation_id, added_by, mentions } = req;

		if user_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}
		if conversation_id.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "conversation_id is required.".to_string(),
			});
		}

		let now = OffsetDateTime::now_utc();
		let mut tasks = JoinSet::new();

		for (idx, m) in mentions.into_iter().enumerate() {
			let engine = self.clone();
			let user_id = user_id.clone();
			let conversation_id = conversation_id.clone();
			let added_by = added_by.clone();

			tasks.spawn(async move {
				let outcome =
					engine.resolve_one(&user_id, &added_by, &conversation_id, &m, now).await;

				(idx, outcome)
			});
		}

		let mut outcomes: Vec<(usize, EntityOutcome)> = Vec::new();

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok(entry) => outcomes.push(entry),
				Err(err) => {
					tracing::error!(error = %err, "Resolution task panicked.");
				},
			}
		}

		outcomes.sort_by_key(|(idx, _)| *idx);

		let mut response = ResolveResponse::default();

		for (_, outcome) in outcomes {
			match outcome.op {
				ResolutionOp::Created => response.created_entities.push(outcome),
				ResolutionOp::Resolved => response.resolved_entities.push(outcome),
				ResolutionOp::Rejected | ResolutionOp::Failed =>
					response.failed_entities.push(outcome),
			}
		}

		Ok(response)
	}

	async fn resolve_one(
		&self,
		user_id: &str,
		added_by: &str,
		conversation_id: &str,
		m: &Mention,
		now: OffsetDateTime,
	) -> EntityOutcome {
		if let Err(code) = mention::mention_gate(m, &self.cfg) {
			return outcome(m, ResolutionOp::Rejected, None, code.as_str());
		}

		// The mention is embedded through the same per-kind template as the
		// stored nodes so the similarity tier compares like with like.
		let embed_input =
			m.kind.profile().embedding_input(m.text.trim(), m.context.as_deref().unwrap_or(""), &[]);
		let embedding = match self.embed_text(&embed_input).await {
			Ok(vec) => vec,
			Err(err) => {
				tracing::warn!(error = %err, mention = %m.text, "Embedding failed; skipping entity.");

				return outcome(m, ResolutionOp::Failed, None, &err.to_string());
			},
		};
		let candidates = match self.generate_candidates(user_id, m, &embedding).await {
			Ok(candidates) => candidates,
			Err(err) => return outcome(m, ResolutionOp::Failed, None, &err.to_string()),
		};
		let decision = self.arbitrate(m, &candidates).await;

		if decision.resolved
			&& let Some(entity_key) = decision.entity_key
		{
			return match self
				.update_entity(user_id, added_by, conversation_id, entity_key, m, now)
				.await
			{
				Ok(node) =>
					outcome(m, ResolutionOp::Resolved, Some(node.entity_key), &decision.reason),
				Err(err) => outcome(m, ResolutionOp::Failed, Some(entity_key), &err.to_string()),
			};
		}

		match self.create_entity(user_id, added_by, conversation_id, m, now).await {
			Ok(node) => outcome(m, ResolutionOp::Created, Some(node.entity_key), &decision.reason),
			Err(err) if err.is_conflict() => {
				// Lost the create race to a concurrent resolution of the
				// same mention; merge onto the winner's node instead.
				let entity_key = keys::entity_key_for(user_id, m.kind, &m.text);

				match self
					.update_entity(user_id, added_by, conversation_id, entity_key, m, now)
					.await
				{
					Ok(node) => outcome(
						m,
						ResolutionOp::Resolved,
						Some(node.entity_key),
						"CREATE_CONFLICT_MERGED",
					),
					Err(err) =>
						outcome(m, ResolutionOp::Failed, Some(entity_key), &err.to_string()),
				}
			},
			Err(err) => outcome(m, ResolutionOp::Failed, None, &err.to_string()),
		}
	}
}

fn outcome(m: &Mention, op: ResolutionOp, entity_key: Option<Uuid>, reason: &str) -> EntityOutcome {
	EntityOutcome {
		mention_text: m.text.clone(),
		kind: m.kind,
		op,
		entity_key,
		reason: reason.to_string(),
	}
}
