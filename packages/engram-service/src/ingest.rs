use serde::{Deserialize, Serialize};
use serde_json::Value;

use engram_domain::{kind::NodeKind, mention::Mention};

use crate::{
	Engine, Error, Result,
	resolve::{EntityOutcome, ResolutionOp, ResolveRequest, ResolveResponse},
};

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract entity mentions from a conversation transcript. Return JSON only: \
{\"mentions\": [{\"text\": string, \"kind\": \"person\"|\"concept\"|\"entity\", \
\"description\": string?, \"context\": string?, \"confidence\": number, \
\"facts\": [{\"class\": \"intrinsic\"|\"relational\", \"content\": string, \
\"relationship_type\": string?, \"relevance\": number?}]}]}. \
Classify every fact: intrinsic facts describe what the entity is; relational \
facts describe how the speaker relates to it and must carry a \
relationship_type. Never put the same fact in both classes.";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestRequest {
	pub user_id: String,
	pub conversation_id: String,
	#[serde(default)]
	pub transcript: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub summary: Option<String>,
	/// Pre-extracted mentions. When present, the extractor provider is not
	/// consulted at all.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mentions: Option<Vec<Mention>>,
	#[serde(default = "default_added_by")]
	pub added_by: String,
}

fn default_added_by() -> String {
	"ingestion".to_string()
}

pub type IngestResponse = ResolveResponse;

impl Engine {
	/// Background-job entry point: one conversation in, per-entity
	/// outcomes out. Re-delivery of the same job is safe end-to-end —
	/// creation keys are deterministic and provenance rows are keyed by
	/// conversation.
	pub async fn ingest(&self, req: IngestRequest) -> Result<IngestResponse> {
		let IngestRequest { user_id, conversation_id, transcript, summary, mentions, added_by } =
			req;
		let (mentions, mut malformed) = match mentions {
			Some(mentions) => (mentions, Vec::new()),
			None => {
				if transcript.trim().is_empty() {
					return Err(Error::InvalidRequest {
						message: "transcript is required when mentions are not provided."
							.to_string(),
					});
				}

				let Some(extractor_cfg) = self.cfg.providers.extractor.as_ref() else {
					return Err(Error::InvalidRequest {
						message:
							"providers.extractor is not configured; pass pre-extracted mentions."
								.to_string(),
					});
				};
				let mut content = transcript.clone();

				if let Some(summary) = summary.as_deref().filter(|s| !s.trim().is_empty()) {
					content.push_str("\n\nSummary:\n");
					content.push_str(summary);
				}

				let messages = [
					serde_json::json!({ "role": "system", "content": EXTRACTION_SYSTEM_PROMPT }),
					serde_json::json!({ "role": "user", "content": content }),
				];
				let payload =
					self.providers.extractor.extract(extractor_cfg, &messages).await.map_err(
						|err| Error::Provider { message: format!("Extractor failed: {err}.") },
					)?;

				parse_extracted_mentions(&payload)?
			},
		};
		let mut response = self
			.resolve_batch(ResolveRequest { user_id, conversation_id, added_by, mentions })
			.await?;

		response.failed_entities.append(&mut malformed);

		Ok(response)
	}
}

/// Validates the extractor payload. Well-formed entries resolve; malformed
/// entries become per-entity rejections, surfaced rather than defaulted.
fn parse_extracted_mentions(payload: &Value) -> Result<(Vec<Mention>, Vec<EntityOutcome>)> {
	let entries = payload
		.get("mentions")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::InvalidRequest {
			message: "Extractor payload is missing the mentions array.".to_string(),
		})?;
	let mut mentions = Vec::with_capacity(entries.len());
	let mut rejected = Vec::new();

	for entry in entries {
		match serde_json::from_value::<Mention>(entry.clone()) {
			Ok(m) => mentions.push(m),
			Err(err) => {
				let text = entry
					.get("text")
					.and_then(|v| v.as_str())
					.unwrap_or("<invalid>")
					.to_string();
				let kind = entry
					.get("kind")
					.and_then(|v| v.as_str())
					.and_then(NodeKind::parse)
					.unwrap_or(NodeKind::Entity);

				rejected.push(EntityOutcome {
					mention_text: text,
					kind,
					op: ResolutionOp::Rejected,
					entity_key: None,
					reason: format!("EXTRACTOR_INVALID_MENTION: {err}"),
				});
			},
		}
	}

	Ok((mentions, rejected))
}
