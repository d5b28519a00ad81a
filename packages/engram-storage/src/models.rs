use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MemoryNode {
	pub entity_key: Uuid,
	pub user_id: String,
	pub kind: String,
	pub name: String,
	pub name_norm: String,
	pub description: Option<String>,
	pub confidence: f32,
	pub source_ref: Value,
	pub salience: f32,
	pub state: String,
	pub access_count: i64,
	pub recall_frequency: i64,
	pub last_accessed_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct NodeNote {
	pub note_id: Uuid,
	pub entity_key: Uuid,
	pub content: String,
	pub added_by: String,
	pub source_ref: Value,
	pub added_at: OffsetDateTime,
	pub expires_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MemoryEdge {
	pub edge_id: Uuid,
	pub user_id: String,
	pub from_key: Uuid,
	pub to_key: Uuid,
	pub relationship_type: String,
	pub relevance: f32,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct EdgeNote {
	pub note_id: Uuid,
	pub edge_id: Uuid,
	pub content: String,
	pub added_by: String,
	pub source_ref: Value,
	pub added_at: OffsetDateTime,
	pub expires_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ScoredNode {
	#[sqlx(flatten)]
	pub node: MemoryNode,
	pub similarity: f32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct EmbeddingOutboxEntry {
	pub outbox_id: Uuid,
	pub entity_key: Uuid,
	pub op: String,
	pub embedding_version: String,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct NodeMention {
	pub mention_id: Uuid,
	pub user_id: String,
	pub entity_key: Uuid,
	pub conversation_id: String,
	pub created_at: OffsetDateTime,
}
