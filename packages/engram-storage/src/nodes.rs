use serde_json::Value;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{MemoryNode, NodeNote, ScoredNode},
};

pub struct NewNode<'a> {
	pub entity_key: Uuid,
	pub user_id: &'a str,
	pub kind: &'a str,
	pub name: &'a str,
	pub name_norm: &'a str,
	pub description: Option<&'a str>,
	pub confidence: f32,
	pub source_ref: &'a Value,
	pub salience: f32,
	pub now: OffsetDateTime,
}

pub struct NodeScalarUpdate<'a> {
	pub user_id: &'a str,
	pub entity_key: Uuid,
	pub name: Option<&'a str>,
	pub name_norm: Option<&'a str>,
	pub description: Option<&'a str>,
	pub confidence: Option<f32>,
	pub source_ref: &'a Value,
	pub now: OffsetDateTime,
}

pub struct NewNote<'a> {
	pub content: &'a str,
	pub added_by: &'a str,
	pub source_ref: &'a Value,
	pub expires_at: Option<OffsetDateTime>,
}

/// Unconditional insert. A racing create for the same derived key surfaces
/// as `Conflict`; the caller falls back to the update path instead of
/// retrying the insert.
pub async fn insert_node(executor: &mut PgConnection, node: NewNode<'_>) -> Result<MemoryNode> {
	let row = sqlx::query_as::<_, MemoryNode>(
		"\
INSERT INTO memory_nodes (
	entity_key,
	user_id,
	kind,
	name,
	name_norm,
	description,
	confidence,
	source_ref,
	salience,
	state,
	access_count,
	recall_frequency,
	last_accessed_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'candidate', 0, 0, NULL, $10, $10)
RETURNING *",
	)
	.bind(node.entity_key)
	.bind(node.user_id)
	.bind(node.kind)
	.bind(node.name)
	.bind(node.name_norm)
	.bind(node.description)
	.bind(node.confidence)
	.bind(node.source_ref)
	.bind(node.salience)
	.bind(node.now)
	.fetch_one(&mut *executor)
	.await
	.map_err(|err| {
		Error::from_insert(
			err,
			&format!(
				"memory node already exists; user_id={} entity_key={}",
				node.user_id, node.entity_key
			),
		)
	})?;

	Ok(row)
}

pub async fn fetch_node(
	executor: &mut PgConnection,
	user_id: &str,
	entity_key: Uuid,
) -> Result<Option<MemoryNode>> {
	let row = sqlx::query_as::<_, MemoryNode>(
		"SELECT * FROM memory_nodes WHERE user_id = $1 AND entity_key = $2",
	)
	.bind(user_id)
	.bind(entity_key)
	.fetch_optional(&mut *executor)
	.await?;

	Ok(row)
}

/// Unscoped fetch for internal consumers (the embedding worker) that hold
/// only an entity key. User-facing reads go through `fetch_node`.
pub async fn fetch_node_by_key(
	executor: &mut PgConnection,
	entity_key: Uuid,
) -> Result<Option<MemoryNode>> {
	let row = sqlx::query_as::<_, MemoryNode>("SELECT * FROM memory_nodes WHERE entity_key = $1")
		.bind(entity_key)
		.fetch_optional(&mut *executor)
		.await?;

	Ok(row)
}

pub async fn fetch_nodes(
	executor: &mut PgConnection,
	user_id: &str,
	entity_keys: &[Uuid],
) -> Result<Vec<MemoryNode>> {
	if entity_keys.is_empty() {
		return Ok(vec![]);
	}

	let rows = sqlx::query_as::<_, MemoryNode>(
		"SELECT * FROM memory_nodes WHERE user_id = $1 AND entity_key = ANY($2)",
	)
	.bind(user_id)
	.bind(entity_keys)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Additive scalar update. Absent fields keep their stored value; the
/// update fails with `NotFound` when the key does not exist rather than
/// silently creating a node.
pub async fn update_node_scalars(
	executor: &mut PgConnection,
	update: NodeScalarUpdate<'_>,
) -> Result<MemoryNode> {
	let row = sqlx::query_as::<_, MemoryNode>(
		"\
UPDATE memory_nodes
SET
	name = COALESCE($3, name),
	name_norm = COALESCE($4, name_norm),
	description = COALESCE($5, description),
	confidence = COALESCE($6, confidence),
	source_ref = $7,
	updated_at = $8
WHERE user_id = $1 AND entity_key = $2
RETURNING *",
	)
	.bind(update.user_id)
	.bind(update.entity_key)
	.bind(update.name)
	.bind(update.name_norm)
	.bind(update.description)
	.bind(update.confidence)
	.bind(update.source_ref)
	.bind(update.now)
	.fetch_optional(&mut *executor)
	.await?;

	row.ok_or_else(|| {
		Error::NotFound(format!(
			"memory node not found; user_id={} entity_key={}",
			update.user_id, update.entity_key
		))
	})
}

/// Appends notes, then drops the oldest rows beyond `cap` so the list stays
/// bounded. Both steps run on the caller's transaction.
pub async fn append_node_notes(
	executor: &mut PgConnection,
	entity_key: Uuid,
	notes: &[NewNote<'_>],
	cap: u32,
	now: OffsetDateTime,
) -> Result<()> {
	for note in notes {
		sqlx::query(
			"\
INSERT INTO node_notes (note_id, entity_key, content, added_by, source_ref, added_at, expires_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
		)
		.bind(Uuid::new_v4())
		.bind(entity_key)
		.bind(note.content)
		.bind(note.added_by)
		.bind(note.source_ref)
		.bind(now)
		.bind(note.expires_at)
		.execute(&mut *executor)
		.await?;
	}

	sqlx::query(
		"\
DELETE FROM node_notes
WHERE entity_key = $1
	AND note_id NOT IN (
		SELECT note_id
		FROM node_notes
		WHERE entity_key = $1
		ORDER BY added_at DESC, note_id DESC
		LIMIT $2
	)",
	)
	.bind(entity_key)
	.bind(cap as i64)
	.execute(&mut *executor)
	.await?;

	Ok(())
}

pub async fn list_node_notes(
	executor: &mut PgConnection,
	entity_key: Uuid,
) -> Result<Vec<NodeNote>> {
	let rows = sqlx::query_as::<_, NodeNote>(
		"\
SELECT *
FROM node_notes
WHERE entity_key = $1
ORDER BY added_at ASC, note_id ASC",
	)
	.bind(entity_key)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Exact tier: case-insensitive name equality via the normalized column,
/// first (oldest) hit wins.
pub async fn find_exact(
	executor: &mut PgConnection,
	user_id: &str,
	kind: &str,
	name_norm: &str,
) -> Result<Option<MemoryNode>> {
	let row = sqlx::query_as::<_, MemoryNode>(
		"\
SELECT *
FROM memory_nodes
WHERE user_id = $1 AND kind = $2 AND name_norm = $3
ORDER BY created_at ASC
LIMIT 1",
	)
	.bind(user_id)
	.bind(kind)
	.bind(name_norm)
	.fetch_optional(&mut *executor)
	.await?;

	Ok(row)
}

/// All candidate names for a user and kind; the fuzzy tier scores these in
/// process since edit distance has no index-friendly form.
pub async fn list_kind_names(
	executor: &mut PgConnection,
	user_id: &str,
	kind: &str,
) -> Result<Vec<(Uuid, String, Option<String>)>> {
	let rows = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
		"\
SELECT entity_key, name, description
FROM memory_nodes
WHERE user_id = $1 AND kind = $2
ORDER BY created_at ASC",
	)
	.bind(user_id)
	.bind(kind)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Embedding tier and retrieval vector search: native pgvector cosine
/// ranking over the stored node embeddings.
pub async fn search_by_embedding(
	executor: &mut PgConnection,
	user_id: &str,
	kind: &str,
	query_vec_text: &str,
	embedding_version: &str,
	min_score: f32,
	limit: u32,
) -> Result<Vec<ScoredNode>> {
	let rows = sqlx::query_as::<_, ScoredNode>(
		"\
SELECT
	n.*,
	(1 - (e.vec <=> $3::text::vector))::real AS similarity
FROM node_embeddings e
JOIN memory_nodes n ON n.entity_key = e.entity_key
WHERE n.user_id = $1
	AND n.kind = $2
	AND e.embedding_version = $4
	AND (1 - (e.vec <=> $3::text::vector)) >= $5
ORDER BY similarity DESC
LIMIT $6",
	)
	.bind(user_id)
	.bind(kind)
	.bind(query_vec_text)
	.bind(embedding_version)
	.bind(min_score)
	.bind(limit as i64)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

pub async fn upsert_node_embedding(
	executor: &mut PgConnection,
	entity_key: Uuid,
	embedding_version: &str,
	embedding_dim: i32,
	vec_text: &str,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO node_embeddings (entity_key, embedding_version, embedding_dim, vec, created_at)
VALUES ($1, $2, $3, $4::text::vector, now())
ON CONFLICT (entity_key, embedding_version) DO UPDATE
SET
	embedding_dim = EXCLUDED.embedding_dim,
	vec = EXCLUDED.vec,
	created_at = now()",
	)
	.bind(entity_key)
	.bind(embedding_version)
	.bind(embedding_dim)
	.bind(vec_text)
	.execute(&mut *executor)
	.await?;

	Ok(())
}

/// The user's distinguished owner node, created lazily. Concurrent callers
/// race benignly on the deterministic key.
pub async fn ensure_owner_node(
	executor: &mut PgConnection,
	user_id: &str,
	owner_key: Uuid,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO memory_nodes (
	entity_key,
	user_id,
	kind,
	name,
	name_norm,
	description,
	confidence,
	source_ref,
	salience,
	state,
	access_count,
	recall_frequency,
	last_accessed_at,
	created_at,
	updated_at
)
VALUES ($1, $2, 'owner', $3, $3, NULL, 1.0, '{}'::jsonb, 1.0, 'core', 0, 0, NULL, $4, $4)
ON CONFLICT (entity_key) DO NOTHING",
	)
	.bind(owner_key)
	.bind(user_id)
	.bind(user_id)
	.bind(now)
	.execute(&mut *executor)
	.await?;

	Ok(())
}

/// Provenance row linking a node back to the conversation that mentioned
/// it. Idempotent per (entity_key, conversation_id) so batch redelivery
/// never duplicates it.
pub async fn record_mention(
	executor: &mut PgConnection,
	user_id: &str,
	entity_key: Uuid,
	conversation_id: &str,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO node_mentions (mention_id, user_id, entity_key, conversation_id, created_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (entity_key, conversation_id) DO NOTHING",
	)
	.bind(Uuid::new_v4())
	.bind(user_id)
	.bind(entity_key)
	.bind(conversation_id)
	.bind(now)
	.execute(&mut *executor)
	.await?;

	Ok(())
}

/// One read-side touch: bumps counters, boosts salience toward 1.0, and
/// advances state without ever downgrading it.
pub async fn touch_node(
	executor: &mut PgConnection,
	user_id: &str,
	entity_key: Uuid,
	boost: f32,
	core_access_threshold: i64,
	now: OffsetDateTime,
) -> Result<MemoryNode> {
	let row = sqlx::query_as::<_, MemoryNode>(
		"\
UPDATE memory_nodes
SET
	access_count = access_count + 1,
	recall_frequency = recall_frequency + 1,
	last_accessed_at = $3,
	salience = LEAST(1.0, salience + $4)::real,
	state = CASE
		WHEN state = 'core' OR access_count + 1 >= $5 THEN 'core'
		ELSE 'active'
	END
WHERE user_id = $1 AND entity_key = $2
RETURNING *",
	)
	.bind(user_id)
	.bind(entity_key)
	.bind(now)
	.bind(boost)
	.bind(core_access_threshold)
	.fetch_optional(&mut *executor)
	.await?;

	row.ok_or_else(|| {
		Error::NotFound(format!("memory node not found; user_id={user_id} entity_key={entity_key}"))
	})
}

/// Administrative deletion. Edge, note, embedding and mention rows go with
/// the node through cascading constraints.
pub async fn delete_node(
	executor: &mut PgConnection,
	user_id: &str,
	entity_key: Uuid,
) -> Result<()> {
	let res = sqlx::query("DELETE FROM memory_nodes WHERE user_id = $1 AND entity_key = $2")
		.bind(user_id)
		.bind(entity_key)
		.execute(&mut *executor)
		.await?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound(format!(
			"memory node not found; user_id={user_id} entity_key={entity_key}"
		)));
	}

	Ok(())
}
