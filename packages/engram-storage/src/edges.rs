use serde_json::Value;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{EdgeNote, MemoryEdge},
	nodes::NewNote,
};

pub struct EdgeUpsert<'a> {
	pub user_id: &'a str,
	pub from_key: Uuid,
	pub to_key: Uuid,
	pub relationship_type: &'a str,
	pub relevance: Option<f32>,
	pub now: OffsetDateTime,
}

/// Creates or merges the edge identified by `(user_id, from_key, to_key,
/// relationship_type)`. Re-asserting a relationship updates the existing
/// row; a missing endpoint fails with `NotFound` before anything is
/// written.
pub async fn upsert_edge(executor: &mut PgConnection, edge: EdgeUpsert<'_>) -> Result<MemoryEdge> {
	let relationship_type = edge.relationship_type.trim();

	if relationship_type.is_empty() {
		return Err(Error::InvalidArgument(
			"edge relationship_type must not be empty".to_string(),
		));
	}

	for (label, key) in [("from_key", edge.from_key), ("to_key", edge.to_key)] {
		let exists: Option<(Uuid,)> = sqlx::query_as(
			"SELECT entity_key FROM memory_nodes WHERE user_id = $1 AND entity_key = $2",
		)
		.bind(edge.user_id)
		.bind(key)
		.fetch_optional(&mut *executor)
		.await?;

		if exists.is_none() {
			return Err(Error::NotFound(format!(
				"edge endpoint not found; user_id={} {label}={key}",
				edge.user_id
			)));
		}
	}

	let row = sqlx::query_as::<_, MemoryEdge>(
		"\
INSERT INTO memory_edges (
	edge_id,
	user_id,
	from_key,
	to_key,
	relationship_type,
	relevance,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, COALESCE($6, 0.5), $7, $7)
ON CONFLICT (user_id, from_key, to_key, relationship_type) DO UPDATE
SET
	relevance = COALESCE($6, memory_edges.relevance),
	updated_at = $7
RETURNING *",
	)
	.bind(Uuid::new_v4())
	.bind(edge.user_id)
	.bind(edge.from_key)
	.bind(edge.to_key)
	.bind(relationship_type)
	.bind(edge.relevance)
	.bind(edge.now)
	.fetch_one(&mut *executor)
	.await?;

	Ok(row)
}

/// Same bounded-append policy as node notes, scoped to one edge.
pub async fn append_edge_notes(
	executor: &mut PgConnection,
	edge_id: Uuid,
	notes: &[NewNote<'_>],
	cap: u32,
	now: OffsetDateTime,
) -> Result<()> {
	for note in notes {
		sqlx::query(
			"\
INSERT INTO edge_notes (note_id, edge_id, content, added_by, source_ref, added_at, expires_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
		)
		.bind(Uuid::new_v4())
		.bind(edge_id)
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
DELETE FROM edge_notes
WHERE edge_id = $1
	AND note_id NOT IN (
		SELECT note_id
		FROM edge_notes
		WHERE edge_id = $1
		ORDER BY added_at DESC, note_id DESC
		LIMIT $2
	)",
	)
	.bind(edge_id)
	.bind(cap as i64)
	.execute(&mut *executor)
	.await?;

	Ok(())
}

pub async fn list_edge_notes(executor: &mut PgConnection, edge_id: Uuid) -> Result<Vec<EdgeNote>> {
	let rows = sqlx::query_as::<_, EdgeNote>(
		"\
SELECT *
FROM edge_notes
WHERE edge_id = $1
ORDER BY added_at ASC, note_id ASC",
	)
	.bind(edge_id)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Edges whose endpoints are both inside the given key set.
pub async fn edges_between(
	executor: &mut PgConnection,
	user_id: &str,
	entity_keys: &[Uuid],
) -> Result<Vec<MemoryEdge>> {
	if entity_keys.is_empty() {
		return Ok(vec![]);
	}

	let rows = sqlx::query_as::<_, MemoryEdge>(
		"\
SELECT *
FROM memory_edges
WHERE user_id = $1 AND from_key = ANY($2) AND to_key = ANY($2)
ORDER BY updated_at DESC",
	)
	.bind(user_id)
	.bind(entity_keys)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Edges with exactly one endpoint inside the key set; the far endpoints
/// are the one-hop neighbors.
pub async fn edges_touching(
	executor: &mut PgConnection,
	user_id: &str,
	entity_keys: &[Uuid],
	limit: u32,
) -> Result<Vec<MemoryEdge>> {
	if entity_keys.is_empty() {
		return Ok(vec![]);
	}

	let rows = sqlx::query_as::<_, MemoryEdge>(
		"\
SELECT *
FROM memory_edges
WHERE user_id = $1
	AND (from_key = ANY($2)) <> (to_key = ANY($2))
ORDER BY relevance DESC, updated_at DESC
LIMIT $3",
	)
	.bind(user_id)
	.bind(entity_keys)
	.bind(limit as i64)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Edges incident to one node, filtered by direction for traversal.
pub async fn edges_for_node(
	executor: &mut PgConnection,
	user_id: &str,
	entity_key: Uuid,
	outgoing: bool,
	incoming: bool,
) -> Result<Vec<MemoryEdge>> {
	let rows = sqlx::query_as::<_, MemoryEdge>(
		"\
SELECT *
FROM memory_edges
WHERE user_id = $1
	AND (($2 AND from_key = $3) OR ($4 AND to_key = $3))
ORDER BY relevance DESC, updated_at DESC",
	)
	.bind(user_id)
	.bind(outgoing)
	.bind(entity_key)
	.bind(incoming)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Administrative deletion of a single edge.
pub async fn delete_edge(executor: &mut PgConnection, user_id: &str, edge_id: Uuid) -> Result<()> {
	let res = sqlx::query("DELETE FROM memory_edges WHERE user_id = $1 AND edge_id = $2")
		.bind(user_id)
		.bind(edge_id)
		.execute(&mut *executor)
		.await?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound(format!(
			"memory edge not found; user_id={user_id} edge_id={edge_id}"
		)));
	}

	Ok(())
}
