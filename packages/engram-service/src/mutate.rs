use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use engram_domain::{
	fact::{self, Fact},
	keys,
	mention::Mention,
	salience::INITIAL_SALIENCE,
};
use engram_storage::{
	edges::{self, EdgeUpsert},
	models::MemoryNode,
	nodes::{self, NewNode, NewNote, NodeScalarUpdate},
	outbox,
};
use sqlx::{Postgres, Transaction};

use crate::{Engine, Result, embedding_version};

impl Engine {
	/// Create entry point. Derives the deterministic key and attempts an
	/// unconditional insert; a concurrent resolution for the same mention
	/// loses the race with a clean `Conflict` and must fall back to
	/// `update_entity`. The mention-provenance row is written in the same
	/// transaction; the embedding is generated later by the worker, after
	/// the node durably exists.
	pub async fn create_entity(
		&self,
		user_id: &str,
		added_by: &str,
		conversation_id: &str,
		mention: &Mention,
		now: OffsetDateTime,
	) -> Result<MemoryNode> {
		let entity_key = keys::entity_key_for(user_id, mention.kind, &mention.text);
		let name_norm = keys::normalize_name(&mention.text);
		let source_ref = source_ref(conversation_id, added_by);
		let mut tx = self.db.pool.begin().await?;
		let node = nodes::insert_node(&mut tx, NewNode {
			entity_key,
			user_id,
			kind: mention.kind.as_str(),
			name: mention.text.trim(),
			name_norm: &name_norm,
			description: mention.description.as_deref(),
			confidence: mention.confidence,
			source_ref: &source_ref,
			salience: INITIAL_SALIENCE,
			now,
		})
		.await?;

		nodes::record_mention(&mut tx, user_id, entity_key, conversation_id, now).await?;
		self.apply_facts(&mut tx, user_id, added_by, entity_key, &mention.facts, &source_ref, now)
			.await?;
		outbox::enqueue(&mut tx, entity_key, outbox::OP_UPSERT, &embedding_version(&self.cfg), now)
			.await?;

		tx.commit().await?;

		Ok(node)
	}

	/// Additive update entry point. Fails with `NotFound` when the key does
	/// not exist — silent creation here would defeat the create path's
	/// idempotency guarantees. Scalars replace, notes append up to the cap,
	/// and any change to the embedded text re-enqueues regeneration.
	pub async fn update_entity(
		&self,
		user_id: &str,
		added_by: &str,
		conversation_id: &str,
		entity_key: Uuid,
		mention: &Mention,
		now: OffsetDateTime,
	) -> Result<MemoryNode> {
		let source_ref = source_ref(conversation_id, added_by);
		let mut tx = self.db.pool.begin().await?;
		let node = nodes::update_node_scalars(&mut tx, NodeScalarUpdate {
			user_id,
			entity_key,
			name: None,
			name_norm: None,
			description: mention.description.as_deref(),
			confidence: Some(mention.confidence),
			source_ref: &source_ref,
			now,
		})
		.await?;

		nodes::record_mention(&mut tx, user_id, entity_key, conversation_id, now).await?;

		let (intrinsic, _) = fact::partition(&mention.facts);
		let embedded_text_changed = mention.description.is_some() || !intrinsic.is_empty();

		self.apply_facts(&mut tx, user_id, added_by, entity_key, &mention.facts, &source_ref, now)
			.await?;

		if embedded_text_changed {
			outbox::enqueue(
				&mut tx,
				entity_key,
				outbox::OP_UPSERT,
				&embedding_version(&self.cfg),
				now,
			)
			.await?;
		}

		tx.commit().await?;

		Ok(node)
	}

	/// Routes classified facts to their storage side: intrinsic facts
	/// become node notes, relational facts become owner→entity edges with
	/// edge notes. The same fact never lands on both sides.
	async fn apply_facts(
		&self,
		tx: &mut Transaction<'_, Postgres>,
		user_id: &str,
		added_by: &str,
		entity_key: Uuid,
		facts: &[Fact],
		source_ref: &Value,
		now: OffsetDateTime,
	) -> Result<()> {
		let (intrinsic, relational) = fact::partition(facts);
		let cap = self.cfg.memory.max_notes;

		if !intrinsic.is_empty() {
			let notes: Vec<NewNote<'_>> = intrinsic
				.iter()
				.map(|fact| NewNote {
					content: fact.content.as_str(),
					added_by,
					source_ref,
					expires_at: None,
				})
				.collect();

			nodes::append_node_notes(tx, entity_key, &notes, cap, now).await?;
		}

		if relational.is_empty() {
			return Ok(());
		}

		let owner_key = keys::owner_entity_key(user_id);

		nodes::ensure_owner_node(tx, user_id, owner_key, now).await?;

		for fact in relational {
			// mention_gate guarantees relational facts carry a type.
			let Some(relationship_type) = fact.relationship_type.as_deref() else {
				continue;
			};
			let edge = edges::upsert_edge(tx, EdgeUpsert {
				user_id,
				from_key: owner_key,
				to_key: entity_key,
				relationship_type,
				relevance: fact.relevance,
				now,
			})
			.await?;
			let notes = [NewNote {
				content: fact.content.as_str(),
				added_by,
				source_ref,
				expires_at: None,
			}];

			edges::append_edge_notes(tx, edge.edge_id, &notes, cap, now).await?;
		}

		Ok(())
	}

	/// Administrative deletion; edges, notes, embeddings and mention rows
	/// cascade with the node.
	pub async fn delete_entity(&self, user_id: &str, entity_key: Uuid) -> Result<()> {
		let mut conn = self.db.pool.acquire().await?;

		nodes::delete_node(&mut conn, user_id, entity_key).await?;

		Ok(())
	}
}

fn source_ref(conversation_id: &str, added_by: &str) -> Value {
	serde_json::json!({
		"conversation_id": conversation_id,
		"added_by": added_by,
	})
}
