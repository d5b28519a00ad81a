use engram_domain::{fact::Fact, kind::NodeKind, mention::Mention};
use engram_service::ResolveRequest;

use super::{build_engine, count_nodes, stub_providers, test_config, test_db};

fn mention_with_note(note: &str) -> Mention {
	Mention {
		text: "Alex".to_string(),
		kind: NodeKind::Person,
		context: None,
		description: None,
		facts: vec![Fact::intrinsic(note)],
		confidence: 0.7,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn concurrent_resolutions_converge_on_one_node() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping concurrent_resolutions_converge_on_one_node; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");
	let left = engine.resolve_batch(ResolveRequest {
		user_id: "user-1".to_string(),
		conversation_id: "conv-1".to_string(),
		added_by: "ingestion".to_string(),
		mentions: vec![mention_with_note("note-a")],
	});
	let right = engine.resolve_batch(ResolveRequest {
		user_id: "user-1".to_string(),
		conversation_id: "conv-2".to_string(),
		added_by: "ingestion".to_string(),
		mentions: vec![mention_with_note("note-b")],
	});
	let (left, right) = tokio::join!(left, right);
	let left = left.expect("Left resolution failed.");
	let right = right.expect("Right resolution failed.");

	assert!(left.failed_entities.is_empty(), "left: {:?}", left.failed_entities);
	assert!(right.failed_entities.is_empty(), "right: {:?}", right.failed_entities);

	// Whichever interleaving happened, exactly one node exists and both
	// resolutions point at it.
	let mut keys: Vec<_> = left
		.created_entities
		.iter()
		.chain(&left.resolved_entities)
		.chain(&right.created_entities)
		.chain(&right.resolved_entities)
		.filter_map(|outcome| outcome.entity_key)
		.collect();

	keys.sort();
	keys.dedup();

	assert_eq!(keys.len(), 1, "both resolutions must land on the same entity");
	assert_eq!(count_nodes(&engine.db.pool, "user-1", "person").await, 1);

	let notes: Vec<String> =
		sqlx::query_scalar::<_, String>("SELECT content FROM node_notes WHERE entity_key = $1")
			.bind(keys[0])
			.fetch_all(&engine.db.pool)
			.await
			.expect("Failed to list notes.");

	assert!(notes.iter().any(|note| note == "note-a"), "notes: {notes:?}");
	assert!(notes.iter().any(|note| note == "note-b"), "notes: {notes:?}");

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
