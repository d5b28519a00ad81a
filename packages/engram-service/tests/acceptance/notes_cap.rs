use engram_domain::{fact::Fact, kind::NodeKind, mention::Mention};
use engram_service::ResolveRequest;

use super::{build_engine, stub_providers, test_config, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn note_growth_is_bounded_oldest_dropped_first() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping note_growth_is_bounded_oldest_dropped_first; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cap = 5_u32;
	let cfg = test_config(test_db.dsn(), cap);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");
	let mut entity_key = None;

	for idx in 0..8 {
		let response = engine
			.resolve_batch(ResolveRequest {
				user_id: "user-1".to_string(),
				conversation_id: format!("conv-{idx}"),
				added_by: "ingestion".to_string(),
				mentions: vec![Mention {
					text: "Alex".to_string(),
					kind: NodeKind::Person,
					context: None,
					description: None,
					facts: vec![Fact::intrinsic(format!("note-{idx}"))],
					confidence: 0.7,
				}],
			})
			.await
			.expect("Resolution failed.");
		let outcome = response
			.created_entities
			.first()
			.or_else(|| response.resolved_entities.first())
			.expect("Expected one outcome.");

		entity_key = outcome.entity_key;

		// Timestamps order the notes; keep them strictly increasing.
		tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	}

	let entity_key = entity_key.expect("Entity key missing.");
	let notes: Vec<String> = sqlx::query_scalar::<_, String>(
		"SELECT content FROM node_notes WHERE entity_key = $1 ORDER BY added_at ASC, note_id ASC",
	)
	.bind(entity_key)
	.fetch_all(&engine.db.pool)
	.await
	.expect("Failed to list notes.");

	assert_eq!(notes.len(), cap as usize, "notes: {notes:?}");
	assert_eq!(notes.first().map(String::as_str), Some("note-3"));
	assert_eq!(notes.last().map(String::as_str), Some("note-7"));

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
