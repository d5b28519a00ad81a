use engram_domain::{fact::Fact, kind::NodeKind, mention::Mention};
use engram_service::{ResolveRequest, ResolutionOp};

use super::{build_engine, count_nodes, stub_providers, test_config, test_db};

fn alex_mention() -> Mention {
	Mention {
		text: "Alex".to_string(),
		kind: NodeKind::Person,
		context: Some("Mentioned while planning the offsite.".to_string()),
		description: Some("A colleague from the data team.".to_string()),
		facts: vec![Fact::intrinsic("Works on the data team.")],
		confidence: 0.8,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn resolving_the_same_mention_twice_creates_one_node() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping resolving_the_same_mention_twice_creates_one_node; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");

	let first = engine
		.resolve_batch(ResolveRequest {
			user_id: "user-1".to_string(),
			conversation_id: "conv-1".to_string(),
			added_by: "ingestion".to_string(),
			mentions: vec![alex_mention()],
		})
		.await
		.expect("First resolution failed.");

	assert_eq!(first.created_entities.len(), 1);
	assert_eq!(first.created_entities[0].op, ResolutionOp::Created);

	let entity_key = first.created_entities[0].entity_key.expect("Created entity must carry a key.");

	let second = engine
		.resolve_batch(ResolveRequest {
			user_id: "user-1".to_string(),
			conversation_id: "conv-2".to_string(),
			added_by: "ingestion".to_string(),
			mentions: vec![alex_mention()],
		})
		.await
		.expect("Second resolution failed.");

	assert!(second.created_entities.is_empty(), "second pass must not create a duplicate");
	assert_eq!(second.resolved_entities.len(), 1);
	assert_eq!(second.resolved_entities[0].entity_key, Some(entity_key));
	assert_eq!(count_nodes(&engine.db.pool, "user-1", "person").await, 1);

	let mention_rows = sqlx::query_scalar::<_, i64>(
		"SELECT COUNT(*) FROM node_mentions WHERE entity_key = $1",
	)
	.bind(entity_key)
	.fetch_one(&engine.db.pool)
	.await
	.expect("Failed to count mention provenance rows.");

	assert_eq!(mention_rows, 2, "each conversation leaves one provenance row");

	let outbox_rows = sqlx::query_scalar::<_, i64>(
		"SELECT COUNT(*) FROM embedding_outbox WHERE entity_key = $1",
	)
	.bind(entity_key)
	.fetch_one(&engine.db.pool)
	.await
	.expect("Failed to count outbox rows.");

	assert!(outbox_rows >= 1, "mutations must enqueue embedding regeneration");

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn arbiter_outage_degrades_to_creation() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping arbiter_outage_degrades_to_creation; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let providers = engram_service::Providers::new(
		std::sync::Arc::new(super::StubEmbedding { vector_dim: super::VECTOR_DIM }),
		std::sync::Arc::new(super::FailingArbiter),
		std::sync::Arc::new(super::SpyExtractor {
			calls: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
			payload: serde_json::json!({ "mentions": [] }),
		}),
	);
	let engine = build_engine(cfg, providers).await.expect("Failed to build engine.");
	let response = engine
		.resolve_batch(ResolveRequest {
			user_id: "user-1".to_string(),
			conversation_id: "conv-1".to_string(),
			added_by: "ingestion".to_string(),
			mentions: vec![alex_mention()],
		})
		.await
		.expect("Resolution must survive an arbiter outage.");

	assert_eq!(response.created_entities.len(), 1);
	assert!(response.created_entities[0].reason.contains("ARBITER_UNAVAILABLE"));

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
