use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};

use engram_service::{IngestRequest, Providers, ResolutionOp};

use super::{RuleOnlyArbiter, SpyExtractor, StubEmbedding, VECTOR_DIM, build_engine, test_config, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn ingest_extracts_classifies_and_resolves() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping ingest_extracts_classifies_and_resolves; set ENGRAM_PG_DSN to run.");

		return;
	};
	let calls = Arc::new(AtomicUsize::new(0));
	let payload = serde_json::json!({
		"mentions": [
			{
				"text": "Alex",
				"kind": "person",
				"description": "A colleague from the data team.",
				"confidence": 0.85,
				"facts": [
					{ "class": "intrinsic", "content": "Works on the data team." },
					{ "class": "relational", "content": "Met at the Austin offsite.", "relationship_type": "knows" }
				]
			},
			{ "kind": "spaceship" }
		]
	});
	let providers = Providers::new(
		Arc::new(StubEmbedding { vector_dim: VECTOR_DIM }),
		Arc::new(RuleOnlyArbiter),
		Arc::new(SpyExtractor { calls: calls.clone(), payload }),
	);
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, providers).await.expect("Failed to build engine.");
	let response = engine
		.ingest(IngestRequest {
			user_id: "user-1".to_string(),
			conversation_id: "conv-1".to_string(),
			transcript: "I met Alex from the data team at the Austin offsite.".to_string(),
			summary: None,
			mentions: None,
			added_by: "ingestion".to_string(),
		})
		.await
		.expect("Ingest failed.");

	assert_eq!(calls.load(Ordering::SeqCst), 1, "the extractor runs once per job");
	assert_eq!(response.created_entities.len(), 1);
	assert_eq!(response.created_entities[0].op, ResolutionOp::Created);
	assert_eq!(response.failed_entities.len(), 1, "the malformed entry is surfaced, not defaulted");
	assert_eq!(response.failed_entities[0].op, ResolutionOp::Rejected);

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
