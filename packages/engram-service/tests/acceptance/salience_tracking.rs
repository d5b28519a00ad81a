use engram_domain::{kind::NodeKind, mention::Mention};
use engram_service::{ExploreRequest, ResolveRequest};
use engram_storage::nodes;

use super::{build_engine, stub_providers, test_config, test_db};

async fn create_alex(engine: &engram_service::Engine) -> uuid::Uuid {
	let response = engine
		.resolve_batch(ResolveRequest {
			user_id: "user-1".to_string(),
			conversation_id: "conv-1".to_string(),
			added_by: "ingestion".to_string(),
			mentions: vec![Mention {
				text: "Alex".to_string(),
				kind: NodeKind::Person,
				context: None,
				description: None,
				facts: vec![],
				confidence: 0.7,
			}],
		})
		.await
		.expect("Resolution failed.");

	response.created_entities[0].entity_key.expect("Created entity must carry a key.")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn first_read_activates_a_fresh_node() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping first_read_activates_a_fresh_node; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");
	let entity_key = create_alex(&engine).await;
	let mut conn = engine.db.pool.acquire().await.expect("Failed to acquire connection.");
	let fresh = nodes::fetch_node(&mut conn, "user-1", entity_key)
		.await
		.expect("Fetch failed.")
		.expect("Node missing.");

	assert_eq!(fresh.state, "candidate");
	assert_eq!(fresh.access_count, 0);
	assert!((fresh.salience - 0.5).abs() < 1e-6);

	let touched = engine.touch_nodes("user-1", &[entity_key]).await.expect("Touch failed.");

	assert_eq!(touched.len(), 1);
	assert_eq!(touched[0].access_count, 1);
	assert_eq!(touched[0].state, "active");
	assert!((touched[0].salience - 0.575).abs() < 1e-6);

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn retrieval_tracking_is_flushed_on_shutdown() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping retrieval_tracking_is_flushed_on_shutdown; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");
	let entity_key = create_alex(&engine).await;
	let response = engine
		.explore(ExploreRequest {
			user_id: "user-1".to_string(),
			queries: vec![],
			text_matches: vec!["Alex".to_string()],
			kinds: None,
			search_relationships: false,
		})
		.await
		.expect("Explore failed.");

	assert_eq!(response.nodes.len(), 1);
	assert_eq!(response.nodes[0].node.entity_key, entity_key);

	// The explore call returned without waiting on tracking; shutdown
	// drains the queue before we look at the row.
	engine.shutdown().await;

	let mut conn = engine.db.pool.acquire().await.expect("Failed to acquire connection.");
	let node = nodes::fetch_node(&mut conn, "user-1", entity_key)
		.await
		.expect("Fetch failed.")
		.expect("Node missing.");

	assert_eq!(node.access_count, 1);
	assert_eq!(node.state, "active");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn state_promotion_is_monotonic_up_to_core() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping state_promotion_is_monotonic_up_to_core; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");
	let entity_key = create_alex(&engine).await;
	let order = |state: &str| match state {
		"candidate" => 0,
		"active" => 1,
		_ => 2,
	};
	let mut last = 0;

	for _ in 0..12 {
		let touched = engine.touch_nodes("user-1", &[entity_key]).await.expect("Touch failed.");
		let rank = order(&touched[0].state);

		assert!(rank >= last, "state must never transition backward");

		last = rank;
	}

	assert_eq!(last, 2, "ten or more reads promote to core");

	let touched = engine.touch_nodes("user-1", &[entity_key]).await.expect("Touch failed.");

	assert_eq!(touched[0].state, "core");
	assert!(touched[0].salience <= 1.0);

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
