use engram_domain::{fact::Fact, keys, kind::NodeKind, mention::Mention};
use engram_service::{Direction, ExploreRequest, ResolveRequest, TraverseRequest};
use engram_storage::edges::{self, EdgeUpsert};

use super::{build_engine, stub_providers, test_config, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn explore_expands_hits_owner_edges_and_neighbors() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping explore_expands_hits_owner_edges_and_neighbors; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");
	let response = engine
		.resolve_batch(ResolveRequest {
			user_id: "user-1".to_string(),
			conversation_id: "conv-1".to_string(),
			added_by: "ingestion".to_string(),
			mentions: vec![
				Mention {
					text: "Alex".to_string(),
					kind: NodeKind::Person,
					context: None,
					description: Some("A colleague from the data team.".to_string()),
					facts: vec![Fact::relational("Met at the Austin offsite.", "knows")],
					confidence: 0.8,
				},
				Mention {
					text: "Rust".to_string(),
					kind: NodeKind::Concept,
					context: None,
					description: Some("A systems programming language.".to_string()),
					facts: vec![Fact::intrinsic("Guarantees memory safety.")],
					confidence: 0.9,
				},
			],
		})
		.await
		.expect("Resolution failed.");

	assert_eq!(response.created_entities.len(), 2);

	let alex_key = response.created_entities[0].entity_key.expect("Missing key.");
	let rust_key = response.created_entities[1].entity_key.expect("Missing key.");

	{
		let mut conn = engine.db.pool.acquire().await.expect("Failed to acquire connection.");

		edges::upsert_edge(&mut conn, EdgeUpsert {
			user_id: "user-1",
			from_key: alex_key,
			to_key: rust_key,
			relationship_type: "works_on",
			relevance: Some(0.8),
			now: time::OffsetDateTime::now_utc(),
		})
		.await
		.expect("Failed to seed edge.");
	}

	let explored = engine
		.explore(ExploreRequest {
			user_id: "user-1".to_string(),
			queries: vec![],
			text_matches: vec!["Alex".to_string()],
			kinds: None,
			search_relationships: true,
		})
		.await
		.expect("Explore failed.");

	assert_eq!(explored.nodes.len(), 1);
	assert_eq!(explored.nodes[0].node.entity_key, alex_key);
	assert!((explored.nodes[0].score - 1.0).abs() < 1e-6, "exact name match scores 1.0");

	let owner_key = keys::owner_entity_key("user-1");
	let has_owner_edge = explored
		.edges
		.iter()
		.any(|edge| edge.from_key == owner_key && edge.to_key == alex_key && edge.relationship_type == "knows");
	let has_neighbor_edge = explored
		.edges
		.iter()
		.any(|edge| edge.from_key == alex_key && edge.to_key == rust_key);

	assert!(has_owner_edge, "edges: {:?}", explored.edges);
	assert!(has_neighbor_edge, "edges: {:?}", explored.edges);
	assert!(
		explored.neighbors.iter().any(|node| node.entity_key == rust_key),
		"one-hop neighbor must be surfaced"
	);
	assert!(
		explored.neighbors.iter().all(|node| node.entity_key != owner_key),
		"the owner node is not a neighbor"
	);

	let relational_edge = explored
		.edges
		.iter()
		.find(|edge| edge.relationship_type == "knows")
		.expect("Owner edge missing.");

	assert!(
		relational_edge.notes.iter().any(|note| note.contains("Austin")),
		"relational fact lives on the edge: {:?}",
		relational_edge.notes
	);

	// Intrinsic/relational separation: the relational fact never lands in
	// the node's notes.
	let node_notes: Vec<String> =
		sqlx::query_scalar::<_, String>("SELECT content FROM node_notes WHERE entity_key = $1")
			.bind(alex_key)
			.fetch_all(&engine.db.pool)
			.await
			.expect("Failed to list node notes.");

	assert!(node_notes.iter().all(|note| !note.contains("Austin")), "notes: {node_notes:?}");

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ENGRAM_PG_DSN to run."]
async fn traverse_walks_typed_edges_breadth_first() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping traverse_walks_typed_edges_breadth_first; set ENGRAM_PG_DSN to run.");

		return;
	};
	let cfg = test_config(test_db.dsn(), 100);
	let engine = build_engine(cfg, stub_providers()).await.expect("Failed to build engine.");
	let response = engine
		.resolve_batch(ResolveRequest {
			user_id: "user-1".to_string(),
			conversation_id: "conv-1".to_string(),
			added_by: "ingestion".to_string(),
			mentions: vec![
				Mention {
					text: "Alex".to_string(),
					kind: NodeKind::Person,
					context: None,
					description: None,
					facts: vec![
						Fact::relational("Close friend.", "knows"),
						Fact::intrinsic("Based in Lisbon."),
					],
					confidence: 0.8,
				},
				Mention {
					text: "Rust".to_string(),
					kind: NodeKind::Concept,
					context: None,
					description: None,
					facts: vec![],
					confidence: 0.9,
				},
			],
		})
		.await
		.expect("Resolution failed.");
	let alex_key = response.created_entities[0].entity_key.expect("Missing key.");
	let rust_key = response.created_entities[1].entity_key.expect("Missing key.");

	{
		let mut conn = engine.db.pool.acquire().await.expect("Failed to acquire connection.");

		edges::upsert_edge(&mut conn, EdgeUpsert {
			user_id: "user-1",
			from_key: alex_key,
			to_key: rust_key,
			relationship_type: "works_on",
			relevance: Some(0.8),
			now: time::OffsetDateTime::now_utc(),
		})
		.await
		.expect("Failed to seed edge.");
	}

	let traversed = engine
		.traverse(TraverseRequest {
			user_id: "user-1".to_string(),
			entity_key: alex_key,
			direction: Direction::Both,
			max_hops: 2,
			verbose: true,
		})
		.await
		.expect("Traverse failed.");
	let owner_key = keys::owner_entity_key("user-1");
	let visited: Vec<_> = traversed.nodes.iter().map(|node| node.entity_key).collect();

	assert!(visited.contains(&alex_key));
	assert!(visited.contains(&rust_key));
	assert!(visited.contains(&owner_key), "the owner node is one hop away via knows");
	assert_eq!(traversed.edges.len(), 2);

	let alex = traversed
		.nodes
		.iter()
		.find(|node| node.entity_key == alex_key)
		.expect("Alex missing from traversal.");
	let notes = alex.notes.as_ref().expect("verbose traversal includes notes");

	assert!(notes.iter().any(|note| note.content.contains("Lisbon")));

	let missing = engine
		.traverse(TraverseRequest {
			user_id: "user-1".to_string(),
			entity_key: uuid::Uuid::new_v4(),
			direction: Direction::Both,
			max_hops: 1,
			verbose: false,
		})
		.await;

	assert!(matches!(missing, Err(engram_service::Error::NotFound { .. })));

	engine.shutdown().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
