use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use engram_domain::{fuzzy, keys, kind::NodeKind};
use engram_storage::{
	edges,
	models::{MemoryEdge, MemoryNode},
	nodes,
};

use crate::{Engine, Error, Result, embedding_version};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	Out,
	In,
	Both,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExploreRequest {
	pub user_id: String,
	#[serde(default)]
	pub queries: Vec<String>,
	#[serde(default)]
	pub text_matches: Vec<String>,
	#[serde(default)]
	pub kinds: Option<Vec<NodeKind>>,
	#[serde(default)]
	pub search_relationships: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraverseRequest {
	pub user_id: String,
	pub entity_key: Uuid,
	pub direction: Direction,
	pub max_hops: u32,
	#[serde(default)]
	pub verbose: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoteView {
	pub content: String,
	pub added_by: String,
	#[serde(with = "crate::time_serde")]
	pub added_at: OffsetDateTime,
	#[serde(default, with = "crate::time_serde::option")]
	pub expires_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeView {
	pub entity_key: Uuid,
	pub kind: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub confidence: f32,
	pub salience: f32,
	pub state: String,
	pub access_count: i64,
	#[serde(default, with = "crate::time_serde::option")]
	pub last_accessed_at: Option<OffsetDateTime>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<Vec<NoteView>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredNodeView {
	#[serde(flatten)]
	pub node: NodeView,
	pub score: f32,
	pub match_source: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeView {
	pub edge_id: Uuid,
	pub from_key: Uuid,
	pub to_key: Uuid,
	pub relationship_type: String,
	pub relevance: f32,
	#[serde(default)]
	pub notes: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExploreResponse {
	pub nodes: Vec<ScoredNodeView>,
	pub edges: Vec<EdgeView>,
	pub neighbors: Vec<NodeView>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TraverseResponse {
	pub nodes: Vec<NodeView>,
	pub edges: Vec<EdgeView>,
}

const MATCH_SOURCE_VECTOR: &str = "vector";
const MATCH_SOURCE_TEXT: &str = "text";

struct Hit {
	node: MemoryNode,
	score: f32,
	source: &'static str,
}

impl Engine {
	/// Composable read entry point: semantic search over `queries`, fuzzy
	/// text match over `text_matches`, and (optionally) one-hop graph
	/// expansion around the hits. Surfaced nodes are enqueued for salience
	/// tracking; the response returns without waiting on those updates.
	pub async fn explore(&self, req: ExploreRequest) -> Result<ExploreResponse> {
		if req.user_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}
		if req.queries.is_empty() && req.text_matches.is_empty() {
			return Err(Error::InvalidRequest {
				message: "At least one of queries or text_matches is required.".to_string(),
			});
		}

		let kinds = requested_kinds(req.kinds.as_deref());
		let mut hits: HashMap<Uuid, Hit> = HashMap::new();

		for query in &req.queries {
			if query.trim().is_empty() {
				continue;
			}

			self.vector_hits(&req.user_id, query, &kinds, &mut hits).await?;
		}
		for query in &req.text_matches {
			if query.trim().is_empty() {
				continue;
			}

			self.text_hits(&req.user_id, query, &kinds, &mut hits).await?;
		}

		let mut hit_keys: Vec<Uuid> = hits.keys().copied().collect();

		hit_keys.sort();

		let mut response = ExploreResponse::default();
		let mut surfaced = hit_keys.clone();

		if req.search_relationships && !hit_keys.is_empty() {
			let owner_key = keys::owner_entity_key(&req.user_id);
			let (edges, neighbors) =
				self.expand(&req.user_id, owner_key, &hit_keys).await?;

			surfaced.extend(neighbors.iter().map(|node| node.entity_key));

			response.edges = edges;
			response.neighbors = neighbors.into_iter().map(|node| node_view(node, None)).collect();
		}

		let mut scored: Vec<ScoredNodeView> = hits
			.into_values()
			.map(|hit| ScoredNodeView {
				node: node_view(hit.node, None),
				score: hit.score,
				match_source: hit.source.to_string(),
			})
			.collect();

		scored.sort_by(|a, b| b.score.total_cmp(&a.score));

		response.nodes = scored;

		self.salience.enqueue(&req.user_id, surfaced);

		Ok(response)
	}

	/// Breadth-first walk over typed edges from one node, up to `max_hops`
	/// (clamped by config). `verbose` includes node notes in the views.
	pub async fn traverse(&self, req: TraverseRequest) -> Result<TraverseResponse> {
		if req.user_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}

		let max_hops = req.max_hops.clamp(1, self.cfg.retrieval.max_hops);
		let (outgoing, incoming) = match req.direction {
			Direction::Out => (true, false),
			Direction::In => (false, true),
			Direction::Both => (true, true),
		};
		let mut conn = self.db.pool.acquire().await?;

		if nodes::fetch_node(&mut conn, &req.user_id, req.entity_key).await?.is_none() {
			return Err(Error::NotFound {
				message: format!("memory node not found; entity_key={}", req.entity_key),
			});
		}

		let mut visited: HashSet<Uuid> = HashSet::from([req.entity_key]);
		let mut collected_edges: Vec<MemoryEdge> = Vec::new();
		let mut seen_edges: HashSet<Uuid> = HashSet::new();
		let mut frontier = vec![req.entity_key];

		for _ in 0..max_hops {
			let mut next = Vec::new();

			for key in frontier {
				let incident =
					edges::edges_for_node(&mut conn, &req.user_id, key, outgoing, incoming).await?;

				for edge in incident {
					let far = if edge.from_key == key { edge.to_key } else { edge.from_key };

					if seen_edges.insert(edge.edge_id) {
						collected_edges.push(edge);
					}
					if visited.insert(far) {
						next.push(far);
					}
				}
			}

			if next.is_empty() {
				break;
			}

			frontier = next;
		}

		let mut node_keys: Vec<Uuid> = visited.iter().copied().collect();

		node_keys.sort();

		let rows = nodes::fetch_nodes(&mut conn, &req.user_id, &node_keys).await?;
		let mut views = Vec::with_capacity(rows.len());

		for node in rows {
			let notes = if req.verbose {
				let rows = nodes::list_node_notes(&mut conn, node.entity_key).await?;

				Some(
					rows.into_iter()
						.map(|note| NoteView {
							content: note.content,
							added_by: note.added_by,
							added_at: note.added_at,
							expires_at: note.expires_at,
						})
						.collect(),
				)
			} else {
				None
			};

			views.push(node_view(node, notes));
		}

		let mut edge_views = Vec::with_capacity(collected_edges.len());

		for edge in collected_edges {
			edge_views.push(self.edge_view(&mut conn, edge, req.verbose).await?);
		}

		self.salience.enqueue(&req.user_id, node_keys);

		Ok(TraverseResponse { nodes: views, edges: edge_views })
	}

	async fn vector_hits(
		&self,
		user_id: &str,
		query: &str,
		kinds: &[NodeKind],
		hits: &mut HashMap<Uuid, Hit>,
	) -> Result<()> {
		let embedding = match self.embed_text(query).await {
			Ok(vec) => vec,
			Err(err) => {
				// Text matching can still serve the request; vector search
				// degrades like a failed candidate tier.
				tracing::warn!(error = %err, query, "Query embedding failed; skipping vector search.");

				return Ok(());
			},
		};
		let vec_text = engram_storage::vector_to_pg(&embedding);
		let version = embedding_version(&self.cfg);
		let mut conn = self.db.pool.acquire().await?;

		for kind in kinds {
			let scored = nodes::search_by_embedding(
				&mut conn,
				user_id,
				kind.as_str(),
				&vec_text,
				&version,
				self.cfg.retrieval.vector_min_score,
				self.cfg.retrieval.vector_limit,
			)
			.await?;

			for hit in scored {
				merge_hit(hits, hit.node, hit.similarity, MATCH_SOURCE_VECTOR);
			}
		}

		Ok(())
	}

	async fn text_hits(
		&self,
		user_id: &str,
		query: &str,
		kinds: &[NodeKind],
		hits: &mut HashMap<Uuid, Hit>,
	) -> Result<()> {
		let min_score = self.cfg.retrieval.text_min_score;
		let limit = self.cfg.retrieval.vector_limit as usize;
		let mut conn = self.db.pool.acquire().await?;

		for kind in kinds {
			let names = nodes::list_kind_names(&mut conn, user_id, kind.as_str()).await?;
			let mut scored: Vec<(Uuid, f32)> = names
				.into_iter()
				.filter_map(|(entity_key, name, _)| {
					let score = fuzzy::text_match_score(query, &name);

					(score >= min_score).then_some((entity_key, score))
				})
				.collect();

			scored.sort_by(|a, b| b.1.total_cmp(&a.1));
			scored.truncate(limit);

			let keys: Vec<Uuid> = scored.iter().map(|(key, _)| *key).collect();
			let rows = nodes::fetch_nodes(&mut conn, user_id, &keys).await?;
			let by_key: HashMap<Uuid, f32> = scored.into_iter().collect();

			for node in rows {
				let score = by_key.get(&node.entity_key).copied().unwrap_or(min_score);

				merge_hit(hits, node, score, MATCH_SOURCE_TEXT);
			}
		}

		Ok(())
	}

	/// Graph expansion around the hit set: edges among hits, edges between
	/// hits and the owner node, then one-hop neighbors with their
	/// connecting edges, capped.
	async fn expand(
		&self,
		user_id: &str,
		owner_key: Uuid,
		hit_keys: &[Uuid],
	) -> Result<(Vec<EdgeView>, Vec<MemoryNode>)> {
		let mut conn = self.db.pool.acquire().await?;
		let mut set_with_owner: Vec<Uuid> = hit_keys.to_vec();

		set_with_owner.push(owner_key);

		let direct = edges::edges_between(&mut conn, user_id, &set_with_owner).await?;
		let touching =
			edges::edges_touching(&mut conn, user_id, hit_keys, self.cfg.retrieval.neighbor_limit)
				.await?;
		let hit_set: HashSet<Uuid> = hit_keys.iter().copied().collect();
		let mut neighbor_keys: Vec<Uuid> = Vec::new();
		let mut seen_neighbors = HashSet::new();

		for edge in &touching {
			for key in [edge.from_key, edge.to_key] {
				if key != owner_key && !hit_set.contains(&key) && seen_neighbors.insert(key) {
					neighbor_keys.push(key);
				}
			}
		}

		neighbor_keys.truncate(self.cfg.retrieval.neighbor_limit as usize);

		let neighbors = nodes::fetch_nodes(&mut conn, user_id, &neighbor_keys).await?;
		let mut seen_edges = HashSet::new();
		let mut edge_views = Vec::new();

		for edge in direct.into_iter().chain(touching) {
			if !seen_edges.insert(edge.edge_id) {
				continue;
			}

			edge_views.push(self.edge_view(&mut conn, edge, true).await?);
		}

		Ok((edge_views, neighbors))
	}

	async fn edge_view(
		&self,
		conn: &mut sqlx::PgConnection,
		edge: MemoryEdge,
		include_notes: bool,
	) -> Result<EdgeView> {
		let notes = if include_notes {
			edges::list_edge_notes(conn, edge.edge_id)
				.await?
				.into_iter()
				.map(|note| note.content)
				.collect()
		} else {
			Vec::new()
		};

		Ok(EdgeView {
			edge_id: edge.edge_id,
			from_key: edge.from_key,
			to_key: edge.to_key,
			relationship_type: edge.relationship_type,
			relevance: edge.relevance,
			notes,
		})
	}
}

fn requested_kinds(kinds: Option<&[NodeKind]>) -> Vec<NodeKind> {
	match kinds {
		Some(kinds) => kinds
			.iter()
			.copied()
			.filter(|kind| kind.profile().resolvable)
			.collect(),
		None => NodeKind::resolvable_kinds().collect(),
	}
}

fn merge_hit(hits: &mut HashMap<Uuid, Hit>, node: MemoryNode, score: f32, source: &'static str) {
	match hits.get_mut(&node.entity_key) {
		Some(existing) => {
			if score > existing.score {
				existing.score = score;
				existing.source = source;
			}
		},
		None => {
			hits.insert(node.entity_key, Hit { node, score, source });
		},
	}
}

fn node_view(node: MemoryNode, notes: Option<Vec<NoteView>>) -> NodeView {
	NodeView {
		entity_key: node.entity_key,
		kind: node.kind,
		name: node.name,
		description: node.description,
		confidence: node.confidence,
		salience: node.salience,
		state: node.state,
		access_count: node.access_count,
		last_accessed_at: node.last_accessed_at,
		notes,
	}
}
