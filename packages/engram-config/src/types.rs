use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub resolution: Resolution,
	pub memory: Memory,
	pub salience: Salience,
	pub retrieval: Retrieval,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub arbiter: ArbiterConfig,
	pub extractor: Option<LlmProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Arbitration backend selection. `mode = "rules"` uses the built-in
/// deterministic scorer; `mode = "external"` delegates to an HTTP decide
/// endpoint and requires `[providers.arbiter.external]`.
#[derive(Debug, Deserialize)]
pub struct ArbiterConfig {
	pub mode: String,
	pub external: Option<ProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Resolution {
	#[serde(default = "default_candidate_limit")]
	pub candidate_limit: u32,
	#[serde(default = "default_fuzzy_max_distance")]
	pub fuzzy_max_distance: u32,
	#[serde(default = "default_fuzzy_limit")]
	pub fuzzy_limit: u32,
	#[serde(default = "default_embedding_min_score")]
	pub embedding_min_score: f32,
	#[serde(default = "default_embedding_limit")]
	pub embedding_limit: u32,
	#[serde(default = "default_accept_fuzzy_distance")]
	pub accept_fuzzy_distance: u32,
	#[serde(default = "default_accept_embedding_score")]
	pub accept_embedding_score: f32,
	#[serde(default = "default_embed_retry_attempts")]
	pub embed_retry_attempts: u32,
	#[serde(default = "default_embed_retry_base_ms")]
	pub embed_retry_base_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Memory {
	#[serde(default = "default_max_notes")]
	pub max_notes: u32,
	#[serde(default = "default_max_name_chars")]
	pub max_name_chars: u32,
	#[serde(default = "default_max_note_chars")]
	pub max_note_chars: u32,
}

#[derive(Debug, Deserialize)]
pub struct Salience {
	#[serde(default = "default_access_boost")]
	pub access_boost: f32,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	#[serde(default = "default_vector_min_score")]
	pub vector_min_score: f32,
	#[serde(default = "default_vector_limit")]
	pub vector_limit: u32,
	#[serde(default = "default_text_min_score")]
	pub text_min_score: f32,
	#[serde(default = "default_neighbor_limit")]
	pub neighbor_limit: u32,
	#[serde(default = "default_max_hops")]
	pub max_hops: u32,
}

fn default_candidate_limit() -> u32 {
	20
}

fn default_fuzzy_max_distance() -> u32 {
	3
}

fn default_fuzzy_limit() -> u32 {
	5
}

fn default_embedding_min_score() -> f32 {
	0.75
}

fn default_embedding_limit() -> u32 {
	20
}

fn default_accept_fuzzy_distance() -> u32 {
	1
}

fn default_accept_embedding_score() -> f32 {
	0.9
}

fn default_embed_retry_attempts() -> u32 {
	3
}

fn default_embed_retry_base_ms() -> u64 {
	250
}

fn default_max_notes() -> u32 {
	100
}

fn default_max_name_chars() -> u32 {
	256
}

fn default_max_note_chars() -> u32 {
	2_000
}

fn default_access_boost() -> f32 {
	0.075
}

fn default_vector_min_score() -> f32 {
	0.5
}

fn default_vector_limit() -> u32 {
	20
}

fn default_text_min_score() -> f32 {
	0.3
}

fn default_neighbor_limit() -> u32 {
	30
}

fn default_max_hops() -> u32 {
	3
}
