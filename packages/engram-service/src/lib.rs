pub mod arbiter;
pub mod candidates;
pub mod ingest;
pub mod mutate;
pub mod resolve;
pub mod retrieve;
pub mod salience;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use ingest::{IngestRequest, IngestResponse};
pub use resolve::{EntityOutcome, ResolutionOp, ResolveRequest, ResolveResponse};
pub use retrieve::{
	Direction, EdgeView, ExploreRequest, ExploreResponse, NodeView, ScoredNodeView,
	TraverseRequest, TraverseResponse,
};
pub use salience::SalienceQueue;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;

use engram_config::{
	ARBITER_MODE_EXTERNAL, ArbiterConfig, Config, EmbeddingProviderConfig, LlmProviderConfig,
};
use engram_domain::{
	mention::Mention,
	resolution::{Candidate, Decision},
};
use engram_providers::{arbiter as arbiter_provider, embedding, extractor};
use engram_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait ArbiterProvider
where
	Self: Send + Sync,
{
	fn decide<'a>(
		&'a self,
		cfg: &'a ArbiterConfig,
		resolution: &'a engram_config::Resolution,
		mention: &'a Mention,
		candidates: &'a [Candidate],
	) -> BoxFuture<'a, color_eyre::Result<Decision>>;
}

pub trait ExtractorProvider
where
	Self: Send + Sync,
{
	fn extract<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub arbiter: Arc<dyn ArbiterProvider>,
	pub extractor: Arc<dyn ExtractorProvider>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl ArbiterProvider for DefaultProviders {
	fn decide<'a>(
		&'a self,
		cfg: &'a ArbiterConfig,
		resolution: &'a engram_config::Resolution,
		mention: &'a Mention,
		candidates: &'a [Candidate],
	) -> BoxFuture<'a, color_eyre::Result<Decision>> {
		Box::pin(async move {
			if cfg.mode == ARBITER_MODE_EXTERNAL
				&& let Some(external) = cfg.external.as_ref()
			{
				return arbiter_provider::decide(external, mention, candidates).await;
			}

			Ok(arbiter::rule_decide(resolution, candidates))
		})
	}
}

impl ExtractorProvider for DefaultProviders {
	fn extract<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(extractor::extract(cfg, messages))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		arbiter: Arc<dyn ArbiterProvider>,
		extractor: Arc<dyn ExtractorProvider>,
	) -> Self {
		Self { embedding, arbiter, extractor }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { embedding: provider.clone(), arbiter: provider.clone(), extractor: provider }
	}
}

/// The memory-graph engine. All collaborators are injected at construction;
/// clones share the same pool, providers, and salience queue.
#[derive(Clone)]
pub struct Engine {
	pub cfg: Arc<Config>,
	pub db: Arc<Db>,
	pub providers: Providers,
	pub salience: SalienceQueue,
}

impl Engine {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_providers(cfg, db, Providers::default())
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		let cfg = Arc::new(cfg);
		let db = Arc::new(db);
		let salience = SalienceQueue::spawn(&cfg, &db);

		Self { cfg, db, providers, salience }
	}

	/// Drains outstanding salience updates. Call before process exit so
	/// fire-and-forget tracking is never silently dropped.
	pub async fn shutdown(&self) {
		self.salience.close().await;
	}

	/// One embedding with retry/backoff per the resolution config. The
	/// returned vector is validated against the configured dimensions.
	pub(crate) async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
		let cfg = &self.cfg.providers.embedding;
		let attempts = self.cfg.resolution.embed_retry_attempts.max(1);
		let base_backoff = self.cfg.resolution.embed_retry_base_ms;
		let texts = [text.to_string()];
		let mut last_err: Option<color_eyre::Report> = None;

		for attempt in 0..attempts {
			if attempt > 0 {
				let backoff = base_backoff.saturating_mul(1 << (attempt - 1).min(6));

				tokio::time::sleep(Duration::from_millis(backoff)).await;
			}

			match self.providers.embedding.embed(cfg, &texts).await {
				Ok(vectors) => {
					let Some(vec) = vectors.into_iter().next() else {
						return Err(Error::Provider {
							message: "Embedding provider returned no vectors.".to_string(),
						});
					};

					if vec.len() != cfg.dimensions as usize {
						return Err(Error::Provider {
							message: "Embedding vector dimension mismatch.".to_string(),
						});
					}

					return Ok(vec);
				},
				Err(err) => {
					tracing::warn!(error = %err, attempt, "Embedding attempt failed.");

					last_err = Some(err);
				},
			}
		}

		Err(Error::Provider {
			message: format!(
				"Embedding provider unavailable after {attempts} attempts: {}.",
				last_err.map(|err| err.to_string()).unwrap_or_default()
			),
		})
	}
}

/// Version tag stored with every embedding; bumping provider, model, or
/// dimensions invalidates old vectors without deleting them.
pub fn embedding_version(cfg: &Config) -> String {
	format!(
		"{}:{}:{}",
		cfg.providers.embedding.provider_id,
		cfg.providers.embedding.model,
		cfg.providers.embedding.dimensions
	)
}
