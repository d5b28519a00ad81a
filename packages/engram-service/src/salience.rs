use std::sync::{Arc, Mutex};

use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use engram_config::Config;
use engram_domain::salience::CORE_ACCESS_THRESHOLD;
use engram_storage::{db::Db, models::MemoryNode, nodes};

use crate::{Engine, Result};

struct Batch {
	user_id: String,
	entity_keys: Vec<Uuid>,
}

/// Decouples read-side salience tracking from the retrieval call path.
/// Retrieval enqueues and returns immediately; the drain task applies the
/// updates, and `close` drains whatever is still queued before the process
/// exits so nothing is silently dropped.
#[derive(Clone)]
pub struct SalienceQueue {
	inner: Arc<Inner>,
}

struct Inner {
	tx: Mutex<Option<mpsc::UnboundedSender<Batch>>>,
	handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SalienceQueue {
	pub fn spawn(cfg: &Arc<Config>, db: &Arc<Db>) -> Self {
		let boost = cfg.salience.access_boost;
		let pool = db.pool.clone();
		let (tx, mut rx) = mpsc::unbounded_channel::<Batch>();
		let handle = tokio::spawn(async move {
			while let Some(batch) = rx.recv().await {
				apply_batch(&pool, boost, &batch).await;
			}
		});

		Self {
			inner: Arc::new(Inner {
				tx: Mutex::new(Some(tx)),
				handle: tokio::sync::Mutex::new(Some(handle)),
			}),
		}
	}

	/// Fire-and-forget: never blocks the caller. Sends after `close` are
	/// dropped with a warning instead of panicking.
	pub fn enqueue(&self, user_id: &str, entity_keys: Vec<Uuid>) {
		if entity_keys.is_empty() {
			return;
		}

		let guard = self.inner.tx.lock().unwrap_or_else(|err| err.into_inner());
		let Some(tx) = guard.as_ref() else {
			tracing::warn!(count = entity_keys.len(), "Salience queue closed; dropping updates.");

			return;
		};

		if tx.send(Batch { user_id: user_id.to_string(), entity_keys }).is_err() {
			tracing::warn!("Salience drain task gone; dropping updates.");
		}
	}

	/// Closes the queue and waits for the drain task to finish every
	/// batch enqueued before the close.
	pub async fn close(&self) {
		{
			let mut guard = self.inner.tx.lock().unwrap_or_else(|err| err.into_inner());

			guard.take();
		}

		let handle = {
			let mut guard = self.inner.handle.lock().await;

			guard.take()
		};

		if let Some(handle) = handle {
			if let Err(err) = handle.await {
				tracing::error!(error = %err, "Salience drain task failed.");
			}
		}
	}
}

/// Best-effort per batch: each node's update is a single atomic statement,
/// and one node failing never blocks the rest of the batch.
async fn apply_batch(pool: &PgPool, boost: f32, batch: &Batch) {
	let now = OffsetDateTime::now_utc();

	for entity_key in &batch.entity_keys {
		let mut conn = match pool.acquire().await {
			Ok(conn) => conn,
			Err(err) => {
				tracing::warn!(error = %err, "Salience update could not acquire a connection.");

				return;
			},
		};

		match nodes::touch_node(&mut conn, &batch.user_id, *entity_key, boost, CORE_ACCESS_THRESHOLD, now)
			.await
		{
			Ok(_) => (),
			Err(err) if err.is_not_found() => {
				tracing::debug!(entity_key = %entity_key, "Salience target deleted; skipping.");
			},
			Err(err) => {
				tracing::warn!(error = %err, entity_key = %entity_key, "Salience update failed.");
			},
		}
	}
}

impl Engine {
	/// Synchronous batched form of the tracker. Used when the caller wants
	/// the updated rows back; retrieval paths go through the queue instead.
	pub async fn touch_nodes(&self, user_id: &str, entity_keys: &[Uuid]) -> Result<Vec<MemoryNode>> {
		let boost = self.cfg.salience.access_boost;
		let now = OffsetDateTime::now_utc();
		let mut updated = Vec::with_capacity(entity_keys.len());

		for entity_key in entity_keys {
			let mut conn = self.db.pool.acquire().await?;

			match nodes::touch_node(&mut conn, user_id, *entity_key, boost, CORE_ACCESS_THRESHOLD, now)
				.await
			{
				Ok(node) => updated.push(node),
				Err(err) if err.is_not_found() => {
					tracing::debug!(entity_key = %entity_key, "Touch target missing; skipping.");
				},
				Err(err) => {
					tracing::warn!(error = %err, entity_key = %entity_key, "Touch failed; continuing batch.");
				},
			}
		}

		Ok(updated)
	}
}
