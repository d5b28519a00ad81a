use std::time::Duration as StdDuration;

use color_eyre::{Result, eyre};
use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use engram_domain::kind::NodeKind;
use engram_providers::embedding;
use engram_storage::{
	db::Db,
	models::{EmbeddingOutboxEntry, MemoryNode},
	nodes, outbox, vector_to_pg,
};

const POLL_INTERVAL_MS: i64 = 500;
const CLAIM_LEASE_SECONDS: i64 = 30;
const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const EMBED_ATTEMPTS: u32 = 3;
const EMBED_BASE_BACKOFF_MS: u64 = 250;
const MAX_OUTBOX_ERROR_CHARS: usize = 1_024;

pub struct WorkerState {
	pub db: Db,
	pub embedding: engram_config::EmbeddingProviderConfig,
	pub vector_dim: u32,
}

/// Drains the embedding outbox: each job re-embeds one node from its
/// current name, description and notes. Jobs are keyed only by entity key,
/// so regeneration stays retryable regardless of how the node got here.
pub async fn run_worker(state: WorkerState) -> Result<()> {
	loop {
		if let Err(err) = process_outbox_once(&state).await {
			tracing::error!(error = %err, "Embedding outbox processing failed.");
		}

		tokio_time::sleep(to_std_duration(Duration::milliseconds(POLL_INTERVAL_MS))).await;
	}
}

async fn process_outbox_once(state: &WorkerState) -> Result<()> {
	let now = OffsetDateTime::now_utc();
	let job = outbox::claim_next(&state.db, now, CLAIM_LEASE_SECONDS).await?;
	let Some(job) = job else {
		return Ok(());
	};

	match handle_upsert(state, &job).await {
		Ok(()) => {
			outbox::mark_done(&state.db, job.outbox_id, OffsetDateTime::now_utc()).await?;
		},
		Err(err) => {
			let next_attempts = job.attempts.saturating_add(1);
			let backoff = backoff_for_attempt(next_attempts);
			let now = OffsetDateTime::now_utc();
			let error_text = sanitize_outbox_error(&err.to_string());

			outbox::mark_failed(
				&state.db,
				job.outbox_id,
				next_attempts,
				&error_text,
				now + backoff,
				now,
			)
			.await?;
			tracing::error!(error = %err, outbox_id = %job.outbox_id, "Outbox job failed.");
		},
	}

	Ok(())
}

async fn handle_upsert(state: &WorkerState, job: &EmbeddingOutboxEntry) -> Result<()> {
	let mut conn = state.db.pool.acquire().await?;
	let node = nodes::fetch_node_by_key(&mut conn, job.entity_key).await?;
	let Some(node) = node else {
		tracing::info!(entity_key = %job.entity_key, "Node missing for outbox job. Marking done.");

		return Ok(());
	};
	let input = embedding_input_for(&node, &mut conn).await?;
	let vectors =
		embedding::embed_with_retry(&state.embedding, &[input], EMBED_ATTEMPTS, EMBED_BASE_BACKOFF_MS)
			.await?;
	let Some(vec) = vectors.into_iter().next() else {
		return Err(eyre::eyre!("Embedding provider returned no vectors."));
	};

	validate_vector_dim(&vec, state.vector_dim)?;

	let vec_text = vector_to_pg(&vec);

	nodes::upsert_node_embedding(
		&mut conn,
		node.entity_key,
		&job.embedding_version,
		vec.len() as i32,
		&vec_text,
	)
	.await?;

	Ok(())
}

async fn embedding_input_for(
	node: &MemoryNode,
	conn: &mut sqlx::PgConnection,
) -> Result<String> {
	let kind = NodeKind::parse(&node.kind)
		.ok_or_else(|| eyre::eyre!("Node has an unknown kind: {}.", node.kind))?;
	let now = OffsetDateTime::now_utc();
	let notes: Vec<String> = nodes::list_node_notes(conn, node.entity_key)
		.await?
		.into_iter()
		.filter(|note| note.expires_at.map(|expires_at| expires_at > now).unwrap_or(true))
		.map(|note| note.content)
		.collect();

	Ok(kind.profile().embedding_input(
		&node.name,
		node.description.as_deref().unwrap_or(""),
		&notes,
	))
}

fn validate_vector_dim(vec: &[f32], expected_dim: u32) -> Result<()> {
	if vec.len() != expected_dim as usize {
		return Err(eyre::eyre!(
			"Embedding dimension {} does not match configured dimensions {}.",
			vec.len(),
			expected_dim
		));
	}

	Ok(())
}

fn sanitize_outbox_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = match raw.split(sep).next() {
					Some(prefix) => prefix,
					None => raw,
				};

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_OUTBOX_ERROR_CHARS {
		out = out.chars().take(MAX_OUTBOX_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}

fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);
	let capped = base.min(MAX_BACKOFF_MS);

	Duration::milliseconds(capped)
}

fn to_std_duration(duration: Duration) -> StdDuration {
	let millis = duration.whole_milliseconds();

	if millis <= 0 {
		return StdDuration::from_millis(0);
	}

	StdDuration::from_millis(millis as u64)
}
