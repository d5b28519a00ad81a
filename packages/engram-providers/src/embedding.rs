use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

const MAX_RETRY_BACKOFF_MS: u64 = 8_000;

pub async fn embed(
	cfg: &engram_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(json)
}

/// Embedding with exponential backoff between attempts. A transient
/// provider failure must not abort a whole resolution batch; the caller
/// bounds the attempts through config.
pub async fn embed_with_retry(
	cfg: &engram_config::EmbeddingProviderConfig,
	texts: &[String],
	attempts: u32,
	base_backoff_ms: u64,
) -> Result<Vec<Vec<f32>>> {
	let attempts = attempts.max(1);
	let mut last_err = None;

	for attempt in 0..attempts {
		if attempt > 0 {
			tokio::time::sleep(Duration::from_millis(backoff_ms(base_backoff_ms, attempt))).await;
		}

		match embed(cfg, texts).await {
			Ok(vectors) => return Ok(vectors),
			Err(err) => {
				last_err = Some(err);
			},
		}
	}

	Err(last_err.unwrap_or_else(|| eyre::eyre!("Embedding provider failed without an error.")))
}

fn backoff_ms(base: u64, attempt: u32) -> u64 {
	let exp = attempt.saturating_sub(1).min(6);

	base.saturating_mul(1 << exp).min(MAX_RETRY_BACKOFF_MS)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;

	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Embedding item missing embedding array."))?;
		let mut vec = Vec::with_capacity(embedding.len());
		for value in embedding {
			let number =
				value.as_f64().ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))?;
			vec.push(number as f32);
		}
		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");
		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn rejects_non_numeric_values() {
		let json = serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [1.0, "oops"] }
			]
		});

		assert!(parse_embedding_response(json).is_err());
	}

	#[test]
	fn backoff_doubles_then_caps() {
		assert_eq!(backoff_ms(250, 1), 250);
		assert_eq!(backoff_ms(250, 2), 500);
		assert_eq!(backoff_ms(250, 3), 1_000);
		assert_eq!(backoff_ms(250, 12), 8_000);
	}
}
