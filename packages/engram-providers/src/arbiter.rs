use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use engram_domain::{
	mention::Mention,
	resolution::{Candidate, Decision},
};

/// Asks an external arbitration service whether a mention matches one of
/// its candidates. The caller treats any error here as "decide
/// conservatively", never as a fatal resolution failure.
pub async fn decide(
	cfg: &engram_config::ProviderConfig,
	mention: &Mention,
	candidates: &[Candidate],
) -> Result<Decision> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"mention": {
			"text": mention.text,
			"kind": mention.kind,
			"context": mention.context,
		},
		"candidates": candidates,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_decision(json)
}

fn parse_decision(json: Value) -> Result<Decision> {
	let decision: Decision = serde_json::from_value(json)
		.map_err(|err| eyre::eyre!("Arbiter response is not a valid decision: {err}."))?;

	if decision.resolved && decision.entity_key.is_none() {
		return Err(eyre::eyre!("Arbiter resolved without an entity_key."));
	}
	if decision.reason.trim().is_empty() {
		return Err(eyre::eyre!("Arbiter decision is missing a reason."));
	}

	Ok(decision)
}

#[cfg(test)]
mod tests {
	use super::*;
	use uuid::Uuid;

	#[test]
	fn parses_matched_decision() {
		let key = Uuid::new_v4();
		let json = serde_json::json!({
			"resolved": true,
			"entity_key": key,
			"reason": "EXACT_NAME",
		});
		let decision = parse_decision(json).expect("parse failed");

		assert!(decision.resolved);
		assert_eq!(decision.entity_key, Some(key));
	}

	#[test]
	fn rejects_resolved_without_key() {
		let json = serde_json::json!({
			"resolved": true,
			"reason": "EXACT_NAME",
		});

		assert!(parse_decision(json).is_err());
	}

	#[test]
	fn rejects_missing_reason() {
		let json = serde_json::json!({
			"resolved": false,
			"reason": "  ",
		});

		assert!(parse_decision(json).is_err());
	}
}
