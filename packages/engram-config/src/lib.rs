mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ArbiterConfig, Config, EmbeddingProviderConfig, LlmProviderConfig, Memory, Postgres,
	ProviderConfig, Providers, Resolution, Retrieval, Salience, Service, Storage,
};

use std::{fs, path::Path};

pub const ARBITER_MODE_RULES: &str = "rules";
pub const ARBITER_MODE_EXTERNAL: &str = "external";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}

	match cfg.providers.arbiter.mode.as_str() {
		ARBITER_MODE_RULES => (),
		ARBITER_MODE_EXTERNAL => {
			let Some(external) = cfg.providers.arbiter.external.as_ref() else {
				return Err(Error::Validation {
					message:
						"providers.arbiter.external is required when providers.arbiter.mode is external."
							.to_string(),
				});
			};

			if external.api_base.trim().is_empty() || external.api_key.trim().is_empty() {
				return Err(Error::Validation {
					message:
						"providers.arbiter.external api_base and api_key must be non-empty."
							.to_string(),
				});
			}
		},
		other => {
			return Err(Error::Validation {
				message: format!("providers.arbiter.mode must be one of rules or external; got {other}."),
			});
		},
	}

	if cfg.resolution.candidate_limit == 0 {
		return Err(Error::Validation {
			message: "resolution.candidate_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.resolution.fuzzy_limit == 0 {
		return Err(Error::Validation {
			message: "resolution.fuzzy_limit must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.resolution.embedding_min_score) {
		return Err(Error::Validation {
			message: "resolution.embedding_min_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.resolution.accept_embedding_score) {
		return Err(Error::Validation {
			message: "resolution.accept_embedding_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.resolution.accept_embedding_score < cfg.resolution.embedding_min_score {
		return Err(Error::Validation {
			message:
				"resolution.accept_embedding_score must not be below resolution.embedding_min_score."
					.to_string(),
		});
	}
	if cfg.resolution.accept_fuzzy_distance > cfg.resolution.fuzzy_max_distance {
		return Err(Error::Validation {
			message:
				"resolution.accept_fuzzy_distance must not exceed resolution.fuzzy_max_distance."
					.to_string(),
		});
	}
	if cfg.resolution.embed_retry_attempts == 0 {
		return Err(Error::Validation {
			message: "resolution.embed_retry_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.memory.max_notes == 0 {
		return Err(Error::Validation {
			message: "memory.max_notes must be greater than zero.".to_string(),
		});
	}
	if cfg.memory.max_name_chars == 0 {
		return Err(Error::Validation {
			message: "memory.max_name_chars must be greater than zero.".to_string(),
		});
	}
	if !(0.05..=0.10).contains(&cfg.salience.access_boost) {
		return Err(Error::Validation {
			message: "salience.access_boost must be in the range 0.05-0.10.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.vector_min_score) {
		return Err(Error::Validation {
			message: "retrieval.vector_min_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.retrieval.vector_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.vector_limit must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.text_min_score) {
		return Err(Error::Validation {
			message: "retrieval.text_min_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.retrieval.neighbor_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.neighbor_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.max_hops == 0 {
		return Err(Error::Validation {
			message: "retrieval.max_hops must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
	if cfg
		.providers
		.arbiter
		.external
		.as_ref()
		.map(|external| external.api_base.trim().is_empty() && external.api_key.trim().is_empty())
		.unwrap_or(false)
		&& cfg.providers.arbiter.mode == ARBITER_MODE_RULES
	{
		cfg.providers.arbiter.external = None;
	}
}
