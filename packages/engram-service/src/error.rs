pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}

impl Error {
	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::Conflict { .. })
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<engram_storage::Error> for Error {
	fn from(err: engram_storage::Error) -> Self {
		match err {
			engram_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			engram_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			engram_storage::Error::NotFound(message) => Self::NotFound { message },
			engram_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
