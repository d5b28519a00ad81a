const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}

impl Error {
	/// Maps a unique-constraint violation onto `Conflict`, which callers
	/// treat as "the row already exists; fall back to update". Any other
	/// database error passes through unchanged.
	pub fn from_insert(err: sqlx::Error, context: &str) -> Self {
		if is_unique_violation(&err) {
			return Self::Conflict(context.to_string());
		}

		Self::Sqlx(err)
	}

	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::Conflict(_))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Database(db_err) =>
			db_err.code().map(|code| code == PG_UNIQUE_VIOLATION).unwrap_or(false),
		_ => false,
	}
}
