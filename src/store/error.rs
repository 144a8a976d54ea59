use thiserror::Error;

pub type StoreResult<T = ()> = Result<T, StoreError>;

/// Failure modes for the Store: transient read failures are
/// reported separately from fatal structural corruption so that callers
/// can retry the former and must not retry the latter.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("store unavailable: {0}")]
	Unavailable(#[from] sea_orm::DbErr),

	#[error("store integrity check failed: {0}")]
	Corrupt(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}
