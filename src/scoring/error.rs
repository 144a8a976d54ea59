use thiserror::Error;

/// Per-field resolution failure. The engine catches this at the field
/// boundary and skips the field silently rather than letting a single
/// bad field abort the whole entity.
#[derive(Debug, Error)]
pub enum FieldResolutionError {
	#[error("no claims to resolve")]
	Empty,
}
