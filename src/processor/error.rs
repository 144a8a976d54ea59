use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
	#[error("io error reading file: {0}")]
	Io(#[from] std::io::Error),

	#[error("processor registry semaphore closed")]
	RegistryClosed,
}
