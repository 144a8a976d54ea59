//! Shared buffer pool for the hasher's read chunks. Buffers are
//! returned to the pool on every exit path — success, error, or
//! cancellation — via the guard's `Drop`.

use std::sync::Mutex;

pub struct BufferPool {
	chunk_size: usize,
	free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
	pub fn new(chunk_size: usize) -> Self {
		Self {
			chunk_size,
			free: Mutex::new(Vec::new()),
		}
	}

	pub fn acquire(&self) -> BufferGuard<'_> {
		let buffer = self
			.free
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.pop()
			.unwrap_or_else(|| vec![0u8; self.chunk_size]);
		BufferGuard { pool: self, buffer: Some(buffer) }
	}
}

pub struct BufferGuard<'a> {
	pool: &'a BufferPool,
	buffer: Option<Vec<u8>>,
}

impl<'a> BufferGuard<'a> {
	pub fn as_mut_slice(&mut self) -> &mut [u8] {
		self.buffer.as_mut().expect("buffer taken before guard dropped")
	}
}

impl<'a> Drop for BufferGuard<'a> {
	fn drop(&mut self) {
		if let Some(buffer) = self.buffer.take() {
			self.pool
				.free
				.lock()
				.unwrap_or_else(|poisoned| poisoned.into_inner())
				.push(buffer);
		}
	}
}
