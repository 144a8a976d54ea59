//! Bounded Worker (C8): a back-pressured queue with a concurrency cap
//! for ingestion tasks.
//!
//! Modeled on the `JobManager`/task-dispatcher pairing in
//! `infrastructure/jobs/manager.rs` but stripped to a simpler shape: a
//! bounded `tokio::sync::mpsc` channel plus a `Semaphore`, rather than
//! full resumable-job machinery (checkpointing, a job database) — that
//! belongs to a persistent job system this engine doesn't need.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::error;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A type-erased unit of work: a future the consumer loop drives to
/// completion under the concurrency semaphore.
pub trait WorkItem: Send + 'static {
	fn run(self: Box<Self>) -> BoxFuture;
}

#[async_trait]
pub trait Handler<T>: Send + Sync + 'static {
	async fn handle(&self, item: T);
}

struct Job<T> {
	item: T,
	handler: Arc<dyn Handler<T>>,
}

impl<T: Send + 'static> WorkItem for Job<T> {
	fn run(self: Box<Self>) -> BoxFuture {
		Box::pin(async move {
			self.handler.handle(self.item).await;
		})
	}
}

/// Back-pressured work queue: `enqueue` blocks (awaits) once the
/// bounded channel is full, and the consumer loop caps concurrent
/// handler execution with a semaphore sized to host parallelism by
/// default.
pub struct BoundedWorker {
	sender: mpsc::Sender<Box<dyn WorkItem>>,
	pending: Arc<AtomicUsize>,
	in_flight: Arc<AtomicUsize>,
	consumer: Option<JoinHandle<()>>,
}

impl BoundedWorker {
	pub fn new(queue_capacity: usize, concurrency: usize) -> Self {
		let (sender, receiver) = mpsc::channel(queue_capacity);
		let pending = Arc::new(AtomicUsize::new(0));
		let in_flight = Arc::new(AtomicUsize::new(0));
		let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

		let consumer = tokio::spawn(Self::consume(receiver, semaphore, pending.clone(), in_flight.clone()));

		Self {
			sender,
			pending,
			in_flight,
			consumer: Some(consumer),
		}
	}

	pub fn with_host_parallelism(queue_capacity: usize) -> Self {
		let concurrency = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
		Self::new(queue_capacity, concurrency)
	}

	async fn consume(
		mut receiver: mpsc::Receiver<Box<dyn WorkItem>>,
		semaphore: Arc<Semaphore>,
		pending: Arc<AtomicUsize>,
		in_flight: Arc<AtomicUsize>,
	) {
		let mut in_flight_tasks = Vec::new();

		while let Some(item) = receiver.recv().await {
			let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
			pending.fetch_sub(1, Ordering::SeqCst);
			in_flight.fetch_add(1, Ordering::SeqCst);

			let in_flight_counter = in_flight.clone();
			let task = tokio::spawn(async move {
				item.run().await;
				drop(permit);
				in_flight_counter.fetch_sub(1, Ordering::SeqCst);
			});
			in_flight_tasks.push(task);
			in_flight_tasks.retain(|task: &JoinHandle<()>| !task.is_finished());
		}

		for task in in_flight_tasks {
			if let Err(err) = task.await {
				// Handler panics are logged, never stop the worker.
				error!("ingestion task panicked: {err}");
			}
		}
	}

	/// Enqueues `item` for `handler`; back-pressures (awaits) when the
	/// bounded channel is full.
	pub async fn enqueue<T: Send + 'static>(&self, item: T, handler: Arc<dyn Handler<T>>) -> Result<(), T> {
		self.pending.fetch_add(1, Ordering::SeqCst);
		let job: Box<dyn WorkItem> = Box::new(Job { item, handler });
		if self.sender.send(job).await.is_err() {
			self.pending.fetch_sub(1, Ordering::SeqCst);
			error!("bounded worker channel closed, dropping work item");
		}
		Ok(())
	}

	pub fn pending_count(&self) -> usize {
		self.pending.load(Ordering::SeqCst) + self.in_flight.load(Ordering::SeqCst)
	}

	/// Closes the writer side, awaits the consumer loop draining the
	/// channel, then awaits in-flight completion.
	pub async fn drain(mut self) {
		drop(self.sender);
		if let Some(consumer) = self.consumer.take() {
			let _ = consumer.await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::sync::atomic::AtomicU32;
	use std::time::Duration;

	struct Counter(Arc<AtomicU32>);

	#[async_trait]
	impl Handler<u32> for Counter {
		async fn handle(&self, item: u32) {
			tokio::time::sleep(Duration::from_millis(5)).await;
			self.0.fetch_add(item, Ordering::SeqCst);
		}
	}

	#[tokio::test]
	async fn processes_every_enqueued_item() {
		let worker = BoundedWorker::new(16, 4);
		let total = Arc::new(AtomicU32::new(0));
		let handler: Arc<dyn Handler<u32>> = Arc::new(Counter(total.clone()));

		for i in 1..=10u32 {
			worker.enqueue(i, handler.clone()).await.unwrap();
		}

		worker.drain().await;
		assert_eq!(total.load(Ordering::SeqCst), 55);
	}

	#[tokio::test]
	async fn pending_count_reflects_queued_and_in_flight_work() {
		let worker = BoundedWorker::new(16, 2);
		let total = Arc::new(AtomicU32::new(0));
		let handler: Arc<dyn Handler<u32>> = Arc::new(Counter(total.clone()));
		for i in 0..5u32 {
			worker.enqueue(i, handler.clone()).await.unwrap();
		}
		assert!(worker.pending_count() > 0);
		worker.drain().await;
	}
}
