// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deduplication of concurrent operations on the same key.
//!
//! The first caller for a key starts the operation on a spawned task; later
//! callers for the same key wait on the same result. The operation gets its
//! own [`CancellationToken`], a child of the registry's shutdown token, which
//! fires once every waiter has gone away.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

struct Entry<T> {
	generation: u64,
	waiters: usize,
	cancel: CancellationToken,
	result: watch::Receiver<Option<T>>,
}

type Entries<T> = Arc<Mutex<HashMap<String, Entry<T>>>>;

fn lock<T>(entries: &Entries<T>) -> MutexGuard<'_, HashMap<String, Entry<T>>> {
	entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of operations currently in flight, keyed by string.
pub struct InflightRegistry<T> {
	entries: Entries<T>,
	shutdown: CancellationToken,
	next_generation: AtomicU64,
}

/// Drops one waiter's interest; the last one out cancels the operation.
struct WaiterGuard<T> {
	entries: Entries<T>,
	key: String,
	generation: u64,
}

impl<T> Drop for WaiterGuard<T> {
	fn drop(&mut self) {
		let mut entries = lock(&self.entries);
		let Some(entry) = entries.get_mut(&self.key) else {
			return;
		};
		if entry.generation != self.generation {
			return;
		}
		entry.waiters = entry.waiters.saturating_sub(1);
		if entry.waiters == 0 {
			tracing::debug!(key = %self.key, "all waiters gone, cancelling operation");
			entry.cancel.cancel();
			entries.remove(&self.key);
		}
	}
}

impl<T> InflightRegistry<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new(shutdown: CancellationToken) -> Self {
		Self {
			entries: Arc::new(Mutex::new(HashMap::new())),
			shutdown,
			next_generation: AtomicU64::new(0),
		}
	}

	/// Number of keys with an operation in flight.
	pub fn len(&self) -> usize {
		lock(&self.entries).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Join the operation in flight for `key`, or start one with `start`.
	///
	/// Returns `None` only if the operation's task died without producing a
	/// result.
	pub async fn run<F, Fut>(&self, key: &str, start: F) -> Option<T>
	where
		F: FnOnce(CancellationToken) -> Fut,
		Fut: Future<Output = T> + Send + 'static,
	{
		let (mut rx, _guard) = {
			let mut entries = lock(&self.entries);
			match entries.get_mut(key) {
				Some(entry) => {
					entry.waiters += 1;
					tracing::debug!(key, waiters = entry.waiters, "joining in-flight operation");
					let guard = WaiterGuard {
						entries: self.entries.clone(),
						key: key.to_string(),
						generation: entry.generation,
					};
					(entry.result.clone(), guard)
				}
				None => {
					let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
					let cancel = self.shutdown.child_token();
					let (tx, rx) = watch::channel(None);
					entries.insert(
						key.to_string(),
						Entry {
							generation,
							waiters: 1,
							cancel: cancel.clone(),
							result: rx.clone(),
						},
					);

					let operation = start(cancel);
					let task_entries = self.entries.clone();
					let task_key = key.to_string();
					tokio::spawn(async move {
						let result = operation.await;
						{
							let mut entries = lock(&task_entries);
							if entries
								.get(&task_key)
								.is_some_and(|e| e.generation == generation)
							{
								entries.remove(&task_key);
							}
						}
						let _ = tx.send(Some(result));
					});

					let guard = WaiterGuard {
						entries: self.entries.clone(),
						key: key.to_string(),
						generation,
					};
					(rx, guard)
				}
			}
		};

		let outcome = rx
			.wait_for(Option::is_some)
			.await
			.ok()
			.and_then(|value| (*value).clone());
		outcome
	}
}
