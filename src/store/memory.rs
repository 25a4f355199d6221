//! Thread-safe in-memory [`VaultStore`] implementation for local development and tests.

// std
use std::collections::VecDeque;
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, UserId},
	store::{RecordKey, StoreError, StoreFuture, StoredCredential, VaultStore},
};

/// Thread-safe storage backend that keeps envelopes and audit lines in-process.
#[derive(Debug, Default)]
pub struct MemoryStore {
	records: RwLock<HashMap<RecordKey, StoredCredential>>,
	log: RwLock<VecDeque<String>>,
}
impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}
}
impl VaultStore for MemoryStore {
	fn put(&self, record: StoredCredential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.records.write().insert(record.key(), record);

			Ok(())
		})
	}

	fn get<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, Option<StoredCredential>> {
		Box::pin(async move { Ok(self.records.read().get(key).cloned()) })
	}

	fn delete<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.records.write().remove(key).is_some()) })
	}

	fn delete_all<'a>(
		&'a self,
		user: &'a UserId,
		provider: &'a ProviderId,
	) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let mut guard = self.records.write();
			let before = guard.len();

			guard.retain(|key, _| !(key.user == *user && key.provider == *provider));

			Ok((before - guard.len()) as u64)
		})
	}

	fn list(&self) -> StoreFuture<'_, Vec<RecordKey>> {
		Box::pin(async move { Ok(self.records.read().keys().cloned().collect()) })
	}

	fn append_log(&self, line: String) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.log.write().push_back(line);

			Ok(())
		})
	}

	fn trim_log(&self, max_entries: usize) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.log.write();

			while guard.len() > max_entries {
				guard.pop_front();
			}

			Ok(())
		})
	}

	fn read_log(&self) -> StoreFuture<'_, Vec<String>> {
		Box::pin(async move { Ok(self.log.read().iter().cloned().collect()) })
	}
}
