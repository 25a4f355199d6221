//! Persistence collaborator contracts and built-in store implementations.
//!
//! The vault is agnostic to the backing engine: anything that can persist
//! sealed credential envelopes keyed by (user, provider, scope-class) and
//! append audit lines satisfies [`VaultStore`]. Credentials are only ever
//! handed to a store in sealed form—plaintext never crosses this boundary.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, UserId},
};

/// Boxed future returned by [`VaultStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Error type produced by [`VaultStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique key identifying a stored credential envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
	/// Account that owns the credential.
	pub user: UserId,
	/// Provider that minted the credential.
	pub provider: ProviderId,
	/// Scope-class fingerprint used for partitioning.
	pub scope_fingerprint: String,
}
impl RecordKey {
	/// Builds a key for the provided user, provider, and scope set.
	pub fn new(user: UserId, provider: ProviderId, scope: &ScopeSet) -> Self {
		Self { user, provider, scope_fingerprint: scope.fingerprint() }
	}
}

/// Persisted credential envelope: sealed payload plus lookup metadata.
///
/// `encrypted_payload` is base64(nonce ‖ tag ‖ ciphertext); the store never
/// sees plaintext token material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
	/// Stable record identifier.
	pub id: String,
	/// Account that owns the credential.
	pub user: UserId,
	/// Provider that minted the credential.
	pub provider: ProviderId,
	/// Scope-class fingerprint used for partitioning.
	pub scope_fingerprint: String,
	/// Sealed credential payload.
	pub encrypted_payload: String,
	/// Instant the envelope was first written.
	pub created_at: OffsetDateTime,
	/// Instant the envelope was last replaced.
	pub updated_at: OffsetDateTime,
}
impl StoredCredential {
	/// Derives the lookup key for this envelope.
	pub fn key(&self) -> RecordKey {
		RecordKey {
			user: self.user.clone(),
			provider: self.provider.clone(),
			scope_fingerprint: self.scope_fingerprint.clone(),
		}
	}
}

/// Storage backend contract implemented by credential stores.
pub trait VaultStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the envelope for its (user, provider, scope-class) key.
	fn put(&self, record: StoredCredential) -> StoreFuture<'_, ()>;

	/// Fetches the envelope for the key, if present. Absence is not an error.
	fn get<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, Option<StoredCredential>>;

	/// Deletes the envelope for the key; returns whether anything was removed.
	fn delete<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, bool>;

	/// Deletes every envelope for the user/provider pair across scope-classes;
	/// returns the number of removed envelopes.
	fn delete_all<'a>(
		&'a self,
		user: &'a UserId,
		provider: &'a ProviderId,
	) -> StoreFuture<'a, u64>;

	/// Lists the keys of every stored envelope (used by the refresh sweep).
	fn list(&self) -> StoreFuture<'_, Vec<RecordKey>>;

	/// Appends one serialized audit line to the append-only log.
	fn append_log(&self, line: String) -> StoreFuture<'_, ()>;

	/// Trims the audit log to at most `max_entries` lines, dropping oldest-first.
	fn trim_log(&self, max_entries: usize) -> StoreFuture<'_, ()>;

	/// Reads the audit log lines in append order.
	fn read_log(&self) -> StoreFuture<'_, Vec<String>>;
}
