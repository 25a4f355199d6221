//! Server-side pending-authorization store keyed by `state`.
//!
//! Entries are consumed exactly once: a successful take removes the entry, so a
//! replayed callback resolves to `Unknown` and fails before any token exchange.
//! Expired entries are purged opportunistically on insert and lookup. The store
//! is in-memory and therefore single-process; a horizontally scaled deployment
//! needs a shared short-TTL store so the callback can land on any instance.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, UserId},
};

/// Lifetime of a pending authorization before its state stops being honored.
pub const DEFAULT_PENDING_TTL: Duration = Duration::minutes(10);

/// One linking attempt awaiting its callback.
#[derive(Clone)]
pub struct PendingAuthorization {
	/// Single-use state value the callback must echo.
	pub state: String,
	/// Account that started the link.
	pub user: UserId,
	/// Provider being linked.
	pub provider: ProviderId,
	/// Requested scope set.
	pub scope: ScopeSet,
	/// Redirect URI the authorize URL was built with.
	pub redirect_uri: Url,
	/// PKCE verifier attached to the exchange request, when the provider uses PKCE.
	pub code_verifier: Option<String>,
	/// Instant the attempt was started.
	pub created_at: OffsetDateTime,
}
impl Debug for PendingAuthorization {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingAuthorization")
			.field("state", &self.state)
			.field("user", &self.user)
			.field("provider", &self.provider)
			.field("scope", &self.scope)
			.field("code_verifier", &self.code_verifier.as_ref().map(|_| "<redacted>"))
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Outcome of resolving a callback `state`.
#[derive(Debug)]
pub enum PendingLookup {
	/// The state matched a live pending authorization; it has been consumed.
	Valid(PendingAuthorization),
	/// The state matched an entry that outlived its TTL; it has been discarded.
	Expired,
	/// The state matched nothing this process issued.
	Unknown,
}

/// In-memory TTL store for pending authorizations.
#[derive(Debug)]
pub struct PendingAuthorizations {
	ttl: Duration,
	entries: Mutex<HashMap<String, PendingAuthorization>>,
}
impl PendingAuthorizations {
	/// Creates a store whose entries expire after `ttl`.
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, entries: Mutex::new(HashMap::new()) }
	}

	/// Records a pending authorization keyed by its state.
	pub fn insert(&self, pending: PendingAuthorization) {
		let mut entries = self.entries.lock();
		let now = OffsetDateTime::now_utc();

		entries.retain(|_, entry| now - entry.created_at < self.ttl);
		entries.insert(pending.state.clone(), pending);
	}

	/// Consumes the entry for `state`, exactly once.
	pub fn take(&self, state: &str, now: OffsetDateTime) -> PendingLookup {
		let mut entries = self.entries.lock();

		match entries.remove(state) {
			Some(entry) if now - entry.created_at < self.ttl => PendingLookup::Valid(entry),
			Some(_) => PendingLookup::Expired,
			None => PendingLookup::Unknown,
		}
	}

	/// Number of live entries.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when nothing is awaiting a callback.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}
impl Default for PendingAuthorizations {
	fn default() -> Self {
		Self::new(DEFAULT_PENDING_TTL)
	}
}
