//! Append-only audit trail for security-relevant credential events.
//!
//! Recording is fire-and-forget from the caller's perspective: a failing
//! backend is reported to the process log and never propagated, because audit
//! trouble must not block a security operation. Entries are immutable once
//! written; the only permitted mutation is retention trimming, oldest-first.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	obs,
	store::{StoreError, VaultStore},
};

const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Security-relevant actions recorded in the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
	/// A credential was stored after a completed link flow.
	TokenIssued,
	/// A credential was replaced by a successful refresh.
	TokenRefreshed,
	/// A credential was deleted because the provider no longer honors it.
	TokenRevoked,
	/// A credential was deleted at the user's request.
	Disconnected,
	/// A callback or payload was rejected for security reasons.
	SecurityRejected,
}
impl AuditAction {
	/// Returns a stable label suitable for log lines and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuditAction::TokenIssued => "token_issued",
			AuditAction::TokenRefreshed => "token_refreshed",
			AuditAction::TokenRevoked => "token_revoked",
			AuditAction::Disconnected => "disconnected",
			AuditAction::SecurityRejected => "security_rejected",
		}
	}
}
impl Display for AuditAction {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Immutable audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
	/// What happened.
	pub action: AuditAction,
	/// Affected account, when known (security rejections may not resolve one).
	pub user: Option<UserId>,
	/// Instant the entry was recorded.
	pub at: OffsetDateTime,
	/// Free-form detail; never contains token material.
	pub detail: String,
}

/// Append-only sink writing audit entries through the persistence collaborator.
pub struct AuditSink {
	store: Arc<dyn VaultStore>,
	max_entries: usize,
}
impl AuditSink {
	/// Creates a sink with the default retention bound.
	pub fn new(store: Arc<dyn VaultStore>) -> Self {
		Self { store, max_entries: DEFAULT_MAX_ENTRIES }
	}

	/// Overrides the retention bound.
	pub fn with_max_entries(mut self, max_entries: usize) -> Self {
		self.max_entries = max_entries;

		self
	}

	/// Appends one entry; backend failures are logged, never raised.
	pub async fn record(
		&self,
		action: AuditAction,
		user: Option<UserId>,
		detail: impl Into<String>,
	) {
		let entry = AuditEntry {
			action,
			user,
			at: OffsetDateTime::now_utc(),
			detail: detail.into(),
		};
		let line = match serde_json::to_string(&entry) {
			Ok(line) => line,
			Err(e) => {
				obs::record_warning("audit_serialize_failed", &e.to_string());

				return;
			},
		};

		if let Err(e) = self.store.append_log(line).await {
			obs::record_warning("audit_append_failed", &e.to_string());

			return;
		}
		if let Err(e) = self.store.trim_log(self.max_entries).await {
			obs::record_warning("audit_trim_failed", &e.to_string());
		}
	}

	/// Reads the retained entries in append order.
	pub async fn entries(&self) -> Result<Vec<AuditEntry>, StoreError> {
		self.store
			.read_log()
			.await?
			.iter()
			.map(|line| {
				serde_json::from_str(line).map_err(|e| StoreError::Serialization {
					message: format!("Failed to parse audit line: {e}"),
				})
			})
			.collect()
	}
}
impl Debug for AuditSink {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuditSink").field("max_entries", &self.max_entries).finish()
	}
}
