//! Encrypted credential vault: store, lookup, proactive refresh, revocation.
//!
//! The vault exclusively owns credential reads and writes. Payloads are sealed
//! with AES-256-GCM before they reach the persistence collaborator and opened
//! only for the duration of a single operation. [`CredentialVault::ensure_fresh`]
//! serializes concurrent refreshes per key behind an async guard, so two
//! request flows observing the same expiring credential produce one provider
//! refresh, not two.

pub mod cipher;

pub use cipher::*;

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	audit::{AuditAction, AuditSink},
	auth::{Credential, ProviderId, ScopeSet, UserId},
	error::AuthError,
	http::HttpTransport,
	oauth::TokenClient,
	obs,
	provider::ProviderRegistry,
	store::{RecordKey, StoreError, StoredCredential, VaultStore},
};

/// Buffer applied by request-path freshness checks (scheduled providers).
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::minutes(5);

const RECORD_ID_LEN: usize = 20;

/// Why a credential is being removed; determines the audit action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevocationReason {
	/// The user explicitly unlinked the integration.
	Disconnect,
	/// The provider reported the grant as revoked (refresh rejection, webhook).
	ProviderRevoked,
	/// The owning account was deleted.
	AccountDeleted,
}
impl RevocationReason {
	/// Returns a stable label suitable for audit details.
	pub const fn as_str(self) -> &'static str {
		match self {
			RevocationReason::Disconnect => "disconnect",
			RevocationReason::ProviderRevoked => "provider_revoked",
			RevocationReason::AccountDeleted => "account_deleted",
		}
	}

	const fn audit_action(self) -> AuditAction {
		match self {
			RevocationReason::Disconnect => AuditAction::Disconnected,
			RevocationReason::ProviderRevoked | RevocationReason::AccountDeleted =>
				AuditAction::TokenRevoked,
		}
	}
}

/// Encrypted credential store with proactive refresh.
pub struct CredentialVault {
	store: Arc<dyn VaultStore>,
	cipher: CredentialCipher,
	audit: Arc<AuditSink>,
	registry: Arc<ProviderRegistry>,
	transport: Arc<dyn HttpTransport>,
	guards: Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>,
}
impl CredentialVault {
	/// Creates a vault over the provided collaborators.
	pub fn new(
		store: Arc<dyn VaultStore>,
		cipher: CredentialCipher,
		audit: Arc<AuditSink>,
		registry: Arc<ProviderRegistry>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self { store, cipher, audit, registry, transport, guards: Mutex::new(HashMap::new()) }
	}

	/// Seals and persists a credential, replacing any prior grant for the same
	/// (user, provider, scope-class) key.
	pub async fn store(&self, credential: Credential) -> Result<()> {
		let key = RecordKey::new(
			credential.key.user.clone(),
			credential.key.provider.clone(),
			&credential.scope,
		);
		let existing = self.store.get(&key).await?;
		let envelope = self.seal(&key, existing.as_ref(), &credential)?;

		self.store.put(envelope).await?;

		Ok(())
	}

	/// Fetches and opens the credential for the key, if present.
	///
	/// Absence is a valid result, not an error; a sealed payload that fails
	/// authentication is a security failure and is audited.
	pub async fn lookup(
		&self,
		user: &UserId,
		provider: &ProviderId,
		scope: &ScopeSet,
	) -> Result<Option<Credential>> {
		let key = RecordKey::new(user.clone(), provider.clone(), scope);

		match self.store.get(&key).await? {
			Some(envelope) => Ok(Some(self.unseal(&envelope).await?)),
			None => Ok(None),
		}
	}

	/// Returns a credential guaranteed not to expire within `buffer`, refreshing
	/// through the provider's token endpoint when necessary.
	///
	/// Credentials without a refresh token are returned as-is with a process-log
	/// warning; callers must treat downstream 401s as a re-authorization signal.
	pub async fn ensure_fresh(
		&self,
		user: &UserId,
		provider: &ProviderId,
		scope: &ScopeSet,
		buffer: Duration,
	) -> Result<Credential> {
		let key = RecordKey::new(user.clone(), provider.clone(), scope);

		self.ensure_fresh_by_key(&key, buffer).await
	}

	/// Key-addressed variant of [`ensure_fresh`](Self::ensure_fresh) used by the
	/// background sweep, which only knows stored keys.
	pub async fn ensure_fresh_by_key(&self, key: &RecordKey, buffer: Duration) -> Result<Credential> {
		let handle = self.registry.get(&key.provider)?;
		let guard = self.flow_guard(key);
		let _serialized = guard.lock().await;
		let envelope = self.store.get(key).await?.ok_or_else(|| AuthError::NotLinked {
			provider: key.provider.to_string(),
		})?;
		let credential = self.unseal(&envelope).await?;
		let now = OffsetDateTime::now_utc();

		if !credential.is_expired_at(now) && !credential.expires_within(buffer, now) {
			return Ok(credential);
		}

		let Some(refresh_token) = credential.refresh_token.clone() else {
			obs::record_warning(
				"refresh_token_missing",
				&format!("provider={} user={}", key.provider, key.user),
			);

			return Ok(credential);
		};
		let client = TokenClient::new(handle, self.transport.clone());
		let grant = match client.refresh(&refresh_token).await {
			Ok(grant) => grant,
			Err(err) => {
				if matches!(err, Error::Auth(AuthError::InvalidGrant { .. } | AuthError::Revoked))
				{
					// The provider will never honor this grant again; drop it so
					// stale secrets are not reused.
					let _ = self.store.delete(key).await;

					self.audit
						.record(
							AuditAction::TokenRevoked,
							Some(key.user.clone()),
							format!("provider={} reason=refresh_rejected", key.provider),
						)
						.await;
				}

				return Err(err);
			},
		};
		let now = OffsetDateTime::now_utc();
		let rotated = Credential {
			key: credential.key.clone(),
			scope: credential.scope.clone(),
			access_token: grant.access_token,
			// Providers that do not rotate refresh tokens omit them from the
			// refresh response; keep the previous secret in that case.
			refresh_token: grant.refresh_token.or(credential.refresh_token),
			expires_at: grant.expires_in.map(|lifetime| now + lifetime),
			issued_at: now,
			updated_at: now,
		};
		let replacement = self.seal(key, Some(&envelope), &rotated)?;

		self.store.put(replacement).await?;
		self.audit
			.record(
				AuditAction::TokenRefreshed,
				Some(key.user.clone()),
				format!("provider={}", key.provider),
			)
			.await;

		Ok(rotated)
	}

	/// Deletes every credential for the user/provider pair; idempotent.
	///
	/// Returns `true` when at least one credential was removed. Removal is
	/// audited with an action derived from `reason`.
	pub async fn revoke(
		&self,
		user: &UserId,
		provider: &ProviderId,
		reason: RevocationReason,
	) -> Result<bool> {
		let removed = self.store.delete_all(user, provider).await?;

		if removed > 0 {
			self.audit
				.record(
					reason.audit_action(),
					Some(user.clone()),
					format!("provider={provider} reason={} removed={removed}", reason.as_str()),
				)
				.await;
		}

		Ok(removed > 0)
	}

	/// Lists the keys of every stored credential (used by the refresh sweep).
	pub async fn list_keys(&self) -> Result<Vec<RecordKey>> {
		Ok(self.store.list().await?)
	}

	/// Returns the registry the vault resolves providers from.
	pub fn registry(&self) -> &Arc<ProviderRegistry> {
		&self.registry
	}

	fn seal(
		&self,
		key: &RecordKey,
		existing: Option<&StoredCredential>,
		credential: &Credential,
	) -> Result<StoredCredential> {
		let plaintext = serde_json::to_vec(credential).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize credential: {e}"),
		})?;
		let payload = self.cipher.seal(&plaintext)?;
		let now = OffsetDateTime::now_utc();

		Ok(StoredCredential {
			id: existing.map_or_else(new_record_id, |envelope| envelope.id.clone()),
			user: key.user.clone(),
			provider: key.provider.clone(),
			scope_fingerprint: key.scope_fingerprint.clone(),
			encrypted_payload: payload,
			created_at: existing.map_or(now, |envelope| envelope.created_at),
			updated_at: now,
		})
	}

	async fn unseal(&self, envelope: &StoredCredential) -> Result<Credential> {
		match self.cipher.open(&envelope.encrypted_payload) {
			Ok(plaintext) => match serde_json::from_slice(&plaintext) {
				Ok(credential) => Ok(credential),
				Err(_) => {
					self.audit_tamper(envelope).await;

					Err(crate::error::SecurityError::Tampered.into())
				},
			},
			Err(err) => {
				self.audit_tamper(envelope).await;

				Err(err.into())
			},
		}
	}

	async fn audit_tamper(&self, envelope: &StoredCredential) {
		self.audit
			.record(
				AuditAction::SecurityRejected,
				Some(envelope.user.clone()),
				format!("provider={} reason=unseal_failed id={}", envelope.provider, envelope.id),
			)
			.await;
	}

	fn flow_guard(&self, key: &RecordKey) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Debug for CredentialVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialVault")
			.field("registry", &self.registry)
			.field("guards", &self.guards.lock().len())
			.finish()
	}
}

fn new_record_id() -> String {
	let suffix: String =
		rand::rng().sample_iter(Alphanumeric).take(RECORD_ID_LEN).map(char::from).collect();

	format!("tok_{suffix}")
}
