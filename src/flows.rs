//! OAuth linking flows: authorize-URL construction and callback handling.
//!
//! Each linking attempt moves through start → awaiting-callback → completed or
//! failed, and never holds state beyond that attempt. The `state` value is
//! generated server-side and resolved server-side at the callback—an unsigned
//! client-supplied `state` is never trusted on its own. A callback whose state
//! matches no pending authorization is a security-significant rejection
//! (CSRF/replay defense), audited and terminal, never retried.

pub mod pending;
pub mod session;

pub use pending::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	audit::{AuditAction, AuditSink},
	auth::{Credential, CredentialKey, ProviderId, ScopeSet, UserId},
	error::SecurityError,
	http::HttpTransport,
	oauth::TokenClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderRegistry,
	vault::CredentialVault,
};

/// Result of a completed linking attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedLink {
	/// Account that linked the integration.
	pub user: UserId,
	/// Linked provider.
	pub provider: ProviderId,
	/// Scope-class the credential was stored under.
	pub scope: ScopeSet,
}

/// Drives the three-legged OAuth handshake for every registered provider.
pub struct LinkCoordinator {
	registry: Arc<ProviderRegistry>,
	vault: Arc<CredentialVault>,
	transport: Arc<dyn HttpTransport>,
	audit: Arc<AuditSink>,
	pending: PendingAuthorizations,
}
impl LinkCoordinator {
	/// Creates a coordinator over the provided collaborators.
	pub fn new(
		registry: Arc<ProviderRegistry>,
		vault: Arc<CredentialVault>,
		transport: Arc<dyn HttpTransport>,
		audit: Arc<AuditSink>,
		pending_ttl: Duration,
	) -> Self {
		Self { registry, vault, transport, audit, pending: PendingAuthorizations::new(pending_ttl) }
	}

	/// Starts a linking attempt: builds the provider authorize URL and records
	/// the pending authorization keyed by its fresh `state`.
	pub async fn start_link(
		&self,
		user: UserId,
		provider: &ProviderId,
		scope: ScopeSet,
	) -> Result<LinkSession> {
		const KIND: FlowKind = FlowKind::Link;

		let span = FlowSpan::new(KIND, "start_link");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let handle = self.registry.get(provider)?;
				let state = session::random_string(session::STATE_LEN);
				let pkce = handle.uses_pkce().then(PkcePair::generate);
				let authorize_url = session::build_authorize_url(
					&handle.descriptor,
					&handle.client_id,
					&handle.redirect_uri,
					&scope,
					&state,
					pkce.as_ref(),
				);

				self.pending.insert(PendingAuthorization {
					state: state.clone(),
					user: user.clone(),
					provider: provider.clone(),
					scope: scope.clone(),
					redirect_uri: handle.redirect_uri.clone(),
					code_verifier: pkce.map(PkcePair::into_verifier),
					created_at: OffsetDateTime::now_utc(),
				});

				Ok(LinkSession { user, provider: provider.clone(), scope, state, authorize_url })
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Completes a linking attempt: validates the returned `state`, exchanges
	/// the code, and stores the sealed credential.
	///
	/// The pending authorization is consumed exactly once—a replayed `state`
	/// fails before any token exchange is attempted.
	pub async fn handle_callback(&self, code: &str, state: &str) -> Result<CompletedLink> {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "handle_callback");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.complete_callback(code, state)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Number of authorizations currently awaiting their callback.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	async fn complete_callback(&self, code: &str, state: &str) -> Result<CompletedLink> {
		let now = OffsetDateTime::now_utc();
		let pending = match self.pending.take(state, now) {
			PendingLookup::Valid(pending) => pending,
			PendingLookup::Expired => {
				self.audit
					.record(AuditAction::SecurityRejected, None, "reason=expired_state")
					.await;

				return Err(SecurityError::ExpiredState.into());
			},
			PendingLookup::Unknown => {
				self.audit
					.record(AuditAction::SecurityRejected, None, "reason=unknown_state")
					.await;

				return Err(SecurityError::UnknownState.into());
			},
		};
		let handle = self.registry.get(&pending.provider)?;
		let client = TokenClient::new(handle, self.transport.clone());
		let grant = client
			.exchange_code(code, &pending.redirect_uri, pending.code_verifier.as_deref())
			.await?;
		let issued = OffsetDateTime::now_utc();
		let credential = Credential {
			key: CredentialKey::new(pending.user.clone(), pending.provider.clone()),
			scope: pending.scope.clone(),
			access_token: grant.access_token,
			refresh_token: grant.refresh_token,
			expires_at: grant.expires_in.map(|lifetime| issued + lifetime),
			issued_at: issued,
			updated_at: issued,
		};

		self.vault.store(credential).await?;
		self.audit
			.record(
				AuditAction::TokenIssued,
				Some(pending.user.clone()),
				format!("provider={} scope={}", pending.provider, pending.scope),
			)
			.await;

		Ok(CompletedLink { user: pending.user, provider: pending.provider, scope: pending.scope })
	}
}
impl Debug for LinkCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LinkCoordinator")
			.field("registry", &self.registry)
			.field("pending", &self.pending.len())
			.finish()
	}
}
