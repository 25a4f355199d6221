//! Facade exposed to the route layer: link, callback, disconnect, call.
//!
//! [`IntegrationHub`] wires the vault, link coordinator, registry, and
//! transport together behind the four operations the HTTP layer consumes.
//! Collaborators are injected through [`HubBuilder`]—no module-level
//! singletons—so tests construct isolated hubs per case.

// self
use crate::{
	_prelude::*,
	audit::AuditSink,
	auth::{Credential, ProviderId, ScopeSet, UserId},
	error::{AuthError, ConfigError},
	flows::{CompletedLink, DEFAULT_PENDING_TTL, LinkCoordinator, LinkSession},
	http::{HttpTransport, ProviderRequest, ProviderResponse},
	oauth,
	obs::FlowKind,
	provider::{CallKind, ProviderHandle, ProviderRegistry},
	store::VaultStore,
	sweep::RefreshScheduler,
	vault::{CredentialCipher, CredentialVault, DEFAULT_REFRESH_BUFFER, MasterKey, RevocationReason},
};

/// Entry point for the credential and resilient-call subsystem.
pub struct IntegrationHub {
	vault: Arc<CredentialVault>,
	coordinator: LinkCoordinator,
	registry: Arc<ProviderRegistry>,
	transport: Arc<dyn HttpTransport>,
	refresh_buffer: Duration,
}
impl IntegrationHub {
	/// Returns a builder collecting the hub's collaborators.
	pub fn builder() -> HubBuilder {
		HubBuilder::default()
	}

	/// Starts a linking attempt and returns the authorize URL to redirect to.
	pub async fn start_link(
		&self,
		user: UserId,
		provider: &ProviderId,
		scope: ScopeSet,
	) -> Result<LinkSession> {
		self.coordinator.start_link(user, provider, scope).await
	}

	/// Completes a linking attempt from the provider's redirect parameters.
	pub async fn handle_callback(&self, code: &str, state: &str) -> Result<CompletedLink> {
		self.coordinator.handle_callback(code, state).await
	}

	/// Unlinks the provider for the user; idempotent.
	pub async fn disconnect(&self, user: &UserId, provider: &ProviderId) -> Result<bool> {
		self.vault.revoke(user, provider, RevocationReason::Disconnect).await
	}

	/// Removes credentials for lifecycle events other than a user disconnect
	/// (provider revocation webhooks, account deletion).
	pub async fn revoke(
		&self,
		user: &UserId,
		provider: &ProviderId,
		reason: RevocationReason,
	) -> Result<bool> {
		self.vault.revoke(user, provider, reason).await
	}

	/// Executes a provider API call with a fresh credential under the provider's
	/// admission and retry policy.
	///
	/// A 401 on the first pass may mean this flow lost a concurrent refresh race
	/// and used a superseded access token; in that case the stored credential is
	/// re-read and the call is repeated exactly once, outside the executor's own
	/// retry loop.
	pub async fn call_provider(
		&self,
		user: &UserId,
		provider: &ProviderId,
		scope: &ScopeSet,
		request: ProviderRequest,
	) -> Result<ProviderResponse> {
		let handle = self.registry.get(provider)?;
		let credential =
			self.vault.ensure_fresh(user, provider, scope, self.refresh_buffer).await?;

		match self.attempt_call(&handle, &credential, request.clone()).await {
			Err(Error::Auth(AuthError::Unauthorized { status: 401, .. })) => {
				let latest = self.vault.lookup(user, provider, scope).await?;

				match latest {
					Some(fresh) if fresh.access_token != credential.access_token =>
						self.attempt_call(&handle, &fresh, request).await,
					_ => Err(AuthError::Unauthorized {
						status: 401,
						reason: "access token rejected; re-authorization required".into(),
					}
					.into()),
				}
			},
			outcome => outcome,
		}
	}

	/// Creates a refresh scheduler bound to this hub's vault.
	pub fn refresh_scheduler(&self) -> RefreshScheduler {
		RefreshScheduler::new(self.vault.clone())
	}

	/// Returns the vault for direct credential management.
	pub fn vault(&self) -> &Arc<CredentialVault> {
		&self.vault
	}

	/// Returns the provider registry.
	pub fn registry(&self) -> &Arc<ProviderRegistry> {
		&self.registry
	}

	async fn attempt_call(
		&self,
		handle: &Arc<ProviderHandle>,
		credential: &Credential,
		request: ProviderRequest,
	) -> Result<ProviderResponse> {
		let executor = handle.executor();
		let strategy = handle.strategy.clone();
		let authorized = request.with_bearer(&credential.access_token);

		executor
			.execute(FlowKind::ProviderCall, |_| {
				let request = authorized.clone();
				let strategy = strategy.clone();

				async move {
					let response = self.transport.send(request).await?;

					if response.is_success() {
						Ok(response)
					} else {
						Err(oauth::classify_failure(strategy.as_ref(), CallKind::Api, &response))
					}
				}
			})
			.await
	}
}
impl Debug for IntegrationHub {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IntegrationHub")
			.field("registry", &self.registry)
			.field("refresh_buffer", &self.refresh_buffer)
			.finish()
	}
}

/// Builder collecting the hub's collaborators.
#[derive(Default)]
pub struct HubBuilder {
	store: Option<Arc<dyn VaultStore>>,
	master_key: Option<MasterKey>,
	registry: Option<ProviderRegistry>,
	transport: Option<Arc<dyn HttpTransport>>,
	pending_ttl: Option<Duration>,
	audit_retention: Option<usize>,
	refresh_buffer: Option<Duration>,
}
impl HubBuilder {
	/// Sets the persistence collaborator.
	pub fn store(mut self, store: Arc<dyn VaultStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Derives the vault key from a configured secret string.
	pub fn master_secret(mut self, secret: &str) -> Self {
		self.master_key = Some(MasterKey::derive(secret));

		self
	}

	/// Supplies the vault key directly.
	pub fn master_key(mut self, key: MasterKey) -> Self {
		self.master_key = Some(key);

		self
	}

	/// Sets the provider registry.
	pub fn registry(mut self, registry: ProviderRegistry) -> Self {
		self.registry = Some(registry);

		self
	}

	/// Sets the outbound transport.
	pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Overrides the pending-authorization TTL (defaults to ten minutes).
	pub fn pending_ttl(mut self, ttl: Duration) -> Self {
		self.pending_ttl = Some(ttl);

		self
	}

	/// Overrides the audit retention bound.
	pub fn audit_retention(mut self, max_entries: usize) -> Self {
		self.audit_retention = Some(max_entries);

		self
	}

	/// Overrides the request-path refresh buffer (defaults to five minutes).
	pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = Some(buffer);

		self
	}

	/// Validates the collected collaborators and assembles the hub.
	pub fn build(self) -> Result<IntegrationHub> {
		let store =
			self.store.ok_or(ConfigError::IncompleteHub { component: "store" })?;
		let master_key =
			self.master_key.ok_or(ConfigError::IncompleteHub { component: "master key" })?;
		let registry = Arc::new(
			self.registry.ok_or(ConfigError::IncompleteHub { component: "provider registry" })?,
		);
		let transport = match self.transport {
			Some(transport) => transport,
			None => Self::default_transport()?,
		};
		let audit = Arc::new(match self.audit_retention {
			Some(max_entries) => AuditSink::new(store.clone()).with_max_entries(max_entries),
			None => AuditSink::new(store.clone()),
		});
		let vault = Arc::new(CredentialVault::new(
			store,
			CredentialCipher::new(&master_key),
			audit.clone(),
			registry.clone(),
			transport.clone(),
		));
		let coordinator = LinkCoordinator::new(
			registry.clone(),
			vault.clone(),
			transport.clone(),
			audit,
			self.pending_ttl.unwrap_or(DEFAULT_PENDING_TTL),
		);

		Ok(IntegrationHub {
			vault,
			coordinator,
			registry,
			transport,
			refresh_buffer: self.refresh_buffer.unwrap_or(DEFAULT_REFRESH_BUFFER),
		})
	}

	#[cfg(feature = "reqwest")]
	fn default_transport() -> Result<Arc<dyn HttpTransport>> {
		Ok(Arc::new(crate::http::ReqwestTransport::default()))
	}

	#[cfg(not(feature = "reqwest"))]
	fn default_transport() -> Result<Arc<dyn HttpTransport>> {
		Err(ConfigError::IncompleteHub { component: "transport" }.into())
	}
}
impl Debug for HubBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HubBuilder")
			.field("store_set", &self.store.is_some())
			.field("master_key_set", &self.master_key.is_some())
			.field("registry_set", &self.registry.is_some())
			.field("transport_set", &self.transport.is_some())
			.finish()
	}
}
