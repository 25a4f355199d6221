//! Registered providers: descriptor + app credentials + shared limiter.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	call::{CallExecutor, RetryPolicy},
	error::ConfigError,
	limit::RateLimiter,
	provider::{
		descriptor::{ClientAuthMethod, GrantType, ProviderDescriptor},
		strategy::{DefaultProviderStrategy, ProviderStrategy},
	},
};

/// One configured provider: descriptor, app credentials, strategy, and the
/// provider's single shared [`RateLimiter`] instance.
///
/// The limiter lives here—one bucket per provider—so that every executor
/// created for this provider gates on the same budget, and a burst against one
/// provider never throttles another.
pub struct ProviderHandle {
	/// Validated descriptor (endpoints, grants, quirks, rate limit).
	pub descriptor: ProviderDescriptor,
	/// OAuth 2.0 client identifier issued to this deployment.
	pub client_id: String,
	/// Optional client secret for confidential authentication methods.
	pub client_secret: Option<String>,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
	/// Error-classification and request-decoration hook.
	pub strategy: Arc<dyn ProviderStrategy>,
	limiter: Arc<RateLimiter>,
	retry: RetryPolicy,
}
impl ProviderHandle {
	/// Creates a handle with the default strategy and retry policy.
	pub fn new(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_uri: Url,
	) -> Self {
		let limiter = Arc::new(RateLimiter::new(descriptor.rate_limit));

		Self {
			descriptor,
			client_id: client_id.into(),
			client_secret: None,
			redirect_uri,
			strategy: Arc::new(DefaultProviderStrategy),
			limiter,
			retry: RetryPolicy::default(),
		}
	}

	/// Sets or replaces the client secret used for confidential client auth modes.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Overrides the retry policy used for calls against this provider.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry = policy;

		self
	}

	/// Provider identifier.
	pub fn id(&self) -> &ProviderId {
		&self.descriptor.id
	}

	/// Returns the provider's shared limiter.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Builds an executor gated by this provider's limiter.
	pub fn executor(&self) -> CallExecutor {
		CallExecutor::new(self.limiter.clone(), self.retry)
	}

	/// Checks whether the provider supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.descriptor.supports(grant)
	}

	/// Returns `true` when the linking flow must carry a PKCE pair.
	pub fn uses_pkce(&self) -> bool {
		self.descriptor.quirks.pkce_required
			|| matches!(
				self.descriptor.preferred_client_auth_method,
				ClientAuthMethod::NoneWithPkce
			)
	}
}
impl Debug for ProviderHandle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderHandle")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri.as_str())
			.finish()
	}
}

/// Lookup table of configured providers, injected wherever calls are made.
#[derive(Default)]
pub struct ProviderRegistry {
	providers: HashMap<ProviderId, Arc<ProviderHandle>>,
}
impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers (or replaces) a provider handle.
	pub fn register(mut self, handle: ProviderHandle) -> Self {
		self.providers.insert(handle.id().clone(), Arc::new(handle));

		self
	}

	/// Resolves a provider or fails with a validation error.
	pub fn get(&self, provider: &ProviderId) -> Result<Arc<ProviderHandle>> {
		self.providers.get(provider).cloned().ok_or_else(|| {
			ConfigError::UnknownProvider { provider: provider.to_string() }.into()
		})
	}

	/// Number of registered providers.
	pub fn len(&self) -> usize {
		self.providers.len()
	}

	/// Returns `true` when no providers are registered.
	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}
impl Debug for ProviderRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRegistry").field("providers", &self.providers.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	fn descriptor(id: &str) -> ProviderDescriptor {
		ProviderDescriptor::builder(
			ProviderId::new(id).expect("Provider identifier fixture should be valid."),
		)
		.authorization_endpoint(
			Url::parse("https://acme.test/auth").expect("Authorize URL fixture should parse."),
		)
		.token_endpoint(
			Url::parse("https://acme.test/token").expect("Token URL fixture should parse."),
		)
		.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
		.build()
		.expect("Descriptor fixture should build successfully.")
	}

	#[test]
	fn unknown_provider_is_a_validation_error() {
		let registry = ProviderRegistry::new();
		let missing = ProviderId::new("nowhere").expect("Provider fixture should be valid.");
		let err = registry.get(&missing).expect_err("Missing provider must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::UnknownProvider { .. })));
	}

	#[test]
	fn executors_share_the_provider_limiter() {
		let redirect =
			Url::parse("https://app.test/callback").expect("Redirect fixture should parse.");
		let handle = ProviderHandle::new(descriptor("acme"), "client-1", redirect);
		let registry = ProviderRegistry::new().register(handle);
		let provider = ProviderId::new("acme").expect("Provider fixture should be valid.");
		let resolved = registry.get(&provider).expect("Registered provider should resolve.");

		assert!(Arc::ptr_eq(resolved.executor().limiter(), resolved.limiter()));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn pkce_follows_quirks_and_auth_method() {
		let redirect =
			Url::parse("https://app.test/callback").expect("Redirect fixture should parse.");
		let confidential = ProviderHandle::new(descriptor("acme"), "client-1", redirect.clone());

		assert!(!confidential.uses_pkce());

		let mut public_descriptor = descriptor("xwitter");

		public_descriptor.preferred_client_auth_method = ClientAuthMethod::NoneWithPkce;

		let public = ProviderHandle::new(public_descriptor, "client-2", redirect);

		assert!(public.uses_pkce());
	}
}
