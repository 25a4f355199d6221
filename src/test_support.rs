//! Shared fixtures for in-crate unit tests: a scripted transport double and
//! provider/registry builders. The scripted transport honors the same
//! single-attempt contract as the real transport, so executor and vault tests
//! exercise the production retry paths unchanged.

// std
use std::collections::VecDeque;
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	call::RetryPolicy,
	error::TransportError,
	http::{HttpTransport, ProviderRequest, ProviderResponse, TransportFuture},
	limit::RateLimitConfig,
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderHandle, ProviderQuirks,
		ProviderRegistry,
	},
};

/// Transport double that replays a scripted response sequence and records
/// every dispatched request for assertions.
pub(crate) struct ScriptedTransport {
	responses: Mutex<VecDeque<Result<ProviderResponse, TransportError>>>,
	requests: Mutex<Vec<ProviderRequest>>,
}
impl ScriptedTransport {
	pub(crate) fn new<I>(responses: I) -> Arc<Self>
	where
		I: IntoIterator<Item = Result<ProviderResponse, TransportError>>,
	{
		Arc::new(Self {
			responses: Mutex::new(responses.into_iter().collect()),
			requests: Mutex::new(Vec::new()),
		})
	}

	pub(crate) fn requests(&self) -> Vec<ProviderRequest> {
		self.requests.lock().clone()
	}
}
impl HttpTransport for ScriptedTransport {
	fn send(&self, request: ProviderRequest) -> TransportFuture<'_, ProviderResponse> {
		self.requests.lock().push(request);

		let next = self.responses.lock().pop_front();

		Box::pin(async move {
			next.unwrap_or_else(|| {
				Err(TransportError::Io(std::io::Error::other("transport script exhausted")))
			})
		})
	}
}

pub(crate) fn json_response(status: u16, body: &str) -> ProviderResponse {
	ProviderResponse { status, retry_after: None, body: body.as_bytes().to_vec() }
}

pub(crate) fn descriptor_with(
	id: &str,
	auth_method: ClientAuthMethod,
	pkce_required: bool,
	rate_limit: RateLimitConfig,
) -> ProviderDescriptor {
	ProviderDescriptor::builder(ProviderId::new(id).expect("Provider fixture should be valid."))
		.authorization_endpoint(
			Url::parse(&format!("https://{id}.test/oauth/authorize"))
				.expect("Authorize URL fixture should parse."),
		)
		.token_endpoint(
			Url::parse(&format!("https://{id}.test/oauth/token"))
				.expect("Token URL fixture should parse."),
		)
		.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
		.preferred_client_auth_method(auth_method)
		.quirks(ProviderQuirks { pkce_required, ..ProviderQuirks::default() })
		.rate_limit(rate_limit)
		.build()
		.expect("Descriptor fixture should build successfully.")
}

pub(crate) fn descriptor(id: &str) -> ProviderDescriptor {
	descriptor_with(id, ClientAuthMethod::ClientSecretPost, false, RateLimitConfig::new(100., 100.))
}

pub(crate) fn handle_for(descriptor: ProviderDescriptor) -> ProviderHandle {
	let redirect =
		Url::parse("https://app.test/integrations/callback").expect("Redirect fixture should parse.");

	ProviderHandle::new(descriptor, "client-1", redirect).with_client_secret("secret-1").with_retry_policy(
		RetryPolicy::default().with_backoff_base(std::time::Duration::from_millis(1)),
	)
}

pub(crate) fn provider_handle(id: &str) -> ProviderHandle {
	handle_for(descriptor(id))
}

pub(crate) fn registry(handle: ProviderHandle) -> ProviderRegistry {
	ProviderRegistry::new().register(handle)
}
