//! Shared fixtures for integration suites: a scripted transport double built on
//! the public [`HttpTransport`] boundary, plus provider and hub builders.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};
// self
use credvault::{
	auth::{ProviderId, ScopeSet, UserId},
	call::RetryPolicy,
	error::TransportError,
	http::{HttpTransport, ProviderRequest, ProviderResponse, TransportFuture},
	hub::IntegrationHub,
	limit::RateLimitConfig,
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderHandle, ProviderQuirks,
		ProviderRegistry,
	},
	store::MemoryStore,
	url::Url,
};

pub const MASTER_SECRET: &str = "integration-master-secret";

/// Transport double that replays scripted responses and records every request.
pub struct MockTransport {
	responses: Mutex<VecDeque<Result<ProviderResponse, TransportError>>>,
	requests: Mutex<Vec<ProviderRequest>>,
}
impl MockTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			responses: Mutex::new(VecDeque::new()),
			requests: Mutex::new(Vec::new()),
		})
	}

	pub fn queue_json(&self, status: u16, body: &str) {
		self.queue(Ok(ProviderResponse {
			status,
			retry_after: None,
			body: body.as_bytes().to_vec(),
		}));
	}

	pub fn queue(&self, response: Result<ProviderResponse, TransportError>) {
		self.responses.lock().expect("Response script lock should not be poisoned.").push_back(response);
	}

	pub fn requests(&self) -> Vec<ProviderRequest> {
		self.requests.lock().expect("Request log lock should not be poisoned.").clone()
	}
}
impl HttpTransport for MockTransport {
	fn send(&self, request: ProviderRequest) -> TransportFuture<'_, ProviderResponse> {
		self.requests.lock().expect("Request log lock should not be poisoned.").push(request);

		let next =
			self.responses.lock().expect("Response script lock should not be poisoned.").pop_front();

		Box::pin(async move {
			next.unwrap_or_else(|| {
				Err(TransportError::Io(std::io::Error::other("transport script exhausted")))
			})
		})
	}
}

pub fn descriptor(id: &str, rate_limit: RateLimitConfig, pkce: bool) -> ProviderDescriptor {
	ProviderDescriptor::builder(
		ProviderId::new(id).expect("Provider identifier fixture should be valid."),
	)
	.authorization_endpoint(
		Url::parse(&format!("https://{id}.test/oauth/authorize"))
			.expect("Authorize URL fixture should parse."),
	)
	.token_endpoint(
		Url::parse(&format!("https://{id}.test/oauth/token"))
			.expect("Token URL fixture should parse."),
	)
	.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
	.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
	.quirks(ProviderQuirks { pkce_required: pkce, scope_delimiter: ' ' })
	.rate_limit(rate_limit)
	.build()
	.expect("Descriptor fixture should build successfully.")
}

pub fn handle(descriptor: ProviderDescriptor) -> ProviderHandle {
	let redirect = Url::parse("https://app.test/integrations/callback")
		.expect("Redirect URL fixture should parse.");

	ProviderHandle::new(descriptor, "client-integration", redirect)
		.with_client_secret("secret-integration")
		.with_retry_policy(
			RetryPolicy::default().with_backoff_base(std::time::Duration::from_millis(1)),
		)
}

pub fn hub(transport: Arc<MockTransport>, registry: ProviderRegistry) -> IntegrationHub {
	IntegrationHub::builder()
		.store(Arc::new(MemoryStore::new()))
		.master_secret(MASTER_SECRET)
		.registry(registry)
		.transport(transport)
		.build()
		.expect("Hub builder should succeed with all collaborators present.")
}

pub fn ids(provider: &str) -> (UserId, ProviderId, ScopeSet) {
	(
		UserId::new("u1").expect("User fixture should be valid."),
		ProviderId::new(provider).expect("Provider fixture should be valid."),
		ScopeSet::new(["ads"]).expect("Scope fixture should be valid."),
	)
}
