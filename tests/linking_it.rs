//! End-to-end linking and resilient-call scenario against a scripted transport.

mod common;

// self
use common::MockTransport;
use credvault::{
	error::{Error, SecurityError},
	http::ProviderRequest,
	limit::RateLimitConfig,
	provider::ProviderRegistry,
	url::Url,
};

#[tokio::test]
async fn link_callback_and_throttled_call_complete_end_to_end() {
	let transport = MockTransport::new();
	// Burst of ten with a negligible refill so consumed tokens stay observable.
	let registry = ProviderRegistry::new()
		.register(common::handle(common::descriptor("acme", RateLimitConfig::new(10., 0.001), true)));
	let hub = common::hub(transport.clone(), registry);
	let (user, provider, scope) = common::ids("acme");

	// Start: the authorize URL must carry a freshly generated state.
	let session = hub
		.start_link(user.clone(), &provider, scope.clone())
		.await
		.expect("Start link should succeed.");
	let state_param = session
		.authorize_url
		.query_pairs()
		.find(|(name, _)| name == "state")
		.map(|(_, value)| value.into_owned())
		.expect("Authorize URL should embed the state.");

	assert_eq!(state_param, session.state);

	// Callback: one code exchange, exactly one credential stored.
	transport.queue_json(
		200,
		"{\"access_token\":\"at-e2e\",\"refresh_token\":\"rt-e2e\",\"expires_in\":3600}",
	);

	let completed = hub
		.handle_callback("valid-code", &session.state)
		.await
		.expect("Callback should complete the link.");

	assert_eq!(completed.user, user);
	assert_eq!(
		hub.vault().list_keys().await.expect("Listing keys should succeed.").len(),
		1,
		"Exactly one credential must be stored for (u1, acme, ads).",
	);

	// Call: two throttled responses, then success on the third attempt.
	transport.queue_json(429, "{\"error\":\"rate_limit_exceeded\"}");
	transport.queue_json(429, "{\"error\":\"rate_limit_exceeded\"}");
	transport.queue_json(200, "{\"rows\":[{\"impressions\":41000}]}");

	let limiter = hub
		.registry()
		.get(&provider)
		.expect("Provider should resolve from the registry.")
		.limiter()
		.clone();
	let before = limiter.available();
	let response = hub
		.call_provider(
			&user,
			&provider,
			&scope,
			ProviderRequest::get(
				Url::parse("https://acme.test/api/metrics").expect("API URL should parse."),
			),
		)
		.await
		.expect("Call should succeed on the third attempt.");

	assert_eq!(response.status, 200);

	// One exchange plus three call attempts hit the transport in total.
	assert_eq!(transport.requests().len(), 4);

	// The bucket reflects the three admissions consumed by the call attempts.
	let consumed = before - limiter.available();

	assert!((consumed - 3.).abs() < 0.1, "expected ~3 consumed tokens, got {consumed}");
}

#[tokio::test]
async fn replayed_callback_state_is_security_fatal() {
	let transport = MockTransport::new();
	let registry = ProviderRegistry::new()
		.register(common::handle(common::descriptor("acme", RateLimitConfig::new(10., 1.), true)));
	let hub = common::hub(transport.clone(), registry);
	let (user, provider, scope) = common::ids("acme");
	let session = hub
		.start_link(user, &provider, scope)
		.await
		.expect("Start link should succeed.");

	transport.queue_json(200, "{\"access_token\":\"at-1\",\"expires_in\":3600}");
	hub.handle_callback("valid-code", &session.state)
		.await
		.expect("First callback should succeed.");

	let err = hub
		.handle_callback("valid-code", &session.state)
		.await
		.expect_err("Replayed state must be rejected.");

	assert!(matches!(err, Error::Security(SecurityError::UnknownState)));
	assert_eq!(transport.requests().len(), 1, "The replay must not trigger a second exchange.");
}

#[tokio::test]
async fn fatal_provider_rejection_is_never_retried() {
	let transport = MockTransport::new();
	let registry = ProviderRegistry::new()
		.register(common::handle(common::descriptor("acme", RateLimitConfig::new(10., 1.), false)));
	let hub = common::hub(transport.clone(), registry);
	let (user, provider, scope) = common::ids("acme");
	let session = hub
		.start_link(user.clone(), &provider, scope.clone())
		.await
		.expect("Start link should succeed.");

	transport.queue_json(200, "{\"access_token\":\"at-1\",\"expires_in\":3600}");
	hub.handle_callback("valid-code", &session.state)
		.await
		.expect("Callback should succeed.");

	transport.queue_json(403, "{\"error\":\"invalid_client\"}");

	let err = hub
		.call_provider(
			&user,
			&provider,
			&scope,
			ProviderRequest::get(
				Url::parse("https://acme.test/api/metrics").expect("API URL should parse."),
			),
		)
		.await
		.expect_err("A 403 must surface as a fatal auth error.");

	assert!(matches!(err, Error::Auth(_)));
	assert_eq!(
		transport.requests().len(),
		2,
		"One exchange and exactly one call attempt should reach the transport.",
	);
}
