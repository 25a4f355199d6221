//! Proactive refresh behavior through the public vault and scheduler APIs.

mod common;

// self
use common::MockTransport;
use credvault::{
	auth::{Credential, CredentialKey},
	limit::RateLimitConfig,
	provider::ProviderRegistry,
	sweep::SWEEP_REFRESH_BUFFER,
	time::{Duration, OffsetDateTime},
	vault::DEFAULT_REFRESH_BUFFER,
};

async fn seeded_hub(
	transport: std::sync::Arc<MockTransport>,
	expires_in: Duration,
	refresh_token: Option<&str>,
) -> credvault::hub::IntegrationHub {
	let registry = ProviderRegistry::new()
		.register(common::handle(common::descriptor("acme", RateLimitConfig::new(50., 50.), false)));
	let hub = common::hub(transport, registry);
	let (user, provider, scope) = common::ids("acme");
	let mut builder = Credential::builder(CredentialKey::new(user, provider), scope)
		.access_token("access-seeded")
		.expires_in(expires_in);

	if let Some(token) = refresh_token {
		builder = builder.refresh_token(token);
	}

	hub.vault()
		.store(builder.build().expect("Credential fixture should build successfully."))
		.await
		.expect("Seeding the vault should succeed.");

	hub
}

#[tokio::test]
async fn near_expiry_credential_is_refreshed_exactly_once() {
	let transport = MockTransport::new();

	transport.queue_json(
		200,
		"{\"access_token\":\"access-fresh\",\"refresh_token\":\"refresh-fresh\",\"expires_in\":3600}",
	);

	// Expires in two minutes; the five-minute buffer forces a single refresh.
	let hub = seeded_hub(transport.clone(), Duration::minutes(2), Some("refresh-seeded")).await;
	let (user, provider, scope) = common::ids("acme");
	let refreshed = hub
		.vault()
		.ensure_fresh(&user, &provider, &scope, DEFAULT_REFRESH_BUFFER)
		.await
		.expect("Refresh should succeed.");

	assert_eq!(refreshed.access_token.expose(), "access-fresh");
	assert_eq!(transport.requests().len(), 1);

	let expiry = refreshed.expires_at.expect("Refreshed credential should carry an expiry.");

	assert!(expiry > OffsetDateTime::now_utc() + Duration::minutes(45));

	// A second ensure_fresh finds the rotated credential and stays local.
	let cached = hub
		.vault()
		.ensure_fresh(&user, &provider, &scope, DEFAULT_REFRESH_BUFFER)
		.await
		.expect("Cached credential should pass through.");

	assert_eq!(cached.access_token.expose(), "access-fresh");
	assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn credential_without_refresh_token_is_returned_stale() {
	let transport = MockTransport::new();
	let hub = seeded_hub(transport.clone(), Duration::minutes(1), None).await;
	let (user, provider, scope) = common::ids("acme");
	let stale = hub
		.vault()
		.ensure_fresh(&user, &provider, &scope, DEFAULT_REFRESH_BUFFER)
		.await
		.expect("A credential without a refresh token is returned as-is.");

	assert_eq!(stale.access_token.expose(), "access-seeded");
	assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn scheduler_sweep_preempts_expiry_with_the_wide_buffer() {
	let transport = MockTransport::new();

	transport.queue_json(
		200,
		"{\"access_token\":\"access-swept\",\"refresh_token\":\"refresh-swept\",\"expires_in\":7200}",
	);

	// 20 minutes out: inside the 30-minute sweep buffer, outside the 5-minute
	// request-path buffer.
	let hub = seeded_hub(transport.clone(), Duration::minutes(20), Some("refresh-seeded")).await;

	hub.refresh_scheduler().with_buffer(SWEEP_REFRESH_BUFFER).sweep_once().await;

	assert_eq!(transport.requests().len(), 1);

	let (user, provider, scope) = common::ids("acme");
	let stored = hub
		.vault()
		.lookup(&user, &provider, &scope)
		.await
		.expect("Lookup should succeed.")
		.expect("Credential should remain stored after the sweep.");

	assert_eq!(stored.access_token.expose(), "access-swept");
}

#[tokio::test]
async fn spawned_scheduler_keeps_ticking_and_shuts_down_cleanly() {
	let transport = MockTransport::new();

	transport.queue_json(
		200,
		"{\"access_token\":\"access-loop\",\"refresh_token\":\"refresh-loop\",\"expires_in\":7200}",
	);

	let hub = seeded_hub(transport.clone(), Duration::minutes(10), Some("refresh-seeded")).await;
	let handle = hub
		.refresh_scheduler()
		.with_interval(std::time::Duration::from_millis(10))
		.spawn();

	tokio::time::sleep(std::time::Duration::from_millis(60)).await;

	assert!(handle.is_running());
	assert!(!transport.requests().is_empty());

	handle.shutdown().await;

	// The scheduler is gone; no further requests may accumulate.
	let observed = transport.requests().len();

	tokio::time::sleep(std::time::Duration::from_millis(40)).await;

	assert_eq!(transport.requests().len(), observed);
}
