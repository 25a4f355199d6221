//! Reqwest-backed transport behavior against a local mock server.

#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use credvault::{
	http::{HttpTransport, ProviderRequest, ReqwestTransport},
	time::Duration,
	url::Url,
};

fn request_url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse.")
}

#[tokio::test]
async fn get_requests_round_trip_status_and_body() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/metrics");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"rows\":[]}");
		})
		.await;
	let transport = ReqwestTransport::default();
	let response = transport
		.send(ProviderRequest::get(request_url(&server, "/metrics")).with_header("accept", "application/json"))
		.await
		.expect("GET against the mock server should succeed.");

	mock.assert_async().await;

	assert_eq!(response.status, 200);
	assert_eq!(response.body, b"{\"rows\":[]}");
	assert!(response.retry_after.is_none());
}

#[tokio::test]
async fn form_posts_reach_the_token_path() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at-live\",\"token_type\":\"bearer\",\"expires_in\":1800}");
		})
		.await;
	let transport = ReqwestTransport::default();
	let mut form = std::collections::BTreeMap::new();

	form.insert("grant_type".to_owned(), "refresh_token".to_owned());
	form.insert("refresh_token".to_owned(), "rt-live".to_owned());

	let response = transport
		.send(ProviderRequest::post_form(request_url(&server, "/oauth/token"), form))
		.await
		.expect("POST against the mock server should succeed.");

	mock.assert_async().await;

	assert_eq!(response.status, 200);
}

#[tokio::test]
async fn numeric_retry_after_hints_are_parsed() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/throttled");
			then.status(429).header("retry-after", "7").body("slow down");
		})
		.await;
	let transport = ReqwestTransport::default();
	let response = transport
		.send(ProviderRequest::get(request_url(&server, "/throttled")))
		.await
		.expect("Throttled responses still resolve at the transport layer.");

	mock.assert_async().await;

	assert_eq!(response.status, 429);
	assert_eq!(response.retry_after, Some(Duration::seconds(7)));
}

#[tokio::test]
async fn connection_failures_surface_as_transport_errors() {
	let transport = ReqwestTransport::default();
	// Port 1 is essentially never listening.
	let unreachable =
		Url::parse("http://127.0.0.1:1/nowhere").expect("Unreachable URL should parse.");
	let err = transport
		.send(ProviderRequest::get(unreachable))
		.await
		.expect_err("A refused connection must surface as a transport error.");

	assert!(err.to_string().contains("Network"), "unexpected error rendering: {err}");
}
