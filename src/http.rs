//! Outbound transport primitives for provider calls.
//!
//! The crate's only dependency on an HTTP stack is the [`HttpTransport`] trait:
//! one injectable boundary that executes a single request and reports the
//! status, `Retry-After` hint, and body. The same interface backs the real
//! [`ReqwestTransport`] and the scripted doubles used in tests, so the
//! executor, vault, and flows never notice which one they are driving. Any
//! non-network response (including 4xx/5xx) resolves to `Ok`; classification
//! happens above the transport.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

const BODY_PREVIEW_LIMIT: usize = 256;

/// HTTP methods used against provider APIs and token endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// Body-less retrieval request.
	Get,
	/// Form-encoded mutation request.
	Post,
}

/// One outbound provider request, transport-agnostic.
#[derive(Clone)]
pub struct ProviderRequest {
	/// HTTP method for the request.
	pub method: HttpMethod,
	/// Fully-formed request URL (including any query parameters).
	pub url: Url,
	/// Additional headers; the authorization header is injected by the hub.
	pub headers: Vec<(String, String)>,
	/// Form-encoded body for POST requests.
	pub form: Option<BTreeMap<String, String>>,
}
impl ProviderRequest {
	/// Creates a GET request for the provided URL.
	pub fn get(url: Url) -> Self {
		Self { method: HttpMethod::Get, url, headers: Vec::new(), form: None }
	}

	/// Creates a form-encoded POST request for the provided URL.
	pub fn post_form(url: Url, form: BTreeMap<String, String>) -> Self {
		Self { method: HttpMethod::Post, url, headers: Vec::new(), form: Some(form) }
	}

	/// Appends a header pair.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Appends a bearer authorization header for the provided access token.
	pub fn with_bearer(self, token: &TokenSecret) -> Self {
		self.with_header("authorization", format!("Bearer {}", token.expose()))
	}
}
impl Debug for ProviderRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let headers: Vec<_> = self
			.headers
			.iter()
			.map(|(name, value)| {
				if name.eq_ignore_ascii_case("authorization") {
					(name.as_str(), "<redacted>")
				} else {
					(name.as_str(), value.as_str())
				}
			})
			.collect();

		f.debug_struct("ProviderRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &headers)
			.field("form", &self.form.as_ref().map(|form| form.len()))
			.finish()
	}
}

/// Provider response surfaced to classification layers.
#[derive(Clone, Debug)]
pub struct ProviderResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration, when supplied.
	pub retry_after: Option<Duration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ProviderResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Lossy, truncated body rendering for diagnostics and error classification.
	pub fn body_preview(&self) -> String {
		let text = String::from_utf8_lossy(&self.body);

		if text.chars().count() <= BODY_PREVIEW_LIMIT {
			return text.into_owned();
		}

		let mut buf: String = text.chars().take(BODY_PREVIEW_LIMIT).collect();

		buf.push('…');

		buf
	}
}

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Injectable outbound call boundary.
///
/// Implementations perform exactly one request attempt per [`send`](Self::send)
/// call; retry, backoff, and admission control live in
/// [`CallExecutor`](crate::call::CallExecutor).
pub trait HttpTransport: Send + Sync {
	/// Executes one request and resolves with the provider's response.
	fn send(&self, request: ProviderRequest) -> TransportFuture<'_, ProviderResponse>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: ProviderRequest) -> TransportFuture<'_, ProviderResponse> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder = match request.method {
				HttpMethod::Get => client.get(request.url),
				HttpMethod::Post => client.post(request.url),
			};

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			if let Some(form) = &request.form {
				builder = builder.form(form);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(ProviderResponse { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
