//! Provider strategy hooks that classify failing responses.
//!
//! Implementations map provider-specific throttling codes and OAuth error
//! fields into the crate taxonomy without tying callers to any particular
//! HTTP client. Only the classification predicate differs per provider; the
//! retry/backoff policy around it is uniform.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Distinguishes which kind of remote call produced the failing response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
	/// Authorization-code exchange against the token endpoint.
	TokenExchange,
	/// Refresh grant against the token endpoint.
	TokenRefresh,
	/// Metrics or data call against the provider API.
	Api,
}
impl CallKind {
	/// Returns a stable label suitable for span or audit fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::TokenExchange => "token_exchange",
			CallKind::TokenRefresh => "token_refresh",
			CallKind::Api => "api",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant (bad code, expired code, bad refresh token).
	InvalidGrant,
	/// Provider rejected the caller's authorization (401/403, bad client).
	AuthRejected,
	/// Failure is temporary and should be retried with backoff.
	Transient,
	/// Provider rejected the request as malformed; a local defect, not retryable.
	Rejected,
}

/// Context passed to provider strategies when classifying failures.
///
/// The struct intentionally keeps only primitive data (status codes, OAuth
/// fields, body preview) so strategies stay completely decoupled from any
/// HTTP client.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderErrorContext {
	/// Which kind of call failed.
	pub call: CallKind,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	/// Creates a new context scoped to the provided call kind.
	pub fn new(call: CallKind) -> Self {
		Self {
			call,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			retry_after: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level/network failures.
	pub fn network_failure(call: CallKind) -> Self {
		let mut ctx = Self::new(call);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(body.into());

		self
	}

	/// Adds the Retry-After hint parsed from the response headers.
	pub fn with_retry_after(mut self, hint: Option<Duration>) -> Self {
		self.retry_after = hint;

		self
	}
}

/// Strategy hook that allows providers to classify errors and decorate requests.
///
/// Implementors are required to be `Send + Sync`. Override only what you need—
/// `augment_token_request` has a default no-op implementation that suffices for
/// most providers; override it when a provider requires extra form fields
/// (audience, resource, api version, etc.).
pub trait ProviderStrategy: Send + Sync {
	/// Maps a failing response into the canonical provider error categories.
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Gives providers a chance to add custom form parameters before dispatching.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Default strategy that applies RFC-guided heuristics.
///
/// It prioritizes structured OAuth fields (`error`, `error_description`), then
/// falls back to body text hints, and finally the HTTP status code. Network
/// failures are always treated as transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.call, ctx.http_status)
	}
}
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<ProviderErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
		|| value.eq_ignore_ascii_case("invalid_token")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(ProviderErrorKind::AuthRejected)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
		|| value.eq_ignore_ascii_case("slow_down")
		|| value.eq_ignore_ascii_case("rate_limit_exceeded")
	{
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") || text.contains("invalid_token") =>
			Some(ProviderErrorKind::AuthRejected),
		text if text.contains("temporarily_unavailable")
			|| text.contains("rate limit")
			|| text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(call: CallKind, status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(401 | 403) => ProviderErrorKind::AuthRejected,
		Some(408 | 429) => ProviderErrorKind::Transient,
		Some(code) if code >= 500 => ProviderErrorKind::Transient,
		Some(400 | 404 | 410) => match call {
			// On the token endpoint these statuses signal a dead grant; on a data
			// call they signal a malformed request.
			CallKind::TokenExchange | CallKind::TokenRefresh => ProviderErrorKind::InvalidGrant,
			CallKind::Api => ProviderErrorKind::Rejected,
		},
		Some(_) => match call {
			CallKind::TokenExchange | CallKind::TokenRefresh => ProviderErrorKind::Transient,
			CallKind::Api => ProviderErrorKind::Rejected,
		},
		None => ProviderErrorKind::Transient,
	}
}
