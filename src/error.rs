//! Crate-level error taxonomy shared by the vault, flows, executor, and stores.
//!
//! Every failure a caller can observe maps into one of four categories: retryable
//! (transient upstream or transport trouble), fatal auth (re-authorization
//! required), fatal validation (local configuration or request construction),
//! and security-fatal (state replay, PKCE rejection, ciphertext tamper). The
//! [`CallExecutor`](crate::call::CallExecutor) consults [`Error::is_retryable`]
//! and the route layer consults [`Error::class`] when translating failures into
//! user-visible behavior.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure (distinct from a not-found lookup, which is `None`).
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request-construction problem; never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; safe to retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, IO); safe to retry with backoff.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Provider-side authorization failure; surfaces as "re-authorization required".
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Security-significant rejection; never retried, always audited.
	#[error(transparent)]
	Security(#[from] SecurityError),
}
impl Error {
	/// Returns `true` when the executor may retry the failed attempt.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}

	/// Coarse category used by the route layer and audit trail.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Transient(_) | Self::Transport(_) => ErrorClass::Retryable,
			Self::Auth(_) => ErrorClass::Auth,
			Self::Config(_) => ErrorClass::Validation,
			Self::Security(_) => ErrorClass::Security,
			Self::Storage(_) => ErrorClass::Storage,
		}
	}
}

/// Coarse failure categories surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
	/// Transient upstream or transport failure; the attempt may be repeated.
	Retryable,
	/// The stored grant is no longer accepted; the user must re-link.
	Auth,
	/// A programming or configuration error, not a runtime condition.
	Validation,
	/// A possible attack (replay, tamper); detail goes only to the audit trail.
	Security,
	/// The persistence collaborator failed.
	Storage,
}
impl ErrorClass {
	/// Returns a stable label suitable for spans, metrics, and audit details.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorClass::Retryable => "retryable",
			ErrorClass::Auth => "auth",
			ErrorClass::Validation => "validation",
			ErrorClass::Security => "security",
			ErrorClass::Storage => "storage",
		}
	}
}
impl Display for ErrorClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures; fatal, never retried.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// No provider with the requested identifier has been registered.
	#[error("No provider named `{provider}` is configured.")]
	UnknownProvider {
		/// Requested provider identifier string.
		provider: String,
	},
	/// The registered provider does not issue refresh tokens.
	#[error("Provider `{provider}` does not support the refresh_token grant.")]
	RefreshUnsupported {
		/// Provider identifier string.
		provider: String,
	},
	/// The provider rejected a well-formed-looking request as invalid.
	#[error("Provider rejected the request with status {status}.")]
	ProviderRejected {
		/// HTTP status code returned by the provider.
		status: u16,
		/// Truncated response body for diagnostics.
		preview: String,
	},
	/// The hub builder is missing a required collaborator.
	#[error("Hub builder is missing its {component}.")]
	IncompleteHub {
		/// Which collaborator was not provided.
		component: &'static str,
	},
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Credential builder validation failed.
	#[error("Unable to build credential.")]
	CredentialBuild(#[from] crate::auth::CredentialBuilderError),
	/// Token endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}

/// Provider-side authorization failures; fatal, trigger re-authorization.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Provider answered 401/403 for a call made with the stored access token.
	#[error("Provider rejected the call with status {status}: {reason}.")]
	Unauthorized {
		/// HTTP status code (401 or 403).
		status: u16,
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant (bad code, expired code, bad refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// The refresh token has been revoked and must not be reused.
	#[error("Refresh token has been revoked.")]
	Revoked,
	/// No credential is stored for the requested user/provider/scope.
	#[error("No credential is linked for provider `{provider}`.")]
	NotLinked {
		/// Provider identifier string.
		provider: String,
	},
}

/// Security-significant rejections; fatal, always audited, never detailed to clients.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SecurityError {
	/// Callback state does not match any pending authorization (CSRF/replay defense).
	#[error("Callback state does not match a pending authorization.")]
	UnknownState,
	/// The pending authorization for the callback state exceeded its lifetime.
	#[error("Pending authorization has expired.")]
	ExpiredState,
	/// Sealed payload failed authentication (tamper or key mismatch); fails closed.
	#[error("Sealed credential payload failed authentication.")]
	Tampered,
	/// Sealed payload is structurally invalid (truncated or not valid base64).
	#[error("Sealed credential payload is malformed.")]
	MalformedCiphertext,
	/// Encryption itself failed; nothing was persisted.
	#[error("Credential payload could not be sealed.")]
	SealFailed,
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Provider API call was throttled or failed server-side (429/5xx).
	#[error("Provider returned a transient failure with status {status}.")]
	Provider {
		/// HTTP status code returned by the provider.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
