//! Token endpoint request construction and response mapping.
//!
//! [`TokenClient`] builds the form-encoded exchange and refresh requests for a
//! registered provider, runs each attempt through the provider's
//! [`CallExecutor`](crate::call::CallExecutor), and maps failing responses into
//! the crate taxonomy via the provider's strategy. Vendor wire shapes beyond
//! the RFC 6749 token response are deliberately not modeled here.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{AuthError, ConfigError, TransientError},
	http::{HttpTransport, ProviderRequest, ProviderResponse},
	obs::FlowKind,
	provider::{
		CallKind, ClientAuthMethod, GrantType, ProviderErrorContext, ProviderErrorKind,
		ProviderHandle, ProviderStrategy,
	},
};

const MAX_EXPIRES_IN_SECS: i64 = 60 * 60 * 24 * 3_650;

/// Result of a successful token endpoint call.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Freshly minted access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Validated token lifetime, when the provider reported one.
	pub expires_in: Option<Duration>,
	/// Scope string echoed by the provider, when present.
	pub scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	scope: Option<String>,
}

#[derive(Default, Deserialize)]
struct OAuthErrorBody {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

/// Executes token endpoint grants for one registered provider.
#[derive(Clone)]
pub struct TokenClient {
	handle: Arc<ProviderHandle>,
	transport: Arc<dyn HttpTransport>,
}
impl TokenClient {
	/// Creates a client bound to the provided handle and transport.
	pub fn new(handle: Arc<ProviderHandle>, transport: Arc<dyn HttpTransport>) -> Self {
		Self { handle, transport }
	}

	/// Exchanges an authorization code (optionally carrying a PKCE verifier)
	/// for a token grant, under the provider's admission and retry policy.
	pub async fn exchange_code(
		&self,
		code: &str,
		redirect_uri: &Url,
		pkce_verifier: Option<&str>,
	) -> Result<TokenGrant> {
		let mut form = BTreeMap::new();

		form.insert("grant_type".into(), GrantType::AuthorizationCode.as_str().into());
		form.insert("code".into(), code.into());
		form.insert("redirect_uri".into(), redirect_uri.to_string());

		if let Some(verifier) = pkce_verifier {
			form.insert("code_verifier".into(), verifier.into());
		}

		self.dispatch(FlowKind::Callback, CallKind::TokenExchange, form).await
	}

	/// Refreshes an access token, under the provider's admission and retry policy.
	pub async fn refresh(&self, refresh_token: &TokenSecret) -> Result<TokenGrant> {
		if !self.handle.supports(GrantType::RefreshToken) {
			return Err(ConfigError::RefreshUnsupported {
				provider: self.handle.id().to_string(),
			}
			.into());
		}

		let mut form = BTreeMap::new();

		form.insert("grant_type".into(), GrantType::RefreshToken.as_str().into());
		form.insert("refresh_token".into(), refresh_token.expose().into());

		self.dispatch(FlowKind::Refresh, CallKind::TokenRefresh, form).await
	}

	async fn dispatch(
		&self,
		flow: FlowKind,
		call: CallKind,
		mut form: BTreeMap<String, String>,
	) -> Result<TokenGrant> {
		let grant = match call {
			CallKind::TokenExchange => GrantType::AuthorizationCode,
			_ => GrantType::RefreshToken,
		};

		self.apply_client_auth(&mut form);
		self.handle.strategy.augment_token_request(grant, &mut form);

		let request = self.build_request(form);
		let executor = self.handle.executor();
		let response = executor
			.execute(flow, |_| {
				let request = request.clone();

				async move { Ok(self.transport.send(request).await?) }
			})
			.await?;

		if !response.is_success() {
			return Err(classify_failure(self.handle.strategy.as_ref(), call, &response));
		}

		parse_token_response(&response)
	}

	fn build_request(&self, form: BTreeMap<String, String>) -> ProviderRequest {
		let mut request =
			ProviderRequest::post_form(self.handle.descriptor.endpoints.token.clone(), form)
				.with_header("accept", "application/json");

		if matches!(
			self.handle.descriptor.preferred_client_auth_method,
			ClientAuthMethod::ClientSecretBasic
		) {
			let secret = self.handle.client_secret.as_deref().unwrap_or_default();
			let encoded = STANDARD.encode(format!("{}:{secret}", self.handle.client_id));

			request = request.with_header("authorization", format!("Basic {encoded}"));
		}

		request
	}

	fn apply_client_auth(&self, form: &mut BTreeMap<String, String>) {
		match self.handle.descriptor.preferred_client_auth_method {
			ClientAuthMethod::ClientSecretBasic => {},
			ClientAuthMethod::ClientSecretPost => {
				form.insert("client_id".into(), self.handle.client_id.clone());

				if let Some(secret) = &self.handle.client_secret {
					form.insert("client_secret".into(), secret.clone());
				}
			},
			ClientAuthMethod::NoneWithPkce => {
				form.insert("client_id".into(), self.handle.client_id.clone());
			},
		}
	}
}
impl Debug for TokenClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenClient").field("provider", self.handle.id()).finish()
	}
}

/// Maps a non-success provider response into the crate error taxonomy.
pub(crate) fn classify_failure(
	strategy: &dyn ProviderStrategy,
	call: CallKind,
	response: &ProviderResponse,
) -> Error {
	let oauth_body: OAuthErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
	let preview = response.body_preview();
	let mut ctx = ProviderErrorContext::new(call)
		.with_http_status(response.status)
		.with_retry_after(response.retry_after)
		.with_body_preview(preview.clone());

	if let Some(error) = &oauth_body.error {
		ctx = ctx.with_oauth_error(error.clone());
	}
	if let Some(description) = &oauth_body.error_description {
		ctx = ctx.with_error_description(description.clone());
	}

	let reason = oauth_body
		.error_description
		.or(oauth_body.error)
		.unwrap_or_else(|| format!("status {}", response.status));

	match strategy.classify_error(&ctx) {
		ProviderErrorKind::InvalidGrant =>
			if reason.to_ascii_lowercase().contains("revok") {
				AuthError::Revoked.into()
			} else {
				AuthError::InvalidGrant { reason }.into()
			},
		ProviderErrorKind::AuthRejected =>
			AuthError::Unauthorized { status: response.status, reason }.into(),
		ProviderErrorKind::Transient => match call {
			CallKind::Api => TransientError::Provider {
				status: response.status,
				retry_after: response.retry_after,
			}
			.into(),
			_ => TransientError::TokenEndpoint {
				message: reason,
				status: Some(response.status),
				retry_after: response.retry_after,
			}
			.into(),
		},
		ProviderErrorKind::Rejected =>
			ConfigError::ProviderRejected { status: response.status, preview }.into(),
	}
}

fn parse_token_response(response: &ProviderResponse) -> Result<TokenGrant> {
	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);
	let parsed: TokenEndpointResponse =
		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::TokenResponseParse { source, status: Some(response.status) }
		})?;
	let expires_in = match parsed.expires_in {
		Some(secs) if secs <= 0 => return Err(ConfigError::NonPositiveExpiresIn.into()),
		Some(secs) if secs > MAX_EXPIRES_IN_SECS =>
			return Err(ConfigError::ExpiresInOutOfRange.into()),
		Some(secs) => Some(Duration::seconds(secs)),
		None => None,
	};

	Ok(TokenGrant {
		access_token: TokenSecret::new(parsed.access_token),
		refresh_token: parsed.refresh_token.map(TokenSecret::new),
		expires_in,
		scope: parsed.scope,
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		limit::RateLimitConfig,
		test_support::{self, ScriptedTransport, json_response},
	};

	fn handle(auth_method: ClientAuthMethod) -> Arc<ProviderHandle> {
		Arc::new(test_support::handle_for(test_support::descriptor_with(
			"acme",
			auth_method,
			true,
			RateLimitConfig::new(100., 100.),
		)))
	}

	#[tokio::test]
	async fn exchange_sends_verifier_and_parses_grant() {
		let transport = ScriptedTransport::new([Ok(json_response(
			200,
			"{\"access_token\":\"at-1\",\"refresh_token\":\"rt-1\",\"expires_in\":3600}",
		))]);
		let client = TokenClient::new(handle(ClientAuthMethod::ClientSecretPost), transport.clone());
		let redirect =
			Url::parse("https://app.test/callback").expect("Redirect fixture should parse.");
		let grant = client
			.exchange_code("auth-code", &redirect, Some("verifier-1"))
			.await
			.expect("Exchange should succeed against the scripted transport.");

		assert_eq!(grant.access_token.expose(), "at-1");
		assert_eq!(grant.refresh_token.as_ref().map(TokenSecret::expose), Some("rt-1"));
		assert_eq!(grant.expires_in, Some(Duration::seconds(3_600)));

		let requests = transport.requests();
		let form = requests[0].form.as_ref().expect("Exchange request should carry a form.");

		assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
		assert_eq!(form.get("code_verifier").map(String::as_str), Some("verifier-1"));
		assert_eq!(form.get("client_id").map(String::as_str), Some("client-1"));
		assert_eq!(form.get("client_secret").map(String::as_str), Some("secret-1"));
	}

	#[tokio::test]
	async fn basic_auth_moves_credentials_into_the_header() {
		let transport = ScriptedTransport::new([Ok(json_response(
			200,
			"{\"access_token\":\"at-2\",\"expires_in\":600}",
		))]);
		let client =
			TokenClient::new(handle(ClientAuthMethod::ClientSecretBasic), transport.clone());
		let redirect =
			Url::parse("https://app.test/callback").expect("Redirect fixture should parse.");

		client
			.exchange_code("auth-code", &redirect, None)
			.await
			.expect("Exchange should succeed against the scripted transport.");

		let requests = transport.requests();
		let form = requests[0].form.as_ref().expect("Exchange request should carry a form.");
		let has_basic = requests[0]
			.headers
			.iter()
			.any(|(name, value)| name == "authorization" && value.starts_with("Basic "));

		assert!(has_basic);
		assert!(!form.contains_key("client_secret"));
	}

	#[tokio::test]
	async fn refresh_maps_invalid_grant_without_retrying() {
		let transport =
			ScriptedTransport::new([Ok(json_response(400, "{\"error\":\"invalid_grant\"}"))]);
		let client = TokenClient::new(handle(ClientAuthMethod::ClientSecretPost), transport.clone());
		let err = client
			.refresh(&TokenSecret::new("stale"))
			.await
			.expect_err("Invalid grant must surface as a fatal auth error.");

		assert!(matches!(err, Error::Auth(AuthError::InvalidGrant { .. })));
		assert_eq!(transport.requests().len(), 1, "Fatal errors must not be retried.");
	}

	#[tokio::test]
	async fn transient_token_endpoint_failures_are_retried() {
		let transport = ScriptedTransport::new([
			Ok(json_response(503, "upstream unavailable")),
			Ok(json_response(
				200,
				"{\"access_token\":\"at-3\",\"refresh_token\":\"rt-3\",\"expires_in\":900}",
			)),
		]);
		let client = TokenClient::new(handle(ClientAuthMethod::ClientSecretPost), transport.clone());
		let grant = client
			.refresh(&TokenSecret::new("rt-old"))
			.await
			.expect("Refresh should recover after one transient failure.");

		assert_eq!(grant.access_token.expose(), "at-3");
		assert_eq!(transport.requests().len(), 2);
	}

	#[tokio::test]
	async fn non_positive_expiry_is_a_validation_error() {
		let transport = ScriptedTransport::new([Ok(json_response(
			200,
			"{\"access_token\":\"at-4\",\"expires_in\":0}",
		))]);
		let client = TokenClient::new(handle(ClientAuthMethod::ClientSecretPost), transport);
		let err = client
			.refresh(&TokenSecret::new("rt"))
			.await
			.expect_err("Zero expiry must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::NonPositiveExpiresIn)));
	}

	#[test]
	fn revoked_refresh_tokens_map_to_revoked() {
		let strategy = crate::provider::DefaultProviderStrategy;
		let response = json_response(
			400,
			"{\"error\":\"invalid_grant\",\"error_description\":\"token revoked by user\"}",
		);
		let err = classify_failure(&strategy, CallKind::TokenRefresh, &response);

		assert!(matches!(err, Error::Auth(AuthError::Revoked)));
	}
}
