//! Credential records, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, TokenSecret, UserId},
};

/// Identifies the owner of a credential: one account linked to one provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
	/// Account that authorized the grant.
	pub user: UserId,
	/// Provider that minted the tokens.
	pub provider: ProviderId,
}
impl CredentialKey {
	/// Creates a key for the provided user and provider.
	pub fn new(user: UserId, provider: ProviderId) -> Self {
		Self { user, provider }
	}
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// One OAuth grant for a (user, provider, scope-class) triple.
///
/// Plaintext instances exist only inside process memory during a single
/// operation; at rest the record is serialized and sealed by the vault cipher.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
	/// Owner of the grant.
	pub key: CredentialKey,
	/// Normalized scopes granted to this record.
	pub scope: ScopeSet,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant, when the provider reported one. Some providers omit it.
	pub expires_at: Option<OffsetDateTime>,
	/// Instant the grant was first issued.
	pub issued_at: OffsetDateTime,
	/// Instant the record was last written (issue or refresh).
	pub updated_at: OffsetDateTime,
}
impl Credential {
	/// Returns a builder for the provided key and scope set.
	pub fn builder(key: CredentialKey, scope: ScopeSet) -> CredentialBuilder {
		CredentialBuilder::new(key, scope)
	}

	/// Returns `true` if the record has expired at the provided instant.
	///
	/// Records without a recorded expiry never report as expired.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| instant >= expiry)
	}

	/// Returns `true` if the record expires within `buffer` of the provided instant.
	pub fn expires_within(&self, buffer: Duration, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| expiry - instant <= buffer)
	}

	/// Returns `true` if the provider issued a refresh token for this grant.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.is_some()
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("key", &self.key)
			.field("scope", &self.scope)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("issued_at", &self.issued_at)
			.field("updated_at", &self.updated_at)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Clone, Debug)]
pub struct CredentialBuilder {
	key: CredentialKey,
	scope: ScopeSet,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	fn new(key: CredentialKey, scope: ScopeSet) -> Self {
		Self {
			key,
			scope,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value when one is present.
	pub fn maybe_refresh_token(mut self, token: Option<impl Into<String>>) -> Self {
		self.refresh_token = token.map(TokenSecret::new);

		self
	}

	/// Sets the issued-at instant (defaults to the current clock).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(issued_at + delta),
			(None, None) => None,
		};

		Ok(Credential {
			key: self.key,
			scope: self.scope,
			access_token,
			refresh_token: self.refresh_token,
			expires_at,
			issued_at,
			updated_at: issued_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn fixture_key() -> CredentialKey {
		CredentialKey::new(
			UserId::new("u1").expect("User fixture should be valid."),
			ProviderId::new("acme").expect("Provider fixture should be valid."),
		)
	}

	#[test]
	fn builder_requires_access_token() {
		let scope = ScopeSet::new(["ads"]).expect("Scope fixture should be valid.");
		let err = Credential::builder(fixture_key(), scope)
			.build()
			.expect_err("Builder without access token must fail.");

		assert_eq!(err, CredentialBuilderError::MissingAccessToken);
	}

	#[test]
	fn expiry_helpers_honor_buffer() {
		let scope = ScopeSet::new(["ads"]).expect("Scope fixture should be valid.");
		let issued = macros::datetime!(2025-06-01 00:00 UTC);
		let credential = Credential::builder(fixture_key(), scope)
			.access_token("access")
			.issued_at(issued)
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Credential fixture should build successfully.");

		assert!(!credential.is_expired_at(issued + Duration::minutes(29)));
		assert!(credential.is_expired_at(issued + Duration::minutes(30)));
		assert!(credential.expires_within(Duration::minutes(5), issued + Duration::minutes(26)));
		assert!(!credential.expires_within(Duration::minutes(5), issued + Duration::minutes(10)));
	}

	#[test]
	fn missing_expiry_never_reports_expired() {
		let scope = ScopeSet::new(["pages"]).expect("Scope fixture should be valid.");
		let credential = Credential::builder(fixture_key(), scope)
			.access_token("long-lived")
			.build()
			.expect("Credential without expiry should build successfully.");

		assert!(credential.expires_at.is_none());
		assert!(!credential.is_expired_at(OffsetDateTime::now_utc() + Duration::days(365)));
		assert!(!credential.expires_within(Duration::hours(1), OffsetDateTime::now_utc()));
	}

	#[test]
	fn debug_redacts_secrets() {
		let scope = ScopeSet::new(["ads"]).expect("Scope fixture should be valid.");
		let credential = Credential::builder(fixture_key(), scope)
			.access_token("visible-nowhere")
			.refresh_token("also-hidden")
			.build()
			.expect("Credential fixture should build successfully.");
		let rendered = format!("{credential:?}");

		assert!(!rendered.contains("visible-nowhere"));
		assert!(!rendered.contains("also-hidden"));
	}
}
