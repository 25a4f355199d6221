//! AES-256-GCM sealing for credential payloads.
//!
//! The 256-bit key is stretched from an arbitrary configured secret with
//! SHA-256 at startup. Every sealing draws a fresh random 96-bit nonce; the
//! stored layout is base64(nonce ‖ tag ‖ ciphertext). Opening verifies the
//! authentication tag and fails closed—no partial plaintext ever escapes.

// crates.io
use aes_gcm::{
	Aes256Gcm, Key, Nonce,
	aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::SecurityError};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// 256-bit symmetric key for the vault cipher.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);
impl MasterKey {
	/// Stretches an arbitrary configured secret into a key via SHA-256.
	pub fn derive(secret: &str) -> Self {
		let mut hasher = Sha256::new();

		hasher.update(secret.as_bytes());

		Self(hasher.finalize().into())
	}

	/// Wraps raw key bytes supplied by the host.
	pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
		Self(bytes)
	}
}
impl Debug for MasterKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("MasterKey").field(&"<redacted>").finish()
	}
}

/// Authenticated encryption for serialized credentials.
#[derive(Clone)]
pub struct CredentialCipher {
	cipher: Aes256Gcm,
}
impl CredentialCipher {
	/// Creates a cipher bound to the provided key.
	pub fn new(key: &MasterKey) -> Self {
		Self { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0)) }
	}

	/// Seals a plaintext payload under a fresh random nonce.
	pub fn seal(&self, plaintext: &[u8]) -> Result<String, SecurityError> {
		let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
		let sealed =
			self.cipher.encrypt(&nonce, plaintext).map_err(|_| SecurityError::SealFailed)?;
		// The AEAD output is ciphertext ‖ tag; the stored layout fronts the tag.
		let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
		let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());

		blob.extend_from_slice(nonce.as_slice());
		blob.extend_from_slice(tag);
		blob.extend_from_slice(ciphertext);

		Ok(STANDARD.encode(blob))
	}

	/// Opens a sealed payload, failing closed on any tamper or corruption.
	pub fn open(&self, sealed: &str) -> Result<Vec<u8>, SecurityError> {
		let blob = STANDARD.decode(sealed).map_err(|_| SecurityError::MalformedCiphertext)?;

		if blob.len() < NONCE_LEN + TAG_LEN {
			return Err(SecurityError::MalformedCiphertext);
		}

		let (nonce, rest) = blob.split_at(NONCE_LEN);
		let (tag, ciphertext) = rest.split_at(TAG_LEN);
		let mut sealed_input = Vec::with_capacity(ciphertext.len() + TAG_LEN);

		sealed_input.extend_from_slice(ciphertext);
		sealed_input.extend_from_slice(tag);

		self.cipher
			.decrypt(Nonce::from_slice(nonce), sealed_input.as_slice())
			.map_err(|_| SecurityError::Tampered)
	}
}
impl Debug for CredentialCipher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CredentialCipher(..)")
	}
}
