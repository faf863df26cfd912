//! Participant link codec
//!
//! Each session owns a symmetric key, generated lazily and persisted next
//! to its document. A participant link is the session's view of one voter:
//! the identity payload is encrypted with ChaCha20-Poly1305 (authenticated,
//! so tampering is detected, not just hidden) and encoded with URL-safe,
//! padding-tolerant base64.
//!
//! By design the token carries no cleartext session identifier, so
//! resolution trial-decrypts against every known session key. That is an
//! O(sessions) cost accepted for unguessability; the [`KeySource`] trait
//! isolates the strategy so a tagged-token scheme could replace it without
//! changing callers.
//!
//! Every failure mode (malformed encoding, authentication failure, expired
//! payload, vanished session) collapses into [`Error::InvalidLink`] so the
//! codec never acts as an oracle for which sessions exist.

use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use chrono::Utc;
use rand::RngCore;
use zeroize::Zeroize;

use crate::types::{LinkPayload, Session};
use crate::{Error, Result};

/// Nonce size for ChaCha20-Poly1305 (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits)
const KEY_SIZE: usize = 32;

/// Advisory link lifetime: 30 days from issuance
const LINK_TTL_SECS: f64 = 86400.0 * 30.0;

/// A session's symmetric link key. Zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_SIZE]);

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    /// Decode the stored key-file format (base64, 32 bytes)
    pub fn from_encoded(encoded: &str) -> Option<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE
            .decode(encoded)
            .ok()?;
        let key: [u8; KEY_SIZE] = bytes.try_into().ok()?;
        Some(Self(key))
    }

    /// Encode to the stored key-file format
    pub fn encode(&self) -> String {
        base64::engine::general_purpose::URL_SAFE.encode(self.0)
    }
}

/// Supplier of candidate keys for trial decryption.
///
/// The session store implements this over the active partition's key
/// files; tests supply fixed key lists.
pub trait KeySource {
    fn keys(&self) -> Vec<SessionKey>;
}

impl KeySource for Vec<SessionKey> {
    fn keys(&self) -> Vec<SessionKey> {
        self.clone()
    }
}

/// Encrypt a participant-identity payload into a URL-safe token.
///
/// The participant must exist on the session; the payload embeds their
/// email and access token plus a 30-day advisory expiry.
pub fn issue(key: &SessionKey, session: &Session, participant_id: &str) -> Result<String> {
    let participant = session
        .participants
        .get(participant_id)
        .ok_or_else(|| Error::not_found("Participant"))?;

    let payload = LinkPayload {
        session_id: session.id.clone(),
        participant_id: participant_id.to_string(),
        email: participant.email.clone(),
        token: participant.token.clone(),
        expires: Utc::now().timestamp() as f64 + LINK_TTL_SECS,
    };

    let plaintext = serde_json::to_vec(&payload)?;

    let cipher = ChaCha20Poly1305::new_from_slice(&key.0).map_err(|_| Error::InvalidLink)?;
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| Error::InvalidLink)?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(blob))
}

/// The URL path segment a token is served under
pub fn vote_path(token: &str) -> String {
    format!("/vote/{token}")
}

/// Decode and decrypt a token against every candidate key.
///
/// Returns the embedded payload when some key authenticates the ciphertext
/// and the payload has not expired. Does not check that the referenced
/// session still exists; callers do, folding that case into the same
/// generic outcome.
pub fn resolve(keys: &dyn KeySource, token: &str) -> Result<LinkPayload> {
    // Tolerate padded input; we emit unpadded.
    let trimmed = token.trim_end_matches('=');
    let blob = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|_| Error::InvalidLink)?;

    if blob.len() <= NONCE_SIZE {
        return Err(Error::InvalidLink);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);

    for key in keys.keys() {
        let Ok(cipher) = ChaCha20Poly1305::new_from_slice(&key.0) else {
            continue;
        };
        let Ok(plaintext) = cipher.decrypt(Nonce::from_slice(nonce), ciphertext) else {
            continue;
        };
        let Ok(payload) = serde_json::from_slice::<LinkPayload>(&plaintext) else {
            continue;
        };

        if (Utc::now().timestamp() as f64) > payload.expires {
            return Err(Error::InvalidLink);
        }
        return Ok(payload);
    }

    Err(Error::InvalidLink)
}
