//! HMAC-SHA256 ticket signatures.
//!
//! A ticket's signature is `hex(HMAC-SHA256(secret, decimal(id)))`, lower-case.
//! The signature doubles as the QR payload scanned at the venue, so it is
//! both the credential and the lookup key.
//!
//! # Security
//!
//! - **Constant-time comparison**: `verify` uses `constant_time_eq`
//! - **Key hygiene**: the secret is zeroized on drop and never printed

use crate::error::{EventPassError, Result};
use crate::types::TicketId;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Shared HMAC secret, loaded once at startup.
#[derive(Clone)]
pub struct HmacSecret(Zeroizing<Vec<u8>>);

impl HmacSecret {
    /// Wrap raw secret bytes.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// `true` if no key material was provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for HmacSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacSecret(<redacted>)")
    }
}

/// Deterministic signer/verifier over ticket ids.
///
/// Stateless apart from the keyed MAC, which is prepared once and cloned per
/// call. Share it behind an `Arc`.
///
/// # Example
///
/// ```
/// use eventpass_core::signature::{HmacSecret, SignatureCodec};
/// use eventpass_core::TicketId;
///
/// # fn main() -> Result<(), eventpass_core::EventPassError> {
/// let codec = SignatureCodec::new(HmacSecret::new("k"))?;
/// let signature = codec.sign(TicketId(42));
/// assert!(codec.verify(TicketId(42), &signature));
/// assert!(!codec.verify(TicketId(43), &signature));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SignatureCodec {
    mac: HmacSha256,
}

impl SignatureCodec {
    /// Key a codec with the process-wide secret.
    ///
    /// # Errors
    ///
    /// Returns [`EventPassError::Config`] if the secret is empty.
    pub fn new(secret: HmacSecret) -> Result<Self> {
        if secret.is_empty() {
            return Err(EventPassError::Config("HMAC secret must not be empty".into()));
        }

        let mac = HmacSha256::new_from_slice(&secret.0)
            .map_err(|e| EventPassError::Signature(e.to_string()))?;

        Ok(Self { mac })
    }

    /// Sign a ticket id.
    #[must_use]
    pub fn sign(&self, id: TicketId) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a presented signature against the id.
    ///
    /// Malformed input (wrong length, upper-case, garbage) simply fails.
    #[must_use]
    pub fn verify(&self, id: TicketId, signature: &str) -> bool {
        let expected = self.sign(id);
        constant_time_eq::constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

impl fmt::Debug for SignatureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureCodec").finish_non_exhaustive()
    }
}
