//! Envelope signatures.
//!
//! Every signed message carries a keyed MAC over the four serialized JSON
//! sections in order (header, parent_header, metadata, content), hex-encoded
//! into its own frame. An empty key selects unsigned mode: the signature
//! frame is empty and verification accepts anything.

use bytes::Bytes;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::error::{ConfigError, ProtocolError};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Supported signature schemes.
///
/// Connection files spell these `hmac-<algo>`; the conventional `hmac-`
/// prefix is stripped to obtain the hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    HmacSha256,
    HmacSha512,
}

impl SignatureScheme {
    /// Parse a scheme name, accepting both the connection-file form
    /// (`"hmac-sha256"`) and the bare hash name (`"sha256"`).
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.strip_prefix("hmac-").unwrap_or(name) {
            "sha256" => Ok(Self::HmacSha256),
            "sha512" => Ok(Self::HmacSha512),
            _ => Err(ConfigError::UnsupportedScheme(name.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha512 => "hmac-sha512",
        }
    }
}

/// Signs and verifies envelope sections with a shared key.
#[derive(Debug, Clone)]
pub struct MessageSigner {
    scheme: SignatureScheme,
    key: Bytes,
}

impl MessageSigner {
    pub fn new(scheme: SignatureScheme, key: impl Into<Bytes>) -> Self {
        Self {
            scheme,
            key: key.into(),
        }
    }

    /// A signer with an empty key: signs nothing, verifies everything.
    #[must_use]
    pub fn unsigned() -> Self {
        Self {
            scheme: SignatureScheme::HmacSha256,
            key: Bytes::new(),
        }
    }

    #[must_use]
    pub fn is_signing(&self) -> bool {
        !self.key.is_empty()
    }

    /// Hex signature over the sections in order; empty string in unsigned
    /// mode.
    #[must_use]
    pub fn sign(&self, sections: &[&[u8]]) -> String {
        if !self.is_signing() {
            return String::new();
        }
        let tag = match self.scheme {
            SignatureScheme::HmacSha256 => compute::<HmacSha256>(&self.key, sections),
            SignatureScheme::HmacSha512 => compute::<HmacSha512>(&self.key, sections),
        };
        hex::encode(tag)
    }

    /// Check a transmitted hex signature against the recomputed one.
    ///
    /// The comparison is constant-time (`Mac::verify_slice`); a signature
    /// that is not valid hex fails the same way as a wrong one.
    pub fn verify(&self, sections: &[&[u8]], signature: &[u8]) -> Result<(), ProtocolError> {
        if !self.is_signing() {
            return Ok(());
        }
        let raw = hex::decode(signature).map_err(|_| ProtocolError::SignatureMismatch)?;
        let ok = match self.scheme {
            SignatureScheme::HmacSha256 => check::<HmacSha256>(&self.key, sections, &raw),
            SignatureScheme::HmacSha512 => check::<HmacSha512>(&self.key, sections, &raw),
        };
        if ok {
            Ok(())
        } else {
            Err(ProtocolError::SignatureMismatch)
        }
    }
}

fn mac_over<M: Mac + KeyInit>(key: &[u8], sections: &[&[u8]]) -> M {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    for section in sections {
        mac.update(section);
    }
    mac
}

fn compute<M: Mac + KeyInit>(key: &[u8], sections: &[&[u8]]) -> Vec<u8> {
    mac_over::<M>(key, sections).finalize().into_bytes().to_vec()
}

fn check<M: Mac + KeyInit>(key: &[u8], sections: &[&[u8]], tag: &[u8]) -> bool {
    mac_over::<M>(key, sections).verify_slice(tag).is_ok()
}
