use crate::codec::{Result, WireError};
use bytes::{Bytes, BytesMut};

/// ZMTP Greeting is always exactly 64 bytes
pub const GREETING_SIZE: usize = 64;

const SIGNATURE_HEAD: u8 = 0xFF;
const SIGNATURE_TAIL: u8 = 0x7F;

/// Build a ZMTP 3.0 greeting (64 bytes), NULL mechanism, as-client.
///
/// Layout (ZMTP 3.x):
/// ```text
/// [0]      0xFF
/// [1..9]   Padding
/// [9]      0x7F
/// [10]     Major version
/// [11]     Minor version
/// [12..32] Mechanism (ASCII, null-padded)
/// [32]     As-Server flag
/// [33..64] Padding
/// ```
pub fn build_greeting() -> Bytes {
    let mut b = BytesMut::with_capacity(GREETING_SIZE);

    // Signature
    b.extend_from_slice(&[SIGNATURE_HEAD]);
    b.extend_from_slice(&[0u8; 8]);
    b.extend_from_slice(&[SIGNATURE_TAIL]);

    // Version 3.0 (compatible with all ZMQ 4.x peers)
    b.extend_from_slice(&[0x03, 0x00]);

    // Mechanism: NULL
    b.extend_from_slice(b"NULL");
    b.extend_from_slice(&[0u8; 16]);

    // As-server flag = 0
    b.extend_from_slice(&[0x00]);

    // Padding
    b.extend_from_slice(&[0u8; 31]);

    b.freeze()
}

/// Validate a peer's 64-byte greeting.
///
/// Accepts any ZMTP 3.x version, which covers `ZeroMQ` 4.1 and later. The
/// peer must offer the NULL mechanism; Jupyter kernels authenticate with
/// per-message HMAC signatures, not transport-level security.
pub fn validate_greeting(src: &[u8]) -> Result<()> {
    if src.len() < GREETING_SIZE {
        return Err(WireError::BadGreeting);
    }

    // Signature
    if src[0] != SIGNATURE_HEAD || src[9] != SIGNATURE_TAIL {
        return Err(WireError::BadGreeting);
    }

    // Version (require 3.x)
    if src[10] < 3 {
        return Err(WireError::BadGreeting);
    }

    // Mechanism (bytes 12..32, ASCII null-padded)
    let mech = &src[12..32];
    let mech = match std::str::from_utf8(mech) {
        Ok(s) => s.trim_matches(char::from(0)),
        Err(_) => return Err(WireError::BadGreeting),
    };
    if mech != "NULL" {
        return Err(WireError::BadGreeting);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_is_64_bytes() {
        assert_eq!(build_greeting().len(), GREETING_SIZE);
    }

    #[test]
    fn test_own_greeting_validates() {
        let greeting = build_greeting();
        assert!(validate_greeting(&greeting).is_ok());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let mut greeting = build_greeting().to_vec();
        greeting[0] = 0x00;
        assert!(matches!(
            validate_greeting(&greeting),
            Err(WireError::BadGreeting)
        ));
    }

    #[test]
    fn test_old_version_rejected() {
        let mut greeting = build_greeting().to_vec();
        greeting[10] = 2;
        assert!(matches!(
            validate_greeting(&greeting),
            Err(WireError::BadGreeting)
        ));
    }

    #[test]
    fn test_non_null_mechanism_rejected() {
        let mut greeting = build_greeting().to_vec();
        greeting[12..17].copy_from_slice(b"CURVE");
        assert!(matches!(
            validate_greeting(&greeting),
            Err(WireError::BadGreeting)
        ));
    }
}
