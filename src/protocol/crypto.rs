//! Hashing and byte helpers used by the authentication exchange.

use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};

type HmacMd5 = Hmac<Md5>;

/// Compute MD5 hash.
pub fn md5_hash(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute HMAC-MD5 of the concatenation of `parts`.
///
/// Keys longer than the MD5 block are hashed first, as RFC 2104 requires.
pub fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16]> {
    let mut mac = HmacMd5::new_from_slice(key).map_err(|e| Error::AuthenticationFailed {
        message: format!("HMAC key rejected: {}", e),
    })?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

/// Byte-wise XOR of two equally sized blocks.
pub fn xor<const N: usize>(left: &[u8; N], right: &[u8; N]) -> [u8; N] {
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = left[i] ^ right[i];
    }
    out
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Convert bytes to uppercase hex string.
pub fn bytes_to_hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Convert hex string to bytes.
#[cfg(test)]
pub(crate) fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if !hex.len().is_multiple_of(2) || !hex.is_ascii() {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_known_digests() {
        assert_eq!(
            bytes_to_hex_upper(&md5_hash(b"")),
            "D41D8CD98F00B204E9800998ECF8427E"
        );
        assert_eq!(
            bytes_to_hex_upper(&md5_hash(b"abc")),
            "900150983CD24FB0D6963F7D28E17F72"
        );
    }

    #[test]
    fn test_hmac_md5_rfc2104_vectors() {
        let mac = hmac_md5(&[0x0B; 16], &[b"Hi There"]).unwrap();
        assert_eq!(bytes_to_hex_upper(&mac), "9294727A3638BB1C13F48EF8158BFC9D");

        // Split input hashes like the concatenation.
        let mac = hmac_md5(b"Jefe", &[b"what do ya ", b"want for nothing?"]).unwrap();
        assert_eq!(bytes_to_hex_upper(&mac), "750C783E6AB0B503EAA86E310A5DB738");
    }

    #[test]
    fn test_xor() {
        assert_eq!(xor(&[0xF0, 0x0F], &[0xFF, 0xFF]), [0x0F, 0xF0]);
    }

    #[test]
    fn test_random_bytes_length() {
        let a = random_bytes(64);
        let b = random_bytes(64);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_conversion() {
        let bytes = [0xDE, 0xAD, 0xBE, 0xEF];
        let hex = bytes_to_hex_upper(&bytes);
        assert_eq!(hex, "DEADBEEF");

        let back = hex_to_bytes(&hex).unwrap();
        assert_eq!(back, bytes);
        assert!(hex_to_bytes("ABC").is_none());
        assert!(hex_to_bytes("ZZ").is_none());
    }
}
