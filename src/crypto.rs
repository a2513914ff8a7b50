//! Signing and verification of Data packets.
//!
//! Two signature kinds are supported: a plain SHA-256 digest, which only
//! protects against corruption, and HMAC-SHA256 with a shared key.

use std::{fs, path::Path};

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Minimum key length in bytes for HMAC operations.
pub const MIN_KEY_LENGTH: usize = 16;

/// Length of both signature kinds in bytes.
pub const SIGNATURE_LENGTH: usize = 32;

/// Errors that can occur while loading an HMAC key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HmacError {
    /// The provided key is too short.
    #[error("Key length {0} is less than minimum required {MIN_KEY_LENGTH} bytes")]
    KeyTooShort(usize),

    /// Invalid hexadecimal string.
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    /// Failed to read key from file.
    #[error("Failed to read key file: {0}")]
    FileReadError(String),
}

/// Shared secret for keyed Data signatures.
#[derive(Clone)]
pub struct HmacKey(Vec<u8>);

impl HmacKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    /// Returns `HmacError::KeyTooShort` if key is less than 16 bytes.
    pub fn new(key: Vec<u8>) -> Result<Self, HmacError> {
        if key.len() < MIN_KEY_LENGTH {
            return Err(HmacError::KeyTooShort(key.len()));
        }
        Ok(Self(key))
    }

    /// Creates a key from a hexadecimal string.
    pub fn from_hex(hex_str: &str) -> Result<Self, HmacError> {
        let key = hex::decode(hex_str).map_err(|e| HmacError::InvalidHex(e.to_string()))?;
        Self::new(key)
    }

    /// Reads a key from a file holding either hex text or raw bytes.
    pub fn from_file(path: &Path) -> Result<Self, HmacError> {
        let raw = fs::read(path).map_err(|e| HmacError::FileReadError(e.to_string()))?;

        if let Ok(text) = std::str::from_utf8(&raw) {
            if let Ok(key) = Self::from_hex(text.trim()) {
                return Ok(key);
            }
        }

        Self::new(raw)
    }

    /// Computes HMAC-SHA256 over `data`.
    #[must_use]
    pub fn compute(&self, data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size");
        mac.update(data);

        let mut out = [0u8; SIGNATURE_LENGTH];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    /// Returns the key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HmacKey({} bytes)", self.0.len())
    }
}

/// Loads an optional key from a hex string or a key file; the hex string wins.
pub fn load_hmac_key(
    hex_key: Option<&str>,
    key_file: Option<&Path>,
) -> Result<Option<HmacKey>, HmacError> {
    if let Some(hex_key) = hex_key {
        return HmacKey::from_hex(hex_key).map(Some);
    }
    if let Some(path) = key_file {
        return HmacKey::from_file(path).map(Some);
    }
    Ok(None)
}

/// Computes the SHA-256 digest of `data`.
#[must_use]
pub fn sha256_digest(data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    let mut out = [0u8; SIGNATURE_LENGTH];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Performs constant-time comparison of two byte slices.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_deterministic() {
        let key = HmacKey::new(vec![0u8; 32]).unwrap();
        assert_eq!(key.compute(b"test data"), key.compute(b"test data"));
    }

    #[test]
    fn test_hmac_depends_on_key() {
        let key1 = HmacKey::new(vec![0xab; 32]).unwrap();
        let key2 = HmacKey::new(vec![0xcd; 32]).unwrap();
        assert_ne!(key1.compute(b"ping ack"), key2.compute(b"ping ack"));
    }

    #[test]
    fn test_digest_differs_from_hmac() {
        let key = HmacKey::new(vec![0xab; 32]).unwrap();
        assert_ne!(sha256_digest(b"ping ack"), key.compute(b"ping ack"));
    }

    #[test]
    fn test_key_from_hex() {
        let key = HmacKey::from_hex("0123456789abcdef0123456789ABCDEF").unwrap();
        assert_eq!(key.len(), 16);
        assert!(!key.is_empty());
    }

    #[test]
    fn test_key_from_hex_invalid() {
        assert!(matches!(
            HmacKey::from_hex("not_valid_hex!"),
            Err(HmacError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_key_minimum_length() {
        assert!(matches!(
            HmacKey::new(vec![0u8; 15]),
            Err(HmacError::KeyTooShort(15))
        ));
        assert!(HmacKey::new(vec![0u8; 16]).is_ok());
        assert!(matches!(
            HmacKey::from_hex("0123456789abcd"),
            Err(HmacError::KeyTooShort(7))
        ));
    }

    #[test]
    fn test_load_hmac_key_prefers_hex() {
        let key = load_hmac_key(
            Some("0123456789abcdef0123456789abcdef"),
            Some(Path::new("/nonexistent/key")),
        )
        .unwrap();
        assert_eq!(key.unwrap().len(), 16);

        assert!(load_hmac_key(None, None).unwrap().is_none());
        assert!(matches!(
            load_hmac_key(None, Some(Path::new("/nonexistent/key"))),
            Err(HmacError::FileReadError(_))
        ));
    }

    #[test]
    fn test_key_from_file_hex_and_raw() {
        let dir = std::env::temp_dir();
        let hex_path = dir.join(format!("ccnping-hex-key-{}", std::process::id()));
        let raw_path = dir.join(format!("ccnping-raw-key-{}", std::process::id()));

        fs::write(&hex_path, "00112233445566778899aabbccddeeff\n").unwrap();
        fs::write(&raw_path, [0xffu8; 20]).unwrap();

        assert_eq!(HmacKey::from_file(&hex_path).unwrap().len(), 16);
        assert_eq!(HmacKey::from_file(&raw_path).unwrap().len(), 20);

        let _ = fs::remove_file(hex_path);
        let _ = fs::remove_file(raw_path);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2]));
        assert!(constant_time_compare(&[], &[]));
    }
}
