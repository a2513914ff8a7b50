//! Request (Interest) and response (Data) packets and their wire codec.
//!
//! Packets travel as a single `Packet` envelope serialized with bincode
//! (varint integers, no trailing bytes, bounded by `MAX_PACKET_SIZE`).
//! A Data signature covers the name, the freshness hint and the content.

use std::time::Duration;

use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    crypto::{constant_time_compare, sha256_digest, HmacKey, SIGNATURE_LENGTH},
    name::Name,
};

/// Largest datagram either side will encode or accept.
pub const MAX_PACKET_SIZE: usize = 8800;

/// Interest lifetime used when the caller does not pick one.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

/// Errors produced by the packet codec.
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Packet codec error: {0}")]
    Codec(#[from] bincode::Error),
}

fn codec() -> impl Options {
    bincode::options().with_limit(MAX_PACKET_SIZE as u64)
}

/// A named request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    /// Random value distinguishing retransmissions of the same name.
    pub nonce: u32,
    /// How long the requester waits for Data, in milliseconds.
    pub lifetime_ms: u32,
    /// When set, caches must not answer; only the producer may.
    pub must_be_fresh: bool,
}

impl Interest {
    pub fn new(name: Name, lifetime: Duration) -> Self {
        Interest {
            name,
            nonce: rand::random(),
            lifetime_ms: lifetime.as_millis().min(u32::MAX as u128) as u32,
            must_be_fresh: false,
        }
    }

    #[must_use]
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms as u64)
    }
}

/// Signature carried by a Data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signature {
    DigestSha256([u8; SIGNATURE_LENGTH]),
    HmacSha256([u8; SIGNATURE_LENGTH]),
}

/// Result of checking a Data signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid,
    /// Keyed signature, but no key was available to check it.
    Unverified,
}

/// A named, signed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    /// Cache validity hint in seconds; `None` leaves caching to the network.
    pub freshness: Option<u32>,
    pub content: Vec<u8>,
    pub signature: Signature,
}

impl Data {
    /// Checks the signature, using `key` for HMAC-signed packets.
    ///
    /// With a key, only a matching HMAC signature is valid; a bare digest
    /// proves nothing about the sender and is rejected.
    pub fn verify(&self, key: Option<&HmacKey>) -> Verification {
        let signed = match signed_portion(&self.name, self.freshness, &self.content) {
            Ok(bytes) => bytes,
            Err(_) => return Verification::Invalid,
        };

        let (expected, actual) = match (&self.signature, key) {
            (Signature::DigestSha256(_), Some(_)) => return Verification::Invalid,
            (Signature::DigestSha256(sig), None) => (sha256_digest(&signed), sig),
            (Signature::HmacSha256(sig), Some(key)) => (key.compute(&signed), sig),
            (Signature::HmacSha256(_), None) => return Verification::Unverified,
        };

        if constant_time_compare(&expected, actual) {
            Verification::Valid
        } else {
            Verification::Invalid
        }
    }
}

fn signed_portion(
    name: &Name,
    freshness: Option<u32>,
    content: &[u8],
) -> Result<Vec<u8>, PacketError> {
    Ok(codec().serialize(&(name, freshness, content))?)
}

/// Produces signed Data packets.
#[derive(Debug, Clone, Default)]
pub enum Signer {
    /// SHA-256 digest; integrity only.
    #[default]
    Digest,
    /// HMAC-SHA256 with a shared key.
    Hmac(HmacKey),
}

impl Signer {
    /// Creates a keyed signer when a key is given, a digest signer otherwise.
    pub fn from_key(key: Option<HmacKey>) -> Self {
        key.map_or(Signer::Digest, Signer::Hmac)
    }

    pub fn sign(
        &self,
        name: Name,
        content: Vec<u8>,
        freshness: Option<u32>,
    ) -> Result<Data, PacketError> {
        let signed = signed_portion(&name, freshness, &content)?;
        let signature = match self {
            Signer::Digest => Signature::DigestSha256(sha256_digest(&signed)),
            Signer::Hmac(key) => Signature::HmacSha256(key.compute(&signed)),
        };

        Ok(Data {
            name,
            freshness,
            content,
            signature,
        })
    }
}

/// Wire envelope for everything exchanged between faces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
}

impl Packet {
    pub fn to_bytes(&self) -> Result<Vec<u8>, PacketError> {
        Ok(codec().serialize(self)?)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, PacketError> {
        Ok(codec().deserialize(buf)?)
    }
}
