// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a fixed-width scalar encoding in bytes (all supported curves).
pub const SCALAR_LENGTH: usize = 32;
/// Extra bytes drawn when sampling a scalar, giving 64 bits of statistical slack.
pub const SCALAR_SAMPLING_SLACK: usize = 8;
/// Length of a SHA-256 digest in bytes.
pub const HASH_LENGTH: usize = 32;
/// Length of an HMAC-SHA-256 tag in bytes.
pub const MAC_LENGTH: usize = 32;
/// Length of the AES-256-GCM key derived from a KEM shared secret.
pub const AEAD_KEY_LENGTH: usize = 32;
/// Length of the AES-GCM nonce in bytes.
pub const AEAD_NONCE_LENGTH: usize = 12;
/// Length of the (truncated) AES-GCM authentication tag in bytes.
pub const AEAD_TAG_LENGTH: usize = 12;
/// Length of the per-row DRBG seed in bytes.
pub const SEED_LENGTH: usize = 16;
/// Length of the encryption randomness handed to the base PKE.
pub const RHO_LENGTH: usize = 32;
/// Length of a KEM shared secret produced by the built-in backends.
pub const KEM_SHARED_SECRET_LENGTH: usize = 32;
/// RSA modulus size used by the built-in RSA-OAEP backend.
pub const RSA_MODULUS_BITS: usize = 2048;
/// Uncompressed SEC1 encoding length of a P-256 point (the DH-KEM `enc`).
pub const P256_UNCOMPRESSED_LENGTH: usize = 65;

const _: () = assert!(SCALAR_LENGTH == 32);
const _: () = assert!(AEAD_NONCE_LENGTH == 12);
const _: () = assert!(AEAD_TAG_LENGTH == 12);
const _: () = assert!(SEED_LENGTH * 2 == RHO_LENGTH);

/// Domain-separation labels.
pub mod labels {
    /// HKDF-Expand info for the hybrid KEM→AEAD key.
    pub const KEM_AEAD_INFO: &[u8] = b"ECLIPTIX-PVE-v1|KEM-AEAD|KDF=HKDF-SHA256|AEAD=AES-GCM-256";
    /// HKDF-Expand info for the DRBG stream key.
    pub const DRBG_INFO: &[u8] = b"ECLIPTIX-PVE-v1/DRBG";
    /// HKDF-Expand info for the per-row quorum AEAD key.
    pub const QUORUM_ROW_INFO: &[u8] = b"ECLIPTIX-PVE-v1/QuorumRow";
    /// Prefix of the Fiat-Shamir challenge transcript.
    pub const CHALLENGE_CONTEXT: &[u8] = b"ECLIPTIX-PVE-v1/Challenge";
    /// RFC 9180 version label.
    pub const HPKE_VERSION: &[u8] = b"HPKE-v1";
    /// RFC 9180 KEM suite prefix.
    pub const HPKE_KEM: &[u8] = b"KEM";
    /// DHKEM(P-256, HKDF-SHA256) identifier.
    pub const DHKEM_P256_ID: [u8; 2] = [0x00, 0x10];
}

/// Enumerates all error conditions raised by the PVE primitives and engines.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PveError {
    /// An input is empty, malformed, or belongs to the wrong curve or backend.
    #[error("invalid argument")]
    InvalidArgument,
    /// A point is not on its curve or is the point at infinity.
    #[error("invalid curve point")]
    InvalidCurvePoint,
    /// The supplied commitment or label differs from the one bound at encryption.
    #[error("commitment or label mismatch")]
    CommitmentMismatch,
    /// The recomputed Fiat-Shamir challenge differs from the stored one.
    #[error("proof verification failed")]
    ProofInvalid,
    /// AEAD authentication failed or the KEM ciphertext was rejected.
    #[error("decryption failed")]
    DecryptionFailed,
    /// No row reconstructed a value matching the commitment.
    #[error("reconstruction failed")]
    ReconstructionFailed,
    /// A pluggable KEM backend reported a failure.
    #[error("kem backend failure")]
    Backend,
    /// A serialized structure has an invalid layout.
    #[error("invalid encoding")]
    InvalidEncoding,
}

/// Convenience alias for `Result<T, PveError>`.
pub type PveResult<T> = Result<T, PveError>;

/// A heap-allocated byte buffer that is zeroized on drop.
///
/// Wraps a `Vec<u8>` and implements `Zeroize + ZeroizeOnDrop` so that
/// shared secrets and decrypted plaintext halves are scrubbed when no longer
/// needed. The `Debug` implementation redacts the contents.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes(Vec<u8>);

impl SecureBytes {
    /// Creates a zero-filled buffer of the given length.
    pub fn new(len: usize) -> Self {
        Self(vec![0u8; len])
    }

    /// Creates a buffer by copying the given slice.
    pub fn from_slice(data: &[u8]) -> Self {
        Self(data.to_vec())
    }

    /// Returns an immutable reference to the underlying bytes.
    pub fn data(&self) -> &[u8] {
        &self.0
    }

    /// Returns the number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::Deref for SecureBytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::DerefMut for SecureBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for SecureBytes {}

impl std::fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureBytes([REDACTED; {}])", self.0.len())
    }
}

/// Compares two byte slices in constant time using libsodium's `sodium_memcmp`.
///
/// Returns `true` if the slices are equal, `false` otherwise. If the lengths
/// differ, returns `false` immediately (length itself is not secret).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.is_empty() {
        return true;
    }
    crate::crypto::init();
    // SAFETY: Both pointers come from valid non-empty slices of equal length.
    unsafe {
        libsodium_sys::sodium_memcmp(
            a.as_ptr() as *const _,
            b.as_ptr() as *const _,
            a.len(),
        ) == 0
    }
}

/// Returns `true` if every byte in `data` is zero, checked in constant time.
pub fn is_all_zero(data: &[u8]) -> bool {
    crate::crypto::init();
    // SAFETY: Pointer comes from a valid slice; a zero length is accepted by libsodium.
    unsafe { libsodium_sys::sodium_is_zero(data.as_ptr(), data.len()) == 1 }
}
