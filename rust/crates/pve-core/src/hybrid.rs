// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use zeroize::Zeroize;

use crate::codec::{Reader, Writer};
use crate::crypto;
use crate::drbg::Drbg;
use crate::kem::Kem;
use crate::types::{
    labels, PveError, PveResult, SecureBytes, AEAD_KEY_LENGTH, AEAD_NONCE_LENGTH,
    AEAD_TAG_LENGTH,
};

/// AES-256-GCM with a 96-bit nonce and a 96-bit tag.
type Aes256Gcm12 = AesGcm<Aes256, U12, U12>;

/// KEM→AEAD hybrid ciphertext.
#[derive(Clone, PartialEq, Eq)]
pub struct HybridCiphertext {
    pub kem_ct: Vec<u8>,
    pub nonce: [u8; AEAD_NONCE_LENGTH],
    /// AEAD output including the 12-byte tag.
    pub aead_ct: Vec<u8>,
}

fn aead_key(shared_secret: &[u8]) -> PveResult<[u8; AEAD_KEY_LENGTH]> {
    crypto::hkdf_sha256::<AEAD_KEY_LENGTH>(&[], shared_secret, labels::KEM_AEAD_INFO)
}

/// AES-256-GCM (12-byte tag) encryption under an already derived key.
///
/// # Errors
///
/// Returns [`PveError::InvalidArgument`] if the AEAD rejects its inputs.
pub fn aead_seal(
    key: &[u8; AEAD_KEY_LENGTH],
    nonce: &[u8; AEAD_NONCE_LENGTH],
    aad: &[u8],
    plaintext: &[u8],
) -> PveResult<Vec<u8>> {
    Aes256Gcm12::new_from_slice(key)
        .map_err(|_| PveError::InvalidArgument)?
        .encrypt(&Nonce::<U12>::from(*nonce), Payload { msg: plaintext, aad })
        .map_err(|_| PveError::InvalidArgument)
}

/// # Errors
///
/// Returns [`PveError::DecryptionFailed`] if the tag does not verify.
pub fn aead_open(
    key: &[u8; AEAD_KEY_LENGTH],
    nonce: &[u8; AEAD_NONCE_LENGTH],
    aad: &[u8],
    ciphertext: &[u8],
) -> PveResult<SecureBytes> {
    if ciphertext.len() < AEAD_TAG_LENGTH {
        return Err(PveError::DecryptionFailed);
    }
    Aes256Gcm12::new_from_slice(key)
        .map_err(|_| PveError::DecryptionFailed)?
        .decrypt(&Nonce::<U12>::from(*nonce), Payload { msg: ciphertext, aad })
        .map(SecureBytes::from)
        .map_err(|_| PveError::DecryptionFailed)
}

impl HybridCiphertext {
    /// Encapsulates to `ek`, derives the AEAD key from the shared secret and
    /// encrypts `plaintext` authenticating `aad`.
    ///
    /// All randomness (KEM ephemeral, nonce) is drawn from `drbg`, so identical
    /// inputs produce byte-identical ciphertexts.
    ///
    /// # Errors
    ///
    /// Propagates KEM failures; returns [`PveError::InvalidArgument`] if the
    /// AEAD rejects its inputs.
    pub fn seal<K: Kem + ?Sized>(
        kem: &K,
        ek: &K::EncapsulationKey,
        aad: &[u8],
        plaintext: &[u8],
        drbg: &mut Drbg,
    ) -> PveResult<Self> {
        let (kem_ct, shared_secret) = kem.encapsulate(ek, drbg)?;
        let mut key = aead_key(&shared_secret)?;
        let nonce = drbg.gen_array::<AEAD_NONCE_LENGTH>();
        let aead_ct = aead_seal(&key, &nonce, aad, plaintext);
        key.zeroize();
        Ok(Self { kem_ct, nonce, aead_ct: aead_ct? })
    }

    /// # Errors
    ///
    /// Returns [`PveError::DecryptionFailed`] if the tag does not verify or the
    /// ciphertext is malformed; propagates KEM failures.
    pub fn open<K: Kem + ?Sized>(
        &self,
        kem: &K,
        dk: &K::DecapsulationKey,
        aad: &[u8],
    ) -> PveResult<SecureBytes> {
        let shared_secret = kem.decapsulate(dk, &self.kem_ct)?;
        let mut key = aead_key(&shared_secret)?;
        let plaintext = aead_open(&key, &self.nonce, aad, &self.aead_ct);
        key.zeroize();
        plaintext
    }

    /// Appends `kem_ct || nonce || aead_ct`, with both variable fields
    /// `u32`-length-prefixed.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if a field overflows its length prefix.
    pub fn write_to(&self, w: &mut Writer) -> PveResult<()> {
        w.put_bytes(&self.kem_ct)?;
        w.put_raw(&self.nonce);
        w.put_bytes(&self.aead_ct)
    }

    /// Reads one ciphertext written by [`HybridCiphertext::write_to`], leaving
    /// the reader positioned after it.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidEncoding`] on truncation or if the AEAD part
    /// is shorter than its tag.
    pub fn read_from(r: &mut Reader<'_>) -> PveResult<Self> {
        let kem_ct = r.bytes()?.to_vec();
        let nonce = r.array::<AEAD_NONCE_LENGTH>()?;
        let aead_ct = r.bytes()?.to_vec();
        if aead_ct.len() < AEAD_TAG_LENGTH {
            return Err(PveError::InvalidEncoding);
        }
        Ok(Self { kem_ct, nonce, aead_ct })
    }

    /// Standalone encoding of [`HybridCiphertext::write_to`].
    pub fn to_bytes(&self) -> PveResult<Vec<u8>> {
        let mut w = Writer::new();
        self.write_to(&mut w)?;
        Ok(w.into_bytes())
    }

    /// # Errors
    ///
    /// Returns [`PveError::InvalidEncoding`] on truncation or trailing bytes.
    pub fn from_bytes(data: &[u8]) -> PveResult<Self> {
        let mut r = Reader::new(data);
        let ct = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(ct)
    }
}

impl std::fmt::Debug for HybridCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridCiphertext")
            .field("kem_ct_len", &self.kem_ct.len())
            .field("aead_ct_len", &self.aead_ct.len())
            .finish()
    }
}
