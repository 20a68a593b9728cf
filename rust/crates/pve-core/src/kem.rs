// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! KEM backends and the base public-key encryption adapter.
//!
//! A [`Kem`] turns a public key plus deterministic randomness into a KEM
//! ciphertext and a shared secret. [`HybridCiphertext`] layers AES-GCM on top,
//! and a [`BasePke`] exposes the result as `encrypt(ek, label, plaintext, rho)`
//! / `decrypt(dk, label, ciphertext)` over [`EncryptionKey`] / [`DecryptionKey`].
//!
//! Engines hold a [`PkeHandle`] (a shared trait object), never a global
//! backend selection.

use std::any::Any;
use std::sync::Arc;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::crypto;
use crate::drbg::Drbg;
use crate::hybrid::HybridCiphertext;
use crate::types::{
    labels, PveError, PveResult, SecureBytes, HASH_LENGTH, KEM_SHARED_SECRET_LENGTH,
    P256_UNCOMPRESSED_LENGTH, RHO_LENGTH, RSA_MODULUS_BITS,
};

/// A key encapsulation mechanism driven by a deterministic generator.
///
/// Every random byte `encapsulate` uses comes from `drbg`, so the same seed
/// reproduces the same `(kem_ct, shared_secret)` pair and a verifier can
/// re-encrypt an opened row byte for byte.
pub trait Kem {
    type EncapsulationKey: ?Sized;
    type DecapsulationKey: ?Sized;

    /// Returns `(kem_ct, shared_secret)`.
    fn encapsulate(
        &self,
        ek: &Self::EncapsulationKey,
        drbg: &mut Drbg,
    ) -> PveResult<(Vec<u8>, SecureBytes)>;

    fn decapsulate(&self, dk: &Self::DecapsulationKey, kem_ct: &[u8]) -> PveResult<SecureBytes>;
}

/// RSA-OAEP (SHA-256 / MGF1-SHA-256) wrapping 32 random bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaOaepKem;

impl Kem for RsaOaepKem {
    type EncapsulationKey = RsaPublicKey;
    type DecapsulationKey = RsaPrivateKey;

    fn encapsulate(
        &self,
        ek: &RsaPublicKey,
        drbg: &mut Drbg,
    ) -> PveResult<(Vec<u8>, SecureBytes)> {
        let shared_secret = drbg.gen(KEM_SHARED_SECRET_LENGTH);
        let kem_ct = ek
            .encrypt(drbg, Oaep::new::<Sha256>(), &shared_secret)
            .map_err(|_| PveError::InvalidArgument)?;
        Ok((kem_ct, shared_secret))
    }

    fn decapsulate(&self, dk: &RsaPrivateKey, kem_ct: &[u8]) -> PveResult<SecureBytes> {
        let shared_secret = SecureBytes::from(
            dk.decrypt(Oaep::new::<Sha256>(), kem_ct)
                .map_err(|_| PveError::DecryptionFailed)?,
        );
        if shared_secret.len() != KEM_SHARED_SECRET_LENGTH {
            return Err(PveError::DecryptionFailed);
        }
        Ok(shared_secret)
    }
}

/// DHKEM(P-256, HKDF-SHA256) with RFC 9180 labeled extract/expand.
#[derive(Debug, Clone, Copy, Default)]
pub struct DhKemP256;

impl DhKemP256 {
    fn suite_id() -> [u8; 5] {
        let mut id = [0u8; 5];
        id[..3].copy_from_slice(labels::HPKE_KEM);
        id[3..].copy_from_slice(&labels::DHKEM_P256_ID);
        id
    }

    fn labeled_extract(label: &[u8], ikm: &[u8]) -> PveResult<[u8; HASH_LENGTH]> {
        let suite = Self::suite_id();
        let mut labeled_ikm =
            [labels::HPKE_VERSION, &suite[..], label, ikm].concat();
        let prk = crypto::key_derivation_extract(&[], &labeled_ikm);
        labeled_ikm.zeroize();
        prk
    }

    fn labeled_expand(
        prk: &[u8],
        label: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> PveResult<()> {
        let len = u16::try_from(okm.len()).map_err(|_| PveError::InvalidArgument)?;
        let suite = Self::suite_id();
        let labeled_info =
            [&len.to_be_bytes()[..], labels::HPKE_VERSION, &suite[..], label, info].concat();
        crypto::key_derivation_expand(prk, &labeled_info, okm)
    }

    fn extract_and_expand(dh: &[u8], kem_context: &[u8]) -> PveResult<SecureBytes> {
        let mut eae_prk = Self::labeled_extract(b"eae_prk", dh)?;
        let mut shared_secret = SecureBytes::new(KEM_SHARED_SECRET_LENGTH);
        let result =
            Self::labeled_expand(&eae_prk, b"shared_secret", kem_context, &mut shared_secret);
        eae_prk.zeroize();
        result.map(|()| shared_secret)
    }
}

impl Kem for DhKemP256 {
    type EncapsulationKey = p256::PublicKey;
    type DecapsulationKey = p256::SecretKey;

    fn encapsulate(
        &self,
        ek: &p256::PublicKey,
        drbg: &mut Drbg,
    ) -> PveResult<(Vec<u8>, SecureBytes)> {
        let ephemeral = p256::NonZeroScalar::random(drbg);
        let enc = p256::PublicKey::from_secret_scalar(&ephemeral)
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        let dh = p256::ecdh::diffie_hellman(ephemeral, ek.as_affine());
        let kem_context = [enc.as_slice(), ek.to_encoded_point(false).as_bytes()].concat();
        let shared_secret = Self::extract_and_expand(dh.raw_secret_bytes(), &kem_context)?;
        Ok((enc, shared_secret))
    }

    fn decapsulate(&self, dk: &p256::SecretKey, kem_ct: &[u8]) -> PveResult<SecureBytes> {
        if kem_ct.len() != P256_UNCOMPRESSED_LENGTH {
            return Err(PveError::DecryptionFailed);
        }
        let ephemeral_public =
            p256::PublicKey::from_sec1_bytes(kem_ct).map_err(|_| PveError::DecryptionFailed)?;
        let dh = p256::ecdh::diffie_hellman(dk.to_nonzero_scalar(), ephemeral_public.as_affine());
        let kem_context =
            [kem_ct, dk.public_key().to_encoded_point(false).as_bytes()].concat();
        Self::extract_and_expand(dh.raw_secret_bytes(), &kem_context)
    }
}

/// Caller-owned private key material for an external KEM. The core never
/// looks inside; only the owning [`KemCapability`] downcasts it.
#[derive(Clone)]
pub struct ExternalKeyHandle(Arc<dyn Any + Send + Sync>);

impl ExternalKeyHandle {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for ExternalKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExternalKeyHandle(..)")
    }
}

/// A KEM supplied by the caller (HSM, post-quantum library, ...).
pub trait KemCapability: Send + Sync {
    /// Must be deterministic in `(ek, rho)`.
    fn encapsulate(&self, ek: &[u8], rho: &[u8; RHO_LENGTH])
        -> PveResult<(Vec<u8>, SecureBytes)>;

    fn decapsulate(&self, dk: &ExternalKeyHandle, kem_ct: &[u8]) -> PveResult<SecureBytes>;

    fn derive_public(&self, dk: &ExternalKeyHandle) -> PveResult<Vec<u8>>;
}

struct CapabilityKem<'a>(&'a dyn KemCapability);

impl Kem for CapabilityKem<'_> {
    type EncapsulationKey = [u8];
    type DecapsulationKey = ExternalKeyHandle;

    fn encapsulate(&self, ek: &[u8], drbg: &mut Drbg) -> PveResult<(Vec<u8>, SecureBytes)> {
        let mut rho = drbg.gen_array::<RHO_LENGTH>();
        let result = self.0.encapsulate(ek, &rho).map_err(|_| PveError::Backend);
        rho.zeroize();
        result
    }

    fn decapsulate(&self, dk: &ExternalKeyHandle, kem_ct: &[u8]) -> PveResult<SecureBytes> {
        self.0.decapsulate(dk, kem_ct).map_err(|_| PveError::Backend)
    }
}

/// Public encryption key for any supported backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionKey {
    Rsa(RsaPublicKey),
    Ec(p256::PublicKey),
    External(Vec<u8>),
}

/// Private decryption key for any supported backend.
#[derive(Clone)]
pub enum DecryptionKey {
    Rsa(RsaPrivateKey),
    Ec(p256::SecretKey),
    External(ExternalKeyHandle),
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            DecryptionKey::Rsa(_) => "Rsa",
            DecryptionKey::Ec(_) => "Ec",
            DecryptionKey::External(_) => "External",
        };
        write!(f, "DecryptionKey::{kind}([REDACTED])")
    }
}

/// Generates an RSA-2048 decryption key from the system RNG.
///
/// # Errors
///
/// Returns [`PveError::Backend`] if key generation fails.
pub fn generate_rsa_key() -> PveResult<DecryptionKey> {
    RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
        .map(DecryptionKey::Rsa)
        .map_err(|_| PveError::Backend)
}

/// Generates a P-256 decryption key from the system RNG.
pub fn generate_ec_key() -> DecryptionKey {
    DecryptionKey::Ec(p256::SecretKey::random(&mut OsRng))
}

/// Uniform label-bound encryption over a KEM backend.
///
/// `rho` is the complete encryption randomness: identical
/// `(ek, label, plaintext, rho)` must yield identical ciphertexts.
pub trait BasePke: Send + Sync {
    fn encrypt(
        &self,
        ek: &EncryptionKey,
        label: &[u8],
        plaintext: &[u8],
        rho: &[u8],
    ) -> PveResult<Vec<u8>>;

    fn decrypt(&self, dk: &DecryptionKey, label: &[u8], ciphertext: &[u8])
        -> PveResult<SecureBytes>;

    fn derive_encryption_key(&self, dk: &DecryptionKey) -> PveResult<EncryptionKey>;
}

/// Shared, cloneable backend handle held by the engines.
pub type PkeHandle = Arc<dyn BasePke>;

fn rho_drbg(rho: &[u8]) -> PveResult<Drbg> {
    if rho.len() != RHO_LENGTH {
        return Err(PveError::InvalidArgument);
    }
    Drbg::new(rho)
}

fn decode_hybrid(ciphertext: &[u8]) -> PveResult<HybridCiphertext> {
    HybridCiphertext::from_bytes(ciphertext).map_err(|_| PveError::DecryptionFailed)
}

fn seal_rsa(pk: &RsaPublicKey, label: &[u8], plaintext: &[u8], rho: &[u8]) -> PveResult<Vec<u8>> {
    HybridCiphertext::seal(&RsaOaepKem, pk, label, plaintext, &mut rho_drbg(rho)?)?.to_bytes()
}

fn seal_ec(
    pk: &p256::PublicKey,
    label: &[u8],
    plaintext: &[u8],
    rho: &[u8],
) -> PveResult<Vec<u8>> {
    HybridCiphertext::seal(&DhKemP256, pk, label, plaintext, &mut rho_drbg(rho)?)?.to_bytes()
}

/// RSA-OAEP backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaOaepPke;

impl BasePke for RsaOaepPke {
    fn encrypt(
        &self,
        ek: &EncryptionKey,
        label: &[u8],
        plaintext: &[u8],
        rho: &[u8],
    ) -> PveResult<Vec<u8>> {
        match ek {
            EncryptionKey::Rsa(pk) => seal_rsa(pk, label, plaintext, rho),
            _ => Err(PveError::InvalidArgument),
        }
    }

    fn decrypt(
        &self,
        dk: &DecryptionKey,
        label: &[u8],
        ciphertext: &[u8],
    ) -> PveResult<SecureBytes> {
        match dk {
            DecryptionKey::Rsa(sk) => decode_hybrid(ciphertext)?.open(&RsaOaepKem, sk, label),
            _ => Err(PveError::InvalidArgument),
        }
    }

    fn derive_encryption_key(&self, dk: &DecryptionKey) -> PveResult<EncryptionKey> {
        match dk {
            DecryptionKey::Rsa(sk) => Ok(EncryptionKey::Rsa(sk.to_public_key())),
            _ => Err(PveError::InvalidArgument),
        }
    }
}

/// P-256 DH-KEM backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct DhKemP256Pke;

impl BasePke for DhKemP256Pke {
    fn encrypt(
        &self,
        ek: &EncryptionKey,
        label: &[u8],
        plaintext: &[u8],
        rho: &[u8],
    ) -> PveResult<Vec<u8>> {
        match ek {
            EncryptionKey::Ec(pk) => seal_ec(pk, label, plaintext, rho),
            _ => Err(PveError::InvalidArgument),
        }
    }

    fn decrypt(
        &self,
        dk: &DecryptionKey,
        label: &[u8],
        ciphertext: &[u8],
    ) -> PveResult<SecureBytes> {
        match dk {
            DecryptionKey::Ec(sk) => decode_hybrid(ciphertext)?.open(&DhKemP256, sk, label),
            _ => Err(PveError::InvalidArgument),
        }
    }

    fn derive_encryption_key(&self, dk: &DecryptionKey) -> PveResult<EncryptionKey> {
        match dk {
            DecryptionKey::Ec(sk) => Ok(EncryptionKey::Ec(sk.public_key())),
            _ => Err(PveError::InvalidArgument),
        }
    }
}

/// Key-kind tags of the unified ciphertext.
pub mod unified_tag {
    pub const RSA: u8 = 1;
    pub const EC: u8 = 2;
}

/// Dispatches on the key kind and prefixes the ciphertext with a one-byte tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnifiedPke;

impl BasePke for UnifiedPke {
    fn encrypt(
        &self,
        ek: &EncryptionKey,
        label: &[u8],
        plaintext: &[u8],
        rho: &[u8],
    ) -> PveResult<Vec<u8>> {
        let (tag, body) = match ek {
            EncryptionKey::Rsa(pk) => (unified_tag::RSA, seal_rsa(pk, label, plaintext, rho)?),
            EncryptionKey::Ec(pk) => (unified_tag::EC, seal_ec(pk, label, plaintext, rho)?),
            EncryptionKey::External(_) => return Err(PveError::InvalidArgument),
        };
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(tag);
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decrypt(
        &self,
        dk: &DecryptionKey,
        label: &[u8],
        ciphertext: &[u8],
    ) -> PveResult<SecureBytes> {
        let (&tag, body) = ciphertext.split_first().ok_or(PveError::DecryptionFailed)?;
        match (tag, dk) {
            (unified_tag::RSA, DecryptionKey::Rsa(sk)) => {
                decode_hybrid(body)?.open(&RsaOaepKem, sk, label)
            }
            (unified_tag::EC, DecryptionKey::Ec(sk)) => {
                decode_hybrid(body)?.open(&DhKemP256, sk, label)
            }
            (_, DecryptionKey::External(_)) => Err(PveError::InvalidArgument),
            _ => Err(PveError::DecryptionFailed),
        }
    }

    fn derive_encryption_key(&self, dk: &DecryptionKey) -> PveResult<EncryptionKey> {
        match dk {
            DecryptionKey::Rsa(_) => RsaOaepPke.derive_encryption_key(dk),
            DecryptionKey::Ec(_) => DhKemP256Pke.derive_encryption_key(dk),
            DecryptionKey::External(_) => Err(PveError::InvalidArgument),
        }
    }
}

/// Backend bound to a caller-supplied [`KemCapability`].
#[derive(Clone)]
pub struct ExternalKemPke {
    capability: Arc<dyn KemCapability>,
}

impl ExternalKemPke {
    pub fn new(capability: Arc<dyn KemCapability>) -> Self {
        Self { capability }
    }
}

impl std::fmt::Debug for ExternalKemPke {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExternalKemPke(..)")
    }
}

impl BasePke for ExternalKemPke {
    fn encrypt(
        &self,
        ek: &EncryptionKey,
        label: &[u8],
        plaintext: &[u8],
        rho: &[u8],
    ) -> PveResult<Vec<u8>> {
        let EncryptionKey::External(pk) = ek else {
            return Err(PveError::InvalidArgument);
        };
        let kem = CapabilityKem(self.capability.as_ref());
        HybridCiphertext::seal(&kem, pk.as_slice(), label, plaintext, &mut rho_drbg(rho)?)?
            .to_bytes()
    }

    fn decrypt(
        &self,
        dk: &DecryptionKey,
        label: &[u8],
        ciphertext: &[u8],
    ) -> PveResult<SecureBytes> {
        let DecryptionKey::External(handle) = dk else {
            return Err(PveError::InvalidArgument);
        };
        let kem = CapabilityKem(self.capability.as_ref());
        decode_hybrid(ciphertext)?.open(&kem, handle, label)
    }

    fn derive_encryption_key(&self, dk: &DecryptionKey) -> PveResult<EncryptionKey> {
        let DecryptionKey::External(handle) = dk else {
            return Err(PveError::InvalidArgument);
        };
        self.capability
            .derive_public(handle)
            .map(EncryptionKey::External)
            .map_err(|_| PveError::Backend)
    }
}
