// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Seeded deterministic random bit generator.
//!
//! Every value a verifier must be able to re-derive (row scalars, encryption
//! randomness, AEAD nonces, KEM ephemerals) is drawn from a [`Drbg`] keyed by a
//! short seed. The stream key is `HKDF-SHA-256(salt = "", ikm = seed, info =
//! DRBG_INFO)` and the stream itself is ChaCha20.

use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};
use zeroize::Zeroize;

use crate::crypto;
use crate::curve::{Curve, Scalar};
use crate::types::{labels, PveError, PveResult, SecureBytes};

/// ChaCha20 stream keyed from a seed. Two instances built from the same seed
/// yield identical output.
pub struct Drbg {
    rng: ChaCha20Rng,
}

impl Drbg {
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `seed` is empty.
    pub fn new(seed: &[u8]) -> PveResult<Self> {
        if seed.is_empty() {
            return Err(PveError::InvalidArgument);
        }
        let mut key = crypto::hkdf_sha256::<32>(&[], seed, labels::DRBG_INFO)?;
        let rng = ChaCha20Rng::from_seed(key);
        key.zeroize();
        Ok(Self { rng })
    }

    /// Next `len` bytes of the stream, in a zeroizing buffer.
    pub fn gen(&mut self, len: usize) -> SecureBytes {
        let mut out = SecureBytes::new(len);
        self.rng.fill_bytes(&mut out);
        out
    }

    /// Next `N` bytes of the stream.
    pub fn gen_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        self.rng.fill_bytes(&mut out);
        out
    }

    /// Draws `q-bytes + 8` bytes and reduces them modulo the curve order.
    pub fn gen_scalar(&mut self, curve: Curve) -> Scalar {
        let wide = self.gen(curve.sampling_length());
        Scalar::reduce(curve, &wide)
    }

    /// `n` consecutive [`Drbg::gen_scalar`] draws.
    pub fn gen_scalars(&mut self, curve: Curve, n: usize) -> Vec<Scalar> {
        (0..n).map(|_| self.gen_scalar(curve)).collect()
    }
}

impl RngCore for Drbg {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

impl CryptoRng for Drbg {}

impl std::fmt::Debug for Drbg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Drbg([REDACTED])")
    }
}
