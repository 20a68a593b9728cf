#![allow(dead_code)]

use std::sync::{Arc, Once, OnceLock};

use pve_core::kem;
use pve_core::pq_kem::MlKem768Capability;
use pve_core::{
    BasePke, DecryptionKey, DhKemP256Pke, EncryptionKey, ExternalKemPke, PkeHandle, RsaOaepPke,
    UnifiedPke,
};
use pve_engine::PveConfig;
use tracing_subscriber::EnvFilter;

/// Small enough to keep RSA-backed tests fast, large enough to exercise
/// a partial final challenge byte.
pub const TEST_KAPPA: u16 = 20;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config() -> PveConfig {
    PveConfig::with_kappa(TEST_KAPPA).unwrap()
}

pub struct Backend {
    pub name: &'static str,
    pub pke: PkeHandle,
    pub ek: EncryptionKey,
    pub dk: DecryptionKey,
}

pub fn rsa_keys() -> &'static (EncryptionKey, DecryptionKey) {
    static KEYS: OnceLock<(EncryptionKey, DecryptionKey)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let dk = kem::generate_rsa_key().unwrap();
        let ek = RsaOaepPke.derive_encryption_key(&dk).unwrap();
        (ek, dk)
    })
}

pub fn ec_keys() -> (EncryptionKey, DecryptionKey) {
    let dk = kem::generate_ec_key();
    let ek = DhKemP256Pke.derive_encryption_key(&dk).unwrap();
    (ek, dk)
}

pub fn rsa_backend() -> Backend {
    let (ek, dk) = rsa_keys().clone();
    Backend { name: "rsa-oaep", pke: Arc::new(RsaOaepPke), ek, dk }
}

pub fn ec_backend() -> Backend {
    let (ek, dk) = ec_keys();
    Backend { name: "dhkem-p256", pke: Arc::new(DhKemP256Pke), ek, dk }
}

pub fn unified_backend() -> Backend {
    let (ek, dk) = ec_keys();
    Backend { name: "unified", pke: Arc::new(UnifiedPke), ek, dk }
}

pub fn ml_kem_backend() -> Backend {
    let capability = Arc::new(MlKem768Capability);
    let (ek, dk) = capability.generate_keypair();
    Backend { name: "ml-kem-768", pke: Arc::new(ExternalKemPke::new(capability)), ek, dk }
}

pub fn all_backends() -> Vec<Backend> {
    vec![rsa_backend(), ec_backend(), unified_backend(), ml_kem_backend()]
}

/// Flips one bit at every `step`-th byte past the header, returning each variant.
pub fn bit_flips(bytes: &[u8], step: usize) -> impl Iterator<Item = Vec<u8>> + '_ {
    (2..bytes.len()).step_by(step).map(move |i| {
        let mut tampered = bytes.to_vec();
        tampered[i] ^= 0x01;
        tampered
    })
}

/// Row `row` is opened when its bit is set; bits are read LSB-first.
pub fn opened_by(challenge: &[u8], row: usize) -> bool {
    (challenge[row / 8] >> (row % 8)) & 1 == 1
}
