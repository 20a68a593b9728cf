// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Core primitives for Ecliptix publicly verifiable encryption.
//!
//! Provides everything the cut-and-choose engines build on: fixed-width curve
//! scalars, a seeded DRBG whose output verifiers can re-derive, a KEM→AEAD
//! hybrid ciphertext, and a uniform label-bound public-key encryption adapter
//! over RSA-OAEP, P-256 DH-KEM, a tagged unified dispatcher and caller-supplied
//! KEMs.
//!
//! # Crate layout
//!
//! * [`types`] -- shared constants, error types, and secure byte containers.
//! * [`crypto`] -- libsodium wrappers (randomness, SHA-256, HMAC, HKDF, Ed25519).
//! * [`curve`] -- curves, fixed-width scalars and canonical points.
//! * [`drbg`] -- seeded deterministic random generator.
//! * [`hybrid`] -- KEM→AEAD hybrid ciphertext.
//! * [`kem`] -- KEM backends, key types and the base PKE adapter.
//! * [`pq_kem`] -- ML-KEM-768 as an external KEM capability.
//! * [`access`] -- access structures and secret sharing over them.
//! * [`codec`] -- length-prefixed wire codec.

/// Access structures and the secret-sharing capability.
pub mod access;
/// Length-prefixed wire codec.
pub mod codec;
/// Low-level cryptographic primitives wrapping libsodium.
pub mod crypto;
/// Curves, scalars and points.
pub mod curve;
/// Seeded deterministic random bit generator.
pub mod drbg;
/// KEM→AEAD hybrid ciphertext.
pub mod hybrid;
/// KEM backends and the base PKE adapter.
pub mod kem;
/// ML-KEM-768 external KEM capability.
pub mod pq_kem;
/// Shared constants, error types, and secure byte containers.
pub mod types;

pub use access::{AccessNode, AccessStructure, SecretSharing, ShamirTreeSharing};
pub use curve::{Curve, Point, Scalar};
pub use drbg::Drbg;
pub use kem::{
    BasePke, DecryptionKey, DhKemP256Pke, EncryptionKey, ExternalKemPke, ExternalKeyHandle,
    KemCapability, PkeHandle, RsaOaepPke, UnifiedPke,
};
pub use types::{PveError, PveResult, SecureBytes};
