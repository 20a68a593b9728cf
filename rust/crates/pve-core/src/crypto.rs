// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

use std::sync::Once;

use crate::types::{PveError, PveResult, HASH_LENGTH, MAC_LENGTH};
use zeroize::Zeroize;

/// Length of an Ed25519 group element or scalar as used by libsodium.
pub const ED25519_BYTES: usize = 32;

static SODIUM_INIT: Once = Once::new();

/// Initializes libsodium exactly once per process.
///
/// Every wrapper in this module calls it, so callers never need to.
pub fn init() {
    SODIUM_INIT.call_once(|| {
        // SAFETY: sodium_init is thread-safe and idempotent; the return code only
        // distinguishes "initialized now" from "already initialized".
        unsafe {
            libsodium_sys::sodium_init();
        }
    });
}

/// Fills `buf` with cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`PveError::InvalidArgument`] if `buf` is empty.
pub fn random_bytes(buf: &mut [u8]) -> PveResult<()> {
    if buf.is_empty() {
        return Err(PveError::InvalidArgument);
    }
    init();
    // SAFETY: buf is a valid mutable slice; length matches buf.len().
    unsafe {
        libsodium_sys::randombytes_buf(buf.as_mut_ptr() as *mut _, buf.len());
    }
    Ok(())
}

/// Returns a fresh random array of `N` bytes.
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    if N > 0 {
        init();
        // SAFETY: out is a valid N-byte array.
        unsafe {
            libsodium_sys::randombytes_buf(out.as_mut_ptr() as *mut _, N);
        }
    }
    out
}

/// Computes the SHA-256 digest of `input`.
pub fn sha256(input: &[u8]) -> [u8; HASH_LENGTH] {
    init();
    let mut out = [0u8; HASH_LENGTH];
    // SAFETY: Output is a 32-byte array, input is a valid slice. Length is cast from usize.
    unsafe {
        libsodium_sys::crypto_hash_sha256(out.as_mut_ptr(), input.as_ptr(), input.len() as u64);
    }
    out
}

/// Incremental SHA-256 over libsodium's streaming API.
pub struct Sha256Stream {
    state: libsodium_sys::crypto_hash_sha256_state,
}

impl Sha256Stream {
    pub fn new() -> Self {
        init();
        let mut state = std::mem::MaybeUninit::<libsodium_sys::crypto_hash_sha256_state>::uninit();
        // SAFETY: _init fully initializes the state before it is read.
        let state = unsafe {
            libsodium_sys::crypto_hash_sha256_init(state.as_mut_ptr());
            state.assume_init()
        };
        Self { state }
    }

    pub fn update(&mut self, part: &[u8]) {
        // SAFETY: state was initialized in new(); part is a valid slice.
        unsafe {
            libsodium_sys::crypto_hash_sha256_update(
                &mut self.state,
                part.as_ptr(),
                part.len() as u64,
            );
        }
    }

    pub fn finalize(mut self) -> [u8; HASH_LENGTH] {
        let mut out = [0u8; HASH_LENGTH];
        // SAFETY: state was initialized in new(); out is a 32-byte array.
        unsafe {
            libsodium_sys::crypto_hash_sha256_final(&mut self.state, out.as_mut_ptr());
        }
        out
    }
}

impl Default for Sha256Stream {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the SHA-256 digest of the concatenation of all `parts`.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; HASH_LENGTH] {
    let mut stream = Sha256Stream::new();
    for part in parts {
        stream.update(part);
    }
    stream.finalize()
}

/// Computes HMAC-SHA-256 over `message` using the given `key`.
///
/// An empty key is accepted and behaves as the all-zero key, as HMAC pads
/// short keys with zeros.
///
/// # Errors
///
/// Returns [`PveError::InvalidArgument`] if the HMAC init, update, or final step fails.
pub fn hmac_sha256(key: &[u8], message: &[u8], mac_out: &mut [u8; MAC_LENGTH]) -> PveResult<()> {
    init();
    let zero_key = [0u8; MAC_LENGTH];
    let key = if key.is_empty() { &zero_key[..] } else { key };
    // SAFETY: State is initialized by _init before use. Subsequent calls use the
    // initialized state pointer. Return codes are checked. State is zeroized after use
    // to scrub the HMAC key material (ipad/opad) from the stack.
    unsafe {
        let mut state =
            std::mem::MaybeUninit::<libsodium_sys::crypto_auth_hmacsha256_state>::uninit();
        let state_ptr = state.as_mut_ptr();
        let state_len = std::mem::size_of::<libsodium_sys::crypto_auth_hmacsha256_state>();
        if libsodium_sys::crypto_auth_hmacsha256_init(state_ptr, key.as_ptr(), key.len()) != 0 {
            libsodium_sys::sodium_memzero(state_ptr as *mut _, state_len);
            return Err(PveError::InvalidArgument);
        }
        if libsodium_sys::crypto_auth_hmacsha256_update(
            state_ptr,
            message.as_ptr(),
            message.len() as u64,
        ) != 0
        {
            libsodium_sys::sodium_memzero(state_ptr as *mut _, state_len);
            return Err(PveError::InvalidArgument);
        }
        if libsodium_sys::crypto_auth_hmacsha256_final(state_ptr, mac_out.as_mut_ptr()) != 0 {
            libsodium_sys::sodium_memzero(state_ptr as *mut _, state_len);
            return Err(PveError::InvalidArgument);
        }
        libsodium_sys::sodium_memzero(state_ptr as *mut _, state_len);
    }
    Ok(())
}

/// Performs the HKDF-Extract step: `PRK = HMAC-SHA-256(salt, IKM)`.
///
/// An empty `salt` is treated as `HashLen` zero bytes (RFC 5869 §2.2).
///
/// # Errors
///
/// Returns [`PveError::InvalidArgument`] if `ikm` is empty.
pub fn key_derivation_extract(salt: &[u8], ikm: &[u8]) -> PveResult<[u8; HASH_LENGTH]> {
    if ikm.is_empty() {
        return Err(PveError::InvalidArgument);
    }
    let mut prk = [0u8; HASH_LENGTH];
    hmac_sha256(salt, ikm, &mut prk)?;
    Ok(prk)
}

/// Performs the HKDF-Expand step, producing output keying material of arbitrary length.
///
/// Uses HMAC-SHA-256 as the underlying PRF. The output length must not
/// exceed `255 * 32` bytes.
///
/// # Errors
///
/// Returns [`PveError::InvalidArgument`] if `prk` or `okm` is empty, or if the
/// requested output length exceeds the HKDF-Expand maximum.
pub fn key_derivation_expand(prk: &[u8], info: &[u8], okm: &mut [u8]) -> PveResult<()> {
    if prk.is_empty() || okm.is_empty() {
        return Err(PveError::InvalidArgument);
    }

    const HASH_LEN: usize = MAC_LENGTH;
    const MAX_BLOCKS: usize = 255;

    let n = okm.len().div_ceil(HASH_LEN);
    if n > MAX_BLOCKS {
        return Err(PveError::InvalidArgument);
    }

    let mut t_prev = [0u8; HASH_LEN];
    let mut t_current = [0u8; HASH_LEN];
    let mut input = Vec::with_capacity(HASH_LEN + info.len() + 1);

    let result = (|| {
        for i in 1..=n {
            input.clear();
            if i > 1 {
                input.extend_from_slice(&t_prev);
            }
            input.extend_from_slice(info);
            input.push(i as u8);

            hmac_sha256(prk, &input, &mut t_current)?;

            let copy_len = std::cmp::min(HASH_LEN, okm.len() - (i - 1) * HASH_LEN);
            okm[(i - 1) * HASH_LEN..(i - 1) * HASH_LEN + copy_len]
                .copy_from_slice(&t_current[..copy_len]);

            std::mem::swap(&mut t_prev, &mut t_current);
        }
        Ok(())
    })();

    t_prev.zeroize();
    t_current.zeroize();
    input.zeroize();
    result
}

/// Extract-then-expand in one call, returning exactly `N` bytes.
pub fn hkdf_sha256<const N: usize>(salt: &[u8], ikm: &[u8], info: &[u8]) -> PveResult<[u8; N]> {
    let mut prk = key_derivation_extract(salt, ikm)?;
    let mut okm = [0u8; N];
    let result = key_derivation_expand(&prk, info, &mut okm);
    prk.zeroize();
    result.map(|()| okm)
}

/// Computes the Ed25519 base-point multiplication `result = scalar * G` without clamping.
///
/// `scalar` is little-endian and must be reduced modulo the group order.
///
/// # Errors
///
/// Returns [`PveError::InvalidArgument`] if the result is the identity (scalar zero).
pub fn ed25519_scalarmult_base(scalar_le: &[u8; ED25519_BYTES]) -> PveResult<[u8; ED25519_BYTES]> {
    init();
    let mut result = [0u8; ED25519_BYTES];
    // SAFETY: Both arrays are 32 bytes as required. Return code is checked.
    unsafe {
        if libsodium_sys::crypto_scalarmult_ed25519_base_noclamp(
            result.as_mut_ptr(),
            scalar_le.as_ptr(),
        ) != 0
        {
            return Err(PveError::InvalidArgument);
        }
    }
    Ok(result)
}

/// Computes the Ed25519 point difference `p - q`.
///
/// # Errors
///
/// Returns [`PveError::InvalidCurvePoint`] if either input is not a valid encoding.
pub fn ed25519_sub(
    p: &[u8; ED25519_BYTES],
    q: &[u8; ED25519_BYTES],
) -> PveResult<[u8; ED25519_BYTES]> {
    init();
    let mut result = [0u8; ED25519_BYTES];
    // SAFETY: All arrays are 32 bytes. Return code is checked.
    unsafe {
        if libsodium_sys::crypto_core_ed25519_sub(result.as_mut_ptr(), p.as_ptr(), q.as_ptr()) != 0
        {
            return Err(PveError::InvalidCurvePoint);
        }
    }
    Ok(result)
}

/// Computes the Ed25519 point sum `p + q`.
///
/// # Errors
///
/// Returns [`PveError::InvalidCurvePoint`] if either input is not a valid encoding.
pub fn ed25519_add(
    p: &[u8; ED25519_BYTES],
    q: &[u8; ED25519_BYTES],
) -> PveResult<[u8; ED25519_BYTES]> {
    init();
    let mut result = [0u8; ED25519_BYTES];
    // SAFETY: All arrays are 32 bytes. Return code is checked.
    unsafe {
        if libsodium_sys::crypto_core_ed25519_add(result.as_mut_ptr(), p.as_ptr(), q.as_ptr()) != 0
        {
            return Err(PveError::InvalidCurvePoint);
        }
    }
    Ok(result)
}

/// Validates that `point` is a canonical Ed25519 encoding in the prime-order
/// subgroup and not of small order (which excludes the identity).
///
/// # Errors
///
/// Returns [`PveError::InvalidCurvePoint`] if the check fails.
pub fn ed25519_validate_point(point: &[u8; ED25519_BYTES]) -> PveResult<()> {
    init();
    // SAFETY: Pointer comes from a 32-byte array.
    unsafe {
        if libsodium_sys::crypto_core_ed25519_is_valid_point(point.as_ptr()) != 1 {
            return Err(PveError::InvalidCurvePoint);
        }
    }
    Ok(())
}

/// Little-endian Ed25519 scalar sum `x + y mod L`.
pub fn ed25519_scalar_add(
    x: &[u8; ED25519_BYTES],
    y: &[u8; ED25519_BYTES],
) -> [u8; ED25519_BYTES] {
    init();
    let mut z = [0u8; ED25519_BYTES];
    // SAFETY: All arrays are 32 bytes.
    unsafe {
        libsodium_sys::crypto_core_ed25519_scalar_add(z.as_mut_ptr(), x.as_ptr(), y.as_ptr());
    }
    z
}

/// Little-endian Ed25519 scalar difference `x - y mod L`.
pub fn ed25519_scalar_sub(
    x: &[u8; ED25519_BYTES],
    y: &[u8; ED25519_BYTES],
) -> [u8; ED25519_BYTES] {
    init();
    let mut z = [0u8; ED25519_BYTES];
    // SAFETY: All arrays are 32 bytes.
    unsafe {
        libsodium_sys::crypto_core_ed25519_scalar_sub(z.as_mut_ptr(), x.as_ptr(), y.as_ptr());
    }
    z
}

/// Little-endian Ed25519 scalar product `x * y mod L`.
pub fn ed25519_scalar_mul(
    x: &[u8; ED25519_BYTES],
    y: &[u8; ED25519_BYTES],
) -> [u8; ED25519_BYTES] {
    init();
    let mut z = [0u8; ED25519_BYTES];
    // SAFETY: All arrays are 32 bytes.
    unsafe {
        libsodium_sys::crypto_core_ed25519_scalar_mul(z.as_mut_ptr(), x.as_ptr(), y.as_ptr());
    }
    z
}

/// Little-endian Ed25519 scalar inverse modulo `L`.
///
/// # Errors
///
/// Returns [`PveError::InvalidArgument`] if `s` is zero.
pub fn ed25519_scalar_invert(s: &[u8; ED25519_BYTES]) -> PveResult<[u8; ED25519_BYTES]> {
    init();
    let mut recip = [0u8; ED25519_BYTES];
    // SAFETY: Both arrays are 32 bytes. Return code is checked.
    unsafe {
        if libsodium_sys::crypto_core_ed25519_scalar_invert(recip.as_mut_ptr(), s.as_ptr()) != 0 {
            return Err(PveError::InvalidArgument);
        }
    }
    Ok(recip)
}

/// Reduces a 64-byte little-endian value modulo `L`.
pub fn ed25519_scalar_reduce(wide: &[u8; 2 * ED25519_BYTES]) -> [u8; ED25519_BYTES] {
    init();
    let mut r = [0u8; ED25519_BYTES];
    // SAFETY: Output is 32 bytes and input is the 64 bytes libsodium reads.
    unsafe {
        libsodium_sys::crypto_core_ed25519_scalar_reduce(r.as_mut_ptr(), wide.as_ptr());
    }
    r
}
