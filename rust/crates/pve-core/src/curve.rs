// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Curves, fixed-width scalars and canonical points.
//!
//! Scalars are always carried as 32 big-endian bytes strictly below the curve
//! order; there is no variable-length scalar encoding anywhere in the crate.
//! Points are carried in their canonical compressed encoding (33-byte SEC1 for
//! the Weierstrass curves, 32 bytes for Ed25519).

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto;
use crate::types::{constant_time_eq, PveError, PveResult, SCALAR_LENGTH, SCALAR_SAMPLING_SLACK};

const P256_ORDER: [u8; SCALAR_LENGTH] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x51,
];

const SECP256K1_ORDER: [u8; SCALAR_LENGTH] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

const ED25519_ORDER: [u8; SCALAR_LENGTH] = [
    0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x14, 0xde, 0xf9, 0xde, 0xa2, 0xf7, 0x9c, 0xd6, 0x58, 0x12, 0x63, 0x1a, 0x5c, 0xf5, 0xd3, 0xed,
];

/// Elliptic curves a commitment `Q = x·G` may live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Curve {
    P256,
    Secp256k1,
    Ed25519,
}

impl Curve {
    pub const ALL: [Curve; 3] = [Curve::P256, Curve::Secp256k1, Curve::Ed25519];

    /// Wire identifier.
    pub fn id(self) -> u8 {
        match self {
            Curve::P256 => 1,
            Curve::Secp256k1 => 2,
            Curve::Ed25519 => 3,
        }
    }

    pub fn from_id(id: u8) -> PveResult<Self> {
        match id {
            1 => Ok(Curve::P256),
            2 => Ok(Curve::Secp256k1),
            3 => Ok(Curve::Ed25519),
            _ => Err(PveError::InvalidEncoding),
        }
    }

    /// Length of a canonical compressed point encoding.
    pub fn point_length(self) -> usize {
        match self {
            Curve::P256 | Curve::Secp256k1 => 33,
            Curve::Ed25519 => crypto::ED25519_BYTES,
        }
    }

    /// Number of bytes drawn when sampling a scalar from a byte stream.
    pub fn sampling_length(self) -> usize {
        SCALAR_LENGTH + SCALAR_SAMPLING_SLACK
    }

    /// Big-endian encoding of the group order.
    pub fn order_bytes(self) -> &'static [u8; SCALAR_LENGTH] {
        match self {
            Curve::P256 => &P256_ORDER,
            Curve::Secp256k1 => &SECP256K1_ORDER,
            Curve::Ed25519 => &ED25519_ORDER,
        }
    }

    /// The group generator.
    pub fn generator(self) -> PveResult<Point> {
        Point::mul_base(&Scalar::from_u64(self, 1))
    }
}

impl std::fmt::Display for Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Curve::P256 => "P-256",
            Curve::Secp256k1 => "secp256k1",
            Curve::Ed25519 => "Ed25519",
        };
        f.write_str(name)
    }
}

/// Dispatches a per-curve scalar routine to the backend module for `$curve`.
macro_rules! scalar_backend {
    ($curve:expr, $op:ident($($arg:expr),*)) => {
        match $curve {
            Curve::P256 => p256_ops::$op($($arg),*),
            Curve::Secp256k1 => secp256k1_ops::$op($($arg),*),
            Curve::Ed25519 => ed25519_ops::$op($($arg),*),
        }
    };
}

/// A scalar modulo the order of a specific curve, encoded as 32 big-endian bytes.
///
/// Arithmetic runs on the curve's own constant-time scalar field (`p256`/`k256`
/// for the Weierstrass curves, libsodium for Ed25519) and equality is
/// constant-time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Scalar {
    #[zeroize(skip)]
    curve: Curve,
    bytes: [u8; SCALAR_LENGTH],
}

impl Scalar {
    /// Parses a canonical fixed-width scalar.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `bytes` is not exactly
    /// [`SCALAR_LENGTH`] bytes or encodes a value not below the curve order.
    pub fn from_bytes(curve: Curve, bytes: &[u8]) -> PveResult<Self> {
        let bytes: [u8; SCALAR_LENGTH] =
            bytes.try_into().map_err(|_| PveError::InvalidArgument)?;
        if !ct_less_than(&bytes, curve.order_bytes()) {
            return Err(PveError::InvalidArgument);
        }
        Ok(Self { curve, bytes })
    }

    /// Reduces an arbitrary-length big-endian integer modulo the curve order.
    pub fn reduce(curve: Curve, bytes_be: &[u8]) -> Self {
        Self { curve, bytes: scalar_backend!(curve, scalar_reduce(bytes_be)) }
    }

    pub fn zero(curve: Curve) -> Self {
        Self { curve, bytes: [0u8; SCALAR_LENGTH] }
    }

    pub fn from_u64(curve: Curve, value: u64) -> Self {
        // Every supported order exceeds 2^64.
        let mut bytes = [0u8; SCALAR_LENGTH];
        bytes[SCALAR_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
        Self { curve, bytes }
    }

    /// Samples a uniformly random scalar from the system RNG.
    pub fn random(curve: Curve) -> Self {
        let mut wide = crypto::random_array::<{ SCALAR_LENGTH + SCALAR_SAMPLING_SLACK }>();
        let scalar = Self::reduce(curve, &wide);
        wide.zeroize();
        scalar
    }

    /// Samples a uniformly random non-zero scalar from the system RNG.
    pub fn random_nonzero(curve: Curve) -> Self {
        loop {
            let scalar = Self::random(curve);
            if !scalar.is_zero() {
                return scalar;
            }
        }
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn as_bytes(&self) -> &[u8; SCALAR_LENGTH] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_LENGTH] {
        self.bytes
    }

    pub fn is_zero(&self) -> bool {
        crate::types::is_all_zero(&self.bytes)
    }

    pub fn add(&self, other: &Scalar) -> PveResult<Scalar> {
        self.same_curve(other)?;
        let bytes = scalar_backend!(self.curve, scalar_add(&self.bytes, &other.bytes))?;
        Ok(Self { curve: self.curve, bytes })
    }

    pub fn sub(&self, other: &Scalar) -> PveResult<Scalar> {
        self.same_curve(other)?;
        let bytes = scalar_backend!(self.curve, scalar_sub(&self.bytes, &other.bytes))?;
        Ok(Self { curve: self.curve, bytes })
    }

    pub fn mul(&self, other: &Scalar) -> PveResult<Scalar> {
        self.same_curve(other)?;
        let bytes = scalar_backend!(self.curve, scalar_mul(&self.bytes, &other.bytes))?;
        Ok(Self { curve: self.curve, bytes })
    }

    /// Multiplicative inverse modulo the curve order.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if the scalar is zero.
    pub fn invert(&self) -> PveResult<Scalar> {
        let bytes = scalar_backend!(self.curve, scalar_invert(&self.bytes))?;
        Ok(Self { curve: self.curve, bytes })
    }

    fn same_curve(&self, other: &Scalar) -> PveResult<()> {
        if self.curve != other.curve {
            return Err(PveError::InvalidArgument);
        }
        Ok(())
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.curve == other.curve && constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for Scalar {}

/// Branch-free `a < b` over big-endian byte strings of equal width.
fn ct_less_than(a: &[u8; SCALAR_LENGTH], b: &[u8; SCALAR_LENGTH]) -> bool {
    let mut borrow = 0u16;
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        borrow = (u16::from(*x).wrapping_sub(u16::from(*y)).wrapping_sub(borrow) >> 8) & 1;
    }
    borrow == 1
}

/// Splits a big-endian integer into `N`-byte limbs, most significant first.
/// The leading limb is zero-padded when the length is not a multiple of `N`.
fn be_limbs<const N: usize>(bytes_be: &[u8]) -> impl Iterator<Item = [u8; N]> + '_ {
    let (head, rest) = bytes_be.split_at(bytes_be.len() % N);
    let mut lead = [0u8; N];
    lead[N - head.len()..].copy_from_slice(head);
    (!head.is_empty()).then_some(lead).into_iter().chain(rest.chunks_exact(N).map(|chunk| {
        let mut limb = [0u8; N];
        limb.copy_from_slice(chunk);
        limb
    }))
}

impl std::fmt::Debug for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scalar({}, [REDACTED])", self.curve)
    }
}

/// A group element in canonical compressed encoding.
///
/// Values decoded with [`Point::from_bytes`] are never the identity; the
/// identity may only appear as an intermediate result of [`Point::sub`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Point {
    curve: Curve,
    bytes: Vec<u8>,
}

macro_rules! weierstrass_ops {
    ($module:ident, $krate:ident) => {
        mod $module {
            use super::*;
            use $krate::elliptic_curve::ff::{Field, PrimeField};
            use $krate::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
            use $krate::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint};

            fn to_field(bytes: &[u8; SCALAR_LENGTH]) -> PveResult<$krate::Scalar> {
                let repr = FieldBytes::from(*bytes);
                Option::<$krate::Scalar>::from($krate::Scalar::from_repr(repr))
                    .ok_or(PveError::InvalidArgument)
            }

            fn from_field(value: $krate::Scalar) -> [u8; SCALAR_LENGTH] {
                let mut out = [0u8; SCALAR_LENGTH];
                out.copy_from_slice(&value.to_repr());
                out
            }

            pub(super) fn scalar_reduce(bytes_be: &[u8]) -> [u8; SCALAR_LENGTH] {
                let radix = $krate::Scalar::from(u64::MAX) + $krate::Scalar::ONE;
                let mut acc = $krate::Scalar::ZERO;
                for limb in be_limbs::<8>(bytes_be) {
                    acc = acc * radix + $krate::Scalar::from(u64::from_be_bytes(limb));
                }
                from_field(acc)
            }

            pub(super) fn scalar_add(
                a: &[u8; SCALAR_LENGTH],
                b: &[u8; SCALAR_LENGTH],
            ) -> PveResult<[u8; SCALAR_LENGTH]> {
                Ok(from_field(to_field(a)? + to_field(b)?))
            }

            pub(super) fn scalar_sub(
                a: &[u8; SCALAR_LENGTH],
                b: &[u8; SCALAR_LENGTH],
            ) -> PveResult<[u8; SCALAR_LENGTH]> {
                Ok(from_field(to_field(a)? - to_field(b)?))
            }

            pub(super) fn scalar_mul(
                a: &[u8; SCALAR_LENGTH],
                b: &[u8; SCALAR_LENGTH],
            ) -> PveResult<[u8; SCALAR_LENGTH]> {
                Ok(from_field(to_field(a)? * to_field(b)?))
            }

            pub(super) fn scalar_invert(a: &[u8; SCALAR_LENGTH]) -> PveResult<[u8; SCALAR_LENGTH]> {
                Option::<$krate::Scalar>::from(Field::invert(&to_field(a)?))
                    .map(from_field)
                    .ok_or(PveError::InvalidArgument)
            }

            fn decode(bytes: &[u8]) -> PveResult<ProjectivePoint> {
                let encoded =
                    EncodedPoint::from_bytes(bytes).map_err(|_| PveError::InvalidCurvePoint)?;
                if encoded.is_identity() {
                    return Ok(ProjectivePoint::IDENTITY);
                }
                Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
                    .map(ProjectivePoint::from)
                    .ok_or(PveError::InvalidCurvePoint)
            }

            fn encode(point: &ProjectivePoint) -> Vec<u8> {
                point.to_affine().to_encoded_point(true).as_bytes().to_vec()
            }

            pub(super) fn validate(bytes: &[u8]) -> PveResult<()> {
                let encoded =
                    EncodedPoint::from_bytes(bytes).map_err(|_| PveError::InvalidCurvePoint)?;
                if encoded.is_identity() {
                    return Err(PveError::InvalidCurvePoint);
                }
                let point = decode(bytes)?;
                if encode(&point) != bytes {
                    return Err(PveError::InvalidCurvePoint);
                }
                Ok(())
            }

            pub(super) fn mul_base(s: &Scalar) -> PveResult<Vec<u8>> {
                Ok(encode(&(ProjectivePoint::GENERATOR * to_field(s.as_bytes())?)))
            }

            pub(super) fn add(a: &[u8], b: &[u8]) -> PveResult<Vec<u8>> {
                Ok(encode(&(decode(a)? + decode(b)?)))
            }

            pub(super) fn sub(a: &[u8], b: &[u8]) -> PveResult<Vec<u8>> {
                Ok(encode(&(decode(a)? - decode(b)?)))
            }

            pub(super) fn is_identity(bytes: &[u8]) -> bool {
                EncodedPoint::from_bytes(bytes)
                    .map(|encoded| encoded.is_identity())
                    .unwrap_or(false)
            }
        }
    };
}

weierstrass_ops!(p256_ops, p256);
weierstrass_ops!(secp256k1_ops, k256);

mod ed25519_ops {
    use super::*;
    use crypto::ED25519_BYTES;

    const IDENTITY: [u8; ED25519_BYTES] = {
        let mut id = [0u8; ED25519_BYTES];
        id[0] = 1;
        id
    };

    fn array(bytes: &[u8]) -> PveResult<[u8; ED25519_BYTES]> {
        bytes.try_into().map_err(|_| PveError::InvalidCurvePoint)
    }

    /// Swaps between the big-endian `Scalar` layout and libsodium's little-endian one.
    fn flip(bytes: &[u8; SCALAR_LENGTH]) -> [u8; SCALAR_LENGTH] {
        let mut out = *bytes;
        out.reverse();
        out
    }

    pub(super) fn scalar_reduce(bytes_be: &[u8]) -> [u8; SCALAR_LENGTH] {
        let mut shift = [0u8; 2 * ED25519_BYTES];
        shift[ED25519_BYTES] = 1;
        let radix = crypto::ed25519_scalar_reduce(&shift);
        let mut acc = [0u8; ED25519_BYTES];
        for mut limb in be_limbs::<ED25519_BYTES>(bytes_be) {
            let mut wide = [0u8; 2 * ED25519_BYTES];
            limb.reverse();
            wide[..ED25519_BYTES].copy_from_slice(&limb);
            let reduced = crypto::ed25519_scalar_reduce(&wide);
            acc = crypto::ed25519_scalar_add(&crypto::ed25519_scalar_mul(&acc, &radix), &reduced);
            limb.zeroize();
            wide.zeroize();
        }
        let out = flip(&acc);
        acc.zeroize();
        out
    }

    pub(super) fn scalar_add(
        a: &[u8; SCALAR_LENGTH],
        b: &[u8; SCALAR_LENGTH],
    ) -> PveResult<[u8; SCALAR_LENGTH]> {
        Ok(flip(&crypto::ed25519_scalar_add(&flip(a), &flip(b))))
    }

    pub(super) fn scalar_sub(
        a: &[u8; SCALAR_LENGTH],
        b: &[u8; SCALAR_LENGTH],
    ) -> PveResult<[u8; SCALAR_LENGTH]> {
        Ok(flip(&crypto::ed25519_scalar_sub(&flip(a), &flip(b))))
    }

    pub(super) fn scalar_mul(
        a: &[u8; SCALAR_LENGTH],
        b: &[u8; SCALAR_LENGTH],
    ) -> PveResult<[u8; SCALAR_LENGTH]> {
        Ok(flip(&crypto::ed25519_scalar_mul(&flip(a), &flip(b))))
    }

    pub(super) fn scalar_invert(a: &[u8; SCALAR_LENGTH]) -> PveResult<[u8; SCALAR_LENGTH]> {
        Ok(flip(&crypto::ed25519_scalar_invert(&flip(a))?))
    }

    pub(super) fn validate(bytes: &[u8]) -> PveResult<()> {
        crypto::ed25519_validate_point(&array(bytes)?)
    }

    pub(super) fn mul_base(s: &Scalar) -> PveResult<Vec<u8>> {
        let mut le = flip(s.as_bytes());
        let result = crypto::ed25519_scalarmult_base(&le);
        le.zeroize();
        Ok(result?.to_vec())
    }

    pub(super) fn add(a: &[u8], b: &[u8]) -> PveResult<Vec<u8>> {
        Ok(crypto::ed25519_add(&array(a)?, &array(b)?)?.to_vec())
    }

    pub(super) fn sub(a: &[u8], b: &[u8]) -> PveResult<Vec<u8>> {
        if a == b {
            return Ok(IDENTITY.to_vec());
        }
        Ok(crypto::ed25519_sub(&array(a)?, &array(b)?)?.to_vec())
    }

    pub(super) fn is_identity(bytes: &[u8]) -> bool {
        bytes == IDENTITY
    }
}

impl Point {
    /// Decodes and validates a canonical compressed point.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidCurvePoint`] if the encoding is not canonical,
    /// the point is not on the curve, or it is the identity.
    pub fn from_bytes(curve: Curve, bytes: &[u8]) -> PveResult<Self> {
        if bytes.len() != curve.point_length() {
            return Err(PveError::InvalidCurvePoint);
        }
        match curve {
            Curve::P256 => p256_ops::validate(bytes)?,
            Curve::Secp256k1 => secp256k1_ops::validate(bytes)?,
            Curve::Ed25519 => ed25519_ops::validate(bytes)?,
        }
        Ok(Self { curve, bytes: bytes.to_vec() })
    }

    /// Computes `s·G`.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `s` is zero.
    pub fn mul_base(s: &Scalar) -> PveResult<Self> {
        if s.is_zero() {
            return Err(PveError::InvalidArgument);
        }
        let curve = s.curve();
        let bytes = match curve {
            Curve::P256 => p256_ops::mul_base(s)?,
            Curve::Secp256k1 => secp256k1_ops::mul_base(s)?,
            Curve::Ed25519 => ed25519_ops::mul_base(s)?,
        };
        Ok(Self { curve, bytes })
    }

    pub fn add(&self, other: &Point) -> PveResult<Self> {
        self.same_curve(other)?;
        let bytes = match self.curve {
            Curve::P256 => p256_ops::add(&self.bytes, &other.bytes)?,
            Curve::Secp256k1 => secp256k1_ops::add(&self.bytes, &other.bytes)?,
            Curve::Ed25519 => ed25519_ops::add(&self.bytes, &other.bytes)?,
        };
        Ok(Self { curve: self.curve, bytes })
    }

    pub fn sub(&self, other: &Point) -> PveResult<Self> {
        self.same_curve(other)?;
        let bytes = match self.curve {
            Curve::P256 => p256_ops::sub(&self.bytes, &other.bytes)?,
            Curve::Secp256k1 => secp256k1_ops::sub(&self.bytes, &other.bytes)?,
            Curve::Ed25519 => ed25519_ops::sub(&self.bytes, &other.bytes)?,
        };
        Ok(Self { curve: self.curve, bytes })
    }

    pub fn is_identity(&self) -> bool {
        match self.curve {
            Curve::P256 => p256_ops::is_identity(&self.bytes),
            Curve::Secp256k1 => secp256k1_ops::is_identity(&self.bytes),
            Curve::Ed25519 => ed25519_ops::is_identity(&self.bytes),
        }
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn same_curve(&self, other: &Point) -> PveResult<()> {
        if self.curve != other.curve {
            return Err(PveError::InvalidArgument);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Point({}, {})", self.curve, hex::encode(&self.bytes))
    }
}
