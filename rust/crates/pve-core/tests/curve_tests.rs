use pve_core::types::{PveError, SCALAR_LENGTH};
use pve_core::{Curve, Point, Scalar};

fn order_minus(curve: Curve, k: u8) -> [u8; SCALAR_LENGTH] {
    let mut bytes = *curve.order_bytes();
    // No order ends in a byte smaller than 0x10, so no borrow is needed.
    bytes[SCALAR_LENGTH - 1] -= k;
    bytes
}

#[test]
fn generators_match_standard_encodings() {
    assert_eq!(
        hex::encode(Curve::P256.generator().unwrap().as_bytes()),
        "036b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"
    );
    assert_eq!(
        hex::encode(Curve::Secp256k1.generator().unwrap().as_bytes()),
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
    );
    assert_eq!(
        hex::encode(Curve::Ed25519.generator().unwrap().as_bytes()),
        "5866666666666666666666666666666666666666666666666666666666666666"
    );
}

#[test]
fn scalar_from_bytes_enforces_fixed_width_and_range() {
    for curve in Curve::ALL {
        assert!(Scalar::from_bytes(curve, &order_minus(curve, 1)).is_ok());
        assert_eq!(
            Scalar::from_bytes(curve, curve.order_bytes()),
            Err(PveError::InvalidArgument)
        );
        assert_eq!(Scalar::from_bytes(curve, &[1u8; 31]), Err(PveError::InvalidArgument));
        assert_eq!(Scalar::from_bytes(curve, &[1u8; 33]), Err(PveError::InvalidArgument));
    }
}

#[test]
fn scalar_reduce_normalizes_wide_input() {
    for curve in Curve::ALL {
        let mut wide = vec![0u8; 8];
        wide.extend_from_slice(curve.order_bytes());
        assert!(Scalar::reduce(curve, &wide).is_zero());

        let short = Scalar::reduce(curve, &[0x05]);
        assert_eq!(short, Scalar::from_u64(curve, 5));
        assert_eq!(short.as_bytes()[..31], [0u8; 31]);
    }
}

#[test]
fn scalar_arithmetic_wraps_modulo_order() {
    for curve in Curve::ALL {
        let max = Scalar::from_bytes(curve, &order_minus(curve, 1)).unwrap();
        let one = Scalar::from_u64(curve, 1);
        assert!(max.add(&one).unwrap().is_zero());
        assert_eq!(Scalar::zero(curve).sub(&one).unwrap(), max);

        let a = Scalar::random_nonzero(curve);
        assert_eq!(a.mul(&a.invert().unwrap()).unwrap(), one);
    }
}

fn power_of_two(bits: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; bits / 8 + 1];
    bytes[0] = 1 << (bits % 8);
    bytes
}

#[test]
fn scalar_reduce_matches_known_residues_across_limbs() {
    let cases = [
        (
            Curve::P256,
            "00000000ffffffff00000000000000004319055258e8617b0c46353d039cdaaf",
            "fffffffe00000001431905529c0166cd22159165b6faae70f756a571fc632551",
        ),
        (
            Curve::Secp256k1,
            "000000000000000000000000000000014551231950b75fc4402da1732fc9bebf",
            "00000000000000014551231950b75fc4402da1732fc9bebf0000000000000000",
        ),
        (
            Curve::Ed25519,
            "0ffffffffffffffffffffffffffffffec6ef5bf4737dcf70d6ec31748d98951d",
            "0ffffffffffffffeb2106215d086329a93b8c838d39a5e065812631a5cf5d3ed",
        ),
    ];
    for (curve, two_256, two_320) in cases {
        assert_eq!(hex::encode(Scalar::reduce(curve, &power_of_two(256)).as_bytes()), two_256);
        assert_eq!(hex::encode(Scalar::reduce(curve, &power_of_two(320)).as_bytes()), two_320);

        let mut doubled = curve.order_bytes().to_vec();
        doubled.extend_from_slice(curve.order_bytes());
        assert!(Scalar::reduce(curve, &doubled).is_zero());
        assert!(Scalar::reduce(curve, &[]).is_zero());
    }
}

#[test]
fn scalar_inverse_matches_known_values() {
    let cases = [
        (Curve::P256, "aaaaaaaa00000000aaaaaaaaaaaaaaaa7def51c91a0fbf034d26872ca84218e1"),
        (Curve::Secp256k1, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa9d1c9e899ca306ad27fe1945de0242b81"),
        (Curve::Ed25519, "0aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaab894a6946ca51339900c4211934e8d49"),
    ];
    for (curve, inv3) in cases {
        let three = Scalar::from_u64(curve, 3);
        assert_eq!(hex::encode(three.invert().unwrap().as_bytes()), inv3);

        let max = Scalar::from_bytes(curve, &order_minus(curve, 1)).unwrap();
        assert_eq!(max.mul(&max).unwrap(), Scalar::from_u64(curve, 1));
        assert_eq!(max.invert().unwrap(), max);
    }
}

#[test]
fn scalar_equality_is_bound_to_curve_and_value() {
    let a = Scalar::from_u64(Curve::P256, 7);
    assert_eq!(a, Scalar::from_bytes(Curve::P256, a.as_bytes()).unwrap());
    assert_ne!(a, Scalar::from_u64(Curve::Secp256k1, 7));
    assert_ne!(a, Scalar::from_u64(Curve::P256, 8));
}

#[test]
fn from_u64_agrees_with_reduce() {
    for curve in Curve::ALL {
        for value in [0u64, 1, 255, 256, u64::MAX] {
            assert_eq!(Scalar::from_u64(curve, value), Scalar::reduce(curve, &value.to_be_bytes()));
        }
    }
}

#[test]
fn scalar_operations_reject_curve_mismatch() {
    let a = Scalar::from_u64(Curve::P256, 3);
    let b = Scalar::from_u64(Curve::Secp256k1, 3);
    assert_eq!(a.add(&b), Err(PveError::InvalidArgument));
    assert_eq!(a.sub(&b), Err(PveError::InvalidArgument));
    assert_eq!(a.mul(&b), Err(PveError::InvalidArgument));
}

#[test]
fn invert_zero_fails() {
    for curve in Curve::ALL {
        assert_eq!(Scalar::zero(curve).invert(), Err(PveError::InvalidArgument));
    }
}

#[test]
fn mul_base_is_additively_homomorphic() {
    for curve in Curve::ALL {
        let a = Scalar::random_nonzero(curve);
        let b = Scalar::random_nonzero(curve);
        let sum = a.add(&b).unwrap();
        let pa = Point::mul_base(&a).unwrap();
        let pb = Point::mul_base(&b).unwrap();
        assert_eq!(pa.add(&pb).unwrap(), Point::mul_base(&sum).unwrap());
        assert_eq!(Point::mul_base(&sum).unwrap().sub(&pb).unwrap(), pa);
    }
}

#[test]
fn mul_base_rejects_zero() {
    for curve in Curve::ALL {
        assert_eq!(Point::mul_base(&Scalar::zero(curve)), Err(PveError::InvalidArgument));
    }
}

#[test]
fn point_sub_of_equal_points_is_identity() {
    for curve in Curve::ALL {
        let p = Point::mul_base(&Scalar::random_nonzero(curve)).unwrap();
        let id = p.sub(&p).unwrap();
        assert!(id.is_identity());
        assert_eq!(Point::from_bytes(curve, id.as_bytes()), Err(PveError::InvalidCurvePoint));
    }
}

#[test]
fn point_from_bytes_round_trips_canonical_encoding() {
    for curve in Curve::ALL {
        let p = Point::mul_base(&Scalar::random_nonzero(curve)).unwrap();
        assert_eq!(p.as_bytes().len(), curve.point_length());
        assert_eq!(Point::from_bytes(curve, p.as_bytes()).unwrap(), p);
    }
}

#[test]
fn point_from_bytes_rejects_invalid_encodings() {
    for curve in Curve::ALL {
        let len = curve.point_length();
        assert!(Point::from_bytes(curve, &vec![0xFF; len]).is_err());
        assert!(Point::from_bytes(curve, &vec![0x02; len - 1]).is_err());
    }
    let g = Curve::P256.generator().unwrap();
    let mut flipped = g.as_bytes().to_vec();
    flipped[0] = 0x04;
    assert!(Point::from_bytes(Curve::P256, &flipped).is_err());
}

#[test]
fn point_from_bytes_rejects_other_curve_length() {
    let ed = Curve::Ed25519.generator().unwrap();
    assert!(Point::from_bytes(Curve::P256, ed.as_bytes()).is_err());
}

#[test]
fn curve_ids_round_trip() {
    for curve in Curve::ALL {
        assert_eq!(Curve::from_id(curve.id()).unwrap(), curve);
    }
    assert_eq!(Curve::from_id(0), Err(PveError::InvalidEncoding));
}

#[test]
fn scalar_debug_is_redacted() {
    let s = Scalar::from_u64(Curve::P256, 42);
    assert!(format!("{s:?}").contains("REDACTED"));
}
