//! Randomized round trips over small parameters.

mod common;

use std::sync::Arc;

use common::*;
use proptest::prelude::*;
use pve_core::{Curve, DhKemP256Pke, Point, Scalar};
use pve_engine::{BatchPve, BatchPveCiphertext, Pve, PveCiphertext, PveConfig};

fn curve_strategy() -> impl Strategy<Value = Curve> {
    prop_oneof![Just(Curve::P256), Just(Curve::Secp256k1), Just(Curve::Ed25519)]
}

fn scalar_strategy(curve: Curve) -> impl Strategy<Value = Scalar> {
    any::<[u8; 40]>()
        .prop_map(move |wide| Scalar::reduce(curve, &wide))
        .prop_filter("non-zero", |s| !s.is_zero())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn single_round_trip(
        (curve, x) in curve_strategy().prop_flat_map(|c| (Just(c), scalar_strategy(c))),
        kappa in 1u16..24,
        label in prop::collection::vec(any::<u8>(), 0..24),
    ) {
        let (ek, dk) = ec_keys();
        let pve = Pve::with_config(Arc::new(DhKemP256Pke), PveConfig::with_kappa(kappa).unwrap()).unwrap();
        let q = Point::mul_base(&x).unwrap();

        let ct = pve.encrypt(&ek, &label, curve, &x).unwrap();
        let bytes = ct.to_bytes().unwrap();
        let parsed = PveCiphertext::from_bytes(&bytes).unwrap();
        prop_assert!(pve.verify(&parsed, &ek, &q, &label).is_ok());
        prop_assert_eq!(pve.decrypt(&parsed, &dk, &ek, &label, false).unwrap(), x);
    }

    #[test]
    fn batch_round_trip(
        curve in curve_strategy(),
        n in 1usize..6,
        kappa in 1u16..16,
    ) {
        let (ek, dk) = ec_keys();
        let pve = BatchPve::with_config(Arc::new(DhKemP256Pke), PveConfig::with_kappa(kappa).unwrap()).unwrap();
        let xs: Vec<Scalar> = (0..n).map(|_| Scalar::random_nonzero(curve)).collect();
        let qs: Vec<Point> = xs.iter().map(|x| Point::mul_base(x).unwrap()).collect();

        let ct = pve.encrypt(&ek, b"prop", curve, &xs).unwrap();
        let parsed = BatchPveCiphertext::from_bytes(&ct.to_bytes().unwrap()).unwrap();
        prop_assert!(pve.verify(&parsed, &ek, &qs, b"prop").is_ok());
        prop_assert_eq!(pve.decrypt(&parsed, &dk, &ek, b"prop", false).unwrap(), xs);
    }

    #[test]
    fn decoding_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = PveCiphertext::from_bytes(&data);
        let _ = BatchPveCiphertext::from_bytes(&data);
        let _ = pve_engine::QuorumPveCiphertext::from_bytes(&data);
    }
}
