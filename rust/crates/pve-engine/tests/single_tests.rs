mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use pve_core::{Curve, DhKemP256Pke, Point, PveError, Scalar};
use pve_engine::{inner_label, Pve, PveCiphertext, PveConfig};

fn engine(backend: &Backend) -> Pve {
    Pve::with_config(backend.pke.clone(), test_config()).unwrap()
}

#[test]
fn round_trip_across_curves_and_backends() {
    init_tracing();
    for backend in all_backends() {
        let pve = engine(&backend);
        for curve in Curve::ALL {
            let x = Scalar::random_nonzero(curve);
            let q = Point::mul_base(&x).unwrap();
            let ct = pve.encrypt(&backend.ek, b"round-trip", curve, &x).unwrap();

            assert_eq!(ct.commitment(), &q);
            assert_eq!(ct.kappa(), TEST_KAPPA);
            assert_eq!(ct.rows().len(), usize::from(TEST_KAPPA));
            pve.verify(&ct, &backend.ek, &q, b"round-trip")
                .unwrap_or_else(|e| panic!("{} / {curve}: {e}", backend.name));
            let got = pve.decrypt(&ct, &backend.dk, &backend.ek, b"round-trip", false).unwrap();
            assert_eq!(got, x, "{} / {curve}", backend.name);
        }
    }
}

#[test]
fn backup_labels_are_not_interchangeable() {
    init_tracing();
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let q = Point::mul_base(&x).unwrap();
    let ct = pve.encrypt(&backend.ek, b"backup-1", Curve::P256, &x).unwrap();

    assert!(pve.verify(&ct, &backend.ek, &q, b"backup-1").is_ok());
    assert_eq!(
        pve.verify(&ct, &backend.ek, &q, b"backup-2"),
        Err(PveError::CommitmentMismatch)
    );
    assert_eq!(
        pve.decrypt(&ct, &backend.dk, &backend.ek, b"backup-2", false),
        Err(PveError::CommitmentMismatch)
    );
    assert_eq!(pve.decrypt(&ct, &backend.dk, &backend.ek, b"backup-1", false).unwrap(), x);
}

#[test]
fn verify_rejects_other_commitment() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::Secp256k1);
    let ct = pve.encrypt(&backend.ek, b"label", Curve::Secp256k1, &x).unwrap();
    let other = Point::mul_base(&Scalar::random_nonzero(Curve::Secp256k1)).unwrap();
    assert_eq!(
        pve.verify(&ct, &backend.ek, &other, b"label"),
        Err(PveError::CommitmentMismatch)
    );
}

#[test]
fn verify_under_wrong_key_fails() {
    let backend = ec_backend();
    let (other_ek, _) = ec_keys();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let q = Point::mul_base(&x).unwrap();
    let ct = pve.encrypt(&backend.ek, b"label", Curve::P256, &x).unwrap();
    assert_eq!(pve.verify(&ct, &other_ek, &q, b"label"), Err(PveError::ProofInvalid));
}

#[test]
fn decrypt_with_wrong_key_fails() {
    let backend = ec_backend();
    let (_, other_dk) = ec_keys();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::Ed25519);
    let ct = pve.encrypt(&backend.ek, b"label", Curve::Ed25519, &x).unwrap();
    assert_eq!(
        pve.decrypt(&ct, &other_dk, &backend.ek, b"label", false),
        Err(PveError::DecryptionFailed)
    );
}

#[test]
fn encrypt_rejects_zero_and_foreign_scalars() {
    let backend = ec_backend();
    let pve = engine(&backend);
    assert_eq!(
        pve.encrypt(&backend.ek, b"l", Curve::P256, &Scalar::zero(Curve::P256)).unwrap_err(),
        PveError::InvalidArgument
    );
    assert_eq!(
        pve.encrypt(&backend.ek, b"l", Curve::P256, &Scalar::from_u64(Curve::Ed25519, 7))
            .unwrap_err(),
        PveError::InvalidArgument
    );
}

#[test]
fn rows_follow_the_challenge() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let ct = pve.encrypt(&backend.ek, b"shape", Curve::P256, &x).unwrap();

    assert_eq!(ct.challenge().len(), 3);
    assert_eq!(ct.challenge()[2] >> 4, 0);
    for (i, row) in ct.rows().iter().enumerate() {
        assert_eq!(row.x1.is_some(), opened_by(ct.challenge(), i), "row {i}");
    }
}

#[test]
fn row_shape_tracks_challenge_for_partial_final_byte() {
    let backend = ec_backend();
    for kappa in [1u16, 7, 9, 15] {
        let config = PveConfig::with_kappa(kappa).unwrap();
        let pve = Pve::with_config(backend.pke.clone(), config).unwrap();
        let x = Scalar::random_nonzero(Curve::Ed25519);
        let q = Point::mul_base(&x).unwrap();
        let ct = pve.encrypt(&backend.ek, b"odd", Curve::Ed25519, &x).unwrap();

        assert_eq!(ct.rows().len(), usize::from(kappa));
        assert_eq!(ct.challenge().len(), config.challenge_length());
        for (i, row) in ct.rows().iter().enumerate() {
            assert_eq!(row.x1.is_some(), opened_by(ct.challenge(), i), "kappa {kappa}, row {i}");
        }
        let parsed = PveCiphertext::from_bytes(&ct.to_bytes().unwrap()).unwrap();
        pve.verify(&parsed, &backend.ek, &q, b"odd").unwrap();
    }
}

#[test]
fn any_opened_row_restores_the_value() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let ct = pve.encrypt(&backend.ek, b"rows", Curve::P256, &x).unwrap();
    let inner = inner_label(b"rows", std::slice::from_ref(ct.commitment()));

    for (i, row) in ct.rows().iter().enumerate() {
        let plaintext = backend.pke.decrypt(&backend.dk, &inner, &row.c).unwrap();
        assert_eq!(ct.restore_from_decrypted(i, plaintext.data()).unwrap(), x);
    }
    assert_eq!(ct.restore_from_decrypted(0, &[0u8; 31]), Err(PveError::ReconstructionFailed));
    assert_eq!(
        ct.restore_from_decrypted(ct.rows().len(), &[0u8; 32]),
        Err(PveError::InvalidArgument)
    );
}

#[test]
fn decrypt_falls_through_corrupted_rows() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::Secp256k1);
    let ct = pve.encrypt(&backend.ek, b"retry", Curve::Secp256k1, &x).unwrap();

    let mut bytes = ct.to_bytes().unwrap();
    // version, kind, curve, bytes(Q), bytes(label), kappa, 3 challenge bytes
    let header = 2 + 1 + (4 + 33) + (4 + b"retry".len()) + 2 + 3;
    let row = &ct.rows()[0];
    let first_row_end =
        header + 1 + if row.x1.is_some() { 32 } else { 0 } + 16 + 4 + row.c.len();
    // Last byte of the first row's ciphertext sits inside its AEAD tag.
    bytes[first_row_end - 1] ^= 0xFF;
    let tampered = PveCiphertext::from_bytes(&bytes).unwrap();

    assert_eq!(
        pve.decrypt(&tampered, &backend.dk, &backend.ek, b"retry", false),
        Err(PveError::ProofInvalid)
    );
    assert_eq!(pve.decrypt(&tampered, &backend.dk, &backend.ek, b"retry", true).unwrap(), x);
}

#[test]
fn serialization_is_canonical() {
    let backend = unified_backend();
    let pve = engine(&backend);
    for curve in Curve::ALL {
        let x = Scalar::random_nonzero(curve);
        let ct = pve.encrypt(&backend.ek, b"wire", curve, &x).unwrap();
        let bytes = ct.to_bytes().unwrap();
        assert_eq!(&bytes[..2], &[1, 1]);
        let parsed = PveCiphertext::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, ct);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }
}

#[test]
fn decoding_rejects_malformed_bundles() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let bytes = pve.encrypt(&backend.ek, b"wire", Curve::P256, &x).unwrap().to_bytes().unwrap();

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_eq!(PveCiphertext::from_bytes(&trailing), Err(PveError::InvalidEncoding));
    assert!(PveCiphertext::from_bytes(&bytes[..bytes.len() - 1]).is_err());

    let mut wrong_kind = bytes.clone();
    wrong_kind[1] = 2;
    assert_eq!(PveCiphertext::from_bytes(&wrong_kind), Err(PveError::InvalidEncoding));

    let mut wrong_version = bytes.clone();
    wrong_version[0] = 9;
    assert_eq!(PveCiphertext::from_bytes(&wrong_version), Err(PveError::InvalidEncoding));

    let mut unknown_curve = bytes;
    unknown_curve[2] = 0;
    assert_eq!(PveCiphertext::from_bytes(&unknown_curve), Err(PveError::InvalidEncoding));
}

#[test]
fn tampering_never_verifies() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let q = Point::mul_base(&x).unwrap();
    let bytes = pve.encrypt(&backend.ek, b"tamper", Curve::P256, &x).unwrap().to_bytes().unwrap();

    for tampered in bit_flips(&bytes, 13) {
        if let Ok(ct) = PveCiphertext::from_bytes(&tampered) {
            assert!(pve.verify(&ct, &backend.ek, &q, b"tamper").is_err());
        }
    }
}

#[test]
fn verifier_demands_configured_soundness() {
    let backend = ec_backend();
    let weak = Pve::with_config(backend.pke.clone(), PveConfig::with_kappa(8).unwrap()).unwrap();
    let strict = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let q = Point::mul_base(&x).unwrap();
    let ct = weak.encrypt(&backend.ek, b"kappa", Curve::P256, &x).unwrap();

    assert!(weak.verify(&ct, &backend.ek, &q, b"kappa").is_ok());
    assert_eq!(strict.verify(&ct, &backend.ek, &q, b"kappa"), Err(PveError::ProofInvalid));
}

#[test]
fn default_engine_uses_production_kappa() {
    let pve = Pve::new(Arc::new(DhKemP256Pke));
    assert_eq!(pve.config().kappa, pve_engine::DEFAULT_KAPPA);
}

#[test]
fn one_ciphertext_is_shared_across_threads() {
    init_tracing();
    let backend = ec_backend();
    let pve = engine(&backend);
    let x = Scalar::random_nonzero(Curve::P256);
    let q = Point::mul_base(&x).unwrap();
    let ct = Arc::new(pve.encrypt(&backend.ek, b"threads", Curve::P256, &x).unwrap());

    thread::scope(|s| {
        for _ in 0..4 {
            let (pve, ct) = (pve.clone(), Arc::clone(&ct));
            let (backend, q, x) = (&backend, &q, &x);
            s.spawn(move || {
                pve.verify(&ct, &backend.ek, q, b"threads").unwrap();
                let got = pve.decrypt(&ct, &backend.dk, &backend.ek, b"threads", false).unwrap();
                assert_eq!(&got, x);
            });
        }
    });
}
