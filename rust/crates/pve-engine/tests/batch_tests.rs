mod common;

use common::*;
use pve_core::types::SEED_LENGTH;
use pve_core::{Curve, Drbg, Point, PveError, Scalar};
use pve_engine::{inner_label, BatchPve, BatchPveCiphertext, RowOpening};

fn engine(backend: &Backend) -> BatchPve {
    BatchPve::with_config(backend.pke.clone(), test_config()).unwrap()
}

fn secrets(curve: Curve, n: usize) -> (Vec<Scalar>, Vec<Point>) {
    let xs: Vec<Scalar> = (0..n).map(|_| Scalar::random_nonzero(curve)).collect();
    let qs = xs.iter().map(|x| Point::mul_base(x).unwrap()).collect();
    (xs, qs)
}

#[test]
fn round_trip_for_several_batch_sizes() {
    init_tracing();
    let backend = ec_backend();
    let pve = engine(&backend);
    for n in [1usize, 4, 16, 20] {
        let (xs, qs) = secrets(Curve::P256, n);
        let ct = pve.encrypt(&backend.ek, b"batch", Curve::P256, &xs).unwrap();
        assert_eq!(ct.batch_size(), n);
        assert_eq!(ct.commitments(), qs.as_slice());
        pve.verify(&ct, &backend.ek, &qs, b"batch").unwrap();
        assert_eq!(pve.decrypt(&ct, &backend.dk, &backend.ek, b"batch", false).unwrap(), xs);
    }
}

#[test]
fn round_trip_across_curves_and_backends() {
    init_tracing();
    for backend in all_backends() {
        let pve = engine(&backend);
        for curve in Curve::ALL {
            let (xs, qs) = secrets(curve, 3);
            let ct = pve.encrypt(&backend.ek, b"matrix", curve, &xs).unwrap();
            pve.verify(&ct, &backend.ek, &qs, b"matrix")
                .unwrap_or_else(|e| panic!("{} / {curve}: {e}", backend.name));
            let got = pve.decrypt(&ct, &backend.dk, &backend.ek, b"matrix", false).unwrap();
            assert_eq!(got, xs, "{} / {curve}", backend.name);
        }
    }
}

#[test]
fn row_openings_match_challenge_and_seed_layout() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let (xs, qs) = secrets(Curve::Secp256k1, 4);
    let ct = pve.encrypt(&backend.ek, b"layout", Curve::Secp256k1, &xs).unwrap();
    let inner = inner_label(b"layout", &qs);

    for (i, row) in ct.rows().iter().enumerate() {
        let plaintext = backend.pke.decrypt(&backend.dk, &inner, &row.c).unwrap();
        match &row.opening {
            RowOpening::Revealed { x1, .. } => {
                assert!(opened_by(ct.challenge(), i));
                assert_eq!(x1.len(), 4);
                // c0 carries the 16-byte seed that expands x0.
                assert_eq!(plaintext.len(), SEED_LENGTH);
                let x0 = Drbg::new(plaintext.data()).unwrap().gen_scalars(Curve::Secp256k1, 4);
                for ((a, b), x) in x0.iter().zip(x1).zip(&xs) {
                    assert_eq!(&a.add(b).unwrap(), x);
                }
            }
            RowOpening::Hidden { .. } => {
                assert!(!opened_by(ct.challenge(), i));
                assert_eq!(plaintext.len(), 4 * 32);
            }
        }
        assert_eq!(ct.restore_from_decrypted(i, plaintext.data()).unwrap(), xs);
    }
}

#[test]
fn verify_rejects_reordered_or_partial_commitments() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let (xs, qs) = secrets(Curve::P256, 3);
    let ct = pve.encrypt(&backend.ek, b"order", Curve::P256, &xs).unwrap();

    let mut swapped = qs.clone();
    swapped.swap(0, 2);
    assert_eq!(pve.verify(&ct, &backend.ek, &swapped, b"order"), Err(PveError::CommitmentMismatch));
    assert_eq!(
        pve.verify(&ct, &backend.ek, &qs[..2], b"order"),
        Err(PveError::CommitmentMismatch)
    );
    assert_eq!(pve.verify(&ct, &backend.ek, &qs, b"other"), Err(PveError::CommitmentMismatch));
}

#[test]
fn encrypt_rejects_bad_inputs() {
    let backend = ec_backend();
    let pve = engine(&backend);
    assert_eq!(
        pve.encrypt(&backend.ek, b"l", Curve::P256, &[]).unwrap_err(),
        PveError::InvalidArgument
    );
    let mixed = [Scalar::random_nonzero(Curve::P256), Scalar::zero(Curve::P256)];
    assert_eq!(
        pve.encrypt(&backend.ek, b"l", Curve::P256, &mixed).unwrap_err(),
        PveError::InvalidArgument
    );
    let foreign = [Scalar::random_nonzero(Curve::Ed25519)];
    assert_eq!(
        pve.encrypt(&backend.ek, b"l", Curve::P256, &foreign).unwrap_err(),
        PveError::InvalidArgument
    );
}

#[test]
fn decrypt_with_wrong_key_fails() {
    let backend = rsa_backend();
    let (other_ek, other_dk) = ec_keys();
    let pve = engine(&backend);
    let (xs, _) = secrets(Curve::P256, 2);
    let ct = pve.encrypt(&backend.ek, b"wrong", Curve::P256, &xs).unwrap();
    assert!(pve.decrypt(&ct, &other_dk, &other_ek, b"wrong", false).is_err());
    assert_eq!(
        pve.decrypt(&ct, &other_dk, &backend.ek, b"wrong", false),
        Err(PveError::DecryptionFailed)
    );
}

#[test]
fn serialization_is_canonical_and_strict() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let (xs, qs) = secrets(Curve::Ed25519, 5);
    let ct = pve.encrypt(&backend.ek, b"wire", Curve::Ed25519, &xs).unwrap();
    let bytes = ct.to_bytes().unwrap();
    assert_eq!(&bytes[..2], &[1, 2]);

    let parsed = BatchPveCiphertext::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, ct);
    assert_eq!(parsed.to_bytes().unwrap(), bytes);
    pve.verify(&parsed, &backend.ek, &qs, b"wire").unwrap();

    let mut trailing = bytes.clone();
    trailing.extend_from_slice(&[0, 0]);
    assert_eq!(BatchPveCiphertext::from_bytes(&trailing), Err(PveError::InvalidEncoding));

    let mut zero_count = bytes.clone();
    zero_count[3..7].copy_from_slice(&0u32.to_be_bytes());
    assert!(BatchPveCiphertext::from_bytes(&zero_count).is_err());

    let mut as_single = bytes;
    as_single[1] = 1;
    assert_eq!(BatchPveCiphertext::from_bytes(&as_single), Err(PveError::InvalidEncoding));
}

#[test]
fn tampering_never_verifies() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let (xs, qs) = secrets(Curve::P256, 2);
    let bytes = pve.encrypt(&backend.ek, b"tamper", Curve::P256, &xs).unwrap().to_bytes().unwrap();

    for tampered in bit_flips(&bytes, 17) {
        if let Ok(ct) = BatchPveCiphertext::from_bytes(&tampered) {
            assert!(pve.verify(&ct, &backend.ek, &qs, b"tamper").is_err());
        }
    }
}

#[test]
fn skip_verify_still_checks_commitments() {
    let backend = ec_backend();
    let pve = engine(&backend);
    let (xs, _) = secrets(Curve::P256, 2);
    let ct = pve.encrypt(&backend.ek, b"skip", Curve::P256, &xs).unwrap();
    assert_eq!(pve.decrypt(&ct, &backend.dk, &backend.ek, b"skip", true).unwrap(), xs);
    assert_eq!(
        pve.decrypt(&ct, &backend.dk, &backend.ek, b"other", true),
        Err(PveError::CommitmentMismatch)
    );
}
