// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Single-scalar cut-and-choose verifiable encryption.
//!
//! Each of the `kappa` rows splits `x` into `x0 + x1`, encrypts both halves
//! and commits to `X0 = x0·G`, `X1 = Q - X0`. The Fiat-Shamir challenge then
//! selects which half a row keeps in recoverable form:
//!
//! * bit 1 keeps `(r1, c0, x1)`: the verifier re-encrypts `x1` and reads `c0`.
//! * bit 0 keeps `(r0, c1)`: the verifier re-derives `x0` from `r0` and reads `c1`.

use std::slice;

use pve_core::codec::{kind, Reader, Writer};
use pve_core::crypto;
use pve_core::types::{RHO_LENGTH, SCALAR_LENGTH, SEED_LENGTH};
use pve_core::{
    Curve, DecryptionKey, Drbg, EncryptionKey, PkeHandle, Point, PveError, PveResult, Scalar,
    SecureBytes,
};
use tracing::{debug, trace};

use crate::config::PveConfig;
use crate::transcript::{
    challenge_bit, inner_label, read_challenge, write_challenge, ChallengeTranscript,
};

/// One retained row.
#[derive(Clone, PartialEq, Eq)]
pub struct SingleRow {
    /// `x1` when the challenge bit is 1, absent otherwise.
    pub x1: Option<Scalar>,
    /// `r1` when the bit is 1, `r0` otherwise.
    pub seed: [u8; SEED_LENGTH],
    /// `c0` when the bit is 1, `c1` otherwise.
    pub c: Vec<u8>,
}

/// A publicly verifiable encryption of one scalar.
#[derive(Clone, PartialEq, Eq)]
pub struct PveCiphertext {
    q: Point,
    label: Vec<u8>,
    kappa: u16,
    challenge: Vec<u8>,
    rows: Vec<SingleRow>,
}

fn expand_hidden_seed(curve: Curve, r0: &[u8]) -> PveResult<(Scalar, SecureBytes)> {
    let mut drbg = Drbg::new(r0)?;
    let x0 = drbg.gen_scalar(curve);
    let rho0 = drbg.gen(RHO_LENGTH);
    Ok((x0, rho0))
}

fn expand_revealed_seed(r1: &[u8]) -> PveResult<SecureBytes> {
    Ok(Drbg::new(r1)?.gen(RHO_LENGTH))
}

fn absorb_row(t: &mut ChallengeTranscript, c0: &[u8], c1: &[u8], x0: &Point, x1: &Point) {
    t.absorb(c0);
    t.absorb(c1);
    t.absorb(x0.as_bytes());
    t.absorb(x1.as_bytes());
}

struct PendingRow {
    r0: [u8; SEED_LENGTH],
    r1: [u8; SEED_LENGTH],
    x1: Scalar,
    c0: Vec<u8>,
    c1: Vec<u8>,
}

/// Single-scalar engine bound to one base-PKE backend.
#[derive(Clone)]
pub struct Pve {
    pke: PkeHandle,
    config: PveConfig,
}

impl Pve {
    pub fn new(pke: PkeHandle) -> Self {
        Self { pke, config: PveConfig::default() }
    }

    pub fn with_config(pke: PkeHandle, config: PveConfig) -> PveResult<Self> {
        config.validate()?;
        Ok(Self { pke, config })
    }

    pub fn config(&self) -> &PveConfig {
        &self.config
    }

    /// Encrypts `x` under `ek`, committing to `Q = x·G`.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `x` is zero or belongs to a
    /// different curve; propagates backend failures.
    pub fn encrypt(
        &self,
        ek: &EncryptionKey,
        label: &[u8],
        curve: Curve,
        x: &Scalar,
    ) -> PveResult<PveCiphertext> {
        if x.curve() != curve {
            return Err(PveError::InvalidArgument);
        }
        let q = Point::mul_base(x)?;
        let kappa = self.config.kappa;
        debug!(%curve, kappa, "pve encrypt");

        let inner = inner_label(label, slice::from_ref(&q));
        let mut transcript = ChallengeTranscript::new(kappa, curve, label, slice::from_ref(&q));
        let mut pending = Vec::with_capacity(usize::from(kappa));

        for _ in 0..kappa {
            // Both halves must be non-zero so that X0 and X1 are honest points.
            let (r0, x0, rho0, x1) = loop {
                let r0 = crypto::random_array::<SEED_LENGTH>();
                let (x0, rho0) = expand_hidden_seed(curve, &r0)?;
                let x1 = x.sub(&x0)?;
                if !x0.is_zero() && !x1.is_zero() {
                    break (r0, x0, rho0, x1);
                }
            };
            let r1 = crypto::random_array::<SEED_LENGTH>();
            let rho1 = expand_revealed_seed(&r1)?;

            let c0 = self.pke.encrypt(ek, &inner, x0.as_bytes(), &rho0)?;
            let c1 = self.pke.encrypt(ek, &inner, x1.as_bytes(), &rho1)?;
            let big_x0 = Point::mul_base(&x0)?;
            let big_x1 = q.sub(&big_x0)?;
            absorb_row(&mut transcript, &c0, &c1, &big_x0, &big_x1);

            pending.push(PendingRow { r0, r1, x1, c0, c1 });
        }

        let challenge = transcript.challenge();
        let rows = pending
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                if challenge_bit(&challenge, i) {
                    SingleRow { x1: Some(row.x1), seed: row.r1, c: row.c0 }
                } else {
                    SingleRow { x1: None, seed: row.r0, c: row.c1 }
                }
            })
            .collect();

        Ok(PveCiphertext { q, label: label.to_vec(), kappa, challenge, rows })
    }

    /// Checks from public data alone that `ct` encrypts the discrete log of `q`.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::CommitmentMismatch`] if `q` or `label` differ from
    /// the ones bound at encryption, and [`PveError::ProofInvalid`] if the
    /// recomputed challenge differs or `ct` carries fewer rows than configured.
    pub fn verify(
        &self,
        ct: &PveCiphertext,
        ek: &EncryptionKey,
        q: &Point,
        label: &[u8],
    ) -> PveResult<()> {
        if *q != ct.q || label != ct.label.as_slice() {
            return Err(PveError::CommitmentMismatch);
        }
        if ct.kappa < self.config.kappa {
            return Err(PveError::ProofInvalid);
        }
        let curve = q.curve();
        let inner = inner_label(label, slice::from_ref(q));
        let mut transcript = ChallengeTranscript::new(ct.kappa, curve, label, slice::from_ref(q));

        for (i, row) in ct.rows.iter().enumerate() {
            if challenge_bit(&ct.challenge, i) {
                let x1 = row.x1.as_ref().ok_or(PveError::ProofInvalid)?;
                let rho1 = expand_revealed_seed(&row.seed)?;
                let c1 = self.pke.encrypt(ek, &inner, x1.as_bytes(), &rho1)?;
                let big_x1 = Point::mul_base(x1).map_err(|_| PveError::ProofInvalid)?;
                let big_x0 = q.sub(&big_x1)?;
                absorb_row(&mut transcript, &row.c, &c1, &big_x0, &big_x1);
            } else {
                let (x0, rho0) = expand_hidden_seed(curve, &row.seed)?;
                let c0 = self.pke.encrypt(ek, &inner, x0.as_bytes(), &rho0)?;
                let big_x0 = Point::mul_base(&x0).map_err(|_| PveError::ProofInvalid)?;
                let big_x1 = q.sub(&big_x0)?;
                absorb_row(&mut transcript, &c0, &row.c, &big_x0, &big_x1);
            }
        }

        if transcript.challenge() != ct.challenge {
            return Err(PveError::ProofInvalid);
        }
        trace!(rows = ct.rows.len(), "pve verify passed");
        Ok(())
    }

    /// Recovers `x`, trying rows in order until one reconstructs `Q`.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::CommitmentMismatch`] on a label mismatch, any
    /// [`Pve::verify`] error unless `skip_verify`, [`PveError::DecryptionFailed`]
    /// if no row ciphertext opened and [`PveError::ReconstructionFailed`] if
    /// none of the opened rows matched `Q`.
    pub fn decrypt(
        &self,
        ct: &PveCiphertext,
        dk: &DecryptionKey,
        ek: &EncryptionKey,
        label: &[u8],
        skip_verify: bool,
    ) -> PveResult<Scalar> {
        if label != ct.label.as_slice() {
            return Err(PveError::CommitmentMismatch);
        }
        if !skip_verify {
            self.verify(ct, ek, &ct.q, label)?;
        }

        let inner = inner_label(label, slice::from_ref(&ct.q));
        let mut opened_any = false;
        for (i, row) in ct.rows.iter().enumerate() {
            let Ok(plaintext) = self.pke.decrypt(dk, &inner, &row.c) else {
                trace!(row = i, "row ciphertext did not open");
                continue;
            };
            opened_any = true;
            match ct.restore_from_decrypted(i, &plaintext) {
                Ok(x) => {
                    debug!(row = i, "pve decrypt restored value");
                    return Ok(x);
                }
                Err(_) => trace!(row = i, "row did not reconstruct the commitment"),
            }
        }
        Err(if opened_any { PveError::ReconstructionFailed } else { PveError::DecryptionFailed })
    }
}

impl PveCiphertext {
    pub fn curve(&self) -> Curve {
        self.q.curve()
    }

    pub fn commitment(&self) -> &Point {
        &self.q
    }

    pub fn label(&self) -> &[u8] {
        &self.label
    }

    pub fn kappa(&self) -> u16 {
        self.kappa
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    pub fn rows(&self) -> &[SingleRow] {
        &self.rows
    }

    /// Combines the decrypted half of row `row_index` with its retained half
    /// and checks the result against the commitment.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::ReconstructionFailed`] if the plaintext is not a
    /// canonical scalar or the sum does not match `Q`.
    pub fn restore_from_decrypted(&self, row_index: usize, plaintext: &[u8]) -> PveResult<Scalar> {
        let row = self.rows.get(row_index).ok_or(PveError::InvalidArgument)?;
        let curve = self.curve();
        let decrypted =
            Scalar::from_bytes(curve, plaintext).map_err(|_| PveError::ReconstructionFailed)?;
        let x = match &row.x1 {
            Some(x1) => decrypted.add(x1)?,
            None => expand_hidden_seed(curve, &row.seed)?.0.add(&decrypted)?,
        };
        match Point::mul_base(&x) {
            Ok(candidate) if candidate == self.q => Ok(x),
            _ => Err(PveError::ReconstructionFailed),
        }
    }

    pub fn to_bytes(&self) -> PveResult<Vec<u8>> {
        let mut w = Writer::with_header(kind::SINGLE);
        w.put_u8(self.curve().id());
        w.put_bytes(self.q.as_bytes())?;
        w.put_bytes(&self.label)?;
        write_challenge(&mut w, self.kappa, &self.challenge);
        for row in &self.rows {
            match &row.x1 {
                Some(x1) => {
                    w.put_u8(1);
                    w.put_raw(x1.as_bytes());
                }
                None => w.put_u8(0),
            }
            w.put_raw(&row.seed);
            w.put_bytes(&row.c)?;
        }
        Ok(w.into_bytes())
    }

    /// # Errors
    ///
    /// Returns [`PveError::InvalidEncoding`] on any layout violation, including
    /// a row whose shape disagrees with its challenge bit, and
    /// [`PveError::InvalidCurvePoint`] for a non-canonical commitment.
    pub fn from_bytes(data: &[u8]) -> PveResult<Self> {
        let mut r = Reader::expect_header(data, kind::SINGLE)?;
        let curve = Curve::from_id(r.u8()?)?;
        let q = Point::from_bytes(curve, r.bytes()?)?;
        let label = r.bytes()?.to_vec();
        let (kappa, challenge) = read_challenge(&mut r)?;

        let mut rows = Vec::with_capacity(usize::from(kappa));
        for i in 0..usize::from(kappa) {
            let x1 = match (r.u8()?, challenge_bit(&challenge, i)) {
                (1, true) => Some(
                    Scalar::from_bytes(curve, r.raw(SCALAR_LENGTH)?)
                        .map_err(|_| PveError::InvalidEncoding)?,
                ),
                (0, false) => None,
                _ => return Err(PveError::InvalidEncoding),
            };
            let seed = r.array::<SEED_LENGTH>()?;
            let c = r.bytes()?.to_vec();
            rows.push(SingleRow { x1, seed, c });
        }
        r.finish()?;

        Ok(Self { q, label, kappa, challenge, rows })
    }
}

impl std::fmt::Debug for PveCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PveCiphertext")
            .field("q", &self.q)
            .field("label", &String::from_utf8_lossy(&self.label))
            .field("kappa", &self.kappa)
            .finish_non_exhaustive()
    }
}
