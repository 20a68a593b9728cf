// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Batched verifiable encryption of `n` scalars under one proof.
//!
//! The hidden half of a row is the scalar vector expanded from a 16-byte seed
//! `r0_1`; that seed is itself the plaintext of `c0`. Its encryption randomness
//! comes from a second seed `r0_2`, so the two derivations never share a
//! stream. The revealed half is the explicit vector `x1 = x - x0`.

use pve_core::codec::{kind, Reader, Writer};
use pve_core::crypto;
use pve_core::types::{RHO_LENGTH, SCALAR_LENGTH, SEED_LENGTH};
use pve_core::{
    Curve, DecryptionKey, Drbg, EncryptionKey, PkeHandle, Point, PveError, PveResult, Scalar,
    SecureBytes,
};
use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::config::PveConfig;
use crate::transcript::{
    challenge_bit, inner_label, read_challenge, write_challenge, ChallengeTranscript,
};

/// Length of a hidden-half seed `r0_1 || r0_2`.
pub const HIDDEN_SEED_LENGTH: usize = 2 * SEED_LENGTH;

/// What a batch or quorum row keeps after the challenge.
#[derive(Clone, PartialEq, Eq)]
pub enum RowOpening {
    /// Challenge bit 0: `r0_1 || r0_2`.
    Hidden { seed: [u8; HIDDEN_SEED_LENGTH] },
    /// Challenge bit 1: `r1` and the explicit vector `x1`.
    Revealed { seed: [u8; SEED_LENGTH], x1: Vec<Scalar> },
}

impl RowOpening {
    pub(crate) fn write_to(&self, w: &mut Writer) -> PveResult<()> {
        match self {
            RowOpening::Hidden { seed } => {
                w.put_bytes(&[])?;
                w.put_bytes(seed)
            }
            RowOpening::Revealed { seed, x1 } => {
                let mut x_bin = encode_scalars(x1);
                let result = w.put_bytes(&x_bin);
                x_bin.zeroize();
                result?;
                w.put_bytes(seed)
            }
        }
    }

    pub(crate) fn read_from(
        r: &mut Reader<'_>,
        curve: Curve,
        n: usize,
        bit: bool,
    ) -> PveResult<Self> {
        let x_bin = r.bytes()?;
        let seed = r.bytes()?;
        if bit {
            let seed = seed.try_into().map_err(|_| PveError::InvalidEncoding)?;
            let x1 = decode_scalars(curve, x_bin, n).map_err(|_| PveError::InvalidEncoding)?;
            Ok(RowOpening::Revealed { seed, x1 })
        } else {
            if !x_bin.is_empty() {
                return Err(PveError::InvalidEncoding);
            }
            let seed = seed.try_into().map_err(|_| PveError::InvalidEncoding)?;
            Ok(RowOpening::Hidden { seed })
        }
    }
}

pub(crate) fn encode_scalars(values: &[Scalar]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * SCALAR_LENGTH);
    for v in values {
        out.extend_from_slice(v.as_bytes());
    }
    out
}

/// Parses exactly `n` fixed-width scalars.
pub(crate) fn decode_scalars(curve: Curve, bytes: &[u8], n: usize) -> PveResult<Vec<Scalar>> {
    if bytes.len() != n * SCALAR_LENGTH {
        return Err(PveError::InvalidArgument);
    }
    bytes
        .chunks_exact(SCALAR_LENGTH)
        .map(|chunk| Scalar::from_bytes(curve, chunk))
        .collect()
}

/// Expands `r0_1` into the hidden scalar vector.
pub(crate) fn expand_scalars(curve: Curve, r0_1: &[u8], n: usize) -> PveResult<Vec<Scalar>> {
    Ok(Drbg::new(r0_1)?.gen_scalars(curve, n))
}

pub(crate) fn expand_rho(seed: &[u8]) -> PveResult<SecureBytes> {
    Ok(Drbg::new(seed)?.gen(RHO_LENGTH))
}

pub(crate) fn commit_all(values: &[Scalar]) -> PveResult<Vec<Point>> {
    values.iter().map(Point::mul_base).collect()
}

pub(crate) fn complement(qs: &[Point], xs: &[Point]) -> PveResult<Vec<Point>> {
    qs.iter().zip(xs).map(|(q, x)| q.sub(x)).collect()
}

pub(crate) fn sub_all(a: &[Scalar], b: &[Scalar]) -> PveResult<Vec<Scalar>> {
    a.iter().zip(b).map(|(a, b)| a.sub(b)).collect()
}

pub(crate) fn add_all(a: &[Scalar], b: &[Scalar]) -> PveResult<Vec<Scalar>> {
    a.iter().zip(b).map(|(a, b)| a.add(b)).collect()
}

/// Checks and commits the secrets of a batch encryption.
pub(crate) fn commit_inputs(curve: Curve, xs: &[Scalar]) -> PveResult<Vec<Point>> {
    if xs.is_empty() || u32::try_from(xs.len()).is_err() {
        return Err(PveError::InvalidArgument);
    }
    if xs.iter().any(|x| x.curve() != curve) {
        return Err(PveError::InvalidArgument);
    }
    commit_all(xs)
}

/// Draws a fresh hidden seed whose vector leaves every `x0` and `x1` non-zero.
pub(crate) fn sample_split(
    curve: Curve,
    xs: &[Scalar],
) -> PveResult<([u8; HIDDEN_SEED_LENGTH], Vec<Scalar>, Vec<Scalar>)> {
    loop {
        let seed = crypto::random_array::<HIDDEN_SEED_LENGTH>();
        let x0 = expand_scalars(curve, &seed[..SEED_LENGTH], xs.len())?;
        let x1 = sub_all(xs, &x0)?;
        if x0.iter().chain(&x1).all(|v| !v.is_zero()) {
            return Ok((seed, x0, x1));
        }
    }
}

/// Reconstructs and checks `x = x0 + x1` for a row given its decrypted half.
pub(crate) fn restore_row(
    curve: Curve,
    qs: &[Point],
    opening: &RowOpening,
    plaintext: &[u8],
) -> PveResult<Vec<Scalar>> {
    let n = qs.len();
    let xs = match opening {
        RowOpening::Revealed { x1, .. } => {
            if plaintext.len() != SEED_LENGTH {
                return Err(PveError::ReconstructionFailed);
            }
            add_all(&expand_scalars(curve, plaintext, n)?, x1)?
        }
        RowOpening::Hidden { seed } => {
            let x1 = decode_scalars(curve, plaintext, n)
                .map_err(|_| PveError::ReconstructionFailed)?;
            add_all(&expand_scalars(curve, &seed[..SEED_LENGTH], n)?, &x1)?
        }
    };
    for (x, q) in xs.iter().zip(qs) {
        match Point::mul_base(x) {
            Ok(candidate) if candidate == *q => {}
            _ => return Err(PveError::ReconstructionFailed),
        }
    }
    Ok(xs)
}

pub(crate) fn write_commitments(w: &mut Writer, curve: Curve, qs: &[Point]) -> PveResult<()> {
    w.put_u8(curve.id());
    w.put_u32(u32::try_from(qs.len()).map_err(|_| PveError::InvalidArgument)?);
    for q in qs {
        w.put_bytes(q.as_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_commitments(r: &mut Reader<'_>) -> PveResult<(Curve, Vec<Point>)> {
    let curve = Curve::from_id(r.u8()?)?;
    let n = r.count(4 + curve.point_length())?;
    if n == 0 {
        return Err(PveError::InvalidEncoding);
    }
    let qs = (0..n)
        .map(|_| Point::from_bytes(curve, r.bytes()?))
        .collect::<PveResult<Vec<_>>>()?;
    Ok((curve, qs))
}

#[derive(Clone, PartialEq, Eq)]
pub struct BatchRow {
    pub opening: RowOpening,
    /// `c0` when the challenge bit is 1, `c1` otherwise.
    pub c: Vec<u8>,
}

/// A publicly verifiable encryption of `n` scalars sharing one proof.
#[derive(Clone, PartialEq, Eq)]
pub struct BatchPveCiphertext {
    curve: Curve,
    qs: Vec<Point>,
    label: Vec<u8>,
    kappa: u16,
    challenge: Vec<u8>,
    rows: Vec<BatchRow>,
}

fn absorb_row(
    t: &mut ChallengeTranscript,
    c0: &[u8],
    c1: &[u8],
    x0: &[Point],
    x1: &[Point],
) {
    t.absorb(c0);
    t.absorb(c1);
    t.absorb_points(x0);
    t.absorb_points(x1);
}

/// Batch engine bound to one base-PKE backend.
#[derive(Clone)]
pub struct BatchPve {
    pke: PkeHandle,
    config: PveConfig,
}

impl BatchPve {
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

    /// Encrypts every scalar of `xs` under `ek`, committing to `Q_j = x_j·G`.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `xs` is empty or contains a
    /// zero or foreign-curve scalar; propagates backend failures.
    pub fn encrypt(
        &self,
        ek: &EncryptionKey,
        label: &[u8],
        curve: Curve,
        xs: &[Scalar],
    ) -> PveResult<BatchPveCiphertext> {
        let qs = commit_inputs(curve, xs)?;
        let kappa = self.config.kappa;
        debug!(%curve, kappa, n = xs.len(), "batch pve encrypt");

        let inner = inner_label(label, &qs);
        let mut transcript = ChallengeTranscript::new(kappa, curve, label, &qs);
        let mut pending = Vec::with_capacity(usize::from(kappa));

        for _ in 0..kappa {
            let (r0, x0, x1) = sample_split(curve, xs)?;
            let r1 = crypto::random_array::<SEED_LENGTH>();
            let rho0 = expand_rho(&r0[SEED_LENGTH..])?;
            let rho1 = expand_rho(&r1)?;

            let mut x1_bin = encode_scalars(&x1);
            let c0 = self.pke.encrypt(ek, &inner, &r0[..SEED_LENGTH], &rho0);
            let c1 = self.pke.encrypt(ek, &inner, &x1_bin, &rho1);
            x1_bin.zeroize();
            let (c0, c1) = (c0?, c1?);

            let big_x0 = commit_all(&x0)?;
            let big_x1 = complement(&qs, &big_x0)?;
            absorb_row(&mut transcript, &c0, &c1, &big_x0, &big_x1);

            pending.push((r0, r1, x1, c0, c1));
        }

        let challenge = transcript.challenge();
        let rows = pending
            .into_iter()
            .enumerate()
            .map(|(i, (r0, r1, x1, c0, c1))| {
                if challenge_bit(&challenge, i) {
                    BatchRow { opening: RowOpening::Revealed { seed: r1, x1 }, c: c0 }
                } else {
                    BatchRow { opening: RowOpening::Hidden { seed: r0 }, c: c1 }
                }
            })
            .collect();

        Ok(BatchPveCiphertext { curve, qs, label: label.to_vec(), kappa, challenge, rows })
    }

    /// # Errors
    ///
    /// Same contract as [`crate::Pve::verify`], with `qs` compared element-wise.
    pub fn verify(
        &self,
        ct: &BatchPveCiphertext,
        ek: &EncryptionKey,
        qs: &[Point],
        label: &[u8],
    ) -> PveResult<()> {
        if qs != ct.qs.as_slice() || label != ct.label.as_slice() {
            return Err(PveError::CommitmentMismatch);
        }
        if ct.kappa < self.config.kappa {
            return Err(PveError::ProofInvalid);
        }
        let curve = ct.curve;
        let n = qs.len();
        let inner = inner_label(label, qs);
        let mut transcript = ChallengeTranscript::new(ct.kappa, curve, label, qs);

        for (i, row) in ct.rows.iter().enumerate() {
            match (&row.opening, challenge_bit(&ct.challenge, i)) {
                (RowOpening::Revealed { seed, x1 }, true) => {
                    let rho1 = expand_rho(seed)?;
                    let mut x1_bin = encode_scalars(x1);
                    let c1 = self.pke.encrypt(ek, &inner, &x1_bin, &rho1);
                    x1_bin.zeroize();
                    let big_x1 = commit_all(x1).map_err(|_| PveError::ProofInvalid)?;
                    let big_x0 = complement(qs, &big_x1)?;
                    absorb_row(&mut transcript, &row.c, &c1?, &big_x0, &big_x1);
                }
                (RowOpening::Hidden { seed }, false) => {
                    let x0 = expand_scalars(curve, &seed[..SEED_LENGTH], n)?;
                    let rho0 = expand_rho(&seed[SEED_LENGTH..])?;
                    let c0 = self.pke.encrypt(ek, &inner, &seed[..SEED_LENGTH], &rho0)?;
                    let big_x0 = commit_all(&x0).map_err(|_| PveError::ProofInvalid)?;
                    let big_x1 = complement(qs, &big_x0)?;
                    absorb_row(&mut transcript, &c0, &row.c, &big_x0, &big_x1);
                }
                _ => return Err(PveError::ProofInvalid),
            }
        }

        if transcript.challenge() != ct.challenge {
            return Err(PveError::ProofInvalid);
        }
        trace!(rows = ct.rows.len(), n, "batch pve verify passed");
        Ok(())
    }

    /// Recovers all `n` scalars from the first row that reconstructs every `Q_j`.
    ///
    /// # Errors
    ///
    /// Same contract as [`crate::Pve::decrypt`].
    pub fn decrypt(
        &self,
        ct: &BatchPveCiphertext,
        dk: &DecryptionKey,
        ek: &EncryptionKey,
        label: &[u8],
        skip_verify: bool,
    ) -> PveResult<Vec<Scalar>> {
        if label != ct.label.as_slice() {
            return Err(PveError::CommitmentMismatch);
        }
        if !skip_verify {
            self.verify(ct, ek, &ct.qs, label)?;
        }

        let inner = inner_label(label, &ct.qs);
        let mut opened_any = false;
        for (i, row) in ct.rows.iter().enumerate() {
            let Ok(plaintext) = self.pke.decrypt(dk, &inner, &row.c) else {
                trace!(row = i, "row ciphertext did not open");
                continue;
            };
            opened_any = true;
            match ct.restore_from_decrypted(i, &plaintext) {
                Ok(xs) => {
                    debug!(row = i, n = xs.len(), "batch pve decrypt restored values");
                    return Ok(xs);
                }
                Err(_) => trace!(row = i, "row did not reconstruct the commitments"),
            }
        }
        Err(if opened_any { PveError::ReconstructionFailed } else { PveError::DecryptionFailed })
    }
}

impl BatchPveCiphertext {
    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn commitments(&self) -> &[Point] {
        &self.qs
    }

    pub fn batch_size(&self) -> usize {
        self.qs.len()
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

    pub fn rows(&self) -> &[BatchRow] {
        &self.rows
    }

    /// Combines the decrypted half of row `row_index` with its retained half;
    /// succeeds only if every element matches its commitment.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::ReconstructionFailed`] if any element mismatches.
    pub fn restore_from_decrypted(
        &self,
        row_index: usize,
        plaintext: &[u8],
    ) -> PveResult<Vec<Scalar>> {
        let row = self.rows.get(row_index).ok_or(PveError::InvalidArgument)?;
        restore_row(self.curve, &self.qs, &row.opening, plaintext)
    }

    pub fn to_bytes(&self) -> PveResult<Vec<u8>> {
        let mut w = Writer::with_header(kind::BATCH);
        write_commitments(&mut w, self.curve, &self.qs)?;
        w.put_bytes(&self.label)?;
        write_challenge(&mut w, self.kappa, &self.challenge);
        for row in &self.rows {
            row.opening.write_to(&mut w)?;
            w.put_bytes(&row.c)?;
        }
        Ok(w.into_bytes())
    }

    /// # Errors
    ///
    /// Returns [`PveError::InvalidEncoding`] on any layout violation.
    pub fn from_bytes(data: &[u8]) -> PveResult<Self> {
        let mut r = Reader::expect_header(data, kind::BATCH)?;
        let (curve, qs) = read_commitments(&mut r)?;
        let label = r.bytes()?.to_vec();
        let (kappa, challenge) = read_challenge(&mut r)?;

        let mut rows = Vec::with_capacity(usize::from(kappa));
        for i in 0..usize::from(kappa) {
            let opening =
                RowOpening::read_from(&mut r, curve, qs.len(), challenge_bit(&challenge, i))?;
            let c = r.bytes()?.to_vec();
            rows.push(BatchRow { opening, c });
        }
        r.finish()?;

        Ok(Self { curve, qs, label, kappa, challenge, rows })
    }
}

impl std::fmt::Debug for BatchPveCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPveCiphertext")
            .field("curve", &self.curve)
            .field("n", &self.qs.len())
            .field("label", &String::from_utf8_lossy(&self.label))
            .field("kappa", &self.kappa)
            .finish_non_exhaustive()
    }
}
