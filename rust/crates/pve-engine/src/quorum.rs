// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Quorum verifiable encryption over an access structure.
//!
//! Row halves are sealed with AES-GCM under a key derived from a per-half
//! scalar `k`. `k` is split over the access structure and every leaf's share
//! is encrypted under that leaf's own key, so only a quorum can reopen a row.
//! Everything in a sealed half is drawn from one seed, which lets a verifier
//! rebuild the revealed half byte for byte.

use std::collections::BTreeMap;
use std::sync::Arc;

use pve_core::codec::{kind, Reader, Writer};
use pve_core::hybrid::{aead_open, aead_seal};
use pve_core::types::{
    labels, AEAD_KEY_LENGTH, AEAD_NONCE_LENGTH, RHO_LENGTH, SEED_LENGTH,
};
use pve_core::{
    crypto, AccessStructure, Curve, DecryptionKey, Drbg, EncryptionKey, PkeHandle, Point,
    PveError, PveResult, Scalar, SecretSharing, SecureBytes, ShamirTreeSharing,
};
use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::batch::{
    commit_all, commit_inputs, complement, encode_scalars, expand_scalars, read_commitments,
    restore_row, sample_split, write_commitments, RowOpening,
};
use crate::config::PveConfig;
use crate::transcript::{
    challenge_bit, inner_label, read_challenge, write_challenge, ChallengeTranscript,
};

/// An access structure together with one encryption key per leaf.
#[derive(Debug, Clone)]
pub struct QuorumRecipients {
    ac: AccessStructure,
    keys: BTreeMap<String, EncryptionKey>,
}

impl QuorumRecipients {
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] unless `keys` names exactly the
    /// leaves of `ac`.
    pub fn new(ac: AccessStructure, keys: BTreeMap<String, EncryptionKey>) -> PveResult<Self> {
        if !keys.keys().eq(ac.leaf_names().iter()) {
            return Err(PveError::InvalidArgument);
        }
        Ok(Self { ac, keys })
    }

    pub fn access_structure(&self) -> &AccessStructure {
        &self.ac
    }

    pub fn keys(&self) -> &BTreeMap<String, EncryptionKey> {
        &self.keys
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct QuorumRow {
    pub opening: RowOpening,
    /// `nonce || AES-GCM(plaintext)` of the kept half.
    pub c: Vec<u8>,
    /// Per-leaf encryptions of the shares of that half's row key.
    pub quorum_c: BTreeMap<String, Vec<u8>>,
}

/// A quorum-decryptable, publicly verifiable encryption of `n` scalars.
#[derive(Clone, PartialEq, Eq)]
pub struct QuorumPveCiphertext {
    curve: Curve,
    qs: Vec<Point>,
    label: Vec<u8>,
    kappa: u16,
    challenge: Vec<u8>,
    rows: Vec<QuorumRow>,
}

struct SealedHalf {
    c: Vec<u8>,
    quorum_c: BTreeMap<String, Vec<u8>>,
}

fn row_key(k: &Scalar) -> PveResult<[u8; AEAD_KEY_LENGTH]> {
    crypto::hkdf_sha256::<AEAD_KEY_LENGTH>(&[], k.as_bytes(), labels::QUORUM_ROW_INFO)
}

fn open_half(k: &Scalar, inner: &[u8], c: &[u8]) -> PveResult<SecureBytes> {
    if c.len() < AEAD_NONCE_LENGTH {
        return Err(PveError::DecryptionFailed);
    }
    let (nonce, body) = c.split_at(AEAD_NONCE_LENGTH);
    let nonce: &[u8; AEAD_NONCE_LENGTH] =
        nonce.try_into().map_err(|_| PveError::DecryptionFailed)?;
    let mut key = row_key(k)?;
    let plaintext = aead_open(&key, nonce, inner, body);
    key.zeroize();
    plaintext
}

fn absorb_half(t: &mut ChallengeTranscript, half_c: &[u8], quorum_c: &BTreeMap<String, Vec<u8>>) {
    t.absorb(half_c);
    t.absorb(&(quorum_c.len() as u32).to_be_bytes());
    for (leaf, ct) in quorum_c {
        t.absorb(leaf.as_bytes());
        t.absorb(ct);
    }
}

/// Quorum engine bound to one base-PKE backend and one sharing scheme.
#[derive(Clone)]
pub struct QuorumPve {
    pke: PkeHandle,
    sharing: Arc<dyn SecretSharing>,
    config: PveConfig,
}

impl QuorumPve {
    /// Uses [`ShamirTreeSharing`] and the default configuration.
    pub fn new(pke: PkeHandle) -> Self {
        Self { pke, sharing: Arc::new(ShamirTreeSharing), config: PveConfig::default() }
    }

    pub fn with_sharing(
        pke: PkeHandle,
        sharing: Arc<dyn SecretSharing>,
        config: PveConfig,
    ) -> PveResult<Self> {
        config.validate()?;
        Ok(Self { pke, sharing, config })
    }

    pub fn config(&self) -> &PveConfig {
        &self.config
    }

    /// Seals one row half. Every random value comes from `seed`.
    fn seal_half(
        &self,
        recipients: &QuorumRecipients,
        inner: &[u8],
        curve: Curve,
        seed: &[u8],
        plaintext: &[u8],
    ) -> PveResult<SealedHalf> {
        let mut drbg = Drbg::new(seed)?;
        let k = drbg.gen_scalar(curve);
        let nonce = drbg.gen_array::<AEAD_NONCE_LENGTH>();

        let mut key = row_key(&k)?;
        let body = aead_seal(&key, &nonce, inner, plaintext);
        key.zeroize();
        let mut c = nonce.to_vec();
        c.extend_from_slice(&body?);

        let shares = self.sharing.split(&recipients.ac, &k, &mut drbg)?;
        let mut quorum_c = BTreeMap::new();
        for (leaf, share) in &shares {
            let ek = recipients.keys.get(leaf).ok_or(PveError::InvalidArgument)?;
            let rho = drbg.gen(RHO_LENGTH);
            quorum_c.insert(leaf.clone(), self.pke.encrypt(ek, inner, share.as_bytes(), &rho)?);
        }
        Ok(SealedHalf { c, quorum_c })
    }

    /// Encrypts `xs` so that any quorum of `recipients` can recover them.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] on empty, zero or foreign-curve
    /// inputs; propagates backend and sharing failures.
    pub fn encrypt(
        &self,
        recipients: &QuorumRecipients,
        label: &[u8],
        curve: Curve,
        xs: &[Scalar],
    ) -> PveResult<QuorumPveCiphertext> {
        let qs = commit_inputs(curve, xs)?;
        let kappa = self.config.kappa;
        debug!(
            %curve,
            kappa,
            n = xs.len(),
            leaves = recipients.keys.len(),
            "quorum pve encrypt"
        );

        let inner = inner_label(label, &qs);
        let mut transcript = ChallengeTranscript::new(kappa, curve, label, &qs);
        let mut pending = Vec::with_capacity(usize::from(kappa));

        for _ in 0..kappa {
            let (r0, x0, x1) = sample_split(curve, xs)?;
            let r1 = crypto::random_array::<SEED_LENGTH>();

            let half0 = self.seal_half(
                recipients,
                &inner,
                curve,
                &r0[SEED_LENGTH..],
                &r0[..SEED_LENGTH],
            )?;
            let mut x1_bin = encode_scalars(&x1);
            let half1 = self.seal_half(recipients, &inner, curve, &r1, &x1_bin);
            x1_bin.zeroize();
            let half1 = half1?;

            let big_x0 = commit_all(&x0)?;
            let big_x1 = complement(&qs, &big_x0)?;
            absorb_half(&mut transcript, &half0.c, &half0.quorum_c);
            absorb_half(&mut transcript, &half1.c, &half1.quorum_c);
            transcript.absorb_points(&big_x0);
            transcript.absorb_points(&big_x1);

            pending.push((r0, r1, x1, half0, half1));
        }

        let challenge = transcript.challenge();
        let rows = pending
            .into_iter()
            .enumerate()
            .map(|(i, (r0, r1, x1, half0, half1))| {
                if challenge_bit(&challenge, i) {
                    QuorumRow {
                        opening: RowOpening::Revealed { seed: r1, x1 },
                        c: half0.c,
                        quorum_c: half0.quorum_c,
                    }
                } else {
                    QuorumRow {
                        opening: RowOpening::Hidden { seed: r0 },
                        c: half1.c,
                        quorum_c: half1.quorum_c,
                    }
                }
            })
            .collect();

        Ok(QuorumPveCiphertext { curve, qs, label: label.to_vec(), kappa, challenge, rows })
    }

    /// # Errors
    ///
    /// Same contract as [`crate::BatchPve::verify`].
    pub fn verify(
        &self,
        ct: &QuorumPveCiphertext,
        recipients: &QuorumRecipients,
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
        let inner = inner_label(label, qs);
        let mut transcript = ChallengeTranscript::new(ct.kappa, curve, label, qs);

        for (i, row) in ct.rows.iter().enumerate() {
            match (&row.opening, challenge_bit(&ct.challenge, i)) {
                (RowOpening::Revealed { seed, x1 }, true) => {
                    let mut x1_bin = encode_scalars(x1);
                    let half1 = self.seal_half(recipients, &inner, curve, seed, &x1_bin);
                    x1_bin.zeroize();
                    let half1 = half1?;
                    let big_x1 = commit_all(x1).map_err(|_| PveError::ProofInvalid)?;
                    let big_x0 = complement(qs, &big_x1)?;
                    absorb_half(&mut transcript, &row.c, &row.quorum_c);
                    absorb_half(&mut transcript, &half1.c, &half1.quorum_c);
                    transcript.absorb_points(&big_x0);
                    transcript.absorb_points(&big_x1);
                }
                (RowOpening::Hidden { seed }, false) => {
                    let x0 = expand_scalars(curve, &seed[..SEED_LENGTH], qs.len())?;
                    let half0 = self.seal_half(
                        recipients,
                        &inner,
                        curve,
                        &seed[SEED_LENGTH..],
                        &seed[..SEED_LENGTH],
                    )?;
                    let big_x0 = commit_all(&x0).map_err(|_| PveError::ProofInvalid)?;
                    let big_x1 = complement(qs, &big_x0)?;
                    absorb_half(&mut transcript, &half0.c, &half0.quorum_c);
                    absorb_half(&mut transcript, &row.c, &row.quorum_c);
                    transcript.absorb_points(&big_x0);
                    transcript.absorb_points(&big_x1);
                }
                _ => return Err(PveError::ProofInvalid),
            }
        }

        if transcript.challenge() != ct.challenge {
            return Err(PveError::ProofInvalid);
        }
        trace!(rows = ct.rows.len(), "quorum pve verify passed");
        Ok(())
    }

    /// Decrypts one leaf's share of row `row_index`.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::CommitmentMismatch`] on a label mismatch,
    /// [`PveError::InvalidArgument`] for an unknown row or leaf and
    /// [`PveError::DecryptionFailed`] if the share does not open.
    pub fn party_decrypt_row(
        &self,
        ct: &QuorumPveCiphertext,
        row_index: usize,
        leaf: &str,
        dk: &DecryptionKey,
        label: &[u8],
    ) -> PveResult<Scalar> {
        if label != ct.label.as_slice() {
            return Err(PveError::CommitmentMismatch);
        }
        let row = ct.rows.get(row_index).ok_or(PveError::InvalidArgument)?;
        let share_ct = row.quorum_c.get(leaf).ok_or(PveError::InvalidArgument)?;
        let inner = inner_label(label, &ct.qs);
        let plaintext = self.pke.decrypt(dk, &inner, share_ct)?;
        Scalar::from_bytes(ct.curve, &plaintext).map_err(|_| PveError::DecryptionFailed)
    }

    /// Combines a quorum's shares for row `row_index` and restores the values.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::ReconstructionFailed`] if `shares` is not a quorum,
    /// the recombined key does not open the row, or the values do not match
    /// the commitments.
    pub fn aggregate_to_restore_row(
        &self,
        ct: &QuorumPveCiphertext,
        recipients: &QuorumRecipients,
        row_index: usize,
        label: &[u8],
        shares: &BTreeMap<String, Scalar>,
        skip_verify: bool,
    ) -> PveResult<Vec<Scalar>> {
        if label != ct.label.as_slice() {
            return Err(PveError::CommitmentMismatch);
        }
        if !skip_verify {
            self.verify(ct, recipients, &ct.qs, label)?;
        }
        let row = ct.rows.get(row_index).ok_or(PveError::InvalidArgument)?;
        if !recipients.ac.enough_for_quorum(shares) {
            return Err(PveError::ReconstructionFailed);
        }
        let k = self.sharing.reconstruct(&recipients.ac, shares)?;
        let inner = inner_label(label, &ct.qs);
        let plaintext =
            open_half(&k, &inner, &row.c).map_err(|_| PveError::ReconstructionFailed)?;
        restore_row(ct.curve, &ct.qs, &row.opening, &plaintext)
    }

    /// Runs the party and aggregation steps for every row until one restores.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `dks` cannot form a quorum,
    /// any verify error unless `skip_verify`, and
    /// [`PveError::ReconstructionFailed`] if no row restores.
    pub fn decrypt(
        &self,
        ct: &QuorumPveCiphertext,
        recipients: &QuorumRecipients,
        dks: &BTreeMap<String, DecryptionKey>,
        label: &[u8],
        skip_verify: bool,
    ) -> PveResult<Vec<Scalar>> {
        if label != ct.label.as_slice() {
            return Err(PveError::CommitmentMismatch);
        }
        if !recipients.ac.enough_for_quorum(dks) {
            return Err(PveError::InvalidArgument);
        }
        if !skip_verify {
            self.verify(ct, recipients, &ct.qs, label)?;
        }

        for row_index in 0..ct.rows.len() {
            let shares: BTreeMap<String, Scalar> = dks
                .iter()
                .filter_map(|(leaf, dk)| {
                    self.party_decrypt_row(ct, row_index, leaf, dk, label)
                        .ok()
                        .map(|share| (leaf.clone(), share))
                })
                .collect();
            match self.aggregate_to_restore_row(ct, recipients, row_index, label, &shares, true) {
                Ok(xs) => {
                    debug!(row = row_index, parties = shares.len(), "quorum pve decrypt restored");
                    return Ok(xs);
                }
                Err(_) => trace!(row = row_index, "row did not restore"),
            }
        }
        Err(PveError::ReconstructionFailed)
    }
}

impl QuorumPveCiphertext {
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

    pub fn rows(&self) -> &[QuorumRow] {
        &self.rows
    }

    pub fn to_bytes(&self) -> PveResult<Vec<u8>> {
        let mut w = Writer::with_header(kind::QUORUM);
        write_commitments(&mut w, self.curve, &self.qs)?;
        w.put_bytes(&self.label)?;
        write_challenge(&mut w, self.kappa, &self.challenge);
        for row in &self.rows {
            row.opening.write_to(&mut w)?;
            w.put_bytes(&row.c)?;
            w.put_u32(u32::try_from(row.quorum_c.len()).map_err(|_| PveError::InvalidArgument)?);
            for (leaf, ct) in &row.quorum_c {
                w.put_bytes(leaf.as_bytes())?;
                w.put_bytes(ct)?;
            }
        }
        Ok(w.into_bytes())
    }

    /// # Errors
    ///
    /// Returns [`PveError::InvalidEncoding`] on any layout violation, including
    /// leaf entries that are not strictly ascending.
    pub fn from_bytes(data: &[u8]) -> PveResult<Self> {
        let mut r = Reader::expect_header(data, kind::QUORUM)?;
        let (curve, qs) = read_commitments(&mut r)?;
        let label = r.bytes()?.to_vec();
        let (kappa, challenge) = read_challenge(&mut r)?;

        let mut rows = Vec::with_capacity(usize::from(kappa));
        for i in 0..usize::from(kappa) {
            let opening =
                RowOpening::read_from(&mut r, curve, qs.len(), challenge_bit(&challenge, i))?;
            let c = r.bytes()?.to_vec();
            let count = r.count(8)?;
            let mut quorum_c = BTreeMap::new();
            let mut previous: Option<String> = None;
            for _ in 0..count {
                let leaf = String::from_utf8(r.bytes()?.to_vec())
                    .map_err(|_| PveError::InvalidEncoding)?;
                if previous.as_ref().is_some_and(|p| *p >= leaf) {
                    return Err(PveError::InvalidEncoding);
                }
                let ct = r.bytes()?.to_vec();
                previous = Some(leaf.clone());
                quorum_c.insert(leaf, ct);
            }
            rows.push(QuorumRow { opening, c, quorum_c });
        }
        r.finish()?;

        Ok(Self { curve, qs, label, kappa, challenge, rows })
    }
}

impl std::fmt::Debug for QuorumPveCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumPveCiphertext")
            .field("curve", &self.curve)
            .field("n", &self.qs.len())
            .field("label", &String::from_utf8_lossy(&self.label))
            .field("kappa", &self.kappa)
            .finish_non_exhaustive()
    }
}
