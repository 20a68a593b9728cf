// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Fiat-Shamir challenge derivation and commitment-bound inner labels.

use pve_core::codec::{Reader, Writer};
use pve_core::crypto::{self, Sha256Stream};
use pve_core::types::labels;
use pve_core::{Curve, Point, PveError, PveResult};

use crate::config::MAX_KAPPA;

/// `label || "-" || hex(SHA-256(Q_0 || Q_1 || ...))`.
///
/// Every row ciphertext is encrypted under this label, so it is bound to the
/// commitments as well as to the caller's label.
pub fn inner_label(label: &[u8], commitments: &[Point]) -> Vec<u8> {
    let parts: Vec<&[u8]> = commitments.iter().map(Point::as_bytes).collect();
    let digest = crypto::sha256_multi(&parts);
    let mut out = Vec::with_capacity(label.len() + 1 + 2 * digest.len());
    out.extend_from_slice(label);
    out.push(b'-');
    out.extend_from_slice(hex::encode(digest).as_bytes());
    out
}

/// Running hash over everything the dealer commits to before the challenge.
pub struct ChallengeTranscript {
    stream: Sha256Stream,
    kappa: u16,
}

impl ChallengeTranscript {
    pub fn new(kappa: u16, curve: Curve, label: &[u8], commitments: &[Point]) -> Self {
        let mut stream = Sha256Stream::new();
        stream.update(labels::CHALLENGE_CONTEXT);
        stream.update(&kappa.to_be_bytes());
        stream.update(&[curve.id()]);
        let mut transcript = Self { stream, kappa };
        transcript.absorb_u32(commitments.len());
        for q in commitments {
            transcript.absorb(q.as_bytes());
        }
        transcript.absorb(label);
        transcript
    }

    /// Absorbs `u32 length || data`.
    pub fn absorb(&mut self, data: &[u8]) {
        self.absorb_u32(data.len());
        self.stream.update(data);
    }

    pub fn absorb_points(&mut self, points: &[Point]) {
        for p in points {
            self.absorb(p.as_bytes());
        }
    }

    fn absorb_u32(&mut self, n: usize) {
        self.stream.update(&(n as u32).to_be_bytes());
    }

    /// Truncates the digest to `kappa` bits packed LSB-first, unused bits zero.
    pub fn challenge(self) -> Vec<u8> {
        let digest = self.stream.finalize();
        let kappa = usize::from(self.kappa);
        let mut out = digest[..kappa.div_ceil(8)].to_vec();
        let rem = kappa % 8;
        if rem != 0 {
            if let Some(last) = out.last_mut() {
                *last &= (1u8 << rem) - 1;
            }
        }
        out
    }
}

/// Whether row `row` is opened. Bits are packed LSB-first; a row past the end
/// of `challenge` reads as hidden.
pub(crate) fn challenge_bit(challenge: &[u8], row: usize) -> bool {
    challenge.get(row / 8).is_some_and(|byte| (byte >> (row % 8)) & 1 == 1)
}

/// Checks the packed length and that bits beyond `kappa` are zero.
pub fn check_challenge(challenge: &[u8], kappa: u16) -> PveResult<()> {
    let kappa = usize::from(kappa);
    if challenge.len() != kappa.div_ceil(8) {
        return Err(PveError::InvalidEncoding);
    }
    let rem = kappa % 8;
    if rem != 0 {
        let last = challenge[challenge.len() - 1];
        if last >> rem != 0 {
            return Err(PveError::InvalidEncoding);
        }
    }
    Ok(())
}

pub(crate) fn write_challenge(w: &mut Writer, kappa: u16, challenge: &[u8]) {
    w.put_u16(kappa);
    w.put_raw(challenge);
}

pub(crate) fn read_challenge(r: &mut Reader<'_>) -> PveResult<(u16, Vec<u8>)> {
    let kappa = r.u16()?;
    if kappa == 0 || kappa > MAX_KAPPA {
        return Err(PveError::InvalidEncoding);
    }
    let challenge = r.raw(usize::from(kappa).div_ceil(8))?.to_vec();
    check_challenge(&challenge, kappa)?;
    Ok((kappa, challenge))
}
