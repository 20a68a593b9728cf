// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

use pve_core::{PveError, PveResult};
use serde::{Deserialize, Serialize};

/// Production number of cut-and-choose rows (soundness error 2^-128).
pub const DEFAULT_KAPPA: u16 = 128;
/// Upper bound: the challenge is read from a single SHA-256 digest.
pub const MAX_KAPPA: u16 = 256;

/// Runtime parameters shared by every engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PveConfig {
    pub kappa: u16,
}

impl Default for PveConfig {
    fn default() -> Self {
        Self { kappa: DEFAULT_KAPPA }
    }
}

impl PveConfig {
    pub fn with_kappa(kappa: u16) -> PveResult<Self> {
        let config = Self { kappa };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `kappa` is outside `1..=256`.
    pub fn validate(&self) -> PveResult<()> {
        if self.kappa == 0 || self.kappa > MAX_KAPPA {
            return Err(PveError::InvalidArgument);
        }
        Ok(())
    }

    /// Byte length of the packed challenge.
    pub fn challenge_length(&self) -> usize {
        usize::from(self.kappa).div_ceil(8)
    }
}
