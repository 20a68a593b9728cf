// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! ML-KEM-768 as an external [`KemCapability`].

use ml_kem::kem::{Decapsulate, Encapsulate};
use ml_kem::{EncodedSizeUser, KemCore, MlKem768};
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use crate::kem::{DecryptionKey, EncryptionKey, ExternalKeyHandle, KemCapability};
use crate::types::{PveError, PveResult, SecureBytes, RHO_LENGTH};

pub const KEM_PUBLIC_KEY_LENGTH: usize = 1184;
pub const KEM_CIPHERTEXT_LENGTH: usize = 1088;

type EK = <MlKem768 as KemCore>::EncapsulationKey;
type DK = <MlKem768 as KemCore>::DecapsulationKey;

/// Private half held inside an [`ExternalKeyHandle`].
struct MlKemSecret {
    dk: DK,
    ek_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MlKem768Capability;

impl MlKem768Capability {
    /// Generates a fresh key pair with the system RNG.
    pub fn generate_keypair(&self) -> (EncryptionKey, DecryptionKey) {
        let (dk, ek) = MlKem768::generate(&mut OsRng);
        let ek_bytes = ek.as_bytes().to_vec();
        let handle = ExternalKeyHandle::new(MlKemSecret { dk, ek_bytes: ek_bytes.clone() });
        (EncryptionKey::External(ek_bytes), DecryptionKey::External(handle))
    }

    fn secret<'a>(&self, dk: &'a ExternalKeyHandle) -> PveResult<&'a MlKemSecret> {
        dk.downcast_ref::<MlKemSecret>().ok_or(PveError::InvalidArgument)
    }
}

impl KemCapability for MlKem768Capability {
    fn encapsulate(
        &self,
        ek: &[u8],
        rho: &[u8; RHO_LENGTH],
    ) -> PveResult<(Vec<u8>, SecureBytes)> {
        if ek.len() != KEM_PUBLIC_KEY_LENGTH {
            return Err(PveError::InvalidArgument);
        }
        let ek_array: ml_kem::Encoded<EK> =
            ek.try_into().map_err(|_| PveError::InvalidArgument)?;
        let ek = EK::from_bytes(&ek_array);

        let mut rng = ChaCha20Rng::from_seed(*rho);
        let (ct, ss) = ek.encapsulate(&mut rng).map_err(|_| PveError::Backend)?;
        let ss: &[u8] = ss.as_ref();
        Ok((ct.to_vec(), SecureBytes::from_slice(ss)))
    }

    fn decapsulate(&self, dk: &ExternalKeyHandle, kem_ct: &[u8]) -> PveResult<SecureBytes> {
        if kem_ct.len() != KEM_CIPHERTEXT_LENGTH {
            return Err(PveError::DecryptionFailed);
        }
        let secret = self.secret(dk)?;
        let ct: ml_kem::Ciphertext<MlKem768> =
            kem_ct.try_into().map_err(|_| PveError::DecryptionFailed)?;
        let ss = secret.dk.decapsulate(&ct).map_err(|_| PveError::Backend)?;
        let ss: &[u8] = ss.as_ref();
        Ok(SecureBytes::from_slice(ss))
    }

    fn derive_public(&self, dk: &ExternalKeyHandle) -> PveResult<Vec<u8>> {
        Ok(self.secret(dk)?.ek_bytes.clone())
    }
}
