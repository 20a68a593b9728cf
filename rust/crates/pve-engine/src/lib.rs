// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Cut-and-choose publicly verifiable encryption engines.
//!
//! * [`Pve`] encrypts one scalar to one recipient.
//! * [`BatchPve`] encrypts `n` scalars under a single proof.
//! * [`QuorumPve`] encrypts `n` scalars so that any quorum of an access
//!   structure can recover them.
//!
//! Engines are cheap to clone and hold their base-PKE backend explicitly, so
//! one ciphertext can be verified or decrypted from many threads at once.

mod batch;
mod config;
mod quorum;
mod single;
mod transcript;

pub use batch::{BatchPve, BatchPveCiphertext, BatchRow, RowOpening, HIDDEN_SEED_LENGTH};
pub use config::{PveConfig, DEFAULT_KAPPA, MAX_KAPPA};
pub use quorum::{QuorumPve, QuorumPveCiphertext, QuorumRecipients, QuorumRow};
pub use single::{Pve, PveCiphertext, SingleRow};
pub use transcript::inner_label;
