// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Length-prefixed, big-endian wire codec shared by every serialized bundle.

use crate::types::{PveError, PveResult};

/// Current bundle format version.
pub const WIRE_VERSION: u8 = 1;

/// Bundle kind discriminants.
pub mod kind {
    pub const SINGLE: u8 = 1;
    pub const BATCH: u8 = 2;
    pub const QUORUM: u8 = 3;
}

/// Append-only encoder. Integers are big-endian.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Empty writer with no header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a bundle with the `version || kind` header.
    pub fn with_header(kind: u8) -> Self {
        let mut w = Self::new();
        w.put_u8(WIRE_VERSION);
        w.put_u8(kind);
        w
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes `data` with no length prefix. Only for fixed-width fields.
    pub fn put_raw(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Writes `u32 length || data`.
    ///
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] if `data` is longer than `u32::MAX`.
    pub fn put_bytes(&mut self, data: &[u8]) -> PveResult<()> {
        let len = u32::try_from(data.len()).map_err(|_| PveError::InvalidArgument)?;
        self.put_u32(len);
        self.put_raw(data);
        Ok(())
    }

    /// Consumes the writer and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a borrowed buffer. Every read is bounds-checked and fails with
/// [`PveError::InvalidEncoding`] on truncation; slices borrow from the input.
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Reads and checks the `version || kind` header.
    pub fn expect_header(data: &'a [u8], kind: u8) -> PveResult<Self> {
        let mut r = Self::new(data);
        if r.u8()? != WIRE_VERSION || r.u8()? != kind {
            return Err(PveError::InvalidEncoding);
        }
        Ok(r)
    }

    /// Takes the next `len` bytes.
    pub fn raw(&mut self, len: usize) -> PveResult<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or(PveError::InvalidEncoding)?;
        if end > self.data.len() {
            return Err(PveError::InvalidEncoding);
        }
        let out = &self.data[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    /// Takes the next `N` bytes as a fixed-size array.
    pub fn array<const N: usize>(&mut self) -> PveResult<[u8; N]> {
        self.raw(N)?.try_into().map_err(|_| PveError::InvalidEncoding)
    }

    pub fn u8(&mut self) -> PveResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> PveResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> PveResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Reads a `u32 length || data` field written by [`Writer::put_bytes`].
    pub fn bytes(&mut self) -> PveResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.raw(len)
    }

    /// Reads a count that must be backed by at least `min_item_len` bytes per item.
    pub fn count(&mut self, min_item_len: usize) -> PveResult<usize> {
        let n = self.u32()? as usize;
        let needed = n.checked_mul(min_item_len.max(1)).ok_or(PveError::InvalidEncoding)?;
        if needed > self.remaining() {
            return Err(PveError::InvalidEncoding);
        }
        Ok(n)
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(self) -> PveResult<()> {
        if self.remaining() != 0 {
            return Err(PveError::InvalidEncoding);
        }
        Ok(())
    }
}
