// zsh-syntax - a grammar and lexical scanner for the Z shell.
// Copyright (C) 2025 The zsh-syntax Authors.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Byte layout for scanner checkpoints.
//!
//! An incremental host snapshots the scanner after every token and may
//! restore any earlier snapshot when the source text changes.  The layout is
//! position-independent and versionless by contract:
//!
//! 1. `glob_paren_depth`, the two extglob/quote booleans, the context count,
//!    the here-document count, and the two history bytes - one byte each.
//! 2. One tag byte per context, bottom of the stack first.
//! 3. Per here-document: `is_raw`, `started`, `allows_indent` (one byte
//!    each), a little-endian `u32` delimiter length, then the delimiter
//!    bytes.
//!
//! Restoring never fails outward: any malformed buffer resets the scanner,
//! and the error type here exists so the restore path can say precisely why
//! it gave up before the reset is applied.

use thiserror::Error as ThisError;

/// Why a serialized buffer could not be restored.
#[derive(ThisError, Copy, Clone, Debug, PartialEq, Eq)]
pub enum StateError {
    /// The buffer ended before the layout did.
    #[error("serialized scanner state is truncated")]
    Truncated,

    /// A context tag byte is outside the known range.
    #[error("unknown context tag {0:#04x} in serialized state")]
    UnknownContextTag(u8),

    /// A boolean byte was neither 0 nor 1.
    #[error("malformed flag byte {0:#04x} in serialized state")]
    MalformedFlag(u8),

    /// A history byte pair claims two previous tokens at once.
    #[error("serialized state claims conflicting token history")]
    ConflictingHistory,

    /// A here-document delimiter is not valid UTF-8.
    #[error("here-document delimiter is not valid UTF-8")]
    MalformedDelimiter,

    /// The buffer continued after the layout ended.
    #[error("{0} trailing bytes after serialized state")]
    TrailingBytes(usize),
}

/// Sequential reader over a checkpoint buffer.
pub(crate) struct Reader<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, StateError> {
        let byte = *self.buffer.get(self.pos).ok_or(StateError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn flag(&mut self) -> Result<bool, StateError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(StateError::MalformedFlag(byte)),
        }
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32, StateError> {
        let end = self.pos.checked_add(4).ok_or(StateError::Truncated)?;
        let bytes = self
            .buffer
            .get(self.pos..end)
            .ok_or(StateError::Truncated)?;
        self.pos = end;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], StateError> {
        let end = self.pos.checked_add(len).ok_or(StateError::Truncated)?;
        let bytes = self
            .buffer
            .get(self.pos..end)
            .ok_or(StateError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    /// The layout must account for every byte the host handed back.
    pub(crate) fn finish(self) -> Result<(), StateError> {
        match self.buffer.len() - self.pos {
            0 => Ok(()),
            n => Err(StateError::TrailingBytes(n)),
        }
    }
}

/// Sequential writer into a host-sized checkpoint buffer.
///
/// Once the buffer overflows the writer goes inert and
/// [`finish`](Writer::finish) reports 0, the host's "did not fit" signal.
pub(crate) struct Writer<'a> {
    buffer: &'a mut [u8],
    pos: usize,
    overflowed: bool,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            pos: 0,
            overflowed: false,
        }
    }

    pub(crate) fn u8(&mut self, byte: u8) {
        if let Some(slot) = self.buffer.get_mut(self.pos) {
            *slot = byte;
            self.pos += 1;
        } else {
            self.overflowed = true;
        }
    }

    pub(crate) fn flag(&mut self, flag: bool) {
        self.u8(flag as u8);
    }

    pub(crate) fn u32_le(&mut self, value: u32) {
        for byte in value.to_le_bytes() {
            self.u8(byte);
        }
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.u8(byte);
        }
    }

    pub(crate) fn mark_overflowed(&mut self) {
        self.overflowed = true;
    }

    pub(crate) fn finish(self) -> usize {
        if self.overflowed {
            0
        } else {
            self.pos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Reader, StateError, Writer};

    #[test]
    fn reader_reports_truncation() {
        let mut reader = Reader::new(&[7]);
        assert_eq!(reader.u8(), Ok(7));
        assert_eq!(reader.u8(), Err(StateError::Truncated));
    }

    #[test]
    fn reader_rejects_garbage_flags() {
        let mut reader = Reader::new(&[2]);
        assert_eq!(reader.flag(), Err(StateError::MalformedFlag(2)));
    }

    #[test]
    fn reader_requires_full_consumption() {
        let reader = Reader::new(&[0, 0]);
        assert_eq!(reader.finish(), Err(StateError::TrailingBytes(2)));
    }

    #[test]
    fn writer_overflow_yields_zero() {
        let mut buffer = [0u8; 2];
        let mut writer = Writer::new(&mut buffer);
        writer.u8(1);
        writer.u8(2);
        writer.u8(3);
        assert_eq!(writer.finish(), 0);
    }

    #[test]
    fn u32_round_trips() {
        let mut buffer = [0u8; 4];
        let mut writer = Writer::new(&mut buffer);
        writer.u32_le(0x0102_0304);
        assert_eq!(writer.finish(), 4);
        let mut reader = Reader::new(&buffer);
        assert_eq!(reader.u32_le(), Ok(0x0102_0304));
        assert!(reader.finish().is_ok());
    }
}
