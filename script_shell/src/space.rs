// Copyright 2026 the Script Shell Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The three script address spaces and their pointer tagging.
//!
//! A single [`Value`] identifies code living in any of three regions:
//!
//! - negative → read-only program memory ([`Region::Rom`]), local offset `-v`
//! - `v >= NVM_BASE` → persistent byte storage ([`Region::Nvm`]), local
//!   offset `v - NVM_BASE`
//! - otherwise → the interpreter's data arena ([`Region::Data`]), local
//!   offset `v`
//!
//! The region is decoded once on entry to every execute call and again for
//! every `{` block capture; local offsets from different regions are never
//! compared.

use crate::value::Value;

/// Base of the tagged NVM pointer range.
///
/// Data-arena offsets stay strictly below this; the arena refuses to grow
/// past it. ROM offset 0 encodes as 0, which is a DATA pointer, so ROM
/// scripts are placed at local offset 1 or above.
pub const NVM_BASE: Value = 0x4000_0000;

/// A script address space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Region {
    /// Mutable data memory owned by the interpreter.
    Data,
    /// Read-only program memory.
    Rom,
    /// Byte-addressable persistent memory.
    Nvm,
}

impl Region {
    /// Splits a tagged pointer into its region and local byte offset.
    #[must_use]
    pub fn decode(ptr: Value) -> (Self, u32) {
        if ptr < 0 {
            (Self::Rom, ptr.unsigned_abs())
        } else if ptr >= NVM_BASE {
            (Self::Nvm, (ptr - NVM_BASE) as u32)
        } else {
            (Self::Data, ptr as u32)
        }
    }

    /// Re-tags a local byte offset as a stack-carried pointer.
    #[must_use]
    pub fn encode(self, local: u32) -> Value {
        match self {
            Self::Data => local as Value,
            Self::Rom => (-(i64::from(local))) as Value,
            Self::Nvm => local as Value + NVM_BASE,
        }
    }

    /// One-letter region tag used by trace output.
    #[must_use]
    pub const fn letter(self) -> u8 {
        match self {
            Self::Data => b'D',
            Self::Rom => b'R',
            Self::Nvm => b'N',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for (region, local) in [
            (Region::Data, 0),
            (Region::Data, 0x3fff),
            (Region::Rom, 1),
            (Region::Rom, 700),
            (Region::Nvm, 0),
            (Region::Nvm, 512),
        ] {
            let ptr = region.encode(local);
            assert_eq!(Region::decode(ptr), (region, local));
        }
    }

    #[test]
    fn tag_ranges_do_not_overlap() {
        assert_eq!(Region::decode(-1).0, Region::Rom);
        assert_eq!(Region::decode(0).0, Region::Data);
        assert_eq!(Region::decode(NVM_BASE - 1).0, Region::Data);
        assert_eq!(Region::decode(NVM_BASE).0, Region::Nvm);
    }
}
