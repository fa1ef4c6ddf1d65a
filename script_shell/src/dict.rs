// Copyright 2026 the Script Shell Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Variable cells and the name dictionary.
//!
//! Variables are a flat array of [`Value`] cells addressed by index.
//! The dictionary maps names (`[A-Za-z0-9]+`) onto those indices, densely
//! and in insertion order: the first use of an unknown name appends an
//! entry, later uses find it by linear byte-exact scan.
//!
//! Names live either in the interpreter heap (RAM variant) or in
//! persistent memory (when the board's [`NvmStore`] is present), using the
//! layout:
//!
//! ```text
//! 0..2   dp       free pointer into the name heap, u16 le
//! 2      entries  u8
//! 3..    entry[limit], each { name_ptr: u16 le, value: i16 le }
//! heap.. NUL-terminated name strings, growing from dp
//! ```
//!
//! A fully erased image (`dp == 0xFFFF`) or an implausible entry count is
//! treated as empty and the header is initialized on construction.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::host::NvmStore;
use crate::value::Value;

const HDR_DP: u32 = 0;
const HDR_ENTRIES: u32 = 2;
const ENTRIES_AT: u32 = 3;
const ENTRY_SIZE: u32 = 4;

/// The flat variable array.
///
/// Reads outside the table yield 0 and writes are ignored.
#[derive(Debug)]
pub struct VarTable {
    cells: Vec<Value>,
}

impl VarTable {
    /// Creates `limit` zeroed cells.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            cells: alloc::vec![0; limit],
        }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the table has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at `addr`, or 0 out of range.
    #[must_use]
    pub fn read(&self, addr: Value) -> Value {
        usize::try_from(addr)
            .ok()
            .and_then(|i| self.cells.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Writes the cell at `addr`; ignored out of range.
    pub fn write(&mut self, addr: Value, val: Value) {
        if let Some(cell) = usize::try_from(addr).ok().and_then(|i| self.cells.get_mut(i)) {
            *cell = val;
        }
    }
}

#[derive(Debug)]
enum Names {
    Ram(Vec<Box<[u8]>>),
    Nvm,
}

/// Insertion-ordered name → index dictionary.
#[derive(Debug)]
pub struct Dict {
    entries: usize,
    limit: usize,
    names: Names,
}

impl Dict {
    /// Creates an empty dictionary over `nvm`, loading persisted entries
    /// (and their value cells into `vars`) when the store is present.
    pub fn open<N: NvmStore>(limit: usize, nvm: &mut N, vars: &mut VarTable) -> Self {
        if !nvm.is_present() {
            return Self {
                entries: 0,
                limit,
                names: Names::Ram(Vec::new()),
            };
        }
        let dp = nvm.read_word(HDR_DP);
        let entries = nvm.read_byte(HDR_ENTRIES) as usize;
        if dp == 0xffff || entries >= limit {
            let heap = Self::heap_start(limit);
            nvm.write_word(HDR_DP, heap);
            nvm.update_byte(HDR_ENTRIES, 0);
            return Self {
                entries: 0,
                limit,
                names: Names::Nvm,
            };
        }
        for i in 0..entries {
            let val = nvm.read_word(Self::entry_addr(i) + 2) as i16;
            vars.write(i as Value, Value::from(val));
        }
        Self {
            entries,
            limit,
            names: Names::Nvm,
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Index for `name`, inserting it on first use.
    ///
    /// Returns −1 when the dictionary is full or the name is empty.
    pub fn lookup_or_insert<N: NvmStore>(&mut self, nvm: &mut N, name: &[u8]) -> Value {
        if name.is_empty() {
            return -1;
        }
        for i in 0..self.entries {
            if self.name_matches(nvm, i, name) {
                return i as Value;
            }
        }
        if self.entries == self.limit {
            return -1;
        }
        let index = self.entries;
        match &mut self.names {
            Names::Ram(heap) => heap.push(Box::from(name)),
            Names::Nvm => {
                let dp = u32::from(nvm.read_word(HDR_DP));
                nvm.update_block(name, dp);
                nvm.update_byte(dp + name.len() as u32, 0);
                nvm.write_word(Self::entry_addr(index), dp as u16);
                nvm.write_word(Self::entry_addr(index) + 2, 0);
                nvm.write_word(HDR_DP, (dp + name.len() as u32 + 1) as u16);
            }
        }
        self.entries += 1;
        if let Names::Nvm = self.names {
            nvm.update_byte(HDR_ENTRIES, self.entries as u8);
        }
        index as Value
    }

    /// Copies the name of entry `index` into `out`. Returns `false` for a
    /// dead index.
    pub fn name<N: NvmStore>(&self, nvm: &N, index: Value, out: &mut Vec<u8>) -> bool {
        let Ok(i) = usize::try_from(index) else {
            return false;
        };
        if i >= self.entries {
            return false;
        }
        match &self.names {
            Names::Ram(heap) => out.extend_from_slice(&heap[i]),
            Names::Nvm => {
                let mut at = u32::from(nvm.read_word(Self::entry_addr(i)));
                loop {
                    let b = nvm.read_byte(at);
                    if b == 0 {
                        break;
                    }
                    out.push(b);
                    at += 1;
                }
            }
        }
        true
    }

    /// Forgets every entry at or above `index`, reclaiming its name bytes.
    pub fn forget<N: NvmStore>(&mut self, nvm: &mut N, index: Value) {
        let Ok(keep) = usize::try_from(index) else {
            return;
        };
        if keep >= self.entries {
            return;
        }
        match &mut self.names {
            Names::Ram(heap) => heap.truncate(keep),
            Names::Nvm => {
                let dp = nvm.read_word(Self::entry_addr(keep));
                nvm.write_word(HDR_DP, dp);
                nvm.update_byte(HDR_ENTRIES, keep as u8);
            }
        }
        self.entries = keep;
    }

    /// Writes `value` into entry `index`'s persistent value cell.
    ///
    /// A no-op in the RAM variant (there is nothing durable to update).
    /// Persisted cells are 16-bit; the value round-trips through `i16`.
    pub fn persist_value<N: NvmStore>(&mut self, nvm: &mut N, index: Value, value: Value) {
        let Ok(i) = usize::try_from(index) else {
            return;
        };
        if i >= self.entries {
            return;
        }
        if let Names::Nvm = self.names {
            nvm.write_word(Self::entry_addr(i) + 2, value as i16 as u16);
        }
    }

    /// Name-heap bytes in use and the entry count.
    #[must_use]
    pub fn stats<N: NvmStore>(&self, nvm: &N) -> (Value, Value) {
        let bytes = match &self.names {
            Names::Ram(heap) => heap.iter().map(|n| n.len() + 1).sum::<usize>() as Value,
            Names::Nvm => {
                Value::from(nvm.read_word(HDR_DP)) - Self::heap_start(self.limit) as Value
            }
        };
        (bytes, self.entries as Value)
    }

    fn name_matches<N: NvmStore>(&self, nvm: &N, i: usize, name: &[u8]) -> bool {
        match &self.names {
            Names::Ram(heap) => &*heap[i] == name,
            Names::Nvm => {
                let at = u32::from(nvm.read_word(Self::entry_addr(i)));
                for (k, &b) in name.iter().enumerate() {
                    if nvm.read_byte(at + k as u32) != b {
                        return false;
                    }
                }
                nvm.read_byte(at + name.len() as u32) == 0
            }
        }
    }

    fn entry_addr(i: usize) -> u32 {
        ENTRIES_AT + ENTRY_SIZE * i as u32
    }

    fn heap_start(limit: usize) -> u16 {
        (ENTRIES_AT + ENTRY_SIZE * limit as u32) as u16
    }
}
