// Copyright 2026 the Script Shell Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator traits between the shell and its host.
//!
//! The interpreter core performs no I/O of its own. Everything it needs
//! from the outside world comes through four traits:
//!
//! - [`Console`]: the character stream the shell is driven over.
//! - [`HostIo`]: physical I/O and timing primitives, invoked by opcode.
//! - [`RomStore`]: read-only program memory holding stored scripts.
//! - [`NvmStore`]: byte-addressable persistent memory for the dictionary.
//!
//! Null/buffer implementations for all four ship here so embedders and
//! tests can start from something that compiles.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::value::Value;

/// The character stream a shell instance is driven over.
///
/// Only `read` and `write_byte` touch the transport; the printing helpers
/// are provided on top so the core never formats through `core::fmt`.
pub trait Console {
    /// Non-blocking read of one byte; `None` when the stream is empty.
    fn read(&mut self) -> Option<u8>;

    /// Writes one byte to the stream.
    fn write_byte(&mut self, b: u8);

    /// Writes a byte string.
    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Writes a line terminator.
    fn newline(&mut self) {
        self.write_byte(b'\n');
    }

    /// Prints `v` in `base` (10, 16, 2, or 8).
    ///
    /// Base 10 prints signed decimal; the other bases print the two's
    /// complement bit pattern with a `0x`, `0b`, or `0` prefix.
    fn print_value(&mut self, v: Value, base: u32) {
        let mut buf = [0u8; 34];
        let mut at = buf.len();
        match base {
            16 | 2 | 8 => {
                let mut rest = v as u32;
                loop {
                    let digit = (rest % base) as u8;
                    at -= 1;
                    buf[at] = if digit < 10 {
                        b'0' + digit
                    } else {
                        b'a' + digit - 10
                    };
                    rest /= base;
                    if rest == 0 {
                        break;
                    }
                }
                match base {
                    16 => self.write_bytes(b"0x"),
                    2 => self.write_bytes(b"0b"),
                    _ => self.write_byte(b'0'),
                }
            }
            _ => {
                let mut rest = v.unsigned_abs();
                loop {
                    at -= 1;
                    buf[at] = b'0' + (rest % 10) as u8;
                    rest /= 10;
                    if rest == 0 {
                        break;
                    }
                }
                if v < 0 {
                    at -= 1;
                    buf[at] = b'-';
                }
            }
        }
        let digits = buf.len() - at;
        for i in 0..digits {
            self.write_byte(buf[at + i]);
        }
    }
}

/// A console over in-memory buffers, for tests and headless embedding.
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferConsole {
    /// Creates an empty buffer console.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes for the shell to read.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Everything the shell has written so far.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Drains and returns the captured output.
    pub fn take_output(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.output)
    }
}

impl Console for BufferConsole {
    fn read(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_byte(&mut self, b: u8) {
        self.output.push(b);
    }
}

/// Pin direction for [`HostIo::pin_mode`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinMode {
    /// High-impedance input.
    Input,
    /// Input with the internal pull-up enabled.
    InputPullup,
    /// Driven output.
    Output,
}

/// Physical I/O and timing primitives.
///
/// The shell invokes these by opcode and assigns them no hardware
/// semantics of its own. `delay` and `yield_now` are the cooperative
/// suspension points; a host with other tasks runs them there.
pub trait HostIo {
    /// Reads a digital pin.
    fn digital_read(&mut self, pin: Value) -> bool;

    /// Drives a digital pin.
    fn digital_write(&mut self, pin: Value, high: bool);

    /// Configures a pin.
    fn pin_mode(&mut self, pin: Value, mode: PinMode);

    /// Samples an analog pin.
    fn analog_read(&mut self, pin: Value) -> Value;

    /// Writes an analog (PWM) value.
    fn analog_write(&mut self, pin: Value, value: Value);

    /// Blocks for `ms` milliseconds.
    fn delay(&mut self, ms: u32);

    /// Monotonic millisecond clock.
    fn millis(&mut self) -> u32;

    /// Yields one cooperative scheduling tick.
    fn yield_now(&mut self);
}

/// A host with no hardware: reads are zero, writes vanish, and the clock
/// advances one millisecond per query so timed scripts still terminate.
#[derive(Debug, Default)]
pub struct NullIo {
    now: u32,
}

impl NullIo {
    /// Creates a null host at clock zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostIo for NullIo {
    fn digital_read(&mut self, _pin: Value) -> bool {
        false
    }

    fn digital_write(&mut self, _pin: Value, _high: bool) {}

    fn pin_mode(&mut self, _pin: Value, _mode: PinMode) {}

    fn analog_read(&mut self, _pin: Value) -> Value {
        0
    }

    fn analog_write(&mut self, _pin: Value, _value: Value) {}

    fn delay(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }

    fn millis(&mut self) -> u32 {
        self.now = self.now.wrapping_add(1);
        self.now
    }

    fn yield_now(&mut self) {}
}

/// Read-only program memory.
pub trait RomStore {
    /// Byte at a local ROM offset; 0 (the script terminator) out of range.
    fn read_byte(&self, local: u32) -> u8;
}

/// ROM with no contents.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmptyRom;

impl RomStore for EmptyRom {
    fn read_byte(&self, _local: u32) -> u8 {
        0
    }
}

impl RomStore for [u8] {
    fn read_byte(&self, local: u32) -> u8 {
        self.get(local as usize).copied().unwrap_or(0)
    }
}

impl<T: RomStore + ?Sized> RomStore for &T {
    fn read_byte(&self, local: u32) -> u8 {
        (**self).read_byte(local)
    }
}

/// Byte-addressable persistent memory.
///
/// Addresses are local (untagged). Word values are 16-bit little-endian.
/// The store is expected to make single-cell writes durable before they
/// are observable; erase/write cycling is its concern, not the shell's.
pub trait NvmStore {
    /// Whether persistent memory is actually backing this store.
    ///
    /// The shell keeps its dictionary in RAM when this is `false`.
    fn is_present(&self) -> bool {
        true
    }

    /// Byte at `addr`; erased cells read 0xFF.
    fn read_byte(&self, addr: u32) -> u8;

    /// Durably writes one byte.
    fn update_byte(&mut self, addr: u32, val: u8);

    /// Little-endian 16-bit read.
    fn read_word(&self, addr: u32) -> u16 {
        u16::from(self.read_byte(addr)) | (u16::from(self.read_byte(addr + 1)) << 8)
    }

    /// Little-endian 16-bit durable write.
    fn write_word(&mut self, addr: u32, val: u16) {
        self.update_byte(addr, (val & 0xff) as u8);
        self.update_byte(addr + 1, (val >> 8) as u8);
    }

    /// Durably writes a block.
    fn update_block(&mut self, src: &[u8], dst: u32) {
        for (i, &b) in src.iter().enumerate() {
            self.update_byte(dst + i as u32, b);
        }
    }
}

/// The absent store: erased reads, ignored writes, `is_present() == false`.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoNvm;

impl NvmStore for NoNvm {
    fn is_present(&self) -> bool {
        false
    }

    fn read_byte(&self, _addr: u32) -> u8 {
        0xff
    }

    fn update_byte(&mut self, _addr: u32, _val: u8) {}
}

/// A volatile NVM image, for tests and simulation.
///
/// Starts fully erased (0xFF). Out-of-range writes are ignored.
#[derive(Clone, Debug)]
pub struct RamNvm {
    bytes: Vec<u8>,
}

impl RamNvm {
    /// Creates an erased image of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            bytes: alloc::vec![0xff; size],
        }
    }

    /// Wraps an existing image.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The raw image.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl NvmStore for RamNvm {
    fn read_byte(&self, addr: u32) -> u8 {
        self.bytes.get(addr as usize).copied().unwrap_or(0xff)
    }

    fn update_byte(&mut self, addr: u32, val: u8) {
        if let Some(cell) = self.bytes.get_mut(addr as usize) {
            *cell = val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_console_round_trips() {
        let mut c = BufferConsole::new();
        c.feed(b"ab");
        assert_eq!(c.read(), Some(b'a'));
        assert_eq!(c.read(), Some(b'b'));
        assert_eq!(c.read(), None);
        c.write_bytes(b"out");
        assert_eq!(c.take_output(), b"out");
        assert!(c.output().is_empty());
    }

    #[test]
    fn print_value_bases() {
        let mut c = BufferConsole::new();
        c.print_value(-42, 10);
        c.write_byte(b' ');
        c.print_value(255, 16);
        c.write_byte(b' ');
        c.print_value(5, 2);
        c.write_byte(b' ');
        c.print_value(9, 8);
        assert_eq!(c.take_output(), b"-42 0xff 0b101 011");
    }

    #[test]
    fn ram_nvm_starts_erased() {
        let mut nvm = RamNvm::new(16);
        assert_eq!(nvm.read_word(0), 0xffff);
        nvm.write_word(0, 0x1234);
        assert_eq!(nvm.read_byte(0), 0x34);
        assert_eq!(nvm.read_byte(1), 0x12);
        assert_eq!(nvm.read_word(0), 0x1234);
    }
}
