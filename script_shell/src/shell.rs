// Copyright 2026 the Script Shell Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interpreter: tokenizer, opcode dispatch, and execution of scripts.
//!
//! [`Shell`] executes NUL-terminated scripts of printable characters. Each
//! execute call decodes the script pointer's region once and walks bytes
//! from there; `{` block captures push tagged pointers in the same region,
//! and control opcodes recurse into the same executor for their
//! sub-scripts.
//!
//! Failures are positions, not exceptions: an execute call either succeeds
//! or reports the tagged address of the offending byte, and inner failures
//! propagate through enclosing blocks unchanged. Most runtime slips are
//! deliberately silent — underflow reads 0, out-of-range variables are
//! no-ops — because the shell is meant to be driven interactively; only
//! structural errors abort.

use alloc::vec::Vec;
use core::fmt;

use crate::arena::DataArena;
use crate::dict::{Dict, VarTable};
use crate::host::{Console, HostIo, NvmStore, PinMode, RomStore};
use crate::ops;
use crate::space::Region;
use crate::stack::ParamStack;
use crate::value::{FALSE, TRUE, Value, as_bool, is_truthy};

/// Construction parameters for a [`Shell`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum observable stack depth.
    pub stack_max: usize,
    /// Number of variable cells (and dictionary capacity).
    pub var_max: usize,
    /// Show full operation names in trace output instead of the opcode
    /// character.
    pub full_op_names: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_max: 16,
            var_max: 32,
            full_op_names: false,
        }
    }
}

/// Why a script aborted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// An opcode neither the shell nor the trap hook recognized.
    UnknownOp(u8),
    /// A `{` without its matching `}`.
    UnmatchedBlock,
    /// A `(` without its matching `)`.
    UnmatchedString,
    /// The trap hook declined the script.
    TrapRejected,
    /// The data arena could not hold the script.
    OutOfMemory,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOp(op) => {
                if op.is_ascii_graphic() {
                    write!(f, "unknown op '{}'", *op as char)
                } else {
                    write!(f, "unknown op {op:#04x}")
                }
            }
            Self::UnmatchedBlock => write!(f, "unmatched '{{'"),
            Self::UnmatchedString => write!(f, "unmatched '('"),
            Self::TrapRejected => write!(f, "trap rejected"),
            Self::OutOfMemory => write!(f, "out of script memory"),
        }
    }
}

impl core::error::Error for FaultKind {}

/// A failed execute call: the failing position and what went wrong.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    /// Tagged address of the offending byte.
    pub at: Value,
    /// Fault kind.
    pub kind: FaultKind,
}

impl Fault {
    /// Region and local offset of the failing position.
    #[must_use]
    pub fn location(&self) -> (Region, u32) {
        Region::decode(self.at)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (region, local) = self.location();
        write!(f, "fault at {}:{local}: {}", region.letter() as char, self.kind)
    }
}

impl core::error::Error for Fault {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Host-extension hook behind the `_` opcode.
///
/// When the shell meets `_` it hands the hook the tagged address of the
/// byte after it. The hook consumes as much of the remaining script as it
/// wants — reading bytes through [`Shell::script_byte`], possibly
/// re-entering [`Shell::execute_script_with`] with itself for sub-scripts —
/// and returns the address to resume at, or `None` to abort. The shell
/// never interprets what the hook consumed.
pub trait Extension<C, I, R, N> {
    /// Handles one trap. Resume addresses must stay within the trapping
    /// script's region.
    fn trap(&mut self, shell: &mut Shell<C, I, R, N>, ip: Value) -> Option<Value>;
}

/// The default extension: reject every trap.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTrap;

impl<C, I, R, N> Extension<C, I, R, N> for NoTrap {
    fn trap(&mut self, _shell: &mut Shell<C, I, R, N>, _ip: Value) -> Option<Value> {
        None
    }
}

/// A script interpreter bound to its console and board collaborators.
pub struct Shell<C, I, R, N> {
    console: C,
    io: I,
    rom: R,
    nvm: N,
    stack: ParamStack,
    vars: VarTable,
    dict: Dict,
    arena: DataArena,
    trace: bool,
    full_names: bool,
    print_base: u32,
    cycles: u32,
    block_len: u32,
}

impl<C, I, R, N> fmt::Debug for Shell<C, I, R, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell")
            .field("depth", &self.stack.depth())
            .field("entries", &self.dict.entries())
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

impl<C, I, R, N> Shell<C, I, R, N>
where
    C: Console,
    I: HostIo,
    R: RomStore,
    N: NvmStore,
{
    /// Creates a shell, loading any dictionary persisted in `nvm`.
    pub fn new(console: C, io: I, rom: R, mut nvm: N, config: Config) -> Self {
        let mut vars = VarTable::new(config.var_max);
        let dict = Dict::open(config.var_max, &mut nvm, &mut vars);
        Self {
            console,
            io,
            rom,
            nvm,
            stack: ParamStack::new(config.stack_max),
            vars,
            dict,
            arena: DataArena::new(),
            trace: false,
            full_names: config.full_op_names,
            print_base: 10,
            cycles: 0,
            block_len: 0,
        }
    }

    /// The console collaborator.
    pub fn console(&mut self) -> &mut C {
        &mut self.console
    }

    /// The host I/O collaborator.
    pub fn io(&mut self) -> &mut I {
        &mut self.io
    }

    /// Tears the shell down, returning the persistent store.
    ///
    /// Lets an embedder flush or snapshot the NVM image after a session.
    pub fn into_nvm(self) -> N {
        self.nvm
    }

    /// Enables or disables trace output.
    pub fn set_trace(&mut self, on: bool) {
        self.trace = on;
    }

    /// Current trace mode.
    #[must_use]
    pub fn trace(&self) -> bool {
        self.trace
    }

    /// Opcodes executed since the last top-level line began.
    #[must_use]
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Observable stack depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Top of stack.
    #[must_use]
    pub fn tos(&self) -> Value {
        self.stack.tos()
    }

    /// Pushes a value for the next script to consume.
    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    /// Pops a result off the stack; 0 when empty.
    pub fn pop(&mut self) -> Value {
        self.stack.pop()
    }

    /// The live stack, bottom to top.
    #[must_use]
    pub fn stack_values(&self) -> Vec<Value> {
        self.stack.iter().collect()
    }

    /// Variable cell `addr`, or 0 out of range.
    #[must_use]
    pub fn var(&self, addr: Value) -> Value {
        self.vars.read(addr)
    }

    /// Number of dictionary entries.
    #[must_use]
    pub fn dict_entries(&self) -> usize {
        self.dict.entries()
    }

    /// Seeds a dictionary entry with a plain value.
    ///
    /// Returns the entry index, or −1 when the dictionary is full.
    pub fn def(&mut self, name: &str, value: Value) -> Value {
        let index = self.dict.lookup_or_insert(&mut self.nvm, name.as_bytes());
        if index >= 0 {
            self.vars.write(index, value);
        }
        index
    }

    /// Seeds a dictionary entry with a tagged script pointer, so `` `name: ``
    /// calls it.
    pub fn def_script(&mut self, name: &str, script: Value) -> Value {
        self.def(name, script)
    }

    /// Byte at a tagged script address, for trap hooks.
    #[must_use]
    pub fn script_byte(&self, ptr: Value) -> u8 {
        let (region, local) = Region::decode(ptr);
        self.byte(region, local)
    }

    /// Non-blocking line assembler.
    ///
    /// Drains available console input into `buf`. On a newline the buffer
    /// is NUL-terminated and `true` is returned; the caller owns clearing
    /// the buffer between lines.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> bool {
        while let Some(c) = self.console.read() {
            buf.push(c);
            if c == b'\n' {
                buf.push(0);
                return true;
            }
        }
        false
    }

    /// Executes one command line.
    pub fn execute_line(&mut self, line: &[u8]) -> Result<(), Fault> {
        self.execute_line_with(&mut NoTrap, line)
    }

    /// Executes one command line with a trap extension in play.
    ///
    /// The line is interned into the data arena for the duration of the
    /// call. With trace on, a failure prints the line again with a caret
    /// under the failing position.
    pub fn execute_line_with<X>(&mut self, ext: &mut X, line: &[u8]) -> Result<(), Fault>
    where
        X: Extension<C, I, R, N> + ?Sized,
    {
        self.cycles = 0;
        let Some(start) = self.arena.intern(line) else {
            return Err(Fault {
                at: 0,
                kind: FaultKind::OutOfMemory,
            });
        };
        let res = self.exec(ext, Region::Data.encode(start));
        if let Err(fault) = res {
            self.report(line, start, fault);
        }
        self.arena.free(start);
        if res.is_ok() {
            self.cycles = 0;
        }
        res
    }

    /// Executes a script stored in ROM (a negative tagged pointer).
    pub fn execute_rom(&mut self, script: Value) -> Result<(), Fault> {
        self.execute_rom_with(&mut NoTrap, script)
    }

    /// Executes a ROM script with a trap extension in play.
    pub fn execute_rom_with<X>(&mut self, ext: &mut X, script: Value) -> Result<(), Fault>
    where
        X: Extension<C, I, R, N> + ?Sized,
    {
        self.cycles = 0;
        let res = self.exec(ext, script);
        if res.is_ok() {
            self.cycles = 0;
        }
        res
    }

    /// Executes a sub-script at any tagged address.
    ///
    /// This is the re-entry point for trap hooks; the cycle counter keeps
    /// running.
    pub fn execute_script_with<X>(&mut self, ext: &mut X, script: Value) -> Result<(), Fault>
    where
        X: Extension<C, I, R, N> + ?Sized,
    {
        self.exec(ext, script)
    }

    fn byte(&self, region: Region, local: u32) -> u8 {
        match region {
            Region::Data => self.arena.byte(local),
            Region::Rom => self.rom.read_byte(local),
            Region::Nvm => self.nvm.read_byte(local),
        }
    }

    /// Runs one script, restoring the caller's frame pointer on every exit.
    fn exec<X>(&mut self, ext: &mut X, script: Value) -> Result<(), Fault>
    where
        X: Extension<C, I, R, N> + ?Sized,
    {
        let (region, start) = Region::decode(script);
        let saved_frame = self.stack.frame();
        let res = self.run(ext, region, start);
        self.stack.set_frame(saved_frame);
        res
    }

    #[allow(clippy::too_many_lines, reason = "single-pass tokenizer")]
    fn run<X>(&mut self, ext: &mut X, region: Region, start: u32) -> Result<(), Fault>
    where
        X: Extension<C, I, R, N> + ?Sized,
    {
        let mut ip = start;
        let mut neg = false;
        let mut base: u32 = 10;

        loop {
            let mut c = self.byte(region, ip);
            ip += 1;
            if c == 0 || c == b'}' {
                return Ok(());
            }

            // Negative-number escape: `-` binds to a following decimal
            // digit, otherwise it is the subtraction opcode.
            if c == b'-' {
                let next = self.byte(region, ip);
                if ops::is_digit(next, 10) {
                    neg = true;
                    c = next;
                    ip += 1;
                }
            } else if c == b'0' {
                let next = self.byte(region, ip);
                if next == b'x' || next == b'b' {
                    base = if next == b'x' { 16 } else { 2 };
                    ip += 1;
                    c = self.byte(region, ip);
                    ip += 1;
                }
            }

            if ops::is_digit(c, base) {
                let mut val: Value = 0;
                while ops::is_digit(c, base) {
                    val = val
                        .wrapping_mul(base as Value)
                        .wrapping_add(ops::digit_value(c, base));
                    c = self.byte(region, ip);
                    ip += 1;
                }
                if neg {
                    val = -val;
                    neg = false;
                }
                self.stack.push(val);
                base = 10;
                if c == 0 || c == b'}' {
                    return Ok(());
                }
            }

            // Newline only reads as `N` in the trace.
            if c == b'\n' {
                c = b'N';
            }

            if c == b' ' || c == b',' {
                continue;
            }

            self.cycles = self.cycles.wrapping_add(1);
            if self.trace {
                self.trace_line(region, ip - 1, c);
            }

            match c {
                b'\'' => {
                    let next = self.byte(region, ip);
                    if next != 0 {
                        self.stack.push(Value::from(next));
                        ip += 1;
                    }
                    continue;
                }
                b'`' => {
                    let mut name = Vec::new();
                    while ops::is_name_char(self.byte(region, ip)) {
                        name.push(self.byte(region, ip));
                        ip += 1;
                    }
                    // The first use of a name only defines it; lookups of an
                    // existing name (and the full-dictionary sentinel) push.
                    let known = self.dict.entries();
                    let index = self.dict.lookup_or_insert(&mut self.nvm, &name);
                    if self.dict.entries() == known {
                        self.stack.push(index);
                    }
                    continue;
                }
                b'{' => {
                    let open = ip - 1;
                    self.stack.push(region.encode(ip));
                    let mut depth = 1u32;
                    loop {
                        let b = self.byte(region, ip);
                        if b == 0 {
                            return Err(Fault {
                                at: region.encode(open),
                                kind: FaultKind::UnmatchedBlock,
                            });
                        }
                        ip += 1;
                        if b == b'{' {
                            depth += 1;
                        } else if b == b'}' {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                    }
                    self.block_len = ip - open - 2;
                    continue;
                }
                b'(' => {
                    let open = ip - 1;
                    let mut depth = 1u32;
                    loop {
                        let b = self.byte(region, ip);
                        if b == 0 {
                            return Err(Fault {
                                at: region.encode(open),
                                kind: FaultKind::UnmatchedString,
                            });
                        }
                        ip += 1;
                        if b == b'(' {
                            depth += 1;
                        } else if b == b')' {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        self.console.write_byte(b);
                    }
                    continue;
                }
                b'[' => {
                    // A nested marker falls through and fails as an
                    // unknown opcode.
                    if self.stack.set_marker() {
                        continue;
                    }
                }
                b']' => {
                    if self.stack.end_marker() {
                        continue;
                    }
                }
                b';' => {
                    let block = self.stack.pop();
                    let addr = self.stack.pop();
                    let (block_region, block_local) = Region::decode(block);
                    let stored = match block_region {
                        Region::Data => self
                            .arena
                            .copy_block(block_local, self.block_len as usize)
                            .map_or(0, |off| Region::Data.encode(off)),
                        Region::Rom | Region::Nvm => block,
                    };
                    self.cell_write(addr, stored);
                    continue;
                }
                _ => {}
            }

            match self.op(ext, c) {
                Ok(true) => {}
                Ok(false) => {
                    if c == ops::TRAP_OP {
                        let resume = ext.trap(self, region.encode(ip));
                        match resume.map(Region::decode) {
                            Some((r, local)) if r == region => ip = local,
                            _ => {
                                return Err(Fault {
                                    at: region.encode(ip - 1),
                                    kind: FaultKind::TrapRejected,
                                });
                            }
                        }
                    } else {
                        return Err(Fault {
                            at: region.encode(ip - 1),
                            kind: FaultKind::UnknownOp(c),
                        });
                    }
                }
                Err(fault) => return Err(fault),
            }
        }
    }

    /// Dispatches one opcode. `Ok(false)` means the opcode is unknown.
    #[allow(clippy::too_many_lines, reason = "character-indexed op catalog")]
    fn op<X>(&mut self, ext: &mut X, c: u8) -> Result<bool, Fault>
    where
        X: Extension<C, I, R, N> + ?Sized,
    {
        match c {
            // arithmetic
            b'+' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(x.wrapping_add(y));
            }
            b'-' => {
                let y = self.stack.pop();
                let x = self.stack.pop();
                self.stack.push(x.wrapping_sub(y));
            }
            b'*' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(x.wrapping_mul(y));
            }
            b'/' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(x.checked_div(y).unwrap_or(0));
            }
            b'%' => {
                let y = self.stack.pop();
                let x = self.stack.pop();
                self.stack.push(x.checked_rem(y).unwrap_or(0));
            }
            b'h' => {
                let z = self.stack.pop();
                let y = self.stack.pop();
                let x = self.stack.tos();
                let wide = i64::from(x) * i64::from(y);
                let scaled = if z == 0 { 0 } else { wide / i64::from(z) };
                self.stack.set_tos(scaled as Value);
            }
            b'n' => {
                let x = self.stack.tos();
                self.stack.set_tos(x.wrapping_neg());
            }

            // comparison
            b'=' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(as_bool(x == y));
            }
            b'#' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(as_bool(x != y));
            }
            b'<' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(as_bool(x < y));
            }
            b'>' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(as_bool(x > y));
            }
            b'F' => self.stack.push(FALSE),
            b'T' => self.stack.push(TRUE),

            // bitwise
            b'~' => {
                let x = self.stack.tos();
                self.stack.set_tos(!x);
            }
            b'&' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(x & y);
            }
            b'|' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(x | y);
            }
            b'^' => {
                let y = self.stack.pop();
                let x = self.stack.tos();
                self.stack.set_tos(x ^ y);
            }

            // memory
            b'@' => {
                let addr = self.stack.tos();
                let val = self.cell_read(addr);
                self.stack.set_tos(val);
            }
            b'!' => {
                let addr = self.stack.pop();
                let val = self.stack.pop();
                self.cell_write(addr, val);
            }

            // stack
            b'o' => self.stack.over(),
            b's' => self.stack.swap(),
            b'r' => self.stack.rot(),
            b'p' => self.stack.pick(),
            b'j' => {
                let d = self.stack.depth();
                self.stack.push(d as Value);
            }
            b'q' => self.stack.dup_if(),
            b'u' => self.stack.dup(),
            b'd' => self.stack.drop_top(),
            b'c' => self.stack.ndrop(),
            b'g' => {
                let n = self.stack.pop();
                self.stack.roll(n);
            }
            b'\\' => {
                let n = self.stack.pop();
                self.stack.frame_op(n);
            }
            b'$' => {
                let n = self.stack.tos();
                let addr = self.vars.len() as Value + self.stack.frame() as Value + n - 1;
                self.stack.set_tos(addr);
            }

            // control
            b'i' => {
                let script = self.stack.pop();
                let flag = self.stack.pop();
                if is_truthy(flag) {
                    self.exec(ext, script)?;
                }
            }
            b'e' => {
                let otherwise = self.stack.pop();
                let then = self.stack.pop();
                let flag = self.stack.pop();
                let script = if is_truthy(flag) { then } else { otherwise };
                self.exec(ext, script)?;
            }
            b'l' => {
                let script = self.stack.pop();
                let n = self.stack.pop();
                for _ in 0..n.max(0) {
                    self.exec(ext, script)?;
                }
            }
            b'w' => {
                let script = self.stack.pop();
                loop {
                    self.exec(ext, script)?;
                    if self.stack.pop() == 0 {
                        break;
                    }
                }
            }
            b'x' => {
                let script = self.stack.pop();
                self.exec(ext, script)?;
            }
            b':' => {
                let addr = self.stack.pop();
                let script = self.cell_read(addr);
                self.exec(ext, script)?;
            }
            b'y' => self.io.yield_now(),

            // stream i/o
            b'.' => {
                let v = self.stack.pop();
                let base = self.print_base;
                self.console.print_value(v, base);
                self.console.write_byte(b' ');
            }
            b'b' => {
                let b = self.stack.pop();
                self.print_base = match b {
                    16 | 2 | 8 => b as u32,
                    _ => 10,
                };
            }
            b'm' => self.console.newline(),
            b'v' => {
                let ch = self.stack.pop();
                self.console.write_byte(ch as u8);
            }
            b'k' => loop {
                if let Some(ch) = self.console.read() {
                    self.stack.push(Value::from(ch));
                    break;
                }
                self.io.yield_now();
            },
            b'K' => match self.console.read() {
                Some(ch) => {
                    self.stack.push(Value::from(ch));
                    self.stack.push(TRUE);
                }
                None => self.stack.push(0),
            },
            b'?' => {
                let addr = self.stack.pop();
                let val = self.cell_read(addr);
                let base = self.print_base;
                self.console.print_value(val, base);
                self.console.write_byte(b' ');
            }
            b't' => {
                let addr = self.stack.pop();
                let mut name = Vec::new();
                if self.dict.name(&self.nvm, addr, &mut name) {
                    self.console.write_bytes(&name);
                    self.stack.push(TRUE);
                } else {
                    self.stack.push(FALSE);
                }
            }
            b'S' => self.print_stack(),
            b'Z' => self.trace = !self.trace,

            // host primitives
            b'A' => {
                let pin = self.stack.tos();
                let sample = self.io.analog_read(pin);
                self.stack.set_tos(sample);
            }
            b'C' => {
                let pin = self.stack.pop();
                let level = self.io.digital_read(pin);
                self.io.digital_write(pin, !level);
            }
            b'D' => {
                let ms = self.stack.pop();
                self.io.delay(ms.max(0) as u32);
            }
            b'E' => {
                let ms = self.stack.pop();
                let t0 = self.stack.pop();
                let elapsed = self.io.millis().wrapping_sub(t0 as u32);
                self.stack.push(as_bool(elapsed >= ms.max(0) as u32));
            }
            b'H' => {
                let pin = self.stack.pop();
                self.io.digital_write(pin, true);
            }
            b'L' => {
                let pin = self.stack.pop();
                self.io.digital_write(pin, false);
            }
            b'W' => {
                let pin = self.stack.pop();
                let level = self.stack.pop();
                self.io.digital_write(pin, is_truthy(level));
            }
            b'I' => {
                let pin = self.stack.pop();
                self.io.pin_mode(pin, PinMode::Input);
            }
            b'U' => {
                let pin = self.stack.pop();
                self.io.pin_mode(pin, PinMode::InputPullup);
            }
            b'O' => {
                let pin = self.stack.pop();
                self.io.pin_mode(pin, PinMode::Output);
            }
            b'R' => {
                let pin = self.stack.pop();
                let level = self.io.digital_read(pin);
                self.stack.push(as_bool(level));
            }
            b'P' => {
                let pin = self.stack.pop();
                let duty = self.stack.pop();
                self.io.analog_write(pin, duty);
            }
            b'M' => {
                let now = self.io.millis();
                self.stack.push(now as Value);
            }
            b'X' => {
                let ms = self.stack.pop().max(0) as u32;
                let t0 = self.io.millis();
                while self.io.millis().wrapping_sub(t0) < ms {
                    self.io.yield_now();
                }
            }
            b'N' => {}

            // dictionary persistence
            b'z' => {
                let addr = self.stack.pop();
                let val = self.vars.read(addr);
                self.dict.persist_value(&mut self.nvm, addr, val);
            }
            b'a' => {
                let (bytes, entries) = self.dict.stats(&self.nvm);
                self.stack.push(bytes);
                self.stack.push(entries);
            }
            b'f' => {
                let v = self.stack.pop();
                if self.nvm.is_present() {
                    self.dict.forget(&mut self.nvm, v);
                } else {
                    let (r, local) = Region::decode(v);
                    if r == Region::Data && v > 0 {
                        self.arena.free(local);
                    }
                }
            }

            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Read through the combined cell space: variables first, then the
    /// frame window onto the live stack.
    fn cell_read(&self, addr: Value) -> Value {
        let vm = self.vars.len() as Value;
        if addr >= vm {
            self.stack.get((addr - vm) as usize)
        } else {
            self.vars.read(addr)
        }
    }

    fn cell_write(&mut self, addr: Value, val: Value) {
        let vm = self.vars.len() as Value;
        if addr >= vm {
            self.stack.set((addr - vm) as usize, val);
        } else {
            self.vars.write(addr, val);
        }
    }

    fn print_stack(&mut self) {
        let d = self.stack.depth();
        self.console.print_value(d as Value, 10);
        self.console.write_byte(b':');
        for i in 0..d {
            let v = self.stack.get(i);
            self.console.write_byte(b' ');
            self.console.print_value(v, 10);
        }
        self.console.newline();
    }

    fn trace_line(&mut self, region: Region, local: u32, c: u8) {
        self.console.print_value(self.cycles as Value, 10);
        self.console.write_byte(b':');
        self.console.write_byte(region.letter());
        self.console.write_byte(b':');
        self.console.print_value(local as Value, 10);
        self.console.write_byte(b':');
        match ops::name(c) {
            Some(full) if self.full_names => self.console.write_bytes(full.as_bytes()),
            _ => self.console.write_byte(c),
        }
        self.console.write_byte(b':');
        self.print_stack();
    }

    /// Caret dump for a failed top-level line, trace mode only.
    fn report(&mut self, line: &[u8], start: u32, fault: Fault) {
        if !self.trace {
            return;
        }
        let (region, local) = fault.location();
        if region != Region::Data || local < start || local > start + line.len() as u32 {
            return;
        }
        self.console.write_bytes(line);
        self.console.newline();
        for _ in 0..(local - start) {
            self.console.write_byte(b' ');
        }
        self.console.write_bytes(b"^--?");
        self.console.newline();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BufferConsole, EmptyRom, NoNvm, NullIo};

    fn shell() -> Shell<BufferConsole, NullIo, EmptyRom, NoNvm> {
        Shell::new(
            BufferConsole::new(),
            NullIo::new(),
            EmptyRom,
            NoNvm,
            Config::default(),
        )
    }

    #[test]
    fn literals_and_bases() {
        let mut sh = shell();
        sh.execute_line(b"12 -34 0xff 0b101").unwrap();
        assert_eq!(sh.stack_values(), [12, -34, 255, 5]);
    }

    #[test]
    fn arithmetic_net_effect() {
        let mut sh = shell();
        sh.execute_line(b"7 3 - 2 *").unwrap();
        assert_eq!(sh.stack_values(), [8]);
    }

    #[test]
    fn scale_widens_through_i64() {
        let mut sh = shell();
        sh.execute_line(b"100000 30000 1000 h").unwrap();
        assert_eq!(sh.stack_values(), [3_000_000]);
    }

    #[test]
    fn comparisons_are_canonical() {
        let mut sh = shell();
        sh.execute_line(b"1 2 < 2 1 < 5 5 =").unwrap();
        assert_eq!(sh.stack_values(), [-1, 0, -1]);
    }

    #[test]
    fn block_execute_round_trip() {
        let mut sh = shell();
        sh.execute_line(b"5 { 2 * } x").unwrap();
        assert_eq!(sh.stack_values(), [10]);
    }

    #[test]
    fn nested_blocks() {
        let mut sh = shell();
        sh.execute_line(b"T { { 3 } x } { 4 } e").unwrap();
        assert_eq!(sh.stack_values(), [3]);
    }

    #[test]
    fn unknown_op_reports_position() {
        let mut sh = shell();
        sh.set_trace(true);
        let fault = sh.execute_line(b"1 2 Q").unwrap_err();
        assert_eq!(fault.kind, FaultKind::UnknownOp(b'Q'));
        assert_eq!(fault.location().0, Region::Data);
        let out = sh.console().take_output();
        let text = core::str::from_utf8(&out).unwrap();
        // The caret lands under the `Q` at column 4.
        assert!(text.ends_with("1 2 Q\n    ^--?\n"), "got: {text:?}");
    }

    #[test]
    fn unmatched_block_fails_at_open() {
        let mut sh = shell();
        let fault = sh.execute_line(b"1 { 2 +").unwrap_err();
        assert_eq!(fault.kind, FaultKind::UnmatchedBlock);
    }

    #[test]
    fn frame_pointer_survives_inner_blocks() {
        let mut sh = shell();
        // The block sets its own frame; `$1` afterwards still addresses the
        // outer frame's first element.
        sh.execute_line(b"1 2 2\\ { 9 1\\ d } x $1 @").unwrap();
        assert_eq!(sh.stack_values(), [1, 2, 1]);
    }

    #[test]
    fn frame_pointer_restored_after_failure() {
        let mut sh = shell();
        let _ = sh.execute_line(b"1 2 2\\ { 9 1\\ Q } x").unwrap_err();
        assert_eq!(sh.stack.frame(), 0);
    }

    #[test]
    fn string_form_prints_interior() {
        let mut sh = shell();
        sh.execute_line(b"(a(b)c)").unwrap();
        assert_eq!(sh.console().take_output(), b"a(b)c");
    }

    #[test]
    fn char_literal_pushes_byte() {
        let mut sh = shell();
        sh.execute_line(b"'A 'b").unwrap();
        assert_eq!(sh.stack_values(), [65, 98]);
    }

    #[test]
    fn cycle_counter_skips_whitespace() {
        let mut sh = shell();
        sh.execute_line(b"1 2 , +  u").unwrap();
        // `+` and `u` execute; literals and separators do not count.
        assert_eq!(sh.cycles(), 0); // reset after success
        sh.execute_line(b"1 2 Q").unwrap_err();
        assert_eq!(sh.cycles(), 1); // only the failing op was counted
    }
}
