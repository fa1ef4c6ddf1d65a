// Copyright 2026 the Script Shell Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `script_shell`: an embeddable, character-coded concatenative script
//! interpreter.
//!
//! Every printable character is an instruction, so command lines and stored
//! scripts can be typed directly on a serial console. Scripts are
//! NUL-terminated byte sequences: literal numbers are pushed, single
//! characters dispatch built-in operations, and `{`…`}` captures code blocks
//! whose start address is pushed as a plain integer.
//!
//! A script pointer is a tagged [`Value`](value::Value): negative values name
//! read-only program memory, values at or above [`NVM_BASE`](space::NVM_BASE)
//! name persistent byte storage, and everything else names the interpreter's
//! own data arena. The interpreter is `no_std` + `alloc` and talks to its
//! surroundings only through the collaborator traits in [`host`].
//!
//! ## Example
//!
//! ```
//! use script_shell::host::{BufferConsole, EmptyRom, NoNvm, NullIo};
//! use script_shell::shell::{Config, Shell};
//!
//! let mut shell = Shell::new(
//!     BufferConsole::new(),
//!     NullIo::new(),
//!     EmptyRom,
//!     NoNvm,
//!     Config::default(),
//! );
//!
//! shell.execute_line(b"1 2 3 +.").unwrap();
//! assert_eq!(shell.console().take_output(), b"5 ");
//! assert_eq!(shell.pop(), 1);
//! ```

#![no_std]

extern crate alloc;

pub(crate) mod arena;
pub mod dict;
pub mod host;
pub mod ops;
pub mod shell;
pub mod space;
pub mod stack;
pub mod value;
