// Copyright 2026 the Script Shell Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(missing_docs, reason = "integration test crate")]

use script_shell::host::{BufferConsole, EmptyRom, NoNvm, NullIo};
use script_shell::shell::{Config, Extension, FaultKind, Shell};
use script_shell::space::Region;
use script_shell::value::Value;

type TestShell = Shell<BufferConsole, NullIo, EmptyRom, NoNvm>;

fn shell() -> TestShell {
    Shell::new(
        BufferConsole::new(),
        NullIo::new(),
        EmptyRom,
        NoNvm,
        Config::default(),
    )
}

fn advance(ip: Value, by: u32) -> Value {
    let (region, local) = Region::decode(ip);
    region.encode(local + by)
}

/// A hook with two extended ops: `_D` doubles the top of stack, `_R` pops a
/// script pointer and runs it (re-entering the interpreter).
struct BoardExt {
    traps: u32,
}

impl Extension<BufferConsole, NullIo, EmptyRom, NoNvm> for BoardExt {
    fn trap(&mut self, shell: &mut TestShell, ip: Value) -> Option<Value> {
        self.traps += 1;
        match shell.script_byte(ip) {
            b'D' => {
                let v = shell.pop();
                shell.push(v.wrapping_mul(2));
                Some(advance(ip, 1))
            }
            b'R' => {
                let script = shell.pop();
                shell.execute_script_with(self, script).ok()?;
                Some(advance(ip, 1))
            }
            _ => None,
        }
    }
}

#[test]
fn trap_consumes_suffix_and_resumes() {
    let mut sh = shell();
    let mut ext = BoardExt { traps: 0 };
    sh.execute_line_with(&mut ext, b"5 _D 1 +").unwrap();
    assert_eq!(sh.stack_values(), [11]);
    assert_eq!(ext.traps, 1);
}

#[test]
fn trap_can_reenter_the_interpreter() {
    let mut sh = shell();
    let mut ext = BoardExt { traps: 0 };
    sh.execute_line_with(&mut ext, b"40 { 2 + } _R").unwrap();
    assert_eq!(sh.stack_values(), [42]);
}

#[test]
fn trap_rejection_aborts_at_the_trap() {
    let mut sh = shell();
    let mut ext = BoardExt { traps: 0 };
    let fault = sh.execute_line_with(&mut ext, b"1 _Z 2").unwrap_err();
    assert_eq!(fault.kind, FaultKind::TrapRejected);
    assert_eq!(sh.stack_values(), [1]);
}

#[test]
fn default_extension_rejects_traps() {
    let mut sh = shell();
    let fault = sh.execute_line(b"_D").unwrap_err();
    assert_eq!(fault.kind, FaultKind::TrapRejected);
}

#[test]
fn failure_inside_trap_subscript_propagates() {
    let mut sh = shell();
    let mut ext = BoardExt { traps: 0 };
    let fault = sh.execute_line_with(&mut ext, b"{ Q } _R").unwrap_err();
    assert_eq!(fault.kind, FaultKind::TrapRejected);
}

// --- arena lifecycle (RAM variant) ---

#[test]
fn copied_blocks_outlive_their_line() {
    let mut sh = shell();
    sh.execute_line(b"`sq `sq { u * } ;").unwrap();
    sh.execute_line(b"(noise line to churn the arena)").unwrap();
    sh.console().take_output();
    sh.execute_line(b"9 `sq :").unwrap();
    assert_eq!(sh.stack_values(), [81]);
}

#[test]
fn free_returns_a_block_to_the_arena() {
    let mut sh = shell();
    sh.execute_line(b"`tmp `tmp { 1 + } ;").unwrap();
    sh.execute_line(b"`tmp @ f").unwrap();
    // The freed block's storage is reused by the next definition.
    sh.execute_line(b"`gone `gone { 2 + } ;").unwrap();
    sh.execute_line(b"5 `gone :").unwrap();
    assert_eq!(sh.stack_values(), [7]);
}

// --- error surfaces ---

#[test]
fn rom_failures_skip_the_caret_dump() {
    const ROM: &[u8] = b"\x001 Q \0";
    let mut sh: Shell<BufferConsole, NullIo, &[u8], NoNvm> = Shell::new(
        BufferConsole::new(),
        NullIo::new(),
        ROM,
        NoNvm,
        Config::default(),
    );
    sh.set_trace(true);
    sh.push(Region::Rom.encode(1));
    let fault = sh.execute_line(b"x").unwrap_err();
    assert_eq!(fault.kind, FaultKind::UnknownOp(b'Q'));
    assert_eq!(fault.location().0, Region::Rom);
    let out = sh.console().take_output();
    let text = std::str::from_utf8(&out).unwrap();
    assert!(!text.contains("^--?"), "got: {text:?}");
}

#[test]
fn unmatched_delimiters_fail_at_the_opener() {
    let mut sh = shell();
    let fault = sh.execute_line(b"1 2 { 3").unwrap_err();
    assert_eq!(fault.kind, FaultKind::UnmatchedBlock);
    let fault = sh.execute_line(b"(oops").unwrap_err();
    assert_eq!(fault.kind, FaultKind::UnmatchedString);
}

#[test]
fn fault_formats_with_location() {
    let mut sh = shell();
    let fault = sh.execute_line(b"Q").unwrap_err();
    let text = format!("{fault}");
    assert!(text.starts_with("fault at D:"), "got: {text}");
    assert!(text.contains("unknown op 'Q'"), "got: {text}");
}

// --- trace ---

#[test]
fn trace_lines_show_full_names_when_configured() {
    let mut sh: TestShell = Shell::new(
        BufferConsole::new(),
        NullIo::new(),
        EmptyRom,
        NoNvm,
        Config {
            full_op_names: true,
            ..Config::default()
        },
    );
    sh.set_trace(true);
    sh.execute_line(b"1 2 +").unwrap();
    let out = sh.console().take_output();
    let text = std::str::from_utf8(&out).unwrap();
    assert!(text.contains(":add:"), "got: {text}");
    assert!(text.contains(":D:"), "got: {text}");
}

#[test]
fn trace_toggle_opcode_flips_tracing() {
    let mut sh = shell();
    sh.execute_line(b"Z").unwrap();
    assert!(sh.trace());
    sh.console().take_output();
    sh.execute_line(b"Z").unwrap();
    assert!(!sh.trace());
}
