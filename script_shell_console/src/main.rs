// Copyright 2026 the Script Shell Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![doc = "Interactive console for `script_shell`.\n\n\
          A std-only line REPL over stdin/stdout with a simulated board:\n\
          pins live in a JSON map, the clock is wall time, and the\n\
          dictionary persists to an NVM image file between sessions.\n"]

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use script_shell::host::{Console, EmptyRom, HostIo, PinMode, RamNvm};
use script_shell::shell::{Config, Shell};

const NVM_SIZE: usize = 1024;

/// Initial simulated pin state, loaded from `--pins FILE`.
#[derive(Debug, Default, Deserialize)]
struct PinMap {
    #[serde(default)]
    digital: std::collections::BTreeMap<String, bool>,
    #[serde(default)]
    analog: std::collections::BTreeMap<String, i32>,
}

struct StdConsole {
    pending: VecDeque<u8>,
    out: io::Stdout,
}

impl StdConsole {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            out: io::stdout(),
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }
}

impl Console for StdConsole {
    fn read(&mut self) -> Option<u8> {
        self.pending.pop_front()
    }

    fn write_byte(&mut self, b: u8) {
        let _ = self.out.write_all(&[b]);
        if b == b'\n' {
            let _ = self.out.flush();
        }
    }
}

struct SimBoard {
    digital: std::collections::BTreeMap<i32, bool>,
    analog: std::collections::BTreeMap<i32, i32>,
    modes: std::collections::BTreeMap<i32, PinMode>,
    epoch: Instant,
    verbose: bool,
}

impl SimBoard {
    fn new(pins: PinMap, verbose: bool) -> Result<Self> {
        let mut digital = std::collections::BTreeMap::new();
        for (pin, level) in pins.digital {
            digital.insert(parse_pin(&pin)?, level);
        }
        let mut analog = std::collections::BTreeMap::new();
        for (pin, value) in pins.analog {
            analog.insert(parse_pin(&pin)?, value);
        }
        Ok(Self {
            digital,
            analog,
            modes: std::collections::BTreeMap::new(),
            epoch: Instant::now(),
            verbose,
        })
    }
}

fn parse_pin(s: &str) -> Result<i32> {
    s.parse::<i32>()
        .with_context(|| format!("invalid pin number '{s}' in pin map"))
}

impl HostIo for SimBoard {
    fn digital_read(&mut self, pin: i32) -> bool {
        self.digital.get(&pin).copied().unwrap_or(false)
    }

    fn digital_write(&mut self, pin: i32, high: bool) {
        if self.verbose {
            eprintln!("[pin {pin} <- {}]", if high { "HIGH" } else { "LOW" });
        }
        self.digital.insert(pin, high);
    }

    fn pin_mode(&mut self, pin: i32, mode: PinMode) {
        self.modes.insert(pin, mode);
    }

    fn analog_read(&mut self, pin: i32) -> i32 {
        self.analog.get(&pin).copied().unwrap_or(0)
    }

    fn analog_write(&mut self, pin: i32, value: i32) {
        if self.verbose {
            eprintln!("[pin {pin} <- {value}]");
        }
        self.analog.insert(pin, value);
    }

    fn delay(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    fn millis(&mut self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn yield_now(&mut self) {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}

#[derive(Debug, Default)]
struct Args {
    trace: bool,
    verbose: bool,
    nvm_path: Option<PathBuf>,
    pins_path: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--trace" => args.trace = true,
            "--verbose" => args.verbose = true,
            "--nvm" => {
                let path = it.next().context("--nvm needs a file path")?;
                args.nvm_path = Some(PathBuf::from(path));
            }
            "--pins" => {
                let path = it.next().context("--pins needs a file path")?;
                args.pins_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => bail!("unknown argument '{other}' (try --help)"),
        }
    }
    Ok(args)
}

fn print_usage() {
    println!("usage: script_shell_console [--trace] [--verbose] [--nvm FILE] [--pins FILE]");
    println!();
    println!("  --trace     start with instruction tracing on");
    println!("  --verbose   log simulated pin writes to stderr");
    println!("  --nvm FILE  persist the dictionary to an NVM image file");
    println!("  --pins FILE JSON pin map, e.g. {{\"digital\":{{\"13\":true}}}}");
}

fn load_nvm(path: Option<&PathBuf>) -> Result<RamNvm> {
    match path {
        Some(path) if path.exists() => {
            let mut bytes =
                fs::read(path).with_context(|| format!("reading NVM image {}", path.display()))?;
            bytes.resize(NVM_SIZE, 0xff);
            Ok(RamNvm::from_bytes(bytes))
        }
        _ => Ok(RamNvm::new(NVM_SIZE)),
    }
}

fn load_pins(path: Option<&PathBuf>) -> Result<PinMap> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading pin map {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing pin map {}", path.display()))
        }
        None => Ok(PinMap::default()),
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let pins = load_pins(args.pins_path.as_ref())?;
    let nvm = load_nvm(args.nvm_path.as_ref())?;
    let board = SimBoard::new(pins, args.verbose)?;

    let mut shell = Shell::new(
        StdConsole::new(),
        board,
        EmptyRom,
        nvm,
        Config {
            full_op_names: true,
            ..Config::default()
        },
    );
    shell.set_trace(args.trace);

    println!("script shell ({} entries persisted; :quit to exit)", shell.dict_entries());

    let stdin = io::stdin();
    let mut buf = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let trimmed = line.trim_end_matches('\r');
        if trimmed == ":quit" {
            break;
        }
        buf.clear();
        buf.extend_from_slice(trimmed.as_bytes());
        buf.push(b'\n');
        shell.console().feed(&buf);

        let mut script = Vec::new();
        if !shell.read_line(&mut script) {
            continue;
        }
        match shell.execute_line(&script) {
            Ok(()) => {}
            Err(fault) => eprintln!("?{fault}"),
        }
    }

    if let Some(path) = args.nvm_path.as_ref() {
        let nvm = shell.into_nvm();
        fs::write(path, nvm.bytes())
            .with_context(|| format!("writing NVM image {}", path.display()))?;
    }
    Ok(())
}
