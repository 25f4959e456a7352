#![doc = r#"
sbc6502 library crate.

This crate exposes the emulator core modules for use by the binary and by
tests.

Modules:
- acia: MC6850-style ACIA register model (keyboard/terminal collaborators)
- bus: address decoder wiring RAM, ROM and the ACIA together
- cli: command-line argument parsing
- cpu: 6502 CPU core with cycle-accurate timing for documented opcodes
- error: crate-wide construction-time error type
- io: host-facing keyboard and terminal collaborators (raw terminal, data files)
- machine: top-level aggregate tying the Bus, CPU and reset channel together
- rom: fixed-size ROM image loading and validation

In tests, shared ROM/keyboard/terminal builders are available under
`crate::test_utils`.
"#]

pub mod acia;
pub mod bus;
pub mod cli;
pub mod cpu;
pub mod error;
pub mod io;
pub mod machine;
pub mod rom;

pub use bus::Bus;
pub use cpu::Cpu6502;
pub use error::EmulatorError;
pub use machine::Machine;

#[cfg(test)]
pub mod test_utils;
