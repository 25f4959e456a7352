/*!
Crate-wide error type for construction-time failures.

Runtime faults the core can recover from on its own (illegal opcodes) are
not represented here — see `cpu::Cpu6502::step` for that path. Only
failures that must abort startup before the machine begins stepping live
in this enum.
*/

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum EmulatorError {
    #[error("bad ROM file: expected {expected} bytes, got {actual}")]
    RomSize { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("command line error: {0}")]
    Cli(String),
}
