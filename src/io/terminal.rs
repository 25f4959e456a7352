use std::io::{self, Write};

use crate::acia::TerminalSink;

/// Writes transmitted bytes straight to stdout, flushing after every byte
/// so output appears promptly under raw-mode terminals.
pub struct StdoutTerminal;

impl StdoutTerminal {
    pub fn new() -> Self {
        Self
    }
}

impl TerminalSink for StdoutTerminal {
    fn write(&mut self, byte: u8) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(&[byte]);
        let _ = stdout.flush();
    }
}
