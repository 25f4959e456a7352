/*!
Top-level aggregate owning the Bus and CPU, plus the reset-request channel
shared with the host driver.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::acia::{KeyboardSource, TerminalSink};
use crate::bus::Bus;
use crate::cpu::Cpu6502;
use crate::error::EmulatorError;
use crate::rom;

/// Latched, single-flag control channel for warm resets requested by the
/// host (e.g. a Ctrl-R keystroke handled on the keyboard-polling thread).
/// `take()` is idempotent within one observation: two calls back-to-back
/// with no intervening `request()` return `true` then `false`.
#[derive(Clone, Default)]
pub struct ResetChannel(Arc<AtomicBool>);

impl ResetChannel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

pub struct Machine {
    bus: Bus,
    cpu: Cpu6502,
    reset_channel: ResetChannel,
}

impl Machine {
    pub fn new(
        rom_path: &str,
        keyboard: Box<dyn KeyboardSource>,
        terminal: Box<dyn TerminalSink>,
    ) -> Result<Self, EmulatorError> {
        let rom = rom::load_from_file(rom_path)?;
        Ok(Self::with_rom(rom, keyboard, terminal))
    }

    pub fn with_rom(
        rom: [u8; rom::ROM_SIZE],
        keyboard: Box<dyn KeyboardSource>,
        terminal: Box<dyn TerminalSink>,
    ) -> Self {
        Self {
            bus: Bus::new(rom, keyboard, terminal),
            cpu: Cpu6502::new(),
            reset_channel: ResetChannel::new(),
        }
    }

    pub fn reset_channel(&self) -> ResetChannel {
        self.reset_channel.clone()
    }

    /// Resets the ACIA, then the CPU — the CPU's reset reads the vector
    /// through the Bus, which must already be reinitialized.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
    }

    pub fn step(&mut self) -> u32 {
        if self.reset_channel.take() {
            self.reset();
        }
        self.cpu.step(&mut self.bus)
    }

    pub fn irq(&mut self, level: bool) {
        self.cpu.irq(level);
    }

    pub fn nmi(&mut self) {
        self.cpu.nmi();
    }

    pub fn set_keyboard(&mut self, keyboard: Box<dyn KeyboardSource>) {
        self.bus.set_keyboard(keyboard);
    }

    pub fn keyboard_exhausted(&self) -> bool {
        self.bus.keyboard_exhausted()
    }

    /// Current program counter, exposed for debugging and diagnostics.
    pub fn pc(&self) -> u16 {
        self.cpu.pc
    }
}
