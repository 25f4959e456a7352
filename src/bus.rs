/*!
Bus abstraction mapping the CPU's 16-bit address space to RAM, ROM, and the
ACIA serial controller.

Address map:
- $0000-$7FFF: 32 KiB RAM
- $8000-$EFFF: ROM (low bank)
- $F000-$F7FF: ACIA, mirrored every 2 bytes across the 2 KiB window
- $F800-$FFFF: ROM (high bank) — includes the reset/IRQ/NMI vectors

Writes to either ROM region are silently discarded; RAM is never altered by
them. The interrupt lines (`irq_line`, `nmi_pending`) live on the CPU, not
here — the Bus only arbitrates memory and the ACIA.
*/

use crate::acia::{Acia, KeyboardSource, TerminalSink};
use crate::rom::ROM_SIZE;

const RAM_SIZE: usize = 0x8000;

/// Result of decoding a 16-bit address into the device it targets. No
/// address in the 16-bit space actually decodes to `Unmapped` under this
/// map; the variant exists for defensive completeness in `Bus::read`/
/// `Bus::write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Ram,
    Rom,
    Acia,
    Unmapped,
}

fn classify_region(addr: u16) -> Region {
    match addr {
        0x0000..=0x7FFF => Region::Ram,
        0x8000..=0xEFFF => Region::Rom,
        0xF000..=0xF7FF => Region::Acia,
        0xF800..=0xFFFF => Region::Rom,
        #[allow(unreachable_patterns)]
        _ => Region::Unmapped,
    }
}

pub struct Bus {
    ram: [u8; RAM_SIZE],
    rom: [u8; ROM_SIZE],
    acia: Acia,
    keyboard: Box<dyn KeyboardSource>,
    terminal: Box<dyn TerminalSink>,
}

impl Bus {
    pub fn new(
        rom: [u8; ROM_SIZE],
        keyboard: Box<dyn KeyboardSource>,
        terminal: Box<dyn TerminalSink>,
    ) -> Self {
        Self {
            ram: [0; RAM_SIZE],
            rom,
            acia: Acia::new(),
            keyboard,
            terminal,
        }
    }

    pub fn reset(&mut self) {
        self.acia.reset();
    }

    /// Replace the keyboard collaborator in place (used by the driver when
    /// a data-injection file is exhausted and interactive input should
    /// take over).
    pub fn set_keyboard(&mut self, keyboard: Box<dyn KeyboardSource>) {
        self.keyboard = keyboard;
    }

    /// `true` once the current keyboard collaborator can never produce
    /// another byte (see `KeyboardSource::is_exhausted`).
    pub fn keyboard_exhausted(&self) -> bool {
        self.keyboard.is_exhausted()
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        match classify_region(addr) {
            Region::Ram => self.ram[(addr & 0x7FFF) as usize],
            Region::Rom => self.rom[(addr & 0x7FFF) as usize],
            Region::Acia => self.acia.read(addr, self.keyboard.as_mut()),
            Region::Unmapped => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        match classify_region(addr) {
            Region::Ram => self.ram[(addr & 0x7FFF) as usize] = data,
            Region::Rom => { /* ROM is read-only */ }
            Region::Acia => self.acia.write(addr, data, self.terminal.as_mut()),
            Region::Unmapped => { /* no device, write ignored */ }
        }
    }

    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{null_terminal, one_shot_keyboard};

    fn bus_with(rom: [u8; ROM_SIZE]) -> Bus {
        Bus::new(rom, one_shot_keyboard(None), null_terminal())
    }

    #[test]
    fn ram_read_write_round_trips() {
        let mut bus = bus_with([0; ROM_SIZE]);
        bus.write(0x0042, 0x99);
        assert_eq!(bus.read(0x0042), 0x99);
    }

    #[test]
    fn rom_writes_are_discarded() {
        let mut rom = [0u8; ROM_SIZE];
        rom[0] = 0x11; // addr 0x8000 maps to rom[0]
        let mut bus = bus_with(rom);
        bus.write(0x8000, 0x22);
        assert_eq!(bus.read(0x8000), 0x11);
    }

    #[test]
    fn rom_high_bank_reaches_vectors() {
        let mut rom = [0u8; ROM_SIZE];
        rom[0x7FFC] = 0x34; // addr 0xFFFC
        rom[0x7FFD] = 0x12; // addr 0xFFFD
        let mut bus = bus_with(rom);
        assert_eq!(bus.read_word(0xFFFC), 0x1234);
    }

    #[test]
    fn acia_window_routes_to_acia() {
        let mut bus = bus_with([0; ROM_SIZE]);
        // Status register reads 0x0E right after construction.
        assert_eq!(bus.read(0xF000), 0x0E);
    }

    #[test]
    fn acia_mirrors_every_two_bytes_across_the_2kib_window() {
        let mut bus = bus_with([0; ROM_SIZE]);
        assert_eq!(bus.read(0xF000), bus.read(0xF7FE));
    }

    #[test]
    fn classify_region_matches_the_documented_address_map() {
        assert_eq!(classify_region(0x0000), Region::Ram);
        assert_eq!(classify_region(0x7FFF), Region::Ram);
        assert_eq!(classify_region(0x8000), Region::Rom);
        assert_eq!(classify_region(0xEFFF), Region::Rom);
        assert_eq!(classify_region(0xF000), Region::Acia);
        assert_eq!(classify_region(0xF7FF), Region::Acia);
        assert_eq!(classify_region(0xF800), Region::Rom);
        assert_eq!(classify_region(0xFFFF), Region::Rom);
    }
}
