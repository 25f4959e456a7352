/*!
MC6850-style ACIA (Asynchronous Communications Interface Adapter).

https://www.cpcwiki.eu/imgs/3/3f/MC6850.pdf

Exposes a two-register window (status/control, receive/transmit data)
mirrored every two bytes across a 2 KiB region of the Bus. The ACIA itself
holds no reference to a host keyboard or terminal; the Bus passes those
collaborators in on every access (see `Bus::read`/`Bus::write`), which
keeps this type free of trait-object storage or lifetimes.
*/

/// Byte source for keyboard input, polled by the ACIA's status/data
/// registers. Implementations must make `ready`/`read` individually
/// atomic; they need not be atomic with respect to each other (a `ready`
/// false positive is tolerated — the ACIA just returns whatever `read`
/// produces).
pub trait KeyboardSource {
    fn ready(&mut self) -> bool;
    fn read(&mut self) -> u8;

    /// Reports `true` once this source can never produce another byte
    /// (e.g. a data-injection file has run out). The driver polls this to
    /// know when to swap in the interactive keyboard. Sources with no
    /// natural end (the interactive keyboard) never return `true`.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Byte sink for terminal output, driven by writes to the ACIA's
/// transmit-data register.
pub trait TerminalSink {
    fn write(&mut self, byte: u8);
}

/// Receive-data-register-full bit of the status register.
const SR_RDRF: u8 = 0x01;
/// Transmit-data-register-empty bit of the status register.
const SR_TDRE: u8 = 0x02;
/// Status register value immediately after reset (bits 2-3 read high).
const SR_RESET: u8 = 0x0E;

pub struct Acia {
    tdr: u8,
    rdr: u8,
    cr: u8,
    sr: u8,
}

impl Acia {
    pub fn new() -> Self {
        Self {
            tdr: 0,
            rdr: 0,
            cr: 0,
            sr: SR_RESET,
        }
    }

    pub fn reset(&mut self) {
        self.tdr = 0;
        self.rdr = 0;
        self.cr = 0;
        self.sr = SR_RESET;
    }

    /// Read through the two-register window. `addr` is the full bus
    /// address; only bit 11 (device select) and bit 0 (register select)
    /// are consulted.
    pub fn read(
        &mut self,
        addr: u16,
        keyboard: &mut dyn KeyboardSource,
    ) -> u8 {
        if addr & 0x0800 != 0 {
            return 0xFF;
        }
        if addr & 1 == 0 {
            if keyboard.ready() {
                self.sr |= SR_RDRF;
            }
            self.sr
        } else {
            self.rdr = keyboard.read();
            self.sr &= !SR_RDRF;
            self.rdr
        }
    }

    pub fn write(
        &mut self,
        addr: u16,
        data: u8,
        terminal: &mut dyn TerminalSink,
    ) {
        if addr & 0x0800 != 0 {
            return;
        }
        if addr & 1 == 0 {
            self.cr = data;
        } else {
            self.tdr = data;
            terminal.write(data);
            self.sr |= SR_TDRE;
        }
    }
}
