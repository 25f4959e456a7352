use std::io::Read as _;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use nix::sys::termios::{self, LocalFlags, InputFlags, SetArg, Termios};

use crate::acia::KeyboardSource;
use crate::error::EmulatorError;
use crate::machine::ResetChannel;

const CTRL_R: u8 = 0x12;
const CTRL_X: u8 = 0x18;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// LF -> CR translation applied to every byte read from either keyboard
/// source, matching the reference terminal driver's line-ending convention.
fn translate(byte: u8) -> u8 {
    if byte == 0x0A { 0x0D } else { byte }
}

/// Puts stdin into raw mode and polls it on a background thread at a fixed
/// interval, mirroring the reference terminal driver's `stdin_handler`.
/// Ctrl-R requests a warm reset via the shared `ResetChannel`; Ctrl-X exits
/// the process immediately. At most one pending byte is buffered; the poll
/// thread stalls (as the original does) while a byte is already pending
/// and unconsumed.
pub struct InteractiveKeyboard {
    pending: Arc<Mutex<Option<u8>>>,
    original_termios: Termios,
}

impl InteractiveKeyboard {
    pub fn new(reset_channel: ResetChannel) -> Result<Self, EmulatorError> {
        let stdin_fd = unsafe { BorrowedFd::borrow_raw(std::io::stdin().as_raw_fd()) };
        let original_termios =
            termios::tcgetattr(stdin_fd).map_err(|errno| EmulatorError::Io(errno.into()))?;

        let mut raw = original_termios.clone();
        raw.input_flags
            .remove(InputFlags::ICRNL | InputFlags::IXON);
        raw.local_flags.remove(
            LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG | LocalFlags::IEXTEN,
        );
        termios::tcsetattr(stdin_fd, SetArg::TCSANOW, &raw)
            .map_err(|errno| EmulatorError::Io(errno.into()))?;

        let pending = Arc::new(Mutex::new(None));
        let poll_pending = Arc::clone(&pending);
        thread::spawn(move || Self::poll_loop(poll_pending, reset_channel));

        Ok(Self {
            pending,
            original_termios,
        })
    }

    fn poll_loop(pending: Arc<Mutex<Option<u8>>>, reset_channel: ResetChannel) {
        let mut stdin = std::io::stdin();
        let mut byte = [0u8; 1];
        loop {
            thread::sleep(POLL_INTERVAL);
            match stdin.read(&mut byte) {
                Ok(0) | Err(_) => continue,
                Ok(_) => match byte[0] {
                    CTRL_R => reset_channel.request(),
                    CTRL_X => std::process::exit(0),
                    ch => {
                        while pending.lock().unwrap().is_some() {
                            thread::sleep(POLL_INTERVAL);
                        }
                        *pending.lock().unwrap() = Some(ch);
                    }
                },
            }
        }
    }
}

impl KeyboardSource for InteractiveKeyboard {
    fn ready(&mut self) -> bool {
        self.pending.lock().unwrap().is_some()
    }

    fn read(&mut self) -> u8 {
        let byte = self.pending.lock().unwrap().take().unwrap_or(0);
        translate(byte)
    }
}

impl Drop for InteractiveKeyboard {
    fn drop(&mut self) {
        let stdin_fd = unsafe { BorrowedFd::borrow_raw(std::io::stdin().as_raw_fd()) };
        let _ = termios::tcsetattr(stdin_fd, SetArg::TCSANOW, &self.original_termios);
    }
}

/// Sequential reader over a data-injection file's bytes. Reports
/// `ready() == false` once exhausted; the driver is then expected to swap
/// in an `InteractiveKeyboard` via `Bus::set_keyboard`.
pub struct DataFileKeyboard {
    bytes: Vec<u8>,
    position: usize,
}

impl DataFileKeyboard {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.bytes.len()
    }
}

impl KeyboardSource for DataFileKeyboard {
    fn ready(&mut self) -> bool {
        !self.is_exhausted()
    }

    fn read(&mut self) -> u8 {
        if self.is_exhausted() {
            return 0;
        }
        let byte = self.bytes[self.position];
        self.position += 1;
        translate(byte)
    }

    fn is_exhausted(&self) -> bool {
        DataFileKeyboard::is_exhausted(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_file_keyboard_exhausts_after_last_byte() {
        let mut kb = DataFileKeyboard::new(vec![b'A', b'B']);
        assert!(kb.ready());
        assert_eq!(kb.read(), b'A');
        assert!(kb.ready());
        assert_eq!(kb.read(), b'B');
        assert!(!kb.ready());
        assert_eq!(kb.read(), 0);
    }

    #[test]
    fn data_file_keyboard_translates_lf_to_cr() {
        let mut kb = DataFileKeyboard::new(vec![0x0A]);
        assert_eq!(kb.read(), 0x0D);
    }
}
