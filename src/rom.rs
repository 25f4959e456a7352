/*!
ROM image loading.

This machine has no header or mapper: a ROM image is exactly `ROM_SIZE`
bytes, loaded verbatim into the ROM-mapped half of the address space.
*/

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::EmulatorError;

pub const ROM_SIZE: usize = 0x8000;

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<[u8; ROM_SIZE], EmulatorError> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    load_from_bytes(&buffer)
}

pub fn load_from_bytes(buffer: &[u8]) -> Result<[u8; ROM_SIZE], EmulatorError> {
    if buffer.len() != ROM_SIZE {
        return Err(EmulatorError::RomSize {
            expected: ROM_SIZE,
            actual: buffer.len(),
        });
    }
    let mut rom = [0u8; ROM_SIZE];
    rom.copy_from_slice(buffer);
    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_size() {
        let buf = vec![0u8; ROM_SIZE - 1];
        let err = load_from_bytes(&buf).unwrap_err();
        assert!(matches!(
            err,
            EmulatorError::RomSize {
                expected: ROM_SIZE,
                actual,
            } if actual == ROM_SIZE - 1
        ));
    }

    #[test]
    fn accepts_exact_size() {
        let buf = vec![0xAAu8; ROM_SIZE];
        let rom = load_from_bytes(&buf).expect("load");
        assert_eq!(rom[0], 0xAA);
        assert_eq!(rom.len(), ROM_SIZE);
    }
}
