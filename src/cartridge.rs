/*!
Cartridge with iNES (v1) loader and mapper integration.

Features:
- Parse iNES (v1) header from bytes or file path
- Extract PRG ROM, CHR (ROM, or CHR RAM when the CHR size is 0), and PRG RAM size
- Determine mirroring, battery-backed RAM and mapper id (0 and 4 supported)
- Construct the concrete `Mapper` and delegate CPU/PPU mapping through it

Notes:
- iNES 2.0 is detected and rejected.
- PRG RAM size byte 0 means 8 KiB by convention.
- The trainer, when present, is skipped and not mapped.
*/

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CartridgeError, EmuError};
use crate::mapper::{Mapper, Nrom};
use crate::mappers::Mmc3;

const HEADER_LEN: usize = 16;
const TRAINER_LEN: usize = 512;
const PRG_UNIT: usize = 16 * 1024;
const CHR_UNIT: usize = 8 * 1024;
const PRG_RAM_UNIT: usize = 8 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    mapper: Mapper,

    mapper_id: u16,
    mirroring: Mirroring,
    battery: bool,
    has_trainer: bool,

    prg_rom_len: usize,
    chr_len: usize,
    prg_ram_len: usize,
    chr_is_ram: bool,
}

impl Cartridge {
    // -------------- Construction --------------

    /// Parse raw iNES bytes and construct the mapper.
    pub fn from_ines_bytes(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_LEN {
            return Err(CartridgeError::Truncated {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }
        if &data[0..4] != b"NES\x1A" {
            return Err(CartridgeError::BadMagic);
        }

        let prg_units = data[4] as usize;
        let chr_units = data[5] as usize;
        let flags6 = data[6];
        let flags7 = data[7];
        let prg_ram_units = data[8] as usize;

        if flags7 & 0x0C == 0x08 {
            return Err(CartridgeError::Nes2Unsupported);
        }
        if prg_units == 0 {
            return Err(CartridgeError::NoPrgRom);
        }

        let mapper_id = (flags7 & 0xF0) as u16 | (flags6 >> 4) as u16;

        let mirroring = if flags6 & 0b0000_1000 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0b0000_0001 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let battery = flags6 & 0b0000_0010 != 0;
        let has_trainer = flags6 & 0b0000_0100 != 0;

        let prg_offset = HEADER_LEN + if has_trainer { TRAINER_LEN } else { 0 };
        let prg_rom_len = prg_units * PRG_UNIT;
        let chr_is_ram = chr_units == 0;
        let chr_file_len = chr_units * CHR_UNIT;

        let expected = prg_offset + prg_rom_len + chr_file_len;
        if data.len() < expected {
            return Err(CartridgeError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let prg_rom = data[prg_offset..prg_offset + prg_rom_len].to_vec();
        let chr_offset = prg_offset + prg_rom_len;
        let chr = if chr_is_ram {
            vec![0; CHR_UNIT]
        } else {
            data[chr_offset..chr_offset + chr_file_len].to_vec()
        };
        let chr_len = chr.len();

        let prg_ram_len = prg_ram_units.max(1) * PRG_RAM_UNIT;

        let mapper = match mapper_id {
            0 => Mapper::Nrom(Nrom::new(prg_rom, chr, chr_is_ram, prg_ram_len)),
            4 => Mapper::Mmc3(Mmc3::new(prg_rom, vec![0; prg_ram_len], chr, chr_is_ram)),
            other => return Err(CartridgeError::UnsupportedMapper(other)),
        };

        Ok(Self {
            mapper,
            mapper_id,
            mirroring,
            battery,
            has_trainer,
            prg_rom_len,
            chr_len,
            prg_ram_len,
            chr_is_ram,
        })
    }

    /// Read a whole iNES image from `reader` and parse it.
    pub fn from_reader<R: Read>(mut reader: R) -> crate::error::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_ines_bytes(&bytes)?)
    }

    /// Load a cartridge from an iNES file (.nes).
    pub fn from_ines_file<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| EmuError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let cart = Self::from_reader(file)?;
        log::info!(
            "loaded {}: mapper {}, PRG {} KiB, CHR {} KiB{}",
            path.display(),
            cart.mapper_id,
            cart.prg_rom_len / 1024,
            cart.chr_len / 1024,
            if cart.chr_is_ram { " (RAM)" } else { "" }
        );
        Ok(cart)
    }

    // -------------- Mapping (delegating to Mapper) --------------

    /// CPU read in $4020..=$FFFF. `None` when nothing drives the bus.
    #[inline]
    pub fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        self.mapper.cpu_read(addr)
    }

    #[inline]
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        self.mapper.cpu_write(addr, value);
    }

    pub fn cpu_peek(&self, addr: u16) -> Option<u8> {
        self.mapper.cpu_peek(addr)
    }

    #[inline]
    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.mapper.ppu_read(addr)
    }

    #[inline]
    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        self.mapper.ppu_write(addr, value);
    }

    #[inline]
    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    #[inline]
    pub fn notify_a12_rise(&mut self) {
        self.mapper.notify_a12_rise();
    }

    pub fn reset(&mut self) {
        self.mapper.reset();
    }

    /// Nametable arrangement in effect right now. Four-screen boards are
    /// fixed; otherwise the board may override the header.
    pub fn effective_mirroring(&self) -> Mirroring {
        if self.mirroring == Mirroring::FourScreen {
            return Mirroring::FourScreen;
        }
        self.mapper.current_mirroring().unwrap_or(self.mirroring)
    }

    // -------------- Accessors --------------

    pub fn mapper_id(&self) -> u16 {
        self.mapper_id
    }

    /// Mirroring declared by the header.
    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn battery_backed(&self) -> bool {
        self.battery
    }

    pub fn has_trainer(&self) -> bool {
        self.has_trainer
    }

    pub fn prg_rom_len(&self) -> usize {
        self.prg_rom_len
    }

    pub fn chr_len(&self) -> usize {
        self.chr_len
    }

    pub fn chr_is_ram(&self) -> bool {
        self.chr_is_ram
    }

    pub fn prg_ram_len(&self) -> usize {
        self.prg_ram_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_ines;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device gone"))
        }
    }

    #[test]
    fn from_reader_parses_and_surfaces_io_errors() {
        let data = build_ines(1, 1, 0, 0, 1, None);
        let cart = Cartridge::from_reader(std::io::Cursor::new(data)).expect("parse");
        assert_eq!(cart.prg_rom_len(), 16 * 1024);

        let err = Cartridge::from_reader(FailingReader).unwrap_err();
        assert!(matches!(err, EmuError::Io(_)));

        let err = Cartridge::from_reader(&b"NES"[..]).unwrap_err();
        assert!(matches!(err, EmuError::Cartridge(_)));
    }

    #[test]
    fn parse_simple_nrom_32k_chr8k() {
        let data = build_ines(2, 1, 0b0000_0001, 0, 1, None);
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");

        assert_eq!(cart.mapper_id(), 0);
        assert_eq!(cart.mirroring(), Mirroring::Vertical);
        assert_eq!(cart.effective_mirroring(), Mirroring::Vertical);
        assert_eq!(cart.prg_rom_len(), 32 * 1024);
        assert_eq!(cart.chr_len(), 8 * 1024);
        assert!(!cart.chr_is_ram());

        assert_eq!(cart.cpu_read(0x8000), Some(0xAA));
        assert_eq!(cart.cpu_read(0xFFFF), Some(0xAA));
        assert_eq!(cart.ppu_read(0x0000), 0xCC);
    }

    #[test]
    fn parse_nrom_16k_chr_ram() {
        let data = build_ines(1, 0, 0, 0, 0, None);
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");

        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
        assert_eq!(cart.prg_ram_len(), 8 * 1024);
        assert!(cart.chr_is_ram());
        assert_eq!(cart.chr_len(), 8 * 1024);

        assert_eq!(cart.cpu_read(0x8000), cart.cpu_read(0xC000));
        cart.ppu_write(0x0010, 0x3C);
        assert_eq!(cart.ppu_read(0x0010), 0x3C);
    }

    #[test]
    fn trainer_moves_data_offset() {
        let trainer = [0x55u8; 512];
        let data = build_ines(1, 1, 0b0000_0100, 0, 1, Some(&trainer));
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");
        assert!(cart.has_trainer());
        assert_eq!(cart.cpu_read(0x8000), Some(0xAA));
    }

    #[test]
    fn header_errors() {
        assert_eq!(
            Cartridge::from_ines_bytes(b"NES").unwrap_err(),
            CartridgeError::Truncated {
                expected: 16,
                actual: 3
            }
        );

        let mut bad = build_ines(1, 1, 0, 0, 1, None);
        bad[0] = b'X';
        assert_eq!(
            Cartridge::from_ines_bytes(&bad).unwrap_err(),
            CartridgeError::BadMagic
        );

        let nes2 = build_ines(1, 1, 0, 0b0000_1000, 1, None);
        assert_eq!(
            Cartridge::from_ines_bytes(&nes2).unwrap_err(),
            CartridgeError::Nes2Unsupported
        );

        let no_prg = build_ines(0, 1, 0, 0, 1, None);
        assert_eq!(
            Cartridge::from_ines_bytes(&no_prg).unwrap_err(),
            CartridgeError::NoPrgRom
        );
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut data = build_ines(2, 1, 0, 0, 1, None);
        data.truncate(16 + 1000);
        assert!(matches!(
            Cartridge::from_ines_bytes(&data),
            Err(CartridgeError::Truncated { .. })
        ));
    }

    #[test]
    fn unsupported_mapper_is_rejected() {
        // Mapper 1 (MMC1).
        let data = build_ines(1, 1, 0x10, 0, 1, None);
        assert_eq!(
            Cartridge::from_ines_bytes(&data).unwrap_err(),
            CartridgeError::UnsupportedMapper(1)
        );
    }

    #[test]
    fn mmc3_overrides_header_mirroring() {
        // Mapper 4, vertical in header.
        let data = build_ines(2, 1, 0x41, 0, 1, None);
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");
        assert_eq!(cart.mapper_id(), 4);
        assert_eq!(cart.effective_mirroring(), Mirroring::Vertical);
        cart.cpu_write(0xA000, 0x01);
        assert_eq!(cart.effective_mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn prg_ram_read_write() {
        let data = build_ines(2, 1, 0, 0, 1, None);
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");

        cart.cpu_write(0x6000, 0x42);
        assert_eq!(cart.cpu_read(0x6000), Some(0x42));
        assert_eq!(cart.cpu_peek(0x6000), Some(0x42));
    }
}
