/*!
Mapper subsystem: closed set of cartridge boards with static dispatch.

Purpose:
- Decouple CPU/PPU address mapping from the `Cartridge` metadata.
- Keep the hot read/write path free of indirection: `Mapper` is an enum and
  every call is a `match`, never a vtable.

Ranges the Bus forwards:
- CPU $4020..=$FFFF to `cpu_read` / `cpu_write`. A `None` read means no
  device drives the bus and the caller substitutes open bus.
- PPU $0000..=$1FFF (pattern tables) to `ppu_read` / `ppu_write`.

Scanline IRQ boards (MMC3) receive `notify_a12_rise` from the console each
time the PPU reports a rising edge on address line A12.
*/

use crate::cartridge::Mirroring;
use crate::mappers::Mmc3;

#[derive(Debug, Clone)]
pub enum Mapper {
    Nrom(Nrom),
    Mmc3(Mmc3),
}

impl Mapper {
    /// iNES mapper number.
    pub fn mapper_id(&self) -> u16 {
        match self {
            Mapper::Nrom(_) => 0,
            Mapper::Mmc3(_) => 4,
        }
    }

    #[inline]
    pub fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match self {
            Mapper::Nrom(m) => m.cpu_read(addr),
            Mapper::Mmc3(m) => m.cpu_read(addr),
        }
    }

    #[inline]
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match self {
            Mapper::Nrom(m) => m.cpu_write(addr, value),
            Mapper::Mmc3(m) => m.cpu_write(addr, value),
        }
    }

    /// Side-effect-free CPU read for debuggers.
    pub fn cpu_peek(&self, addr: u16) -> Option<u8> {
        match self {
            Mapper::Nrom(m) => m.cpu_peek(addr),
            Mapper::Mmc3(m) => m.cpu_peek(addr),
        }
    }

    #[inline]
    pub fn ppu_read(&self, addr: u16) -> u8 {
        match self {
            Mapper::Nrom(m) => m.chr_read(addr),
            Mapper::Mmc3(m) => m.ppu_read(addr),
        }
    }

    #[inline]
    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        match self {
            Mapper::Nrom(m) => m.chr_write(addr, value),
            Mapper::Mmc3(m) => m.ppu_write(addr, value),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Mapper::Nrom(_) => {}
            Mapper::Mmc3(m) => m.reset(),
        }
    }

    /// Level of the board's IRQ output.
    #[inline]
    pub fn irq_pending(&self) -> bool {
        match self {
            Mapper::Nrom(_) => false,
            Mapper::Mmc3(m) => m.irq_pending(),
        }
    }

    /// PPU A12 went low to high.
    #[inline]
    pub fn notify_a12_rise(&mut self) {
        if let Mapper::Mmc3(m) = self {
            m.clock_scanline_counter();
        }
    }

    /// Mirroring selected by the board at runtime, if it controls it.
    pub fn current_mirroring(&self) -> Option<Mirroring> {
        match self {
            Mapper::Nrom(_) => None,
            Mapper::Mmc3(m) => m.current_mirroring(),
        }
    }
}

/// NROM (mapper 0).
///
/// - PRG ROM: 16 KiB (NROM-128, mirrored) or 32 KiB (NROM-256) at $8000..=$FFFF.
/// - PRG RAM: optional at $6000..=$7FFF.
/// - CHR: 8 KiB ROM, or RAM when the image carries none.
#[derive(Clone, Debug)]
pub struct Nrom {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
}

impl Nrom {
    pub fn new(prg_rom: Vec<u8>, chr: Vec<u8>, chr_is_ram: bool, prg_ram_size: usize) -> Self {
        Self {
            prg_rom,
            prg_ram: vec![0; prg_ram_size],
            chr,
            chr_is_ram,
        }
    }

    #[inline]
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        self.cpu_peek(addr)
    }

    fn cpu_peek(&self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF if !self.prg_ram.is_empty() => {
                let rel = (addr as usize - 0x6000) % self.prg_ram.len();
                Some(self.prg_ram[rel])
            }
            0x8000..=0xFFFF if !self.prg_rom.is_empty() => {
                // 16 KiB images mirror into $C000; modulo covers both sizes.
                let rel = (addr as usize - 0x8000) % self.prg_rom.len();
                Some(self.prg_rom[rel])
            }
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if let 0x6000..=0x7FFF = addr {
            if !self.prg_ram.is_empty() {
                let rel = (addr as usize - 0x6000) % self.prg_ram.len();
                self.prg_ram[rel] = value;
            }
        }
    }

    #[inline]
    fn chr_read(&self, addr: u16) -> u8 {
        if self.chr.is_empty() {
            return 0;
        }
        self.chr[(addr as usize & 0x1FFF) % self.chr.len()]
    }

    #[inline]
    fn chr_write(&mut self, addr: u16, value: u8) {
        if !self.chr_is_ram || self.chr.is_empty() {
            return;
        }
        let idx = (addr as usize & 0x1FFF) % self.chr.len();
        self.chr[idx] = value;
    }

    pub fn is_nrom_128(&self) -> bool {
        self.prg_rom.len() == 16 * 1024
    }
}
