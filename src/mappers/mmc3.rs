/*!
MMC3 (mapper 4).

- Bank select ($8000 even) / bank data ($8001 odd).
- PRG: two switchable 8K banks (R6, R7) plus fixed second-last and last;
  bit 6 of bank select swaps $8000 and $C000.
- CHR: two 2K banks (R0, R1) and four 1K banks (R2..R5); bit 7 inverts the
  halves.
- Mirroring ($A000 even) and PRG RAM enable/protect ($A001 odd).
- Scanline IRQ: latch ($C000), reload ($C001), disable+acknowledge ($E000),
  enable ($E001). The counter is clocked by `clock_scanline_counter`, which the
  console calls on each PPU A12 rise.

PRG RAM reads while disabled are undriven (open bus).
*/

use crate::cartridge::Mirroring;

#[derive(Debug, Clone)]
pub struct Mmc3 {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,

    bank_regs: [u8; 8],
    bank_select: u8,
    prg_swap: bool,
    chr_inversion: bool,

    prg_8k_count: usize,
    chr_1k_count: usize,

    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,

    mirroring: Option<Mirroring>,
    prg_ram_enabled: bool,
    prg_ram_write_protect: bool,
}

impl Mmc3 {
    pub fn new(prg_rom: Vec<u8>, prg_ram: Vec<u8>, chr: Vec<u8>, chr_is_ram: bool) -> Self {
        let chr = if chr.is_empty() { vec![0; 8 * 1024] } else { chr };
        let prg_8k_count = (prg_rom.len() / 0x2000).max(1);
        let chr_1k_count = (chr.len() / 0x400).max(1);
        let mut m = Self {
            prg_rom,
            prg_ram,
            chr,
            chr_is_ram,
            bank_regs: [0; 8],
            bank_select: 0,
            prg_swap: false,
            chr_inversion: false,
            prg_8k_count,
            chr_1k_count,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
            mirroring: None,
            prg_ram_enabled: false,
            prg_ram_write_protect: false,
        };
        m.reset();
        m
    }

    pub fn reset(&mut self) {
        self.bank_select = 0;
        self.prg_swap = false;
        self.chr_inversion = false;
        self.bank_regs = [0, 2, 4, 5, 6, 7, 0, 1];
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.mirroring = None;
        self.prg_ram_enabled = !self.prg_ram.is_empty();
        self.prg_ram_write_protect = false;
    }

    // ---------------------------------------------------------------------
    // CPU side
    // ---------------------------------------------------------------------

    #[inline]
    pub fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        self.cpu_peek(addr)
    }

    pub fn cpu_peek(&self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram.is_empty() || !self.prg_ram_enabled {
                    return None;
                }
                Some(self.prg_ram[(addr as usize - 0x6000) % self.prg_ram.len()])
            }
            0x8000..=0xFFFF if !self.prg_rom.is_empty() => {
                let bank = self.prg_bank_for(addr);
                let idx = bank * 0x2000 + (addr as usize & 0x1FFF);
                Some(self.prg_rom[idx % self.prg_rom.len()])
            }
            _ => None,
        }
    }

    fn prg_bank_for(&self, addr: u16) -> usize {
        let last = self.prg_8k_count - 1;
        let second_last = self.prg_8k_count.saturating_sub(2);
        let r6 = self.bank_regs[6] as usize % self.prg_8k_count;
        let r7 = self.bank_regs[7] as usize % self.prg_8k_count;
        match (addr, self.prg_swap) {
            (0x8000..=0x9FFF, false) => r6,
            (0x8000..=0x9FFF, true) => second_last,
            (0xA000..=0xBFFF, _) => r7,
            (0xC000..=0xDFFF, false) => second_last,
            (0xC000..=0xDFFF, true) => r6,
            _ => last,
        }
    }

    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        let even = addr & 1 == 0;
        match addr {
            0x6000..=0x7FFF => {
                if !self.prg_ram.is_empty() && self.prg_ram_enabled && !self.prg_ram_write_protect {
                    let rel = (addr as usize - 0x6000) % self.prg_ram.len();
                    self.prg_ram[rel] = value;
                }
            }
            0x8000..=0x9FFF if even => {
                self.bank_select = value;
                self.prg_swap = value & 0x40 != 0;
                self.chr_inversion = value & 0x80 != 0;
            }
            0x8000..=0x9FFF => {
                self.bank_regs[(self.bank_select & 0x07) as usize] = value;
            }
            0xA000..=0xBFFF if even => {
                self.mirroring = Some(if value & 1 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                });
            }
            0xA000..=0xBFFF => {
                if !self.prg_ram.is_empty() {
                    self.prg_ram_enabled = value & 0x80 != 0;
                    self.prg_ram_write_protect = value & 0x40 != 0;
                }
            }
            0xC000..=0xDFFF if even => self.irq_latch = value,
            0xC000..=0xDFFF => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            0xE000..=0xFFFF if even => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            0xE000..=0xFFFF => self.irq_enabled = true,
            _ => {}
        }
    }

    // ---------------------------------------------------------------------
    // PPU side
    // ---------------------------------------------------------------------

    fn chr_index(&self, addr: u16) -> usize {
        let addr = addr & 0x1FFF;
        // Inversion swaps the 2K half ($0000) with the 1K half ($1000).
        let a = if self.chr_inversion { addr ^ 0x1000 } else { addr } as usize;
        let bank_1k = match a {
            0x0000..=0x07FF => (self.bank_regs[0] & 0xFE) as usize + (a >> 10 & 1),
            0x0800..=0x0FFF => (self.bank_regs[1] & 0xFE) as usize + (a >> 10 & 1),
            0x1000..=0x13FF => self.bank_regs[2] as usize,
            0x1400..=0x17FF => self.bank_regs[3] as usize,
            0x1800..=0x1BFF => self.bank_regs[4] as usize,
            _ => self.bank_regs[5] as usize,
        };
        (bank_1k % self.chr_1k_count) * 0x400 + (a & 0x03FF)
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.chr[self.chr_index(addr)]
    }

    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let idx = self.chr_index(addr);
            self.chr[idx] = value;
        }
    }

    // ---------------------------------------------------------------------
    // IRQ
    // ---------------------------------------------------------------------

    /// One A12 rising edge.
    pub fn clock_scanline_counter(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    #[inline]
    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    #[inline]
    pub fn current_mirroring(&self) -> Option<Mirroring> {
        self.mirroring
    }
}

#[cfg(test)]
mod tests {
    use super::Mmc3;
    use crate::cartridge::Mirroring;

    /// PRG bank n is filled with n; CHR 1K bank n is filled with n.
    fn build_banked(prg_8k: usize, chr_1k: usize) -> Mmc3 {
        let prg = (0..prg_8k).flat_map(|b| vec![b as u8; 0x2000]).collect();
        let chr = (0..chr_1k).flat_map(|b| vec![b as u8; 0x400]).collect();
        Mmc3::new(prg, vec![0; 8 * 1024], chr, false)
    }

    fn select(m: &mut Mmc3, val: u8) {
        m.cpu_write(0x8000, val);
    }

    fn data(m: &mut Mmc3, val: u8) {
        m.cpu_write(0x8001, val);
    }

    #[test]
    fn prg_mode0_layout() {
        let mut m = build_banked(8, 8);
        select(&mut m, 6);
        data(&mut m, 2);
        select(&mut m, 7);
        data(&mut m, 3);
        assert_eq!(m.cpu_read(0x8000), Some(2));
        assert_eq!(m.cpu_read(0xA000), Some(3));
        assert_eq!(m.cpu_read(0xC000), Some(6));
        assert_eq!(m.cpu_read(0xFFFF), Some(7));
    }

    #[test]
    fn prg_mode1_swaps_8000_and_c000() {
        let mut m = build_banked(8, 8);
        select(&mut m, 0x46);
        data(&mut m, 1);
        assert_eq!(m.cpu_read(0x8000), Some(6));
        assert_eq!(m.cpu_read(0xC000), Some(1));
        assert_eq!(m.cpu_read(0xE000), Some(7));
    }

    #[test]
    fn chr_inversion_switch() {
        let mut m = build_banked(4, 16);
        select(&mut m, 0x00);
        data(&mut m, 4);
        assert_eq!(m.ppu_read(0x0000), 4);
        assert_eq!(m.ppu_read(0x0400), 5);
        select(&mut m, 0x80);
        assert_eq!(m.ppu_read(0x1000), 4);
        assert_eq!(m.ppu_read(0x1400), 5);
    }

    #[test]
    fn chr_ram_write_basic() {
        let mut m = Mmc3::new(vec![0xAA; 0x2000 * 4], vec![], vec![], true);
        select(&mut m, 2);
        data(&mut m, 0);
        m.ppu_write(0x1000, 0x5E);
        assert_eq!(m.ppu_read(0x1000), 0x5E);
    }

    #[test]
    fn mirroring_control() {
        let mut m = build_banked(4, 8);
        m.cpu_write(0xA000, 0x00);
        assert_eq!(m.current_mirroring(), Some(Mirroring::Vertical));
        m.cpu_write(0xA000, 0x01);
        assert_eq!(m.current_mirroring(), Some(Mirroring::Horizontal));
    }

    #[test]
    fn prg_ram_enable_and_protect() {
        let mut m = build_banked(4, 8);
        m.cpu_write(0x6000, 0x12);
        assert_eq!(m.cpu_read(0x6000), Some(0x12));

        m.cpu_write(0xA001, 0x00);
        assert_eq!(m.cpu_read(0x6000), None);

        m.cpu_write(0xA001, 0xC0);
        m.cpu_write(0x6000, 0x34);
        assert_eq!(m.cpu_read(0x6000), Some(0x12));

        m.cpu_write(0xA001, 0x80);
        m.cpu_write(0x6000, 0x56);
        assert_eq!(m.cpu_read(0x6000), Some(0x56));
    }

    #[test]
    fn scanline_irq_fires_after_latch_plus_one_edges() {
        let mut m = build_banked(4, 8);
        m.cpu_write(0xC000, 3);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xE001, 0);
        // Reload to 3, then 2, 1, 0.
        for _ in 0..3 {
            m.clock_scanline_counter();
            assert!(!m.irq_pending());
        }
        m.clock_scanline_counter();
        assert!(m.irq_pending());

        m.cpu_write(0xE000, 0);
        assert!(!m.irq_pending());
    }

    #[test]
    fn disabled_irq_never_pends() {
        let mut m = build_banked(4, 8);
        m.cpu_write(0xC000, 0);
        for _ in 0..4 {
            m.clock_scanline_counter();
        }
        assert!(!m.irq_pending());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut m = build_banked(8, 8);
        select(&mut m, 0xC6);
        data(&mut m, 5);
        m.cpu_write(0xE001, 0);
        m.reset();
        assert_eq!(m.cpu_read(0x8000), Some(0));
        assert_eq!(m.cpu_read(0xC000), Some(6));
        assert_eq!(m.current_mirroring(), None);
    }
}
