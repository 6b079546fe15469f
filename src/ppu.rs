/*!
PPU register model and frame timing.

Scope:
- CPU-visible registers $2000..=$2007 (mirrored every 8 bytes by the bus):
  * $2000 PPUCTRL: VRAM increment (bit 2), sprite height (bit 5), NMI enable (bit 7)
  * $2001 PPUMASK: show background (bit 3) / sprites (bit 4)
  * $2002 PPUSTATUS: sprite-zero hit (bit 6) and overflow (bit 5) only; the
    vblank bit lives in the interrupt ledger and is composed by the bus
  * $2003/$2004 OAMADDR/OAMDATA
  * $2005/$2006 PPUSCROLL/PPUADDR two-write latches sharing one toggle
  * $2007 PPUDATA with buffered reads below $3F00
- PPU address space: pattern tables through the cartridge, 4 KiB of nametable
  RAM arranged by the cartridge's mirroring, 32-byte palette with the
  $3F10/$14/$18/$1C aliases.
- `step` reports vblank transitions, frame completion and the synthetic A12
  rise MMC3 uses to count scanlines.
- Warm-up: after power-on, writes to $2000, $2001, $2005 and $2006 are dropped
  for the first 29658 CPU cycles.

Pixels are not produced. Sprite-zero hit and overflow are evaluated coarsely
from OAM positions.
*/

use bitflags::bitflags;

use crate::cartridge::{Cartridge, Mirroring};
use crate::clock::{CPU_DIVIDER, ScanPosition, VBLANK_SCANLINE};

/// CPU cycles after power-on during which the PPU ignores control writes.
pub const WARMUP_CPU_CYCLES: u32 = 29658;

/// Dot on which the synthetic A12 rise is reported (sprite pattern fetches).
pub const A12_RISE_DOT: u16 = 260;

const STATUS_SPRITE_ZERO: u8 = 0x40;
const STATUS_OVERFLOW: u8 = 0x20;

const CTRL_INCREMENT_32: u8 = 0x04;
const CTRL_SPRITE_16: u8 = 0x20;
const CTRL_NMI_ENABLE: u8 = 0x80;

const MASK_SHOW_BG: u8 = 0x08;
const MASK_SHOW_SPRITES: u8 = 0x10;

bitflags! {
    /// Events produced by one PPU step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuSignals: u8 {
        /// Vblank started; one frame of output is done.
        const FRAME_COMPLETE = 0x01;
        const VBLANK_SET = 0x02;
        const VBLANK_CLEAR = 0x04;
        /// Background or sprites enabled in PPUMASK.
        const RENDERING = 0x08;
        /// Pattern fetches moved from $0xxx to $1xxx (MMC3 scanline clock).
        const A12_RISE = 0x10;
    }
}

#[derive(Clone, Debug)]
pub struct Ppu {
    ctrl: u8,
    mask: u8,
    sprite_flags: u8,
    oam_addr: u8,

    write_toggle: bool,
    scroll_x: u8,
    scroll_y: u8,

    vram_addr: u16,
    read_buffer: u8,
    nametables: [u8; 0x1000],
    palette: [u8; 32],
    oam: [u8; 256],

    /// Remaining master ticks of the warm-up window.
    warmup_ticks: u32,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            ctrl: 0,
            mask: 0,
            sprite_flags: 0,
            oam_addr: 0,
            write_toggle: false,
            scroll_x: 0,
            scroll_y: 0,
            vram_addr: 0,
            read_buffer: 0,
            nametables: [0; 0x1000],
            palette: [0; 32],
            oam: [0; 256],
            warmup_ticks: 0,
        }
    }

    /// Cold start: clears all memory and arms the warm-up window unless skipped.
    pub fn power_on(&mut self, skip_warmup: bool) {
        *self = Self::new();
        if !skip_warmup {
            self.warmup_ticks = WARMUP_CPU_CYCLES * CPU_DIVIDER as u32;
        }
    }

    /// Reset line: control registers and latches clear; VRAM, palette and OAM
    /// keep their contents.
    pub fn reset(&mut self) {
        self.ctrl = 0;
        self.mask = 0;
        self.write_toggle = false;
        self.scroll_x = 0;
        self.scroll_y = 0;
        self.read_buffer = 0;
    }

    // ---------------------------------------------------------------------
    // Timing
    // ---------------------------------------------------------------------

    /// Advance one master tick at `pos`.
    pub fn step(&mut self, pos: ScanPosition) -> PpuSignals {
        self.warmup_ticks = self.warmup_ticks.saturating_sub(1);

        let mut signals = PpuSignals::empty();
        let rendering = self.rendering_enabled();

        if pos.scanline == VBLANK_SCANLINE && pos.dot == 1 {
            signals.insert(PpuSignals::VBLANK_SET | PpuSignals::FRAME_COMPLETE);
        }
        if pos.is_pre_render() && pos.dot == 1 {
            self.sprite_flags = 0;
            signals.insert(PpuSignals::VBLANK_CLEAR);
        }

        if rendering {
            signals.insert(PpuSignals::RENDERING);
            if (pos.is_visible_line() || pos.is_pre_render()) && pos.dot == A12_RISE_DOT {
                signals.insert(PpuSignals::A12_RISE);
            }
            if pos.is_visible_line() {
                self.evaluate_sprite_flags(pos);
            }
        }

        signals
    }

    fn sprite_height(&self) -> u16 {
        if self.ctrl & CTRL_SPRITE_16 != 0 { 16 } else { 8 }
    }

    fn sprite_on_line(&self, index: usize, scanline: u16) -> bool {
        let top = self.oam[index * 4] as u16 + 1;
        scanline >= top && scanline < top + self.sprite_height()
    }

    fn evaluate_sprite_flags(&mut self, pos: ScanPosition) {
        if self.mask & (MASK_SHOW_BG | MASK_SHOW_SPRITES) == (MASK_SHOW_BG | MASK_SHOW_SPRITES)
            && self.sprite_flags & STATUS_SPRITE_ZERO == 0
        {
            let x = self.oam[3] as u16;
            if x < 255 && pos.dot == x + 1 && self.sprite_on_line(0, pos.scanline) {
                self.sprite_flags |= STATUS_SPRITE_ZERO;
            }
        }
        if pos.dot == 257 && self.sprite_flags & STATUS_OVERFLOW == 0 {
            let count = (0..64)
                .filter(|&i| self.sprite_on_line(i, pos.scanline))
                .count();
            if count > 8 {
                self.sprite_flags |= STATUS_OVERFLOW;
            }
        }
    }

    // ---------------------------------------------------------------------
    // CPU-visible registers
    // ---------------------------------------------------------------------

    /// Register write. `addr` is already folded into $2000..=$2007.
    pub fn write_reg(&mut self, addr: u16, value: u8, cart: Option<&mut Cartridge>) {
        let warming_up = self.in_warmup();
        match addr {
            0x2000 if !warming_up => self.ctrl = value,
            0x2001 if !warming_up => self.mask = value,
            0x2003 => self.oam_addr = value,
            0x2004 => self.write_oam_data(value),
            0x2005 if !warming_up => {
                if self.write_toggle {
                    self.scroll_y = value;
                } else {
                    self.scroll_x = value;
                }
                self.write_toggle = !self.write_toggle;
            }
            0x2006 if !warming_up => {
                if self.write_toggle {
                    self.vram_addr = (self.vram_addr & 0x3F00) | value as u16;
                } else {
                    self.vram_addr = (self.vram_addr & 0x00FF) | ((value as u16 & 0x3F) << 8);
                }
                self.write_toggle = !self.write_toggle;
            }
            0x2007 => {
                let a = self.vram_addr;
                self.write_vram(a, value, cart);
                self.increment_vram_addr();
            }
            _ => {}
        }
    }

    /// Register read. `None` for write-only registers, which read back open bus.
    pub fn read_reg(&mut self, addr: u16, cart: Option<&Cartridge>) -> Option<u8> {
        match addr {
            0x2002 => Some(self.read_status()),
            0x2004 => Some(self.oam[self.oam_addr as usize]),
            0x2007 => {
                let a = self.vram_addr & 0x3FFF;
                let out = if a >= 0x3F00 {
                    // Palette reads are immediate; the buffer picks up the
                    // nametable byte underneath.
                    self.read_buffer = self.read_vram(a - 0x1000, cart);
                    self.read_vram(a, cart)
                } else {
                    let prev = self.read_buffer;
                    self.read_buffer = self.read_vram(a, cart);
                    prev
                };
                self.increment_vram_addr();
                Some(out)
            }
            _ => None,
        }
    }

    /// Sprite bits of PPUSTATUS. Resets the shared write toggle.
    pub fn read_status(&mut self) -> u8 {
        self.write_toggle = false;
        self.sprite_flags
    }

    /// OAMDATA write; also the sink for OAM DMA.
    #[inline]
    pub fn write_oam_data(&mut self, value: u8) {
        self.oam[self.oam_addr as usize] = value;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    fn increment_vram_addr(&mut self) {
        let step = if self.ctrl & CTRL_INCREMENT_32 != 0 { 32 } else { 1 };
        self.vram_addr = self.vram_addr.wrapping_add(step) & 0x3FFF;
    }

    // ---------------------------------------------------------------------
    // PPU address space
    // ---------------------------------------------------------------------

    pub fn read_vram(&self, addr: u16, cart: Option<&Cartridge>) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => cart.map_or(0, |c| c.ppu_read(addr)),
            0x2000..=0x3EFF => self.nametables[nametable_index(addr, mirroring_of(cart))],
            _ => self.palette[palette_index(addr)],
        }
    }

    pub fn write_vram(&mut self, addr: u16, value: u8, cart: Option<&mut Cartridge>) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => {
                if let Some(c) = cart {
                    c.ppu_write(addr, value);
                }
            }
            0x2000..=0x3EFF => {
                let mirroring = mirroring_of(cart.as_deref());
                self.nametables[nametable_index(addr, mirroring)] = value;
            }
            _ => self.palette[palette_index(addr)] = value & 0x3F,
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    #[inline]
    pub fn nmi_enabled(&self) -> bool {
        self.ctrl & CTRL_NMI_ENABLE != 0
    }

    #[inline]
    pub fn rendering_enabled(&self) -> bool {
        self.mask & (MASK_SHOW_BG | MASK_SHOW_SPRITES) != 0
    }

    #[inline]
    pub fn in_warmup(&self) -> bool {
        self.warmup_ticks > 0
    }

    pub fn ctrl(&self) -> u8 {
        self.ctrl
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn vram_addr(&self) -> u16 {
        self.vram_addr
    }

    pub fn scroll(&self) -> (u8, u8) {
        (self.scroll_x, self.scroll_y)
    }

    pub fn write_toggle(&self) -> bool {
        self.write_toggle
    }

    pub fn oam(&self) -> &[u8; 256] {
        &self.oam
    }
}

fn mirroring_of(cart: Option<&Cartridge>) -> Mirroring {
    cart.map_or(Mirroring::Horizontal, Cartridge::effective_mirroring)
}

/// Offset into the 4 KiB nametable RAM for a PPU address in $2000..=$3EFF.
fn nametable_index(addr: u16, mirroring: Mirroring) -> usize {
    let a = (addr as usize - 0x2000) & 0x0FFF;
    let table = a / 0x400;
    let physical = match mirroring {
        Mirroring::Horizontal => table >> 1,
        Mirroring::Vertical => table & 1,
        Mirroring::FourScreen => table,
    };
    physical * 0x400 + (a & 0x3FF)
}

/// $3F10/$14/$18/$1C alias the background entries.
fn palette_index(addr: u16) -> usize {
    let i = addr as usize & 0x1F;
    if i & 0x13 == 0x10 { i & 0x0F } else { i }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(scanline: u16, dot: u16) -> ScanPosition {
        ScanPosition::new(scanline, dot)
    }

    fn set_addr(p: &mut Ppu, addr: u16) {
        p.write_reg(0x2006, (addr >> 8) as u8, None);
        p.write_reg(0x2006, addr as u8, None);
    }

    #[test]
    fn vblank_edges_and_frame_complete() {
        let mut p = Ppu::new();
        let s = p.step(pos(241, 1));
        assert!(s.contains(PpuSignals::VBLANK_SET));
        assert!(s.contains(PpuSignals::FRAME_COMPLETE));
        assert!(!s.contains(PpuSignals::VBLANK_CLEAR));

        let s = p.step(pos(261, 1));
        assert!(s.contains(PpuSignals::VBLANK_CLEAR));
        assert!(p.step(pos(100, 5)).is_empty());
    }

    #[test]
    fn vblank_dot_reports_set_and_frame_together() {
        let mut p = Ppu::new();
        let s = p.step(pos(241, 1));
        assert_eq!(s, PpuSignals::VBLANK_SET | PpuSignals::FRAME_COMPLETE);
        assert_eq!(p.step(pos(261, 1)), PpuSignals::VBLANK_CLEAR);
        assert_eq!(p.step(pos(0, 0)), PpuSignals::empty());
    }

    #[test]
    fn a12_rise_only_while_rendering() {
        let mut p = Ppu::new();
        assert!(!p.step(pos(10, A12_RISE_DOT)).contains(PpuSignals::A12_RISE));

        p.write_reg(0x2001, MASK_SHOW_BG, None);
        let s = p.step(pos(10, A12_RISE_DOT));
        assert!(s.contains(PpuSignals::A12_RISE | PpuSignals::RENDERING));
        assert!(p.step(pos(261, A12_RISE_DOT)).contains(PpuSignals::A12_RISE));
        assert!(!p.step(pos(245, A12_RISE_DOT)).contains(PpuSignals::A12_RISE));
    }

    #[test]
    fn status_read_resets_write_toggle() {
        let mut p = Ppu::new();
        p.write_reg(0x2005, 0x12, None);
        assert!(p.write_toggle());
        assert_eq!(p.read_status(), 0);
        assert!(!p.write_toggle());
    }

    #[test]
    fn ppudata_buffered_read_and_increment() {
        let mut p = Ppu::new();
        set_addr(&mut p, 0x2000);
        p.write_reg(0x2007, 0x11, None);
        p.write_reg(0x2007, 0x22, None);

        set_addr(&mut p, 0x2000);
        assert_eq!(p.read_reg(0x2007, None), Some(0x00));
        assert_eq!(p.read_reg(0x2007, None), Some(0x11));
        assert_eq!(p.read_reg(0x2007, None), Some(0x22));
    }

    #[test]
    fn increment_32_on_ppudata_write() {
        let mut p = Ppu::new();
        p.write_reg(0x2000, CTRL_INCREMENT_32, None);
        set_addr(&mut p, 0x2000);
        p.write_reg(0x2007, 0xAA, None);
        assert_eq!(p.vram_addr(), 0x2020);
        p.write_reg(0x2007, 0xBB, None);
        assert_eq!(p.vram_addr(), 0x2040);
    }

    #[test]
    fn palette_reads_are_immediate_and_aliased() {
        let mut p = Ppu::new();
        set_addr(&mut p, 0x3F10);
        p.write_reg(0x2007, 0x2C, None);
        set_addr(&mut p, 0x3F00);
        assert_eq!(p.read_reg(0x2007, None), Some(0x2C));
    }

    #[test]
    fn horizontal_mirroring_folds_2400_onto_2000() {
        let mut p = Ppu::new();
        set_addr(&mut p, 0x2405);
        p.write_reg(0x2007, 0x77, None);
        assert_eq!(p.read_vram(0x2005, None), 0x77);
        assert_eq!(p.read_vram(0x2805, None), 0x00);
        assert_eq!(nametable_index(0x2C05, Mirroring::Horizontal), 0x405);
        assert_eq!(nametable_index(0x2805, Mirroring::Vertical), 0x005);
        assert_eq!(nametable_index(0x2C05, Mirroring::FourScreen), 0xC05);
    }

    #[test]
    fn write_only_registers_read_none() {
        let mut p = Ppu::new();
        for reg in [0x2000, 0x2001, 0x2003, 0x2005, 0x2006] {
            assert_eq!(p.read_reg(reg, None), None, "reg {reg:04X}");
        }
    }

    #[test]
    fn warmup_drops_control_writes() {
        let mut p = Ppu::new();
        p.power_on(false);
        assert!(p.in_warmup());
        p.write_reg(0x2000, CTRL_NMI_ENABLE, None);
        p.write_reg(0x2001, MASK_SHOW_BG, None);
        p.write_reg(0x2003, 0x10, None);
        p.write_reg(0x2004, 0x99, None);
        assert!(!p.nmi_enabled());
        assert!(!p.rendering_enabled());
        assert_eq!(p.oam()[0x10], 0x99);

        for _ in 0..WARMUP_CPU_CYCLES * 3 {
            p.step(pos(0, 0));
        }
        assert!(!p.in_warmup());
        p.write_reg(0x2000, CTRL_NMI_ENABLE, None);
        assert!(p.nmi_enabled());
    }

    #[test]
    fn oam_data_wraps() {
        let mut p = Ppu::new();
        p.write_reg(0x2003, 0xFF, None);
        p.write_oam_data(1);
        p.write_oam_data(2);
        assert_eq!(p.oam()[0xFF], 1);
        assert_eq!(p.oam()[0x00], 2);
    }

    #[test]
    fn sprite_zero_hit_and_overflow() {
        let mut p = Ppu::new();
        // Sprite 0 at y=9 (visible from line 10), x=20.
        p.write_reg(0x2003, 0, None);
        for b in [9, 0, 0, 20] {
            p.write_oam_data(b);
        }
        // Eight more sprites on the same lines.
        for _ in 1..9 {
            for b in [9, 0, 0, 0] {
                p.write_oam_data(b);
            }
        }
        p.write_reg(0x2001, MASK_SHOW_BG | MASK_SHOW_SPRITES, None);

        p.step(pos(10, 21));
        p.step(pos(10, 257));
        assert_eq!(p.read_status() & 0x60, STATUS_SPRITE_ZERO | STATUS_OVERFLOW);

        p.step(pos(261, 1));
        assert_eq!(p.read_status(), 0);
    }

    #[test]
    fn reset_keeps_memory_but_clears_control() {
        let mut p = Ppu::new();
        p.write_reg(0x2000, CTRL_NMI_ENABLE, None);
        p.write_oam_data(0x42);
        p.reset();
        assert!(!p.nmi_enabled());
        assert_eq!(p.oam()[0], 0x42);
        assert!(!p.in_warmup());
    }
}
