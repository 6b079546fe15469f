/*!
CPU address decode, open bus, and the capture of timing-relevant accesses.

Address map (CPU):
- $0000-$1FFF: 2 KiB internal RAM, mirrored every $0800
- $2000-$3FFF: PPU registers, mirrored every 8 bytes
- $4000-$4013, $4015, $4017 (write): APU
- $4014 (write): OAM DMA trigger; the page is queued for the console
- $4015 (read): APU status
- $4016/$4017 (read): controller bit 0, bits 5-7 from open bus
- $4016 (write): controller strobe (both pads)
- $4018-$401F: unmapped
- $4020-$FFFF: cartridge; regions the board leaves undriven read open bus

Every read and write latches the data bus into `open_bus`. Write-only PPU
registers and unmapped space read that value back.

Two PPU accesses feed the interrupt ledger:
- $2002 reads compose the ledger's vblank flag (bit 7) with the PPU's sprite
  bits (6, 5) and open bus (4-0), then record the read.
- $2000 writes capture the NMI enable before and after the write and record
  the toggle.

The bus never reads the clock. The console stamps it with the current tick
(`set_tick`) before each CPU-cycle so ledger events carry the right time.
*/

pub mod dma;
pub mod ram;

#[cfg(test)]
mod tests;

use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::clock::CPU_DIVIDER;
use crate::controller::Controller;
use crate::cpu::CpuBus;
use crate::ledger::InterruptLedger;
use crate::ppu::Ppu;

pub use dma::{CpuMemory, DmcDma, OamDma, OamWriter};
pub use ram::Ram;

const PPUCTRL: u16 = 0x2000;
const PPUSTATUS: u16 = 0x2002;

#[derive(Debug, Clone)]
pub struct Bus {
    ram: Ram,
    open_bus: u8,

    pub ppu: Ppu,
    pub apu: Apu,
    pub controllers: [Controller; 2],
    cartridge: Option<Cartridge>,

    ledger: InterruptLedger,
    now: u64,
    irq_line: bool,
    oam_dma_request: Option<(u8, u64)>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self {
            ram: Ram::new(),
            open_bus: 0,
            ppu: Ppu::new(),
            apu: Apu::new(),
            controllers: [Controller::new(), Controller::new()],
            cartridge: None,
            ledger: InterruptLedger::new(),
            now: 0,
            irq_line: false,
            oam_dma_request: None,
        }
    }

    /// Cold start. RAM and the ledger start over; the cartridge stays inserted.
    pub fn power_on(&mut self, skip_warmup: bool) {
        self.ram.clear();
        self.open_bus = 0;
        self.ppu.power_on(skip_warmup);
        self.apu.reset();
        self.ledger = InterruptLedger::new();
        self.now = 0;
        self.reset_lines();
        if let Some(cart) = self.cartridge.as_mut() {
            cart.reset();
        }
    }

    /// Reset button. RAM, the ledger and the tick stamp survive.
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.reset_lines();
        if let Some(cart) = self.cartridge.as_mut() {
            cart.reset();
        }
    }

    fn reset_lines(&mut self) {
        self.irq_line = false;
        self.oam_dma_request = None;
        for pad in &mut self.controllers {
            pad.write_strobe(0);
        }
    }

    // -----------------------------
    // Cartridge slot
    // -----------------------------

    pub fn insert_cartridge(&mut self, cart: Cartridge) -> Option<Cartridge> {
        self.cartridge.replace(cart)
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    // -----------------------------
    // Orchestrator inputs
    // -----------------------------

    /// Tick stamp used for every ledger event until the next call.
    #[inline]
    pub fn set_tick(&mut self, tick: u64) {
        self.now = tick;
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.now
    }

    #[inline]
    pub fn set_irq_line(&mut self, level: bool) {
        self.irq_line = level;
    }

    /// Page written to $4014 since the last call, with the CPU cycle of the
    /// write.
    #[inline]
    pub fn take_oam_dma_request(&mut self) -> Option<(u8, u64)> {
        self.oam_dma_request.take()
    }

    pub fn ledger(&self) -> &InterruptLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut InterruptLedger {
        &mut self.ledger
    }

    /// Vblank began. Uses the NMI enable in effect right now.
    pub fn record_vblank_set(&mut self, tick: u64) {
        let enabled = self.ppu.nmi_enabled();
        self.ledger.record_assert_set(tick, enabled);
    }

    pub fn record_vblank_clear(&mut self, tick: u64) {
        self.ledger.record_assert_clear(tick);
    }

    #[inline]
    pub fn open_bus(&self) -> u8 {
        self.open_bus
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    // -----------------------------
    // CPU-visible memory interface
    // -----------------------------

    pub fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0x0000..=0x1FFF => self.ram.read(addr),
            0x2000..=0x3FFF => self.read_ppu_register(0x2000 | (addr & 0x0007)),
            0x4015 => self.apu.read_status(),
            0x4016 => (self.open_bus & 0xE0) | self.controllers[0].read(),
            0x4017 => (self.open_bus & 0xE0) | self.controllers[1].read(),
            0x4000..=0x401F => self.open_bus,
            _ => self
                .cartridge
                .as_mut()
                .and_then(|cart| cart.cpu_read(addr))
                .unwrap_or(self.open_bus),
        };
        self.open_bus = value;
        value
    }

    fn read_ppu_register(&mut self, reg: u16) -> u8 {
        if reg == PPUSTATUS {
            let vblank = if self.ledger.flag_visible() { 0x80 } else { 0 };
            let sprite = self.ppu.read_status() & 0x60;
            self.ledger.record_status_read(self.now);
            return vblank | sprite | (self.open_bus & 0x1F);
        }
        self.ppu
            .read_reg(reg, self.cartridge.as_ref())
            .unwrap_or(self.open_bus)
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        self.open_bus = value;
        match addr {
            0x0000..=0x1FFF => self.ram.write(addr, value),
            0x2000..=0x3FFF => {
                let reg = 0x2000 | (addr & 0x0007);
                let was_enabled = self.ppu.nmi_enabled();
                self.ppu.write_reg(reg, value, self.cartridge.as_mut());
                if reg == PPUCTRL {
                    let enabled = self.ppu.nmi_enabled();
                    self.ledger.record_enable_toggle(self.now, was_enabled, enabled);
                }
            }
            0x4014 => {
                let cycle = self.now / CPU_DIVIDER;
                log::trace!("OAM DMA requested from page ${value:02X} on cycle {cycle}");
                self.oam_dma_request = Some((value, cycle));
            }
            0x4016 => {
                for pad in &mut self.controllers {
                    pad.write_strobe(value);
                }
            }
            0x4000..=0x4017 => self.apu.write_reg(addr, value),
            0x4018..=0x401F => {}
            _ => {
                if let Some(cart) = self.cartridge.as_mut() {
                    cart.cpu_write(addr, value);
                }
            }
        }
    }

    /// Read without side effects, for debuggers. Registers whose reads have
    /// side effects report open bus.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram.read(addr),
            0x2000..=0x3FFF if addr & 0x0007 == 0x0002 => {
                let vblank = if self.ledger.flag_visible() { 0x80 } else { 0 };
                vblank | (self.open_bus & 0x1F)
            }
            0x4015 => self.apu.peek_status(),
            0x4016 => (self.open_bus & 0xE0) | self.controllers[0].peek(),
            0x4017 => (self.open_bus & 0xE0) | self.controllers[1].peek(),
            0x2000..=0x401F => self.open_bus,
            _ => self
                .cartridge
                .as_ref()
                .and_then(|cart| cart.cpu_peek(addr))
                .unwrap_or(self.open_bus),
        }
    }

    /// Little-endian word via `peek`.
    pub fn peek_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.peek(addr), self.peek(addr.wrapping_add(1))])
    }
}

impl CpuBus for Bus {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        Bus::read(self, addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        Bus::write(self, addr, value)
    }

    fn nmi_line(&self) -> bool {
        self.ledger
            .should_assert_line(self.now, self.ppu.nmi_enabled())
    }

    #[inline]
    fn irq_line(&self) -> bool {
        self.irq_line
    }

    fn acknowledge_nmi(&mut self) {
        self.ledger.acknowledge(self.now);
    }
}

impl CpuMemory for Bus {
    #[inline]
    fn cpu_read(&mut self, addr: u16) -> u8 {
        self.read(addr)
    }
}

impl OamWriter for Bus {
    #[inline]
    fn write_oam_data(&mut self, value: u8) {
        self.ppu.write_oam_data(value);
    }
}
