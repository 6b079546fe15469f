/*!
Console: the tick orchestrator and host surface.

One `tick()` is one master (PPU dot) tick:

1. Snapshot the clock and advance it. The advance is 2 when rendering is on,
   the frame is odd and the snapshot sits at scanline 261 dot 339, so dot
   (261, 340) is never visited.
2. Step the PPU at the snapshot position. Vblank set/clear go straight into
   the interrupt ledger; A12 rises clock the mapper.
3. On CPU ticks (every third master tick) stamp the bus, step the APU, compose
   the IRQ line (frame | DMC | mapper), start a queued OAM DMA, then run
   exactly one of: DMC DMA, OAM DMA, CPU.

The clock lives here and nowhere else. Other components see copied tick
stamps.

`tick()` cannot fail. Before `power_on()` and after the CPU jams it does
nothing.
*/


use std::path::Path;

use crate::bus::{Bus, DmcDma, OamDma};
use crate::cartridge::Cartridge;
use crate::clock::{MasterClock, PRE_RENDER_SCANLINE};
use crate::config::EmuConfig;
use crate::controller::Controller;
use crate::cpu::{Cpu, Registers};
use crate::error::{EmuError, Result};
use crate::ppu::PpuSignals;

/// Dot on the pre-render line that is skipped on odd frames.
const ODD_FRAME_SKIP_DOT: u16 = 339;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStatus {
    /// Not powered on yet.
    Off,
    Running,
    /// The CPU fetched an illegal opcode; only `reset` or `power_on` recover.
    Jammed,
}

#[derive(Debug, Clone)]
pub struct Console {
    clock: MasterClock,
    cpu: Cpu,
    bus: Bus,
    oam_dma: OamDma,
    dmc_dma: DmcDma,
    powered: bool,
    frames: u64,
    config: EmuConfig,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(EmuConfig::default())
    }
}

impl Console {
    pub fn new(config: EmuConfig) -> Self {
        let mut clock = MasterClock::new();
        clock.set_speed_multiplier(config.speed_multiplier);
        let mut cpu = Cpu::new();
        cpu.set_log_interrupts(config.log_interrupts);
        Self {
            clock,
            cpu,
            bus: Bus::new(),
            oam_dma: OamDma::new(),
            dmc_dma: DmcDma::new(),
            powered: false,
            frames: 0,
            config,
        }
    }

    /// Insert a cartridge, returning the one it replaces.
    pub fn insert_cartridge(&mut self, cart: Cartridge) -> Option<Cartridge> {
        log::info!(
            "cartridge attached: mapper {}, {:?} mirroring",
            cart.mapper_id(),
            cart.mirroring()
        );
        self.bus.insert_cartridge(cart)
    }

    /// Load an iNES file and insert it.
    pub fn load_rom<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let cart = Cartridge::from_ines_file(path)?;
        self.insert_cartridge(cart);
        Ok(())
    }

    /// Cold start: clock, ledger, RAM and every device start over.
    pub fn power_on(&mut self) {
        self.clock = MasterClock::new();
        self.clock.set_speed_multiplier(self.config.speed_multiplier);
        self.bus.power_on(self.config.skip_warmup);
        self.cpu.power_on();
        self.cpu.set_log_interrupts(self.config.log_interrupts);
        self.oam_dma.reset();
        self.dmc_dma.reset();
        self.frames = 0;
        self.powered = true;
        log::info!(
            "power on (warm-up {})",
            if self.config.skip_warmup { "skipped" } else { "armed" }
        );
    }

    /// Reset button: CPU and peripherals re-initialize; clock, ledger and RAM
    /// are preserved.
    pub fn reset(&mut self) -> Result<()> {
        if !self.powered {
            return Err(EmuError::NotPowered);
        }
        self.cpu.reset();
        self.bus.reset();
        self.oam_dma.reset();
        self.dmc_dma.reset();
        log::info!("reset at tick {}", self.clock.ticks());
        Ok(())
    }

    /// Advance one master tick.
    pub fn tick(&mut self) {
        if !self.powered || self.cpu.is_jammed() {
            return;
        }

        let pre = self.clock;
        let skip_dot = pre.is_odd_frame()
            && pre.scanline() == PRE_RENDER_SCANLINE
            && pre.dot() == ODD_FRAME_SKIP_DOT
            && self.bus.ppu.rendering_enabled();
        self.clock.advance(if skip_dot { 2 } else { 1 });
        let now = pre.ticks();

        let signals = self.bus.ppu.step(pre.scan_position());
        if signals.contains(PpuSignals::VBLANK_SET) {
            self.bus.record_vblank_set(now);
        }
        if signals.contains(PpuSignals::VBLANK_CLEAR) {
            self.bus.record_vblank_clear(now);
        }
        if signals.contains(PpuSignals::A12_RISE) {
            if let Some(cart) = self.bus.cartridge_mut() {
                cart.notify_a12_rise();
            }
        }
        if signals.contains(PpuSignals::FRAME_COMPLETE) {
            self.frames += 1;
            log::trace!("frame {} complete at tick {}", pre.frame_index(), now);
        }

        if !pre.is_cpu_tick() {
            return;
        }

        self.bus.set_tick(now);
        let apu = self.bus.apu.step();
        if let Some(addr) = apu.dmc_request {
            self.dmc_dma.start(addr);
        }
        let mapper_irq = self.bus.cartridge().is_some_and(Cartridge::irq_pending);
        self.bus
            .set_irq_line(apu.frame_irq || apu.dmc_irq || mapper_irq);

        if let Some((page, write_cycle)) = self.bus.take_oam_dma_request() {
            self.oam_dma.start(page, write_cycle);
        }

        if self.dmc_dma.is_active() {
            if let Some(sample) = self.dmc_dma.step(&mut self.bus) {
                self.bus.apu.receive_sample(sample);
            }
        } else if self.oam_dma.is_active() {
            self.oam_dma.step(&mut self.bus);
        } else {
            self.cpu.tick(&mut self.bus);
        }
    }

    /// Run `n` master ticks.
    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Run until the next frame completes (vblank start), or until the CPU
    /// jams.
    pub fn run_frame(&mut self) -> Result<()> {
        if !self.powered {
            return Err(EmuError::NotPowered);
        }
        let target = self.frames + 1;
        while self.frames < target && !self.cpu.is_jammed() {
            self.tick();
        }
        Ok(())
    }

    pub fn status(&self) -> ConsoleStatus {
        if !self.powered {
            ConsoleStatus::Off
        } else if self.cpu.is_jammed() {
            ConsoleStatus::Jammed
        } else {
            ConsoleStatus::Running
        }
    }

    #[inline]
    pub fn is_jammed(&self) -> bool {
        self.cpu.is_jammed()
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn registers(&self) -> &Registers {
        self.cpu.registers()
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn clock(&self) -> &MasterClock {
        &self.clock
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Pad 0 or 1.
    pub fn controller_mut(&mut self, port: usize) -> Option<&mut Controller> {
        self.bus.controllers.get_mut(port)
    }

    /// Frames completed since power-on.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Side-effect-free CPU-space read.
    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    pub fn config(&self) -> &EmuConfig {
        &self.config
    }

    pub fn dma_active(&self) -> bool {
        self.oam_dma.is_active() || self.dmc_dma.is_active()
    }
}
