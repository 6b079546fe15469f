/*!
DMA engines that steal CPU cycles: OAM (sprite page copy) and DMC (sample fetch).

OAM DMA
- Triggered by a write of page `$XX` to $4014.
- 256 read/write pairs: read `$XX00 + i` through the full CPU decode, write the
  byte to OAMDATA. That is 512 ticks, plus one alignment tick when the
  trigger landed on an odd CPU cycle (512 / 513 total).
- The halt cycle is the triggering write itself, so it is not counted here.

DMC DMA
- Triggered by the APU when its sample buffer empties.
- Three idle ticks with no bus access (the data bus keeps its last value),
  then one fetch tick that reads the sample address. The byte is handed back
  to the caller for delivery to the APU.

Both engines are stepped once per CPU cycle by the console, and only while
active. While either is active the CPU does not advance. DMC has priority; an
OAM transfer interrupted by a DMC fetch simply resumes on the next free tick.
*/

/// CPU-space reads performed on behalf of a DMA engine.
/// Must behave exactly like a CPU read, side effects included.
pub trait CpuMemory {
    fn cpu_read(&mut self, addr: u16) -> u8;
}

/// Destination of OAM DMA bytes. Equivalent to a write to $2004.
pub trait OamWriter {
    fn write_oam_data(&mut self, value: u8);
}

/// Idle ticks before the DMC fetch tick.
pub const DMC_IDLE_TICKS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OamPhase {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct OamDma {
    active: bool,
    src_addr: u16,
    index: u16,
    phase: OamPhase,
    latch: u8,
    align_ticks: u8,
}

impl Default for OamDma {
    fn default() -> Self {
        Self::new()
    }
}

impl OamDma {
    pub const fn new() -> Self {
        Self {
            active: false,
            src_addr: 0,
            index: 0,
            phase: OamPhase::Read,
            latch: 0,
            align_ticks: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Begin copying page `src_page`. `cpu_cycle` is the CPU cycle of the
    /// triggering write; odd cycles add one alignment tick.
    pub fn start(&mut self, src_page: u8, cpu_cycle: u64) {
        self.active = true;
        self.src_addr = (src_page as u16) << 8;
        self.index = 0;
        self.phase = OamPhase::Read;
        self.latch = 0;
        self.align_ticks = (cpu_cycle & 1) as u8;
        log::trace!(
            "OAM DMA from ${:04X} (cpu cycle {}, align {})",
            self.src_addr,
            cpu_cycle,
            self.align_ticks
        );
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ticks left in the current transfer, alignment included. 0 when idle.
    pub fn stall_remaining(&self) -> u32 {
        if !self.active {
            return 0;
        }
        let bytes_left = 256u32.saturating_sub(self.index as u32);
        let transfer = match self.phase {
            OamPhase::Read => bytes_left * 2,
            OamPhase::Write => (bytes_left * 2).saturating_sub(1),
        };
        self.align_ticks as u32 + transfer
    }

    /// One CPU cycle of transfer. Returns true when the CPU is stalled.
    pub fn step<B>(&mut self, bus: &mut B) -> bool
    where
        B: CpuMemory + OamWriter,
    {
        if !self.active {
            return false;
        }

        if self.align_ticks > 0 {
            self.align_ticks -= 1;
            return true;
        }

        match self.phase {
            OamPhase::Read => {
                self.latch = bus.cpu_read(self.src_addr.wrapping_add(self.index));
                self.phase = OamPhase::Write;
            }
            OamPhase::Write => {
                bus.write_oam_data(self.latch);
                self.index += 1;
                self.phase = OamPhase::Read;
                if self.index >= 256 {
                    self.active = false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct DmcDma {
    active: bool,
    addr: u16,
    idle_left: u8,
}

impl Default for DmcDma {
    fn default() -> Self {
        Self::new()
    }
}

impl DmcDma {
    pub const fn new() -> Self {
        Self {
            active: false,
            addr: 0,
            idle_left: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Queue a sample fetch from `addr`. A request while a fetch is already in
    /// flight is ignored; the APU only asks again after it is served.
    pub fn start(&mut self, addr: u16) {
        if self.active {
            return;
        }
        self.active = true;
        self.addr = addr;
        self.idle_left = DMC_IDLE_TICKS;
        log::trace!("DMC DMA fetch queued for ${:04X}", addr);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stall_remaining(&self) -> u32 {
        if self.active {
            self.idle_left as u32 + 1
        } else {
            0
        }
    }

    /// One CPU cycle. Returns the fetched byte on the final tick.
    pub fn step<M: CpuMemory>(&mut self, mem: &mut M) -> Option<u8> {
        if !self.active {
            return None;
        }
        if self.idle_left > 0 {
            self.idle_left -= 1;
            return None;
        }
        self.active = false;
        Some(mem.cpu_read(self.addr))
    }
}
