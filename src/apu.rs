/*!
APU register file, frame counter IRQ and the DMC sample reader.

Scope:
- $4000..=$4013 channel registers are stored; only the DMC ($4010..=$4013) is
  simulated. No audio is produced.
- $4015 write: channel enable mask; bit 4 starts or stops the DMC and any
  write clears the DMC interrupt flag.
- $4015 read: enable bits 0..3, DMC active (bit 4), frame IRQ (bit 6), DMC IRQ
  (bit 7). Reading clears the frame IRQ flag.
- $4017 write: bit 7 selects 5-step mode, bit 6 inhibits (and clears) the
  frame IRQ. The sequence restarts on every write.

Timing (NTSC, in CPU cycles):
- 4-step sequence: period 29830, frame IRQ raised at cycle 29829.
- 5-step sequence: period 37282, never raises an IRQ.
- DMC output unit: one bit every `DMC_RATES[rate]` cycles; after 8 bits the
  sample buffer is consumed and a new fetch is requested through
  `ApuSignals::dmc_request`. The fetched byte comes back via `receive_sample`.
*/

/// Cycle of the 4-step sequence on which the frame IRQ is raised.
pub const FRAME_IRQ_CYCLE: u32 = 29829;
const FOUR_STEP_PERIOD: u32 = 29830;
const FIVE_STEP_PERIOD: u32 = 37282;

/// DMC output periods per rate index.
pub const DMC_RATES: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// Outputs of one APU step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApuSignals {
    pub frame_irq: bool,
    pub dmc_irq: bool,
    /// The DMC wants the byte at this address.
    pub dmc_request: Option<u16>,
}

#[derive(Clone, Debug)]
struct Dmc {
    irq_enabled: bool,
    loop_flag: bool,
    rate_index: usize,
    output_level: u8,

    sample_addr: u16,
    sample_len: u16,
    current_addr: u16,
    bytes_remaining: u16,

    buffer: Option<u8>,
    fetch_outstanding: bool,

    timer: u16,
    shift: u8,
    bits_remaining: u8,
    silence: bool,

    irq: bool,
}

impl Dmc {
    fn new() -> Self {
        Self {
            irq_enabled: false,
            loop_flag: false,
            rate_index: 0,
            output_level: 0,
            sample_addr: 0xC000,
            sample_len: 1,
            current_addr: 0xC000,
            bytes_remaining: 0,
            buffer: None,
            fetch_outstanding: false,
            timer: DMC_RATES[0],
            shift: 0,
            bits_remaining: 8,
            silence: true,
            irq: false,
        }
    }

    fn restart(&mut self) {
        self.current_addr = self.sample_addr;
        self.bytes_remaining = self.sample_len;
    }

    fn clock_output(&mut self) {
        if !self.silence {
            if self.shift & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
        }
        self.shift >>= 1;
        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.buffer.take() {
                Some(b) => {
                    self.shift = b;
                    self.silence = false;
                }
                None => self.silence = true,
            }
        }
    }

    fn step(&mut self) -> Option<u16> {
        self.timer -= 1;
        if self.timer == 0 {
            self.timer = DMC_RATES[self.rate_index];
            self.clock_output();
        }
        if self.buffer.is_none() && self.bytes_remaining > 0 && !self.fetch_outstanding {
            self.fetch_outstanding = true;
            return Some(self.current_addr);
        }
        None
    }

    fn receive(&mut self, byte: u8) {
        self.fetch_outstanding = false;
        if self.bytes_remaining == 0 {
            return;
        }
        self.buffer = Some(byte);
        self.current_addr = if self.current_addr == 0xFFFF {
            0x8000
        } else {
            self.current_addr + 1
        };
        self.bytes_remaining -= 1;
        if self.bytes_remaining == 0 {
            if self.loop_flag {
                self.restart();
            } else if self.irq_enabled {
                self.irq = true;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Apu {
    // Raw register mirror for $4000..=$4017; the $4014 slot is unused.
    regs: [u8; 0x18],
    enabled_mask: u8,

    five_step: bool,
    irq_inhibit: bool,
    frame_irq: bool,
    frame_cycle: u32,

    dmc: Dmc,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    pub fn new() -> Self {
        Self {
            regs: [0; 0x18],
            enabled_mask: 0,
            five_step: false,
            irq_inhibit: false,
            frame_irq: false,
            frame_cycle: 0,
            dmc: Dmc::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance one CPU cycle.
    pub fn step(&mut self) -> ApuSignals {
        self.frame_cycle += 1;
        if self.five_step {
            if self.frame_cycle >= FIVE_STEP_PERIOD {
                self.frame_cycle = 0;
            }
        } else {
            if self.frame_cycle == FRAME_IRQ_CYCLE && !self.irq_inhibit {
                self.frame_irq = true;
            }
            if self.frame_cycle >= FOUR_STEP_PERIOD {
                self.frame_cycle = 0;
            }
        }

        let dmc_request = self.dmc.step();
        if let Some(addr) = dmc_request {
            log::trace!("DMC fetch request ${addr:04X}");
        }

        ApuSignals {
            frame_irq: self.frame_irq,
            dmc_irq: self.dmc.irq,
            dmc_request,
        }
    }

    /// Byte fetched by the DMC DMA for the last request.
    pub fn receive_sample(&mut self, byte: u8) {
        self.dmc.receive(byte);
    }

    pub fn write_reg(&mut self, addr: u16, value: u8) {
        if !(0x4000..=0x4017).contains(&addr) || addr == 0x4014 || addr == 0x4016 {
            return;
        }
        self.regs[(addr - 0x4000) as usize] = value;

        match addr {
            0x4010 => {
                self.dmc.irq_enabled = value & 0x80 != 0;
                self.dmc.loop_flag = value & 0x40 != 0;
                self.dmc.rate_index = (value & 0x0F) as usize;
                if !self.dmc.irq_enabled {
                    self.dmc.irq = false;
                }
            }
            0x4011 => self.dmc.output_level = value & 0x7F,
            0x4012 => self.dmc.sample_addr = 0xC000 | ((value as u16) << 6),
            0x4013 => self.dmc.sample_len = ((value as u16) << 4) + 1,
            0x4015 => {
                self.enabled_mask = value & 0x1F;
                self.dmc.irq = false;
                if value & 0x10 == 0 {
                    self.dmc.bytes_remaining = 0;
                } else if self.dmc.bytes_remaining == 0 {
                    self.dmc.restart();
                }
            }
            0x4017 => {
                self.five_step = value & 0x80 != 0;
                self.irq_inhibit = value & 0x40 != 0;
                if self.irq_inhibit {
                    self.frame_irq = false;
                }
                self.frame_cycle = 0;
            }
            _ => {}
        }
    }

    /// $4015 read. Clears the frame IRQ flag.
    pub fn read_status(&mut self) -> u8 {
        let status = self.peek_status();
        self.frame_irq = false;
        status
    }

    /// $4015 without side effects.
    pub fn peek_status(&self) -> u8 {
        let mut status = self.enabled_mask & 0x0F;
        if self.dmc.bytes_remaining > 0 {
            status |= 0x10;
        }
        if self.frame_irq {
            status |= 0x40;
        }
        if self.dmc.irq {
            status |= 0x80;
        }
        status
    }

    #[inline]
    pub fn frame_irq(&self) -> bool {
        self.frame_irq
    }

    #[inline]
    pub fn dmc_irq(&self) -> bool {
        self.dmc.irq
    }

    /// Combined APU contribution to the IRQ line.
    #[inline]
    pub fn irq_pending(&self) -> bool {
        self.frame_irq || self.dmc.irq
    }

    pub fn dmc_output_level(&self) -> u8 {
        self.dmc.output_level
    }

    /// Mirror of the last value written to a register.
    pub fn reg(&self, addr: u16) -> u8 {
        match addr {
            0x4000..=0x4017 => self.regs[(addr - 0x4000) as usize],
            _ => 0,
        }
    }
}
