/*!
core::Cpu - the per-tick 6502 state machine.

One call to `tick` is one CPU cycle and performs at most one bus access.

Phases
======
- FetchOpcode: poll interrupts, then either fetch+decode or hijack.
- FetchOperand / Execute: walk the instruction's micro-op slice
  (`addressing::sequence`). Execute marks the slice's final entry.
- ServiceInterrupt: the 7-tick NMI / IRQ / BRK / RESET sequence.
- Jammed: an illegal opcode was fetched. `tick` does nothing until reset.

Interrupt hijack
================
The poll happens at the start of the opcode-fetch tick. When something is
pending, that same tick performs a dummy read at PC (no increment) and
becomes tick 1 of the service sequence:

```text
    1  read PC (discarded)          [BRK: opcode fetch, PC+1]
    2  read PC (discarded)          [BRK: padding byte, PC+1]
    3  push PCH
    4  push PCL
    5  push P (B clear, or set for BRK), then set I
    6  read vector low
    7  read vector high, jump       [NMI: acknowledge]
```

RESET runs the same seven ticks with the pushes turned into reads. An NMI
that is asserted by tick 5 of an IRQ or BRK steals the vector.

Interrupts are polled only at opcode-fetch ticks, so the one-instruction
delay real hardware gives CLI/SEI/PLP is not modelled.
*/


use crate::cpu::addressing::{MicroOp, sequence};
use crate::cpu::execute::{branch_taken, execute};
use crate::cpu::state::{IRQ_DISABLE, Registers, with_zn};
use crate::cpu::table::{Mnemonic, Mode, Opcode, decode};
use crate::cpu::{CpuBus, IRQ_VECTOR, NMI_VECTOR, PendingInterrupt, RESET_VECTOR};

/// Ticks in an interrupt service sequence.
pub const SERVICE_TICKS: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuPhase {
    FetchOpcode,
    FetchOperand,
    Execute,
    ServiceInterrupt,
    Jammed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    Nmi,
    Irq,
    Brk,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

const NOP: Opcode = Opcode {
    byte: 0xEA,
    mnemonic: Mnemonic::Nop,
    mode: Mode::Implied,
};

#[derive(Debug, Clone)]
pub struct Cpu {
    regs: Registers,
    phase: CpuPhase,
    cycles: u64,

    // Current instruction.
    opcode: Opcode,
    ops: &'static [MicroOp],
    step: usize,
    /// Ticks spent on the current instruction or service sequence.
    cycle: u8,

    // Operand latches.
    addr: u16,
    ptr: u8,
    data: u8,
    page_crossed: bool,

    // Interrupt service.
    service: InterruptKind,
    vector: u16,

    // Line samples, refreshed every tick.
    nmi_line: bool,
    irq_line: bool,

    jam_opcode: Option<u8>,
    log_interrupts: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Power-up state. The first ticks run the RESET sequence.
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::new(),
            phase: CpuPhase::FetchOpcode,
            cycles: 0,
            opcode: NOP,
            ops: &[],
            step: 0,
            cycle: 0,
            addr: 0,
            ptr: 0,
            data: 0,
            page_crossed: false,
            service: InterruptKind::Reset,
            vector: RESET_VECTOR,
            nmi_line: false,
            irq_line: false,
            jam_opcode: None,
            log_interrupts: false,
        };
        cpu.reset();
        cpu
    }

    /// Arm the RESET sequence. Registers other than SP/P/PC are kept; the
    /// sequence itself adjusts SP and sets I.
    pub fn reset(&mut self) {
        self.jam_opcode = None;
        self.nmi_line = false;
        self.irq_line = false;
        self.begin_service(InterruptKind::Reset, 0);
    }

    /// Power-on: fresh registers, then RESET.
    pub fn power_on(&mut self) {
        let log_interrupts = self.log_interrupts;
        *self = Self::new();
        self.log_interrupts = log_interrupts;
    }

    pub fn set_log_interrupts(&mut self, on: bool) {
        self.log_interrupts = on;
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    #[inline]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    #[inline]
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    #[inline]
    pub fn phase(&self) -> CpuPhase {
        self.phase
    }

    #[inline]
    pub fn is_jammed(&self) -> bool {
        self.phase == CpuPhase::Jammed
    }

    /// Opcode byte that jammed the engine, if any.
    #[inline]
    pub fn jam_opcode(&self) -> Option<u8> {
        self.jam_opcode
    }

    /// CPU cycles executed (DMA stalls excluded).
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// True when the next tick starts a new instruction.
    #[inline]
    pub fn at_instruction_boundary(&self) -> bool {
        self.phase == CpuPhase::FetchOpcode
    }

    /// The single prioritized interrupt poll.
    #[inline]
    pub fn pending_interrupt(&self) -> PendingInterrupt {
        PendingInterrupt::poll(self.nmi_line, self.irq_line, self.regs.flag(IRQ_DISABLE))
    }

    // ---------------------------------------------------------------------
    // Tick
    // ---------------------------------------------------------------------

    /// Run one CPU cycle.
    pub fn tick<B: CpuBus>(&mut self, bus: &mut B) {
        if self.phase == CpuPhase::Jammed {
            return;
        }
        self.cycles += 1;
        self.nmi_line = bus.nmi_line();
        self.irq_line = bus.irq_line();

        match self.phase {
            CpuPhase::FetchOpcode => self.fetch_or_hijack(bus),
            CpuPhase::FetchOperand | CpuPhase::Execute => self.run_micro_op(bus),
            CpuPhase::ServiceInterrupt => self.service_step(bus),
            CpuPhase::Jammed => {}
        }
    }

    fn fetch_or_hijack<B: CpuBus>(&mut self, bus: &mut B) {
        let kind = match self.pending_interrupt() {
            PendingInterrupt::Edge => Some(InterruptKind::Nmi),
            PendingInterrupt::Level => Some(InterruptKind::Irq),
            PendingInterrupt::None => None,
        };
        if let Some(kind) = kind {
            // Hijacked fetch: same bus access, byte dropped, PC untouched.
            let _ = bus.read(self.regs.pc);
            self.begin_service(kind, 1);
            return;
        }

        let byte = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        let Some(op) = decode(byte) else {
            self.jam(byte);
            return;
        };
        match op.mnemonic {
            Mnemonic::Jam => self.jam(byte),
            Mnemonic::Brk => {
                self.opcode = op;
                self.begin_service(InterruptKind::Brk, 1);
            }
            _ => {
                self.opcode = op;
                self.ops = sequence(op);
                self.step = 0;
                self.cycle = 1;
                self.phase = self.operand_phase();
            }
        }
    }

    fn jam(&mut self, byte: u8) {
        log::warn!(
            "CPU jammed on opcode ${:02X} at ${:04X}",
            byte,
            self.regs.pc.wrapping_sub(1)
        );
        self.jam_opcode = Some(byte);
        self.phase = CpuPhase::Jammed;
    }

    #[inline]
    fn operand_phase(&self) -> CpuPhase {
        if self.step + 1 >= self.ops.len() {
            CpuPhase::Execute
        } else {
            CpuPhase::FetchOperand
        }
    }

    fn run_micro_op<B: CpuBus>(&mut self, bus: &mut B) {
        let Some(&op) = self.ops.get(self.step) else {
            self.phase = CpuPhase::FetchOpcode;
            return;
        };
        self.cycle = self.cycle.saturating_add(1);
        let flow = self.micro_op(op, bus);
        self.step += 1;
        if self.phase == CpuPhase::Jammed {
            return;
        }
        if flow == Flow::Done || self.step >= self.ops.len() {
            self.phase = CpuPhase::FetchOpcode;
        } else {
            self.phase = self.operand_phase();
        }
    }

    // ---------------------------------------------------------------------
    // Micro-ops
    // ---------------------------------------------------------------------

    fn micro_op<B: CpuBus>(&mut self, op: MicroOp, bus: &mut B) -> Flow {
        let mn = self.opcode.mnemonic;
        match op {
            MicroOp::DummyReadPc => {
                let _ = bus.read(self.regs.pc);
            }
            MicroOp::ImpliedExecute => {
                let _ = bus.read(self.regs.pc);
                let accumulator = self.opcode.mode == Mode::Accumulator;
                let operand = if accumulator { self.regs.a } else { 0 };
                let delta = execute(mn, &self.regs, operand);
                delta.apply(&mut self.regs);
                if accumulator {
                    if let Some(v) = delta.write {
                        self.regs.a = v;
                    }
                }
                if delta.halt {
                    self.jam(self.opcode.byte);
                }
                return Flow::Done;
            }
            MicroOp::ReadImmediate => {
                let v = self.fetch_pc(bus);
                execute(mn, &self.regs, v).apply(&mut self.regs);
                return Flow::Done;
            }

            MicroOp::FetchAddrLo => {
                self.addr = self.fetch_pc(bus) as u16;
            }
            MicroOp::FetchAddrHi => {
                let hi = self.fetch_pc(bus) as u16;
                self.addr |= hi << 8;
            }
            MicroOp::ZpIndexX => {
                let _ = bus.read(self.addr);
                self.addr = (self.addr as u8).wrapping_add(self.regs.x) as u16;
            }
            MicroOp::ZpIndexY => {
                let _ = bus.read(self.addr);
                self.addr = (self.addr as u8).wrapping_add(self.regs.y) as u16;
            }
            MicroOp::FetchHiIndexX => {
                let hi = self.fetch_pc(bus);
                self.index_into(hi, self.regs.x);
            }
            MicroOp::FetchHiIndexY => {
                let hi = self.fetch_pc(bus);
                self.index_into(hi, self.regs.y);
            }
            MicroOp::ReadIndexed => {
                let v = bus.read(self.addr);
                if !self.page_crossed {
                    execute(mn, &self.regs, v).apply(&mut self.regs);
                    return Flow::Done;
                }
                self.addr = self.addr.wrapping_add(0x0100);
            }
            MicroOp::FixIndexed => {
                let _ = bus.read(self.addr);
                if self.page_crossed {
                    self.addr = self.addr.wrapping_add(0x0100);
                }
            }

            MicroOp::FetchPtr => {
                self.ptr = self.fetch_pc(bus);
            }
            MicroOp::PtrIndexX => {
                let _ = bus.read(self.ptr as u16);
                self.ptr = self.ptr.wrapping_add(self.regs.x);
            }
            MicroOp::PtrLo => {
                self.addr = bus.read(self.ptr as u16) as u16;
            }
            MicroOp::PtrHi => {
                let hi = bus.read(self.ptr.wrapping_add(1) as u16) as u16;
                self.addr |= hi << 8;
            }
            MicroOp::PtrHiIndexY => {
                let hi = bus.read(self.ptr.wrapping_add(1) as u16);
                self.index_into(hi, self.regs.y);
            }

            MicroOp::ReadExecute => {
                let v = bus.read(self.addr);
                execute(mn, &self.regs, v).apply(&mut self.regs);
            }
            MicroOp::WriteExecute => {
                let delta = execute(mn, &self.regs, 0);
                if let Some(v) = delta.write {
                    bus.write(self.addr, v);
                }
                delta.apply(&mut self.regs);
            }
            MicroOp::RmwRead => {
                self.data = bus.read(self.addr);
            }
            MicroOp::RmwDummyWrite => {
                bus.write(self.addr, self.data);
            }
            MicroOp::RmwWrite => {
                let delta = execute(mn, &self.regs, self.data);
                if let Some(v) = delta.write {
                    bus.write(self.addr, v);
                }
                delta.apply(&mut self.regs);
            }

            MicroOp::BranchFetch => {
                self.data = self.fetch_pc(bus);
                if !branch_taken(mn, self.regs.p) {
                    return Flow::Done;
                }
            }
            MicroOp::BranchTake => {
                let _ = bus.read(self.regs.pc);
                let offset = self.data as i8 as i16 as u16;
                let target = self.regs.pc.wrapping_add(offset);
                if target & 0xFF00 == self.regs.pc & 0xFF00 {
                    self.regs.pc = target;
                    return Flow::Done;
                }
                self.regs.pc = (self.regs.pc & 0xFF00) | (target & 0x00FF);
                self.addr = target;
            }
            MicroOp::BranchFix => {
                let _ = bus.read(self.regs.pc);
                self.regs.pc = self.addr;
            }

            MicroOp::JmpAbsHi => {
                let hi = bus.read(self.regs.pc) as u16;
                self.regs.pc = (hi << 8) | (self.addr & 0x00FF);
            }
            MicroOp::IndirectLo => {
                self.data = bus.read(self.addr);
            }
            MicroOp::IndirectHi => {
                // The pointer's high byte is read without carrying into the page.
                let hi_addr = (self.addr & 0xFF00) | (self.addr.wrapping_add(1) & 0x00FF);
                let hi = bus.read(hi_addr) as u16;
                self.regs.pc = (hi << 8) | self.data as u16;
            }

            MicroOp::StackDummyRead => {
                let _ = bus.read(self.regs.stack_addr());
            }
            MicroOp::PushPch => self.push(bus, (self.regs.pc >> 8) as u8),
            MicroOp::PushPcl => self.push(bus, self.regs.pc as u8),
            MicroOp::PushA => self.push(bus, self.regs.a),
            MicroOp::PushP => self.push(bus, self.regs.status_for_push(true)),
            MicroOp::PullA => {
                let v = self.pull(bus);
                self.regs.a = v;
                self.regs.p = with_zn(self.regs.p, v);
            }
            MicroOp::PullP => {
                let v = self.pull(bus);
                self.regs.load_status(v);
            }
            MicroOp::PullPcl => {
                self.addr = self.pull(bus) as u16;
            }
            MicroOp::PullPch => {
                let hi = self.pull(bus) as u16;
                self.regs.pc = (hi << 8) | (self.addr & 0x00FF);
            }
            MicroOp::JsrFetchHi => {
                let hi = bus.read(self.regs.pc) as u16;
                self.regs.pc = (hi << 8) | (self.addr & 0x00FF);
            }
            MicroOp::RtsIncrement => {
                let _ = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
        }
        Flow::Continue
    }

    #[inline]
    fn fetch_pc<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        let v = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        v
    }

    /// Form `hi:lo+index` without carrying into `hi`; remember the carry.
    #[inline]
    fn index_into(&mut self, hi: u8, index: u8) {
        let (lo, carry) = (self.addr as u8).overflowing_add(index);
        self.addr = ((hi as u16) << 8) | lo as u16;
        self.page_crossed = carry;
    }

    #[inline]
    fn push<B: CpuBus>(&mut self, bus: &mut B, value: u8) {
        bus.write(self.regs.stack_addr(), value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    #[inline]
    fn pull<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        bus.read(self.regs.stack_addr())
    }

    // ---------------------------------------------------------------------
    // Interrupt service
    // ---------------------------------------------------------------------

    /// Enter the service sequence with `done` ticks already spent.
    fn begin_service(&mut self, kind: InterruptKind, done: u8) {
        self.service = kind;
        self.vector = match kind {
            InterruptKind::Nmi => NMI_VECTOR,
            InterruptKind::Reset => RESET_VECTOR,
            InterruptKind::Irq | InterruptKind::Brk => IRQ_VECTOR,
        };
        self.cycle = done;
        self.phase = CpuPhase::ServiceInterrupt;
        if self.log_interrupts {
            log::debug!("{:?} service from ${:04X}", kind, self.regs.pc);
        } else {
            log::trace!("{:?} service from ${:04X}", kind, self.regs.pc);
        }
    }

    fn service_step<B: CpuBus>(&mut self, bus: &mut B) {
        self.cycle += 1;
        let reset = self.service == InterruptKind::Reset;
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
            }
            2 => {
                let _ = bus.read(self.regs.pc);
                if self.service == InterruptKind::Brk {
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                }
            }
            3 | 4 => {
                let value = if self.cycle == 3 {
                    (self.regs.pc >> 8) as u8
                } else {
                    self.regs.pc as u8
                };
                self.service_push(bus, value, reset);
            }
            5 => {
                let value = self.regs.status_for_push(self.service == InterruptKind::Brk);
                self.service_push(bus, value, reset);
                self.regs.set_flag(IRQ_DISABLE, true);
                if matches!(self.service, InterruptKind::Irq | InterruptKind::Brk)
                    && self.nmi_line
                {
                    self.service = InterruptKind::Nmi;
                    self.vector = NMI_VECTOR;
                }
            }
            6 => {
                self.addr = bus.read(self.vector) as u16;
            }
            _ => {
                let hi = bus.read(self.vector.wrapping_add(1)) as u16;
                self.regs.pc = (hi << 8) | (self.addr & 0x00FF);
                if self.service == InterruptKind::Nmi {
                    bus.acknowledge_nmi();
                }
                self.phase = CpuPhase::FetchOpcode;
            }
        }
    }

    /// Push during service. RESET turns the write into a read.
    #[inline]
    fn service_push<B: CpuBus>(&mut self, bus: &mut B, value: u8, suppress: bool) {
        if suppress {
            let _ = bus.read(self.regs.stack_addr());
            self.regs.sp = self.regs.sp.wrapping_sub(1);
        } else {
            self.push(bus, value);
        }
    }

    /// Ticks spent in the current service sequence, 0 outside one.
    #[inline]
    pub fn service_cycle(&self) -> u8 {
        if self.phase == CpuPhase::ServiceInterrupt {
            self.cycle
        } else {
            0
        }
    }

    /// Kind of the current (or last) service sequence.
    #[inline]
    pub fn service_kind(&self) -> InterruptKind {
        self.service
    }
}
