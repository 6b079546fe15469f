/*!
cpu::mod - public surface of the 2A03 CPU execution engine.

Layout

```text
    state.rs       - Registers and status flag helpers.
    table.rs       - Opcode byte -> (Mnemonic, Mode) decode.
    addressing.rs  - Micro-op sequences per addressing mode.
    execute.rs     - Pure instruction semantics returning a `Delta`.
    core/          - `Cpu`, the per-tick state machine and interrupt service.
```

The engine talks to the outside world only through `CpuBus`, which the
console's `Bus` implements. Tests drive it with a flat-memory mock.
*/

pub mod addressing;
pub mod core;
pub mod execute;
pub mod state;
pub mod table;

pub use crate::cpu::core::{Cpu, CpuPhase, InterruptKind};
pub use crate::cpu::state::{
    BREAK, CARRY, DECIMAL, IRQ_DISABLE, NEGATIVE, OVERFLOW, Registers, UNUSED, ZERO,
};

/// NMI vector.
pub const NMI_VECTOR: u16 = 0xFFFA;
/// RESET vector.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ / BRK vector.
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Everything the CPU can see of the machine during one tick.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    /// Level of the NMI input right now.
    fn nmi_line(&self) -> bool;
    /// Level of the shared IRQ input right now.
    fn irq_line(&self) -> bool;
    /// Called on the last tick of an NMI service sequence.
    fn acknowledge_nmi(&mut self);
}

/// Result of the single prioritized interrupt poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingInterrupt {
    #[default]
    None,
    /// NMI: edge-latched, ignores the I flag.
    Edge,
    /// IRQ: level-sensitive, masked by the I flag.
    Level,
}

impl PendingInterrupt {
    /// Edge beats Level. Level is dropped while `irq_masked`.
    #[inline]
    pub const fn poll(nmi: bool, irq: bool, irq_masked: bool) -> Self {
        if nmi {
            PendingInterrupt::Edge
        } else if irq && !irq_masked {
            PendingInterrupt::Level
        } else {
            PendingInterrupt::None
        }
    }

    #[inline]
    pub const fn is_pending(self) -> bool {
        !matches!(self, PendingInterrupt::None)
    }
}

#[cfg(test)]
mod tests {
    use super::PendingInterrupt;

    #[test]
    fn edge_has_priority_over_level() {
        assert_eq!(PendingInterrupt::poll(true, true, false), PendingInterrupt::Edge);
        assert_eq!(PendingInterrupt::poll(true, false, true), PendingInterrupt::Edge);
    }

    #[test]
    fn level_is_masked_by_i_flag() {
        assert_eq!(PendingInterrupt::poll(false, true, true), PendingInterrupt::None);
        assert_eq!(PendingInterrupt::poll(false, true, false), PendingInterrupt::Level);
        assert!(!PendingInterrupt::poll(false, false, false).is_pending());
    }
}
