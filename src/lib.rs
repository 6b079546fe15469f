#![doc = r#"
lockstep: a cycle-locked NES core.

A single master clock drives everything. Each `Console::tick()` is one PPU
dot; every third tick is also a CPU cycle in which exactly one of the DMC DMA,
the OAM DMA or the CPU touches the bus.

Modules:
- clock: `MasterClock`, the only counter; scan position and CPU phase are derived
- ledger: `InterruptLedger`, timestamped vblank / NMI bookkeeping
- bus: CPU address decode, open bus, DMA engines
- cpu: per-tick 6502 state machine with hijacked interrupt service
- console: tick orchestrator and host surface
- ppu / apu / controller: register-level collaborators
- cartridge / mapper / mappers: iNES loader and boards (NROM, MMC3)
- config / error: runtime configuration and error types

In tests, shared iNES builders are available under `crate::test_utils`.
"#]

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod clock;
pub mod config;
pub mod console;
pub mod controller;
pub mod cpu;
pub mod error;
pub mod ledger;
pub mod mapper;
pub mod mappers;
pub mod ppu;

pub use bus::Bus;
pub use cartridge::{Cartridge, Mirroring};
pub use clock::MasterClock;
pub use config::EmuConfig;
pub use console::{Console, ConsoleStatus};
pub use cpu::{Cpu, PendingInterrupt, Registers};
pub use error::{CartridgeError, EmuError, Result};
pub use ledger::InterruptLedger;

#[cfg(test)]
pub mod test_utils;
