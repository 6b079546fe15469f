/*
Module: mappers

Board implementations with their own banking state. Boards simple enough to
fit in a few lines (NROM) live next to the `Mapper` enum in `mapper.rs`.

Implemented:
- MMC3 (Mapper 4): PRG/CHR banking, mirroring, PRG RAM protect, A12 IRQ.
*/

pub mod mmc3;

pub use mmc3::Mmc3;
