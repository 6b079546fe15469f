//! iNES image builders shared by the cartridge, bus and console tests.
//!
//! Header fields used here:
//! - bytes[0..4] = b"NES\x1A"
//! - byte 4 = PRG ROM size in 16 KiB units
//! - byte 5 = CHR ROM size in 8 KiB units (0 => CHR RAM)
//! - byte 6 = flags 6 (mirroring, battery, trainer, mapper low nibble)
//! - byte 7 = flags 7 (NES 2.0 indicator, mapper high nibble)
//! - byte 8 = PRG RAM size in 8 KiB units

#![allow(dead_code)]

/// Minimal iNES (v1) image. PRG is filled with 0xAA and CHR with 0xCC.
pub fn build_ines(
    prg_16k: usize,
    chr_8k: usize,
    flags6: u8,
    flags7: u8,
    prg_ram_8k: u8,
    trainer: Option<&[u8; 512]>,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(
        16 + trainer.map_or(0, |_| 512) + prg_16k * 16 * 1024 + chr_8k * 8 * 1024,
    );

    bytes.extend_from_slice(b"NES\x1A");
    bytes.push(prg_16k as u8);
    bytes.push(chr_8k as u8);
    bytes.push(flags6);
    bytes.push(flags7);
    bytes.push(prg_ram_8k);
    bytes.extend_from_slice(&[0u8; 7]);

    if let Some(t) = trainer {
        bytes.extend_from_slice(t);
    }
    bytes.resize(bytes.len() + prg_16k * 16 * 1024, 0xAA);
    bytes.resize(bytes.len() + chr_8k * 8 * 1024, 0xCC);
    bytes
}

/// NROM-128 image with `program` at $8000 (and mirrored at $C000) and the
/// given vectors. The rest of PRG is filled with NOP ($EA) so a program
/// falling off its end keeps running. CHR is RAM.
pub fn build_nrom_with_prg(program: &[u8], reset: u16, nmi: u16, irq: u16) -> Vec<u8> {
    assert!(program.len() <= 0x3FFA, "program overlaps the vectors");

    let mut rom = build_ines(1, 0, 0, 0, 1, None);
    let prg = &mut rom[16..16 + 16 * 1024];
    prg.fill(0xEA);
    prg[..program.len()].copy_from_slice(program);
    set_vectors_in_prg(prg, reset, nmi, irq);
    rom
}

/// Place `bytes` at CPU address `addr` inside a 16 KiB NROM-128 PRG image
/// built by `build_nrom_with_prg`.
pub fn patch_prg(rom: &mut [u8], addr: u16, bytes: &[u8]) {
    let offset = 16 + (addr as usize & 0x3FFF);
    rom[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Write the NMI, RESET and IRQ vectors at the end of a 16 or 32 KiB PRG slice.
pub fn set_vectors_in_prg(prg: &mut [u8], reset: u16, nmi: u16, irq: u16) {
    let base = match prg.len() {
        0x4000 => 0x3FFA,
        0x8000 => 0x7FFA,
        other => panic!("unsupported PRG length {other} for vector placement"),
    };
    prg[base..base + 2].copy_from_slice(&nmi.to_le_bytes());
    prg[base + 2..base + 4].copy_from_slice(&reset.to_le_bytes());
    prg[base + 4..base + 6].copy_from_slice(&irq.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_basic_ines() {
        let rom = build_ines(2, 1, 0x01, 0x00, 1, None);
        assert_eq!(&rom[0..4], b"NES\x1A");
        assert_eq!(&rom[4..9], &[2, 1, 0x01, 0x00, 1]);
        assert_eq!(rom.len(), 16 + 2 * 16 * 1024 + 8 * 1024);
    }

    #[test]
    fn writes_vectors_for_both_prg_sizes() {
        let mut prg = vec![0u8; 16 * 1024];
        set_vectors_in_prg(&mut prg, 0x8123, 0x8456, 0x8ABC);
        assert_eq!(&prg[0x3FFA..], &[0x56, 0x84, 0x23, 0x81, 0xBC, 0x8A]);

        let mut prg = vec![0u8; 32 * 1024];
        set_vectors_in_prg(&mut prg, 0x8123, 0x8456, 0x8ABC);
        assert_eq!(&prg[0x7FFA..], &[0x56, 0x84, 0x23, 0x81, 0xBC, 0x8A]);
    }

    #[test]
    fn program_lands_at_prg_start() {
        let mut rom = build_nrom_with_prg(&[0xA9, 0x01], 0x8000, 0x9000, 0xA000);
        patch_prg(&mut rom, 0x9000, &[0x40]);
        assert_eq!(&rom[16..19], &[0xA9, 0x01, 0xEA]);
        assert_eq!(rom[16 + 0x1000], 0x40);
        assert_eq!(&rom[16 + 0x3FFC..16 + 0x3FFE], &[0x00, 0x80]);
    }
}
