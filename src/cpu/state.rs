/*!
state.rs - architectural 6502 registers and status flag helpers.

`Registers` owns only what the programmer can see. Phase, latches and the
interrupt line samples live on `Cpu` in `core.rs`.

Status register layout
=======================
Bit: 7 6 5 4 3 2 1 0
     N V 1 B D I Z C

B does not exist as a stored bit. It only appears in the byte pushed by
PHP/BRK (set) or by a hardware interrupt (clear). Bit 5 always reads as 1.
*/

/// Processor status flag bit masks.
pub const CARRY: u8 = 0b0000_0001;
pub const ZERO: u8 = 0b0000_0010;
pub const IRQ_DISABLE: u8 = 0b0000_0100;
pub const DECIMAL: u8 = 0b0000_1000; // Latched but ignored by the 2A03 ALU.
pub const BREAK: u8 = 0b0001_0000;
pub const UNUSED: u8 = 0b0010_0000;
pub const OVERFLOW: u8 = 0b0100_0000;
pub const NEGATIVE: u8 = 0b1000_0000;

/// Base of the hardware stack page.
pub const STACK_BASE: u16 = 0x0100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: u8,
}

impl Default for Registers {
    /// Power-up values. SP starts at 0 and the reset sequence's three
    /// suppressed pushes bring it to $FD.
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0x00,
            pc: 0x0000,
            p: IRQ_DISABLE | UNUSED,
        }
    }
}

impl Registers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn flag(&self, mask: u8) -> bool {
        self.p & mask != 0
    }

    #[inline]
    pub fn set_flag(&mut self, mask: u8, on: bool) {
        self.p = with_flag(self.p, mask, on);
    }

    /// Address of the current top-of-stack slot.
    #[inline]
    pub fn stack_addr(&self) -> u16 {
        STACK_BASE | self.sp as u16
    }

    /// Status byte as pushed to the stack. `brk` selects the B bit.
    #[inline]
    pub fn status_for_push(&self, brk: bool) -> u8 {
        let base = (self.p | UNUSED) & !BREAK;
        if brk { base | BREAK } else { base }
    }

    /// Load P from a pulled byte (PLP/RTI). B is dropped, bit 5 forced on.
    #[inline]
    pub fn load_status(&mut self, value: u8) {
        self.p = (value & !BREAK) | UNUSED;
    }
}

/// Return `p` with `mask` set or cleared.
#[inline]
pub fn with_flag(p: u8, mask: u8, on: bool) -> u8 {
    if on { p | mask } else { p & !mask }
}

/// Return `p` with Z and N updated from `value`.
#[inline]
pub fn with_zn(p: u8, value: u8) -> u8 {
    let p = with_flag(p, ZERO, value == 0);
    with_flag(p, NEGATIVE, value & 0x80 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_status_break_bit() {
        let mut r = Registers::new();
        r.p = CARRY | NEGATIVE;
        assert_eq!(r.status_for_push(false), CARRY | NEGATIVE | UNUSED);
        assert_eq!(r.status_for_push(true), CARRY | NEGATIVE | UNUSED | BREAK);
    }

    #[test]
    fn load_status_drops_break_forces_unused() {
        let mut r = Registers::new();
        r.load_status(0xFF & !UNUSED);
        assert!(!r.flag(BREAK));
        assert!(r.flag(UNUSED));
        assert!(r.flag(NEGATIVE | CARRY));
    }

    #[test]
    fn zn_helper() {
        assert_eq!(with_zn(0, 0) & (ZERO | NEGATIVE), ZERO);
        assert_eq!(with_zn(ZERO, 0x80) & (ZERO | NEGATIVE), NEGATIVE);
        assert_eq!(with_zn(ZERO | NEGATIVE, 0x01) & (ZERO | NEGATIVE), 0);
    }
}
