/*!
execute.rs - pure instruction semantics.

`execute` takes the register file and the operand byte the engine fetched and
returns a `Delta`: which registers change, the byte to store (if any) and
whether the CPU must halt. It never touches the bus and knows nothing about
cycles. The engine in `core.rs` decides where and when the delta lands.

Operand meaning by access class
- Read: the byte read from the effective address (or the immediate byte).
- ReadModifyWrite: the original memory byte (or A in accumulator mode); the
  result comes back in `Delta::write`.
- Write and implied: ignored.

Control flow and stack instructions (branches, JMP, JSR, RTS, RTI, BRK, the
push/pull group) are sequenced entirely by the engine and return an empty
delta here.

Decimal mode is not implemented by the 2A03, so ADC/SBC are binary only.
*/

use crate::cpu::state::{
    CARRY, DECIMAL, IRQ_DISABLE, NEGATIVE, OVERFLOW, Registers, ZERO, with_flag, with_zn,
};
use crate::cpu::table::Mnemonic;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delta {
    pub a: Option<u8>,
    pub x: Option<u8>,
    pub y: Option<u8>,
    pub sp: Option<u8>,
    pub p: Option<u8>,
    pub write: Option<u8>,
    pub halt: bool,
}

impl Delta {
    /// Commit register changes. `write` is left to the caller.
    pub fn apply(&self, regs: &mut Registers) {
        if let Some(a) = self.a {
            regs.a = a;
        }
        if let Some(x) = self.x {
            regs.x = x;
        }
        if let Some(y) = self.y {
            regs.y = y;
        }
        if let Some(sp) = self.sp {
            regs.sp = sp;
        }
        if let Some(p) = self.p {
            regs.p = p;
        }
    }
}

pub fn execute(op: Mnemonic, regs: &Registers, operand: u8) -> Delta {
    use Mnemonic::*;
    let p = regs.p;
    match op {
        Lda => load_a(p, operand),
        Ldx => Delta {
            x: Some(operand),
            p: Some(with_zn(p, operand)),
            ..Delta::default()
        },
        Ldy => Delta {
            y: Some(operand),
            p: Some(with_zn(p, operand)),
            ..Delta::default()
        },

        Sta => store(regs.a),
        Stx => store(regs.x),
        Sty => store(regs.y),

        Adc => add_with_carry(regs.a, operand, p),
        Sbc => add_with_carry(regs.a, !operand, p),
        And => load_a(p, regs.a & operand),
        Ora => load_a(p, regs.a | operand),
        Eor => load_a(p, regs.a ^ operand),

        Cmp => compare(regs.a, operand, p),
        Cpx => compare(regs.x, operand, p),
        Cpy => compare(regs.y, operand, p),

        Bit => {
            let p = with_flag(p, ZERO, regs.a & operand == 0);
            let p = with_flag(p, NEGATIVE, operand & 0x80 != 0);
            let p = with_flag(p, OVERFLOW, operand & 0x40 != 0);
            Delta {
                p: Some(p),
                ..Delta::default()
            }
        }

        Asl => shifted(p, operand << 1, operand & 0x80 != 0),
        Lsr => shifted(p, operand >> 1, operand & 0x01 != 0),
        Rol => {
            let carry_in = (p & CARRY != 0) as u8;
            shifted(p, (operand << 1) | carry_in, operand & 0x80 != 0)
        }
        Ror => {
            let carry_in = if p & CARRY != 0 { 0x80 } else { 0 };
            shifted(p, (operand >> 1) | carry_in, operand & 0x01 != 0)
        }
        Inc => modified(p, operand.wrapping_add(1)),
        Dec => modified(p, operand.wrapping_sub(1)),

        Inx => {
            let x = regs.x.wrapping_add(1);
            Delta {
                x: Some(x),
                p: Some(with_zn(p, x)),
                ..Delta::default()
            }
        }
        Iny => {
            let y = regs.y.wrapping_add(1);
            Delta {
                y: Some(y),
                p: Some(with_zn(p, y)),
                ..Delta::default()
            }
        }
        Dex => {
            let x = regs.x.wrapping_sub(1);
            Delta {
                x: Some(x),
                p: Some(with_zn(p, x)),
                ..Delta::default()
            }
        }
        Dey => {
            let y = regs.y.wrapping_sub(1);
            Delta {
                y: Some(y),
                p: Some(with_zn(p, y)),
                ..Delta::default()
            }
        }

        Tax => Delta {
            x: Some(regs.a),
            p: Some(with_zn(p, regs.a)),
            ..Delta::default()
        },
        Tay => Delta {
            y: Some(regs.a),
            p: Some(with_zn(p, regs.a)),
            ..Delta::default()
        },
        Txa => load_a(p, regs.x),
        Tya => load_a(p, regs.y),
        Tsx => Delta {
            x: Some(regs.sp),
            p: Some(with_zn(p, regs.sp)),
            ..Delta::default()
        },
        Txs => Delta {
            sp: Some(regs.x),
            ..Delta::default()
        },

        Clc => flag(p, CARRY, false),
        Sec => flag(p, CARRY, true),
        Cli => flag(p, IRQ_DISABLE, false),
        Sei => flag(p, IRQ_DISABLE, true),
        Cld => flag(p, DECIMAL, false),
        Sed => flag(p, DECIMAL, true),
        Clv => flag(p, OVERFLOW, false),

        Jam => Delta {
            halt: true,
            ..Delta::default()
        },

        Nop | Bcc | Bcs | Beq | Bmi | Bne | Bpl | Bvc | Bvs | Brk | Jmp | Jsr | Rts | Rti
        | Pha | Php | Pla | Plp => Delta::default(),
    }
}

/// Branch condition for a relative-mode mnemonic. False for anything else.
pub fn branch_taken(op: Mnemonic, p: u8) -> bool {
    use Mnemonic::*;
    match op {
        Bcc => p & CARRY == 0,
        Bcs => p & CARRY != 0,
        Bne => p & ZERO == 0,
        Beq => p & ZERO != 0,
        Bpl => p & NEGATIVE == 0,
        Bmi => p & NEGATIVE != 0,
        Bvc => p & OVERFLOW == 0,
        Bvs => p & OVERFLOW != 0,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[inline]
fn load_a(p: u8, value: u8) -> Delta {
    Delta {
        a: Some(value),
        p: Some(with_zn(p, value)),
        ..Delta::default()
    }
}

#[inline]
fn store(value: u8) -> Delta {
    Delta {
        write: Some(value),
        ..Delta::default()
    }
}

#[inline]
fn flag(p: u8, mask: u8, on: bool) -> Delta {
    Delta {
        p: Some(with_flag(p, mask, on)),
        ..Delta::default()
    }
}

fn add_with_carry(a: u8, v: u8, p: u8) -> Delta {
    let carry_in = (p & CARRY != 0) as u16;
    let sum = a as u16 + v as u16 + carry_in;
    let result = sum as u8;
    let p = with_flag(p, CARRY, sum > 0xFF);
    // Signed overflow: operands agree in sign and the result does not.
    let p = with_flag(p, OVERFLOW, (!(a ^ v) & (a ^ result) & 0x80) != 0);
    load_a(p, result)
}

fn compare(reg: u8, v: u8, p: u8) -> Delta {
    let p = with_flag(p, CARRY, reg >= v);
    flag_only(with_zn(p, reg.wrapping_sub(v)))
}

#[inline]
fn flag_only(p: u8) -> Delta {
    Delta {
        p: Some(p),
        ..Delta::default()
    }
}

fn shifted(p: u8, result: u8, carry_out: bool) -> Delta {
    let p = with_flag(p, CARRY, carry_out);
    modified(p, result)
}

#[inline]
fn modified(p: u8, result: u8) -> Delta {
    Delta {
        p: Some(with_zn(p, result)),
        write: Some(result),
        ..Delta::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::state::UNUSED;

    fn regs() -> Registers {
        Registers {
            p: UNUSED,
            ..Registers::new()
        }
    }

    #[test]
    fn adc_overflow_and_carry() {
        let mut r = regs();
        r.a = 0x50;
        let d = execute(Mnemonic::Adc, &r, 0x50);
        assert_eq!(d.a, Some(0xA0));
        let p = d.p.unwrap_or_default();
        assert!(p & OVERFLOW != 0);
        assert!(p & CARRY == 0);
        assert!(p & NEGATIVE != 0);

        r.a = 0xF0;
        let d = execute(Mnemonic::Adc, &r, 0x20);
        assert_eq!(d.a, Some(0x10));
        assert!(d.p.unwrap_or_default() & CARRY != 0);
    }

    #[test]
    fn sbc_with_borrow() {
        let mut r = regs();
        r.a = 0x10;
        r.p |= CARRY;
        let d = execute(Mnemonic::Sbc, &r, 0x01);
        assert_eq!(d.a, Some(0x0F));
        assert!(d.p.unwrap_or_default() & CARRY != 0);

        r.p &= !CARRY;
        let d = execute(Mnemonic::Sbc, &r, 0x01);
        assert_eq!(d.a, Some(0x0E));
    }

    #[test]
    fn compare_sets_carry_and_zero() {
        let mut r = regs();
        r.x = 0x40;
        let p = execute(Mnemonic::Cpx, &r, 0x40).p.unwrap_or_default();
        assert!(p & CARRY != 0 && p & ZERO != 0);
        let p = execute(Mnemonic::Cpx, &r, 0x41).p.unwrap_or_default();
        assert!(p & CARRY == 0 && p & NEGATIVE != 0);
    }

    #[test]
    fn rotate_through_carry() {
        let mut r = regs();
        r.p |= CARRY;
        let d = execute(Mnemonic::Ror, &r, 0x02);
        assert_eq!(d.write, Some(0x81));
        assert!(d.p.unwrap_or_default() & CARRY == 0);

        let d = execute(Mnemonic::Rol, &r, 0x80);
        assert_eq!(d.write, Some(0x01));
        assert!(d.p.unwrap_or_default() & CARRY != 0);
    }

    #[test]
    fn bit_copies_high_bits() {
        let mut r = regs();
        r.a = 0x01;
        let p = execute(Mnemonic::Bit, &r, 0xC0).p.unwrap_or_default();
        assert!(p & NEGATIVE != 0);
        assert!(p & OVERFLOW != 0);
        assert!(p & ZERO != 0);
    }

    #[test]
    fn stores_emit_write_only() {
        let mut r = regs();
        r.y = 0x7E;
        let d = execute(Mnemonic::Sty, &r, 0);
        assert_eq!(d.write, Some(0x7E));
        assert_eq!(d.p, None);
    }

    #[test]
    fn txs_leaves_flags() {
        let mut r = regs();
        r.x = 0x00;
        let d = execute(Mnemonic::Txs, &r, 0);
        assert_eq!(d.sp, Some(0x00));
        assert_eq!(d.p, None);
    }

    #[test]
    fn jam_halts() {
        assert!(execute(Mnemonic::Jam, &regs(), 0).halt);
    }

    #[test]
    fn branch_conditions() {
        assert!(branch_taken(Mnemonic::Bne, 0));
        assert!(!branch_taken(Mnemonic::Beq, 0));
        assert!(branch_taken(Mnemonic::Bcs, CARRY));
        assert!(branch_taken(Mnemonic::Bvc, NEGATIVE));
        assert!(!branch_taken(Mnemonic::Lda, 0xFF));
    }
}
