/*!
addressing.rs - per-mode micro-op sequences.

Every instruction after its opcode fetch is a fixed slice of single-tick
primitives. Instructions sharing an addressing mode and access class share a
slice, so `LDA abs,X` and `CMP abs,X` run the exact same cycles.

Early exits
- `ReadIndexed` finishes a read instruction when the index did not carry into
  the high byte: the index add and the final read share one tick, as on the
  real chip. On a carry it performs the dummy read at the unfixed address and
  the sequence continues to `ReadExecute`.
- `BranchFetch` finishes when the condition is false, `BranchTake` when the
  target stays on the same page.

Write and read-modify-write forms of indexed modes always perform the dummy
read (`FixIndexed`), regardless of page crossing.
*/

use crate::cpu::table::{Access, Mnemonic, Mode, Opcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// Read at PC, discard. Used by implied and stack instructions.
    DummyReadPc,
    /// Dummy read at PC, then apply the instruction to registers (A in
    /// accumulator mode).
    ImpliedExecute,
    /// Read the byte at PC, PC += 1, apply.
    ReadImmediate,

    FetchAddrLo,
    FetchAddrHi,
    ZpIndexX,
    ZpIndexY,
    FetchHiIndexX,
    FetchHiIndexY,
    ReadIndexed,
    FixIndexed,

    FetchPtr,
    PtrIndexX,
    PtrLo,
    PtrHi,
    PtrHiIndexY,

    ReadExecute,
    WriteExecute,
    RmwRead,
    RmwDummyWrite,
    RmwWrite,

    BranchFetch,
    BranchTake,
    BranchFix,

    JmpAbsHi,
    IndirectLo,
    IndirectHi,

    StackDummyRead,
    PushPch,
    PushPcl,
    PushA,
    PushP,
    PullA,
    PullP,
    PullPcl,
    PullPch,
    JsrFetchHi,
    RtsIncrement,
}

use MicroOp::*;

const IMPLIED: &[MicroOp] = &[ImpliedExecute];
const IMMEDIATE: &[MicroOp] = &[ReadImmediate];

const ZP_READ: &[MicroOp] = &[FetchAddrLo, ReadExecute];
const ZP_WRITE: &[MicroOp] = &[FetchAddrLo, WriteExecute];
const ZP_RMW: &[MicroOp] = &[FetchAddrLo, RmwRead, RmwDummyWrite, RmwWrite];

const ZPX_READ: &[MicroOp] = &[FetchAddrLo, ZpIndexX, ReadExecute];
const ZPX_WRITE: &[MicroOp] = &[FetchAddrLo, ZpIndexX, WriteExecute];
const ZPX_RMW: &[MicroOp] = &[FetchAddrLo, ZpIndexX, RmwRead, RmwDummyWrite, RmwWrite];
const ZPY_READ: &[MicroOp] = &[FetchAddrLo, ZpIndexY, ReadExecute];
const ZPY_WRITE: &[MicroOp] = &[FetchAddrLo, ZpIndexY, WriteExecute];

const ABS_READ: &[MicroOp] = &[FetchAddrLo, FetchAddrHi, ReadExecute];
const ABS_WRITE: &[MicroOp] = &[FetchAddrLo, FetchAddrHi, WriteExecute];
const ABS_RMW: &[MicroOp] = &[FetchAddrLo, FetchAddrHi, RmwRead, RmwDummyWrite, RmwWrite];

const ABSX_READ: &[MicroOp] = &[FetchAddrLo, FetchHiIndexX, ReadIndexed, ReadExecute];
const ABSX_WRITE: &[MicroOp] = &[FetchAddrLo, FetchHiIndexX, FixIndexed, WriteExecute];
const ABSX_RMW: &[MicroOp] = &[
    FetchAddrLo,
    FetchHiIndexX,
    FixIndexed,
    RmwRead,
    RmwDummyWrite,
    RmwWrite,
];
const ABSY_READ: &[MicroOp] = &[FetchAddrLo, FetchHiIndexY, ReadIndexed, ReadExecute];
const ABSY_WRITE: &[MicroOp] = &[FetchAddrLo, FetchHiIndexY, FixIndexed, WriteExecute];

const INDX_READ: &[MicroOp] = &[FetchPtr, PtrIndexX, PtrLo, PtrHi, ReadExecute];
const INDX_WRITE: &[MicroOp] = &[FetchPtr, PtrIndexX, PtrLo, PtrHi, WriteExecute];
const INDY_READ: &[MicroOp] = &[FetchPtr, PtrLo, PtrHiIndexY, ReadIndexed, ReadExecute];
const INDY_WRITE: &[MicroOp] = &[FetchPtr, PtrLo, PtrHiIndexY, FixIndexed, WriteExecute];

const BRANCH: &[MicroOp] = &[BranchFetch, BranchTake, BranchFix];

const JMP_ABS: &[MicroOp] = &[FetchAddrLo, JmpAbsHi];
const JMP_IND: &[MicroOp] = &[FetchAddrLo, FetchAddrHi, IndirectLo, IndirectHi];
const JSR: &[MicroOp] = &[FetchAddrLo, StackDummyRead, PushPch, PushPcl, JsrFetchHi];
const RTS: &[MicroOp] = &[DummyReadPc, StackDummyRead, PullPcl, PullPch, RtsIncrement];
const RTI: &[MicroOp] = &[DummyReadPc, StackDummyRead, PullP, PullPcl, PullPch];
const PHA: &[MicroOp] = &[DummyReadPc, PushA];
const PHP: &[MicroOp] = &[DummyReadPc, PushP];
const PLA: &[MicroOp] = &[DummyReadPc, StackDummyRead, PullA];
const PLP: &[MicroOp] = &[DummyReadPc, StackDummyRead, PullP];

/// Micro-ops that follow the opcode fetch. BRK is sequenced by the interrupt
/// service path and never reaches here.
pub fn sequence(op: Opcode) -> &'static [MicroOp] {
    match op.mnemonic {
        Mnemonic::Jmp if op.mode == Mode::Indirect => return JMP_IND,
        Mnemonic::Jmp => return JMP_ABS,
        Mnemonic::Jsr => return JSR,
        Mnemonic::Rts => return RTS,
        Mnemonic::Rti => return RTI,
        Mnemonic::Pha => return PHA,
        Mnemonic::Php => return PHP,
        Mnemonic::Pla => return PLA,
        Mnemonic::Plp => return PLP,
        m if m.is_branch() => return BRANCH,
        _ => {}
    }

    let access = op.mnemonic.access();
    match (op.mode, access) {
        (Mode::Implied | Mode::Accumulator, _) => IMPLIED,
        (Mode::Immediate, _) => IMMEDIATE,

        (Mode::ZeroPage, Access::Write) => ZP_WRITE,
        (Mode::ZeroPage, Access::ReadModifyWrite) => ZP_RMW,
        (Mode::ZeroPage, _) => ZP_READ,

        (Mode::ZeroPageX, Access::Write) => ZPX_WRITE,
        (Mode::ZeroPageX, Access::ReadModifyWrite) => ZPX_RMW,
        (Mode::ZeroPageX, _) => ZPX_READ,

        (Mode::ZeroPageY, Access::Write) => ZPY_WRITE,
        (Mode::ZeroPageY, _) => ZPY_READ,

        (Mode::Absolute, Access::Write) => ABS_WRITE,
        (Mode::Absolute, Access::ReadModifyWrite) => ABS_RMW,
        (Mode::Absolute, _) => ABS_READ,

        (Mode::AbsoluteX, Access::Write) => ABSX_WRITE,
        (Mode::AbsoluteX, Access::ReadModifyWrite) => ABSX_RMW,
        (Mode::AbsoluteX, _) => ABSX_READ,

        (Mode::AbsoluteY, Access::Write) => ABSY_WRITE,
        (Mode::AbsoluteY, _) => ABSY_READ,

        (Mode::IndirectX, Access::Write) => INDX_WRITE,
        (Mode::IndirectX, _) => INDX_READ,

        (Mode::IndirectY, Access::Write) => INDY_WRITE,
        (Mode::IndirectY, _) => INDY_READ,

        (Mode::Indirect, _) => JMP_IND,
        (Mode::Relative, _) => BRANCH,
    }
}

/// Cycle count of an instruction, opcode fetch included, for the
/// no-page-cross / branch-not-taken case. BRK reports its 7-tick service.
pub fn base_cycles(op: Opcode) -> u32 {
    if op.mnemonic == Mnemonic::Brk {
        return 7;
    }
    let ops = sequence(op);
    let early_exit = ops.contains(&ReadIndexed) || op.mnemonic.is_branch();
    let extra = if early_exit {
        // Branches stop after BranchFetch; indexed reads skip ReadExecute.
        if op.mnemonic.is_branch() { 2 } else { 1 }
    } else {
        0
    };
    1 + ops.len() as u32 - extra
}
