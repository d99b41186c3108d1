//! The semantics façade: pure, untimed instruction behavior.
//!
//! Every function here takes an explicit snapshot of its inputs and returns
//! a new latch value (or, for EX/MEM's bounds-checked address, a
//! [`CoreError`]). None of them hold timing state — that is the
//! controller's job. Grounded on the teacher's `cpu::stages::*` functions
//! and `cpu::control::AluOp`, narrowed from RV64 to RV32 and reshaped from
//! CPU-mutating functions into input-to-output transforms.

use crate::common::{CoreError, RegisterFile, EXCEPTION_HANDLER_ADDR, HALT_ENCODING, NOP_ENCODING};
use crate::memory::Memory;

use super::decode::decode;
use super::{funct3, funct7, opcodes};
use crate::instr::{Instruction, Opcode, Status};

/// IF: fetches the word at `pc`. An unmapped fetch address yields the
/// architectural NOP rather than a fault — `spec.md`'s memory exception is
/// scoped to load/store effective addresses computed in EX, not fetch.
pub fn sim_if(pc: u64, memory: &Memory) -> Instruction {
    let raw = memory.load_u32(pc).unwrap_or(NOP_ENCODING);
    Instruction {
        raw,
        pc,
        next_pc: pc.wrapping_add(4),
        is_nop: raw == NOP_ENCODING,
        is_halt: raw == HALT_ENCODING,
        status: Status::Normal,
        ..Instruction::default()
    }
}

fn alu_add(a: u32, b: i32) -> u32 {
    a.wrapping_add(b as u32)
}

enum Alu {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

fn alu(op: Alu, a: u32, b: u32) -> u32 {
    let shamt = b & 0x1f;
    match op {
        Alu::Add => a.wrapping_add(b),
        Alu::Sub => a.wrapping_sub(b),
        Alu::Sll => a.wrapping_shl(shamt),
        Alu::Srl => a.wrapping_shr(shamt),
        Alu::Sra => ((a as i32) >> shamt) as u32,
        Alu::Or => a | b,
        Alu::And => a & b,
        Alu::Xor => a ^ b,
        Alu::Slt => ((a as i32) < (b as i32)) as u32,
        Alu::Sltu => (a < b) as u32,
    }
}

fn op_alu(funct3: u32, funct7: u32) -> Option<Alu> {
    Some(match (funct3, funct7) {
        (self::funct3::ADD_SUB, funct7::NORMAL) => Alu::Add,
        (self::funct3::ADD_SUB, funct7::ALT) => Alu::Sub,
        (self::funct3::SLL, funct7::NORMAL) => Alu::Sll,
        (self::funct3::SLT, funct7::NORMAL) => Alu::Slt,
        (self::funct3::SLTU, funct7::NORMAL) => Alu::Sltu,
        (self::funct3::XOR, funct7::NORMAL) => Alu::Xor,
        (self::funct3::SRL_SRA, funct7::NORMAL) => Alu::Srl,
        (self::funct3::SRL_SRA, funct7::ALT) => Alu::Sra,
        (self::funct3::OR, funct7::NORMAL) => Alu::Or,
        (self::funct3::AND, funct7::NORMAL) => Alu::And,
        _ => return None,
    })
}

fn op_imm_alu(funct3: u32, funct7: u32) -> Option<Alu> {
    Some(match funct3 {
        self::funct3::ADD_SUB => Alu::Add,
        self::funct3::SLT => Alu::Slt,
        self::funct3::SLTU => Alu::Sltu,
        self::funct3::XOR => Alu::Xor,
        self::funct3::OR => Alu::Or,
        self::funct3::AND => Alu::And,
        self::funct3::SLL if funct7 == funct7::NORMAL => Alu::Sll,
        self::funct3::SRL_SRA if funct7 == funct7::NORMAL => Alu::Srl,
        self::funct3::SRL_SRA if funct7 == funct7::ALT => Alu::Sra,
        _ => return None,
    })
}

fn load_width_signed(f3: u32) -> Option<(u32, bool)> {
    Some(match f3 {
        self::funct3::LB => (1, true),
        self::funct3::LH => (2, true),
        self::funct3::LW => (4, true),
        self::funct3::LBU => (1, false),
        self::funct3::LHU => (2, false),
        _ => return None,
    })
}

fn store_width(f3: u32) -> Option<u32> {
    Some(match f3 {
        self::funct3::SB => 1,
        self::funct3::SH => 2,
        self::funct3::SW => 4,
        _ => return None,
    })
}

/// ID: decodes the fetched word, reads the (not-yet-forwarded) register
/// file, and determines whether this encoding is legal.
pub fn sim_id(if_latch: &Instruction, regs: &RegisterFile) -> Instruction {
    let base = Instruction {
        pc: if_latch.pc,
        next_pc: if_latch.next_pc,
        raw: if_latch.raw,
        ..Instruction::default()
    };

    if if_latch.is_halt {
        return Instruction {
            opcode: Opcode::Halt,
            is_nop: false,
            is_halt: true,
            is_legal: true,
            status: if_latch.status,
            ..base
        };
    }
    if if_latch.is_nop {
        return Instruction {
            status: if_latch.status,
            ..Instruction::default()
        };
    }

    let f = decode(if_latch.raw);
    let mut inst = Instruction {
        rs1: f.rs1,
        rs2: f.rs2,
        rd: f.rd,
        imm: f.imm,
        status: if_latch.status,
        ..base
    };

    let legal = match f.opcode {
        opcodes::LOAD => {
            inst.opcode = Opcode::Load;
            inst.reads_rs1 = true;
            inst.writes_rd = true;
            inst.reads_mem = true;
            load_width_signed(f.funct3).is_some()
        }
        opcodes::STORE => {
            inst.opcode = Opcode::Store;
            inst.reads_rs1 = true;
            inst.reads_rs2 = true;
            inst.writes_mem = true;
            store_width(f.funct3).is_some()
        }
        opcodes::BRANCH => {
            inst.opcode = Opcode::Branch;
            inst.reads_rs1 = true;
            inst.reads_rs2 = true;
            matches!(
                f.funct3,
                self::funct3::BEQ
                    | self::funct3::BNE
                    | self::funct3::BLT
                    | self::funct3::BGE
                    | self::funct3::BLTU
                    | self::funct3::BGEU
            )
        }
        opcodes::JAL => {
            inst.opcode = Opcode::Jal;
            inst.writes_rd = true;
            true
        }
        opcodes::JALR => {
            inst.opcode = Opcode::Jalr;
            inst.reads_rs1 = true;
            inst.writes_rd = true;
            f.funct3 == self::funct3::JALR
        }
        opcodes::OP => {
            inst.opcode = Opcode::Op;
            inst.reads_rs1 = true;
            inst.reads_rs2 = true;
            inst.writes_rd = true;
            inst.does_arith = true;
            op_alu(f.funct3, f.funct7).is_some()
        }
        opcodes::OP_IMM => {
            inst.opcode = Opcode::OpImm;
            inst.reads_rs1 = true;
            inst.writes_rd = true;
            inst.does_arith = true;
            op_imm_alu(f.funct3, f.funct7).is_some()
        }
        opcodes::LUI => {
            inst.opcode = Opcode::Lui;
            inst.writes_rd = true;
            inst.does_arith = true;
            true
        }
        opcodes::AUIPC => {
            inst.opcode = Opcode::Auipc;
            inst.writes_rd = true;
            inst.does_arith = true;
            true
        }
        opcodes::SYSTEM => {
            inst.opcode = Opcode::System;
            false
        }
        _ => false,
    };
    inst.is_legal = legal;

    if inst.reads_rs1 {
        inst.op1_val = regs.read(inst.rs1 as usize);
    }
    if inst.reads_rs2 {
        inst.op2_val = regs.read(inst.rs2 as usize);
    }

    inst
}

/// Resolves the architectural `next_pc` for a control-flow instruction,
/// using `id_latch`'s (possibly forwarded) operand values. Always-not-taken
/// is the prediction made at fetch; this is where it is checked and, for
/// `BRANCH`/`JAL`/`JALR`, corrected.
pub fn sim_next_pc_resolution(id_latch: &Instruction) -> Instruction {
    let mut out = id_latch.clone();
    if !id_latch.is_legal {
        return out;
    }

    match id_latch.opcode {
        Opcode::Branch => {
            let a = id_latch.op1_val;
            let b = id_latch.op2_val;
            let taken = match decode(id_latch.raw).funct3 {
                self::funct3::BEQ => a == b,
                self::funct3::BNE => a != b,
                self::funct3::BLT => (a as i32) < (b as i32),
                self::funct3::BGE => (a as i32) >= (b as i32),
                self::funct3::BLTU => a < b,
                self::funct3::BGEU => a >= b,
                _ => false,
            };
            out.next_pc = if taken {
                id_latch.pc.wrapping_add(id_latch.imm as i64 as u64)
            } else {
                id_latch.pc.wrapping_add(4)
            };
        }
        Opcode::Jal => {
            out.next_pc = id_latch.pc.wrapping_add(id_latch.imm as i64 as u64);
        }
        Opcode::Jalr => {
            out.next_pc = (alu_add(id_latch.op1_val, id_latch.imm) & !1u32) as u64;
        }
        _ => {}
    }
    out
}

/// EX: runs the ALU for arithmetic instructions and computes the effective
/// address for loads/stores. Operand fields must already carry any
/// forwarded value; this function performs no forwarding itself.
pub fn sim_ex(id_latch: &Instruction) -> Instruction {
    let mut out = id_latch.clone();
    if !id_latch.is_legal {
        return out;
    }

    let f = decode(id_latch.raw);
    match id_latch.opcode {
        Opcode::Op => {
            if let Some(op) = op_alu(f.funct3, f.funct7) {
                out.alu_result = alu(op, id_latch.op1_val, id_latch.op2_val);
            }
        }
        Opcode::OpImm => {
            if let Some(op) = op_imm_alu(f.funct3, f.funct7) {
                let b = if matches!(f.funct3, self::funct3::SLL | self::funct3::SRL_SRA) {
                    (id_latch.imm as u32) & 0x1f
                } else {
                    id_latch.imm as u32
                };
                out.alu_result = alu(op, id_latch.op1_val, b);
            }
        }
        Opcode::Lui => out.alu_result = id_latch.imm as u32,
        Opcode::Auipc => out.alu_result = alu_add(id_latch.pc as u32, id_latch.imm),
        Opcode::Load | Opcode::Store => {
            out.mem_addr = alu_add(id_latch.op1_val, id_latch.imm);
        }
        Opcode::Jal | Opcode::Jalr => out.alu_result = id_latch.pc.wrapping_add(4) as u32,
        _ => {}
    }
    out
}

/// MEM: performs the actual load/store against `memory`. Returns
/// [`CoreError::MemoryFault`] when the effective address reaches or
/// exceeds the backing store's size.
pub fn sim_mem(ex_latch: &Instruction, memory: &mut Memory) -> Result<Instruction, CoreError> {
    let mut out = ex_latch.clone();
    if !ex_latch.is_legal || (!ex_latch.reads_mem && !ex_latch.writes_mem) {
        return Ok(out);
    }

    let addr = ex_latch.mem_addr as u64;
    let f = decode(ex_latch.raw);

    if addr >= memory.size() as u64 {
        return Err(CoreError::MemoryFault {
            addr,
            pc: ex_latch.pc,
        });
    }

    if ex_latch.reads_mem {
        let (width, signed) =
            load_width_signed(f.funct3).expect("legality checked at decode");
        out.mem_result = match (width, signed) {
            (1, true) => memory.load_u8(addr).unwrap_or(0) as i8 as i32 as u32,
            (2, true) => memory.load_u16(addr).unwrap_or(0) as i16 as i32 as u32,
            (1, false) => memory.load_u8(addr).unwrap_or(0) as u32,
            (2, false) => memory.load_u16(addr).unwrap_or(0) as u32,
            _ => memory.load_u32(addr).unwrap_or(0),
        };
    } else if ex_latch.writes_mem {
        let width = store_width(f.funct3).expect("legality checked at decode");
        match width {
            1 => {
                let _ = memory.store_u8(addr, ex_latch.op2_val as u8);
            }
            2 => {
                let _ = memory.store_u16(addr, ex_latch.op2_val as u16);
            }
            _ => {
                let _ = memory.store_u32(addr, ex_latch.op2_val);
            }
        }
    }

    Ok(out)
}

/// WB: commits the architectural register write, if any. Squashed and
/// bubble latches never reach here with `writes_rd` honored by the
/// controller, which checks `status` before calling.
pub fn sim_wb(mem_latch: &Instruction, regs: &mut RegisterFile) {
    if !mem_latch.is_legal || !mem_latch.writes_rd {
        return;
    }
    let value = match mem_latch.opcode {
        Opcode::Load => mem_latch.mem_result,
        Opcode::Jal | Opcode::Jalr => mem_latch.alu_result,
        _ => mem_latch.alu_result,
    };
    regs.write(mem_latch.rd as usize, value);
}

/// The fixed redirect target for both exception kinds (`spec.md` §4.2.7).
pub fn exception_handler_pc() -> u64 {
    EXCEPTION_HANDLER_ADDR
}
