//! The instruction latch: the single value type every pipeline stage holds.
//!
//! Latches vary by *content*, never by *type* (`spec.md` §9): `opcode` is a
//! closed tagged enum and hazard predicates are exhaustive matches over it,
//! not dispatch through a trait hierarchy.

use serde::Serialize;

use crate::common::NOP_ENCODING;

/// The closed set of opcode categories the controller and façade recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Opcode {
    /// Load (`LB`/`LH`/`LW`/`LBU`/`LHU`).
    Load,
    /// Store (`SB`/`SH`/`SW`).
    Store,
    /// Conditional branch (`BEQ`/`BNE`/`BLT`/`BGE`/`BLTU`/`BGEU`).
    Branch,
    /// `JAL`.
    Jal,
    /// `JALR`.
    Jalr,
    /// Register-register ALU op.
    Op,
    /// Register-immediate ALU op.
    OpImm,
    /// `LUI`.
    Lui,
    /// `AUIPC`.
    Auipc,
    /// A `SYSTEM`-class encoding that is not the designated halt encoding.
    System,
    /// The designated halt encoding.
    Halt,
}

/// Status of an instruction's stay in a stage, in a given cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// No instruction has reached this stage yet (startup filler).
    Idle,
    /// Ordinary in-order progress; side effects will commit.
    Normal,
    /// Fetched while an unresolved control instruction sits in ID; may be
    /// squashed once that control instruction resolves.
    Speculative,
    /// Cancelled by a misprediction or exception; must not commit.
    Squashed,
    /// An injected NOP preserving pipeline timing; never commits side effects.
    Bubble,
}

/// One pipeline stage latch's worth of instruction state.
///
/// Only the fields documented in `spec.md` §3 are read or mutated by the
/// controller's hazard/forwarding/commit logic. `imm` is present purely so
/// the semantics façade (`crate::isa::semantics`) can carry the decoded
/// immediate from ID through to EX/MEM without re-decoding `raw`; the
/// controller itself never inspects it.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// 32-bit encoded instruction word.
    pub raw: u32,
    /// Fetch address of this instruction.
    pub pc: u64,
    /// Architectural next PC (sequential, or branch/jump target once resolved).
    pub next_pc: u64,
    /// Opcode category.
    pub opcode: Opcode,
    /// Source register 1 index (0-31).
    pub rs1: u8,
    /// Source register 2 index (0-31).
    pub rs2: u8,
    /// Destination register index (0-31).
    pub rd: u8,
    /// Whether this instruction reads `rs1`.
    pub reads_rs1: bool,
    /// Whether this instruction reads `rs2`.
    pub reads_rs2: bool,
    /// Whether this instruction writes `rd`.
    pub writes_rd: bool,
    /// Whether MEM performs a load for this instruction.
    pub reads_mem: bool,
    /// Whether MEM performs a store for this instruction.
    pub writes_mem: bool,
    /// Whether EX produces a committed ALU result for this instruction.
    pub does_arith: bool,
    /// Operand 1, captured at ID, possibly forwarded before EX.
    pub op1_val: u32,
    /// Operand 2, captured at ID, possibly forwarded before EX (or, for a
    /// store, overwritten by store-data forwarding before MEM).
    pub op2_val: u32,
    /// Decoded immediate (façade/logger use only).
    pub imm: i32,
    /// EX-stage ALU output, for `does_arith` instructions.
    pub alu_result: u32,
    /// EX-stage effective address, for `reads_mem`/`writes_mem` instructions.
    pub mem_addr: u32,
    /// MEM-stage load result.
    pub mem_result: u32,
    /// True for the architectural NOP (`raw == 0x0000_0013`).
    pub is_nop: bool,
    /// True for the designated halt encoding.
    pub is_halt: bool,
    /// False when decode could not recognize `raw`.
    pub is_legal: bool,
    /// This latch's status for the current cycle.
    pub status: Status,
}

impl Default for Instruction {
    /// The architectural NOP, in `Status::Idle` — the state every latch but
    /// the initial fetch starts in (`spec.md` §4.2.9).
    fn default() -> Self {
        Self {
            raw: NOP_ENCODING,
            pc: 0,
            next_pc: 0,
            opcode: Opcode::OpImm,
            rs1: 0,
            rs2: 0,
            rd: 0,
            reads_rs1: false,
            reads_rs2: false,
            writes_rd: false,
            reads_mem: false,
            writes_mem: false,
            does_arith: true,
            op1_val: 0,
            op2_val: 0,
            imm: 0,
            alu_result: 0,
            mem_addr: 0,
            mem_result: 0,
            is_nop: true,
            is_halt: false,
            is_legal: true,
            status: Status::Idle,
        }
    }
}

impl Instruction {
    /// A bubble: the architectural NOP tagged `Status::Bubble`.
    pub fn bubble() -> Self {
        Self {
            status: Status::Bubble,
            ..Self::default()
        }
    }

    /// A squashed copy of this instruction; it must not commit any
    /// architectural side effect at writeback.
    pub fn squashed(mut self) -> Self {
        self.status = Status::Squashed;
        self
    }
}
