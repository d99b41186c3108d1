//! Hazard detection and operand forwarding.
//!
//! Grounded on the teacher's `cpu::control::{need_stall_load_use,
//! forward_rs}`, generalized from the teacher's single load-use check into
//! the three-hazard, priority-ordered table `spec.md` §4.2.4 requires, and
//! from the teacher's two-forwarding-source scheme into the four paths
//! §4.2.3 names.

use crate::instr::{Instruction, Opcode, Status};

fn committing(latch: &Instruction) -> bool {
    matches!(latch.status, Status::Normal | Status::Speculative)
}

fn ex_writes(ex: &Instruction) -> bool {
    committing(ex) && ex.is_legal && ex.writes_rd && ex.rd != 0
}

fn ex_is_load(ex: &Instruction) -> bool {
    ex_writes(ex) && ex.reads_mem
}

fn ex_is_arith(ex: &Instruction) -> bool {
    ex_writes(ex) && ex.does_arith
}

fn mem_writes(mem: &Instruction) -> bool {
    committing(mem) && mem.is_legal && mem.writes_rd && mem.rd != 0
}

fn id_is_control(id: &Instruction) -> bool {
    matches!(id.opcode, Opcode::Branch | Opcode::Jal | Opcode::Jalr)
}

fn id_is_store(id: &Instruction) -> bool {
    matches!(id.opcode, Opcode::Store)
}

fn depends_on(id: &Instruction, producer_rd: u8) -> bool {
    (id.reads_rs1 && id.rs1 == producer_rd) || (id.reads_rs2 && id.rs2 == producer_rd)
}

fn depends_on_rs1(id: &Instruction, producer_rd: u8) -> bool {
    id.reads_rs1 && id.rs1 == producer_rd
}

fn depends_on_rs2(id: &Instruction, producer_rd: u8) -> bool {
    id.reads_rs2 && id.rs2 == producer_rd
}

/// The hazard the controller must stall for this cycle, in priority order.
/// At most one applies per cycle — load-branch subsumes load-use, which is
/// checked ahead of arith-branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    /// EX holds a load whose result a control instruction in ID needs to
    /// resolve its branch/jump condition: 2-cycle stall (`spec.md` §4.2.4).
    LoadBranch,
    /// EX holds a load whose result the very next instruction needs as an
    /// operand: 1-cycle stall. Exempts a store in ID, since store data can
    /// still be forwarded WB→MEM after the store itself advances.
    LoadUse,
    /// EX holds an arithmetic result a control instruction in ID needs:
    /// 1-cycle stall, not counted toward `load_stalls`.
    ArithBranch,
}

/// Detects the (at most one) hazard between the EX and ID latches.
pub fn detect(id: &Instruction, ex: &Instruction) -> Option<Hazard> {
    if ex_is_load(ex) && id_is_control(id) && depends_on(id, ex.rd) {
        return Some(Hazard::LoadBranch);
    }
    let haz1 = depends_on_rs1(id, ex.rd);
    let haz2 = depends_on_rs2(id, ex.rd);
    if ex_is_load(ex) && !id_is_control(id) && (haz1 || (haz2 && !id_is_store(id))) {
        return Some(Hazard::LoadUse);
    }
    if ex_is_arith(ex) && id_is_control(id) && depends_on(id, ex.rd) {
        return Some(Hazard::ArithBranch);
    }
    None
}

/// Forwards `rs1`/`rs2` values into `id`'s operand fields from whichever of
/// `ex`/`mem` is the most recent producer, following the priority order in
/// `spec.md` §4.2.3: EX's ALU result outranks MEM's load result, which
/// outranks MEM's ALU result.
pub fn forward_to_id(id: &mut Instruction, ex: &Instruction, mem: &Instruction) {
    let mem_val = if mem_writes(mem) {
        Some(if mem.reads_mem {
            mem.mem_result
        } else {
            mem.alu_result
        })
    } else {
        None
    };
    let ex_val = ex_is_arith(ex).then_some(ex.alu_result);

    if id.reads_rs1 {
        if ex_is_arith(ex) && ex.rd == id.rs1 {
            id.op1_val = ex_val.unwrap();
        } else if mem_writes(mem) && mem.rd == id.rs1 {
            id.op1_val = mem_val.unwrap();
        }
    }
    if id.reads_rs2 {
        if ex_is_arith(ex) && ex.rd == id.rs2 {
            id.op2_val = ex_val.unwrap();
        } else if mem_writes(mem) && mem.rd == id.rs2 {
            id.op2_val = mem_val.unwrap();
        }
    }
}

/// Forwards store data WB→MEM: a store sitting in EX (about to enter MEM)
/// whose `rs2` matches the instruction currently completing writeback gets
/// the freshly committed value instead of its stale ID-stage snapshot.
pub fn forward_store_data(ex: &mut Instruction, wb: &Instruction) {
    if !matches!(ex.opcode, Opcode::Store) || !ex.is_legal {
        return;
    }
    if mem_writes(wb) && wb.rd == ex.rs2 {
        ex.op2_val = if wb.reads_mem {
            wb.mem_result
        } else {
            wb.alu_result
        };
    }
}
