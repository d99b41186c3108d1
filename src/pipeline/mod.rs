//! The five-stage controller: owns every latch and orchestrates one cycle
//! at a time.
//!
//! Grounded on the teacher's `Cpu` (`cpu/mod.rs`) and its `tick()` method:
//! stages are processed oldest-instruction-first within a single function
//! call (WB, then MEM, then EX, then ID/IF), which lets each stage read the
//! *other* latches' still-current (pre-tick) values as "the producer one
//! stage ahead" without needing double-buffering. Narrowed from the
//! teacher's four `IFID`/`IDEx`/`EXMEM`/`MEMWB` latch types (plus MMU,
//! CSRs, a dynamic branch predictor and a multi-level cache hierarchy) down
//! to the single `Instruction` latch type and the two flat caches this
//! design calls for.

pub mod hazards;

use crate::cache::{Access, CacheSim};
use crate::common::{CoreError, RegisterFile, EXCEPTION_HANDLER_ADDR};
use crate::config::Config;
use crate::instr::{Instruction, Opcode, Status};
use crate::isa::semantics;
use crate::memory::Memory;
use crate::snapshot::Snapshot;
use crate::stats::FinalStats;

/// What happened during one call to [`Controller::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    /// A normal cycle; the pipeline advanced (or legitimately stalled on a
    /// hazard, or rode out an in-flight I-cache miss) without incident.
    Normal,
    /// Every latch was frozen this cycle by an outstanding D-cache miss.
    CacheStall,
    /// The halt encoding reached writeback and committed.
    Halted,
    /// An exception reached its redirect point this cycle.
    Exception(CoreError),
}

/// The outcome of running a batch of cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The requested number of cycles elapsed.
    Continued,
    /// The pipeline halted.
    Halted,
    /// An exception occurred; the controller's PC now points at the
    /// handler and execution can continue if the caller chooses.
    Exception(CoreError),
}

/// Owns the pipeline's architectural and micro-architectural state and
/// advances it one cycle at a time.
#[derive(Debug)]
pub struct Controller {
    if_latch: Instruction,
    id_latch: Instruction,
    ex_latch: Instruction,
    mem_latch: Instruction,
    wb_latch: Instruction,

    regs: RegisterFile,
    memory: Memory,
    i_cache: CacheSim,
    d_cache: CacheSim,

    /// Address of the next instruction fetch.
    pc: u64,

    cycle_count: u64,
    dynamic_instructions: u64,
    load_stalls: u64,

    /// Cycles left before an in-flight I-cache miss resolves. Independent
    /// of `d_miss_remaining`: it ticks down even while a D-miss also holds
    /// the rest of the pipeline frozen (`spec.md` §4.3).
    i_miss_remaining: u64,
    /// Cycles left before an in-flight D-cache miss resolves. While
    /// nonzero, every latch is frozen and WB publishes a bubble.
    d_miss_remaining: u64,
    /// Set to 1 on the first cycle a load-branch hazard is detected; the
    /// following cycle forces a second stall regardless of what hazard
    /// detection would otherwise say (`spec.md` §4.2.4/§9).
    load_branch_extra: u8,
}

impl Controller {
    /// Builds a controller with `program` loaded at address 0 and performs
    /// the initial fetch at `config.start_pc`, so the first call to `tick`
    /// processes a pipeline that already has one instruction in flight
    /// (`spec.md` §4.2.9).
    pub fn init(config: Config, program: &[u8]) -> Self {
        let mut memory = Memory::new(config.memory_size);
        memory.load_image(program);

        let mut controller = Self {
            if_latch: Instruction::default(),
            id_latch: Instruction::default(),
            ex_latch: Instruction::default(),
            mem_latch: Instruction::default(),
            wb_latch: Instruction::default(),
            regs: RegisterFile::new(),
            memory,
            i_cache: CacheSim::new(config.i_cache),
            d_cache: CacheSim::new(config.d_cache),
            pc: config.start_pc,
            cycle_count: 0,
            dynamic_instructions: 0,
            load_stalls: 0,
            i_miss_remaining: 0,
            d_miss_remaining: 0,
            load_branch_extra: 0,
        };
        let mut initial = controller.fetch(config.start_pc);
        initial.status = Status::Speculative;
        controller.pc = initial.next_pc;
        controller.if_latch = initial;
        controller
    }

    /// Queries the I-cache and fetches the word at `addr`, arming
    /// `i_miss_remaining` on a miss.
    fn fetch(&mut self, addr: u64) -> Instruction {
        if !self.i_cache.access(addr, Access::Read) {
            self.i_miss_remaining = self.i_cache.miss_latency();
            tracing::warn!(addr, latency = self.i_miss_remaining, "i-cache miss");
        }
        semantics::sim_if(addr, &self.memory)
    }

    /// Abandons whatever fetch is outstanding and clears every pending
    /// stall; called when an exception redirects the pipeline.
    fn abandon_in_flight_state(&mut self) {
        if self.i_miss_remaining > 0 {
            self.i_cache.invalidate(self.if_latch.pc);
        }
        self.i_miss_remaining = 0;
        self.d_miss_remaining = 0;
        self.load_branch_extra = 0;
    }

    /// Reads architectural register `idx` (0-31); `x0` always reads 0.
    ///
    /// Exposed for dumps and tests — the controller itself never reads a
    /// register except through the semantics façade during `tick`.
    pub fn register(&self, idx: usize) -> u32 {
        self.regs.read(idx)
    }

    /// A snapshot of the current (post-tick) latch contents, for tracing.
    ///
    /// `cycle_count` counts ticks executed (1-based, matching
    /// `FinalStats::total_cycles`); the snapshot reports the 0-based index
    /// of the cycle that was just completed, so the first snapshot emitted
    /// after the first `tick()` call carries `cycle == 0`.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            self.cycle_count - 1,
            &self.if_latch,
            &self.id_latch,
            &self.ex_latch,
            &self.mem_latch,
            &self.wb_latch,
        )
    }

    /// Advances the pipeline by exactly one cycle.
    pub fn tick(&mut self) -> TickEvent {
        self.cycle_count += 1;
        tracing::trace!(cycle = self.cycle_count, pc = self.pc, "tick start");

        // A D-cache miss freezes every latch; WB publishes a bubble once
        // the faulting access's own commit cycle has passed.
        if self.d_miss_remaining > 0 {
            self.d_miss_remaining -= 1;
            if self.i_miss_remaining > 0 {
                self.i_miss_remaining -= 1;
            }
            self.wb_latch = Instruction::bubble();
            return TickEvent::CacheStall;
        }

        let id0 = self.id_latch.clone();
        let ex0 = self.ex_latch.clone();
        let mem0 = self.mem_latch.clone();
        let wb0 = self.wb_latch.clone();

        let illegal_exception = !id0.is_legal && !id0.is_nop && committing(&id0);

        // ---- WB: retire MEM' ----
        let wb_commits = committing(&mem0);
        if wb_commits {
            semantics::sim_wb(&mem0, &mut self.regs);
            if mem0.is_legal && !mem0.is_nop && !mem0.is_halt {
                self.dynamic_instructions += 1;
            }
        }
        if wb_commits && mem0.is_halt {
            self.wb_latch = mem0;
            return TickEvent::Halted;
        }

        // ---- MEM: run EX' ----
        let mut ex_for_mem = ex0.clone();
        let ex_commits = committing(&ex_for_mem);
        let mut mem_fault: Option<CoreError> = None;
        let new_mem = if ex_commits {
            if ex_for_mem.writes_mem {
                hazards::forward_store_data(&mut ex_for_mem, &wb0);
            }
            if ex_for_mem.reads_mem || ex_for_mem.writes_mem {
                let kind = if ex_for_mem.writes_mem {
                    Access::Write
                } else {
                    Access::Read
                };
                if !self.d_cache.access(u64::from(ex_for_mem.mem_addr), kind) {
                    self.d_miss_remaining = self.d_cache.miss_latency();
                    tracing::warn!(
                        addr = ex_for_mem.mem_addr,
                        latency = self.d_miss_remaining,
                        "d-cache miss"
                    );
                }
            }
            match semantics::sim_mem(&ex_for_mem, &mut self.memory) {
                Ok(done) => done,
                Err(err) => {
                    mem_fault = Some(err);
                    ex_for_mem.squashed()
                }
            }
        } else {
            ex_for_mem
        };

        if let Some(err) = mem_fault {
            // The faulting instruction (MEM, itself) and everything
            // younger (EX, ID, IF) are squashed; WB already retired the
            // older instruction above.
            self.wb_latch = mem0;
            self.mem_latch = new_mem;
            self.ex_latch = Instruction::default().squashed();
            self.id_latch = Instruction::default().squashed();
            self.abandon_in_flight_state();
            self.pc = EXCEPTION_HANDLER_ADDR;
            self.if_latch = Instruction {
                pc: self.pc,
                status: Status::Squashed,
                ..Instruction::default()
            };
            return TickEvent::Exception(err);
        }

        // ---- EX: advance ID', subject to hazard detection ----
        let mut id0_resolved = id0.clone();
        let id_is_candidate = committing(&id0_resolved) && id0_resolved.is_legal;
        let mut hazard_stall = false;
        let mut taken_redirect: Option<u64> = None;

        let new_ex = if !id_is_candidate {
            id0_resolved.clone()
        } else {
            // Forwarding and (for control instructions) branch/jump
            // resolution are re-applied every cycle ID' sits here, so a
            // value that arrives only after a stall begins is still
            // picked up before the instruction finally advances.
            hazards::forward_to_id(&mut id0_resolved, &ex0, &mem0);
            if matches!(id0_resolved.opcode, Opcode::Branch | Opcode::Jal | Opcode::Jalr) {
                id0_resolved = semantics::sim_next_pc_resolution(&id0_resolved);
            }

            if self.load_branch_extra > 0 {
                self.load_branch_extra -= 1;
                hazard_stall = true;
                Instruction::bubble()
            } else {
                match hazards::detect(&id0, &ex0) {
                    Some(hazards::Hazard::LoadBranch) => {
                        self.load_branch_extra = 1;
                        self.load_stalls += 1;
                        hazard_stall = true;
                        Instruction::bubble()
                    }
                    Some(hazards::Hazard::LoadUse) => {
                        self.load_stalls += 1;
                        hazard_stall = true;
                        Instruction::bubble()
                    }
                    Some(hazards::Hazard::ArithBranch) => {
                        hazard_stall = true;
                        Instruction::bubble()
                    }
                    None => {
                        let executed = semantics::sim_ex(&id0_resolved);
                        if matches!(
                            id0_resolved.opcode,
                            Opcode::Branch | Opcode::Jal | Opcode::Jalr
                        ) && id0_resolved.next_pc != id0.pc.wrapping_add(4)
                        {
                            taken_redirect = Some(id0_resolved.next_pc);
                        }
                        executed
                    }
                }
            }
        };

        self.wb_latch = mem0;
        self.mem_latch = new_mem;

        // ---- ID: the illegal-instruction exception ----
        if illegal_exception {
            // Older instructions already in EX/MEM/WB are unaffected; only
            // the illegal instruction (ID, itself) and IF (younger) squash.
            self.ex_latch = Instruction::bubble();
            self.id_latch = id0.clone().squashed();
            self.abandon_in_flight_state();
            self.pc = EXCEPTION_HANDLER_ADDR;
            self.if_latch = Instruction {
                pc: self.pc,
                status: Status::Squashed,
                ..Instruction::default()
            };
            return TickEvent::Exception(CoreError::IllegalInstruction {
                raw: id0.raw,
                pc: id0.pc,
            });
        }

        self.ex_latch = new_ex;

        // ---- ID / IF: hazard stall, cache-driven freeze, or nominal advance ----
        if hazard_stall {
            // IF and ID are both stalled: ID keeps this same instruction
            // (with whatever forwarding/resolution was just applied) for
            // re-evaluation next cycle; IF is left untouched.
            self.id_latch = id0_resolved;
            return TickEvent::Normal;
        }

        if let Some(target) = taken_redirect {
            // The branch/jump itself committed into EX above; what gets
            // squashed here is the speculatively-fetched IF behind it and
            // whatever would have been decoded from it this cycle.
            self.id_latch = Instruction::default().squashed();
            self.if_latch.status = Status::Squashed;
            if self.i_miss_remaining > 0 {
                self.i_cache.invalidate(self.if_latch.pc);
            }
            self.i_miss_remaining = 0;
            self.pc = target;
            return TickEvent::Normal;
        }

        if self.i_miss_remaining > 0 {
            // The outstanding I-cache miss freezes only IF (republished
            // unchanged) and ID (bubble); EX/MEM/WB above already
            // continued draining normally this cycle.
            self.i_miss_remaining -= 1;
            self.id_latch = Instruction::bubble();
            return TickEvent::Normal;
        }

        let decoded = semantics::sim_id(&self.if_latch, &self.regs);
        let speculative =
            decoded.is_legal && matches!(decoded.opcode, Opcode::Branch | Opcode::Jal | Opcode::Jalr);
        let mut fetched = self.fetch(self.pc);
        if speculative {
            fetched.status = Status::Speculative;
        }
        self.pc = fetched.next_pc;
        self.id_latch = decoded;
        self.if_latch = fetched;

        TickEvent::Normal
    }

    /// Runs up to `n` cycles, stopping early on halt or exception.
    pub fn run_cycles(&mut self, n: u64) -> RunOutcome {
        for _ in 0..n {
            match self.tick() {
                TickEvent::Halted => return RunOutcome::Halted,
                TickEvent::Exception(e) => return RunOutcome::Exception(e),
                TickEvent::Normal | TickEvent::CacheStall => {}
            }
        }
        RunOutcome::Continued
    }

    /// Runs until halt or the first exception.
    pub fn run_till_halt(&mut self) -> RunOutcome {
        loop {
            match self.tick() {
                TickEvent::Halted => return RunOutcome::Halted,
                TickEvent::Exception(e) => return RunOutcome::Exception(e),
                TickEvent::Normal | TickEvent::CacheStall => {}
            }
        }
    }

    /// Summarizes the run so far.
    pub fn finalize(&self) -> FinalStats {
        let stats = FinalStats {
            dynamic_instructions: self.dynamic_instructions,
            total_cycles: self.cycle_count,
            ic_hits: self.i_cache.hits(),
            ic_misses: self.i_cache.misses(),
            dc_hits: self.d_cache.hits(),
            dc_misses: self.d_cache.misses(),
            load_stalls: self.load_stalls,
        };
        tracing::info!(
            dynamic_instructions = stats.dynamic_instructions,
            total_cycles = stats.total_cycles,
            load_stalls = stats.load_stalls,
            "pipeline run finalized"
        );
        stats
    }
}

fn committing(latch: &Instruction) -> bool {
    matches!(latch.status, Status::Normal | Status::Speculative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn no_op_config() -> Config {
        let mut cfg = Config::default();
        cfg.memory_size = 4096;
        cfg
    }

    #[test]
    fn addi_chain_commits_in_order() {
        use crate::common::HALT_ENCODING;
        // addi x1,x0,5 ; addi x2,x1,7 ; halt
        let program = program_bytes(&[0x0050_0093, 0x0070_8113, HALT_ENCODING]);
        let mut cfg = no_op_config();
        cfg.i_cache.ways = 1;
        cfg.d_cache.ways = 1;
        let mut ctrl = Controller::init(cfg, &program);
        let outcome = ctrl.run_till_halt();
        assert_eq!(outcome, RunOutcome::Halted);
        assert_eq!(ctrl.regs.read(1), 5);
        assert_eq!(ctrl.regs.read(2), 12);
    }

    #[test]
    fn halt_encoding_stops_the_run() {
        use crate::common::HALT_ENCODING;
        let program = program_bytes(&[HALT_ENCODING]);
        let mut ctrl = Controller::init(no_op_config(), &program);
        let outcome = ctrl.run_till_halt();
        assert_eq!(outcome, RunOutcome::Halted);
    }

    #[test]
    fn illegal_encoding_redirects_to_handler() {
        // 0b1111111 is not a defined RV32I opcode.
        let program = program_bytes(&[0xffff_ffff]);
        let mut cfg = no_op_config();
        // A default miss_latency of 10 would bubble ID through the cold
        // initial-fetch I-miss for 10 cycles before this raw word is even
        // decoded; keep the startup delay small so the budget below covers
        // both the cold miss and the illegal-instruction detection.
        cfg.i_cache.miss_latency = 1;
        let mut ctrl = Controller::init(cfg, &program);
        let outcome = ctrl.run_cycles(10);
        assert!(matches!(
            outcome,
            RunOutcome::Exception(CoreError::IllegalInstruction { .. })
        ));
    }

    #[test]
    fn out_of_bounds_store_faults() {
        // addi x1, x0, 2047 ; sw x0, 0(x1)
        let program = program_bytes(&[0x7ff0_0093, 0x0000_a023]);
        let mut cfg = no_op_config();
        cfg.memory_size = 64;
        let mut ctrl = Controller::init(cfg, &program);
        let outcome = ctrl.run_cycles(20);
        assert!(matches!(
            outcome,
            RunOutcome::Exception(CoreError::MemoryFault { .. })
        ));
    }

    #[test]
    fn load_use_hazard_still_produces_correct_result() {
        // lw x1, 12(x0)  -- address 12 is past the program, reads as zero
        // addi x2, x1, 1 ; jal x0, 0 (spins in place)
        let program = program_bytes(&[0x00c0_2083, 0x0010_8113, 0x0000_006f]);
        let mut ctrl = Controller::init(no_op_config(), &program);
        let _ = ctrl.run_cycles(30);
        assert_eq!(ctrl.regs.read(1), 0);
        assert_eq!(ctrl.regs.read(2), 1);
        assert!(ctrl.load_stalls >= 1);
    }

    #[test]
    fn taken_branch_squashes_the_fall_through_instruction() {
        // beq x0, x0, 8 ; addi x3, x0, 99 (skipped) ; addi x1, x0, 7 ; halt
        use crate::common::HALT_ENCODING;
        let program = program_bytes(&[
            0x0000_0463, // beq x0, x0, 8
            0x0630_0193, // addi x3, x0, 99
            0x0070_0093, // addi x1, x0, 7
            HALT_ENCODING,
        ]);
        let mut ctrl = Controller::init(no_op_config(), &program);
        let outcome = ctrl.run_till_halt();
        assert_eq!(outcome, RunOutcome::Halted);
        assert_eq!(ctrl.regs.read(1), 7);
        assert_eq!(ctrl.regs.read(3), 0, "the fallen-through add must never commit");
    }

    #[test]
    fn not_taken_branch_falls_through_normally() {
        // addi x1, x0, 1 ; bne x0, x0, 8 (not taken) ; addi x2, x0, 5 ; halt
        use crate::common::HALT_ENCODING;
        let program = program_bytes(&[
            0x0010_0093, // addi x1, x0, 1
            0x0000_1463, // bne x0, x0, 8
            0x0050_0113, // addi x2, x0, 5
            HALT_ENCODING,
        ]);
        let mut ctrl = Controller::init(no_op_config(), &program);
        let outcome = ctrl.run_till_halt();
        assert_eq!(outcome, RunOutcome::Halted);
        assert_eq!(ctrl.regs.read(2), 5);
    }

    #[test]
    fn jal_links_return_address_and_redirects() {
        // jal x1, 8 ; addi x2, x0, 99 (skipped) ; addi x3, x0, 4 ; halt
        use crate::common::HALT_ENCODING;
        let program = program_bytes(&[
            0x0080_00ef, // jal x1, 8
            0x0630_0113, // addi x2, x0, 99
            0x0040_0193, // addi x3, x0, 4
            HALT_ENCODING,
        ]);
        let mut ctrl = Controller::init(no_op_config(), &program);
        let outcome = ctrl.run_till_halt();
        assert_eq!(outcome, RunOutcome::Halted);
        assert_eq!(ctrl.regs.read(1), 4, "jal must link pc+4");
        assert_eq!(ctrl.regs.read(2), 0, "the fallen-through add must never commit");
        assert_eq!(ctrl.regs.read(3), 4);
    }

    #[test]
    fn load_branch_hazard_stalls_and_resolves_correctly() {
        // lw x1, 24(x0) -- reads zero (past the program)
        // beq x1, x0, 12 (taken: x1 == 0) -- immediately follows the load,
        // so resolving it needs the EX-held load's result (LoadBranch hazard)
        use crate::common::HALT_ENCODING;
        let program = program_bytes(&[
            0x0180_2083, // lw x1, 24(x0)
            0x0000_8663, // beq x1, x0, 12
            0x0630_0193, // addi x3, x0, 99 (skipped)
            0x0370_0213, // addi x4, x0, 55 (skipped)
            0x0070_0293, // addi x5, x0, 7
            HALT_ENCODING,
        ]);
        let mut ctrl = Controller::init(no_op_config(), &program);
        let outcome = ctrl.run_till_halt();
        assert_eq!(outcome, RunOutcome::Halted);
        assert_eq!(ctrl.regs.read(1), 0);
        assert_eq!(ctrl.regs.read(3), 0, "skipped by the taken branch");
        assert_eq!(ctrl.regs.read(4), 0, "skipped by the taken branch");
        assert_eq!(ctrl.regs.read(5), 7);
        assert!(ctrl.load_stalls >= 1);
    }
}
