//! Integration tests for the six concrete scenarios in `spec.md` §8, plus
//! the quantified/round-trip properties it names.
//!
//! Grounded on the teacher's `crates/hardware/tests/` split (a dedicated
//! `tests/` directory of scenario-level checks alongside the library's own
//! `#[cfg(test)]` unit tests) and its `rstest`/`pretty_assertions`
//! dev-dependencies.

use pretty_assertions::assert_eq;
use rstest::rstest;

use rv5_core::common::HALT_ENCODING;
use rv5_core::config::Config;
use rv5_core::pipeline::{Controller, RunOutcome};
use rv5_core::CoreError;

fn program(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn default_config() -> Config {
    let mut cfg = Config::default();
    cfg.memory_size = 4096;
    cfg
}

#[rstest]
fn scenario_1_no_hazards_computes_expected_registers() {
    // addi r1, r0, 5; addi r2, r0, 7; add r3, r1, r2; halt
    let prog = program(&[
        0x0050_0093, // addi x1, x0, 5
        0x0070_0113, // addi x2, x0, 7
        0x0020_81b3, // add x3, x1, x2
        HALT_ENCODING,
    ]);
    let mut ctrl = Controller::init(default_config(), &prog);
    let outcome = ctrl.run_till_halt();
    assert_eq!(outcome, RunOutcome::Halted);
    assert_eq!(ctrl.register(1), 5);
    assert_eq!(ctrl.register(2), 7);
    assert_eq!(ctrl.register(3), 12);

    let stats = ctrl.finalize();
    assert_eq!(stats.load_stalls, 0, "no hazards in this program");
    assert!(stats.total_cycles >= stats.dynamic_instructions);
}

#[rstest]
fn scenario_2_load_use_stall_forwards_correctly() {
    // addi r1, r0, 200; lw r2, 0(r1); add r3, r2, r2; halt   with mem[200]=9
    // (address 200 sits well past the instruction fetch window that the
    // pipeline still speculatively walks while HALT drains to writeback, so
    // it's never itself mistaken for a fetched instruction.)
    let mut prog = program(&[
        0x0c80_0093, // addi x1, x0, 200
        0x0000_a103, // lw x2, 0(x1)
        0x0021_01b3, // add x3, x2, x2
        HALT_ENCODING,
    ]);
    prog.resize(256, 0);
    prog[200..204].copy_from_slice(&9u32.to_le_bytes());

    let mut ctrl = Controller::init(default_config(), &prog);
    let outcome = ctrl.run_till_halt();
    assert_eq!(outcome, RunOutcome::Halted);
    assert_eq!(ctrl.register(2), 9);
    assert_eq!(ctrl.register(3), 18);

    let stats = ctrl.finalize();
    assert_eq!(stats.load_stalls, 1);
}

#[rstest]
fn scenario_3_taken_branch_squashes_fallthrough() {
    // addi r1, r0, 1; beq r1, r1, +8; addi r2, r0, 42; addi r3, r0, 99; halt
    let prog = program(&[
        0x0010_0093, // addi x1, x0, 1
        0x0010_8463, // beq x1, x1, 8
        0x02a0_0113, // addi x2, x0, 42 (skipped)
        0x0630_0193, // addi x3, x0, 99
        HALT_ENCODING,
    ]);
    let mut ctrl = Controller::init(default_config(), &prog);
    let outcome = ctrl.run_till_halt();
    assert_eq!(outcome, RunOutcome::Halted);
    assert_eq!(ctrl.register(2), 0, "x2 write is skipped by the taken branch");
    assert_eq!(ctrl.register(3), 99);
}

#[rstest]
fn scenario_4_d_cache_miss_stalls_mem_without_changing_results() {
    let mut prog = program(&[
        0x0c80_0093, // addi x1, x0, 200
        0x0000_a103, // lw x2, 0(x1)
        0x0021_01b3, // add x3, x2, x2
        HALT_ENCODING,
    ]);
    prog.resize(256, 0);
    prog[200..204].copy_from_slice(&9u32.to_le_bytes());

    let mut cfg = default_config();
    cfg.d_cache.miss_latency = 3;
    let mut ctrl = Controller::init(cfg, &prog);
    let outcome = ctrl.run_till_halt();
    assert_eq!(outcome, RunOutcome::Halted);
    assert_eq!(ctrl.register(2), 9);
    assert_eq!(ctrl.register(3), 18);

    let stats = ctrl.finalize();
    assert_eq!(stats.dc_misses, 1);
    assert_eq!(stats.dc_hits, 0);
}

#[rstest]
fn scenario_5_illegal_instruction_redirects_to_handler() {
    let prog = program(&[0xffff_ffff]);
    let mut cfg = default_config();
    // The initial fetch in `init` is a cold I-cache miss; at the default
    // miss_latency of 10 that alone would bubble ID for ten cycles before
    // this raw word is ever decoded, so keep it small to fit the budget.
    cfg.i_cache.miss_latency = 1;
    let mut ctrl = Controller::init(cfg, &prog);
    let outcome = ctrl.run_cycles(5);
    assert!(matches!(
        outcome,
        RunOutcome::Exception(CoreError::IllegalInstruction { .. })
    ));
}

#[rstest]
fn scenario_6_memory_exception_on_out_of_range_load() {
    // addi r1, r0, 1; slli r1, r1, 30; lw r2, 0(r1); halt
    let prog = program(&[
        0x0010_0093, // addi x1, x0, 1
        0x01e0_9093, // slli x1, x1, 30
        0x0000_a103, // lw x2, 0(x1)
        HALT_ENCODING,
    ]);
    let mut cfg = default_config();
    cfg.memory_size = 1 << 20;
    // Same reasoning as scenario 5: a 10-cycle cold I-miss at startup would
    // otherwise eat the whole cycle budget before the load even reaches MEM.
    cfg.i_cache.miss_latency = 1;
    cfg.d_cache.miss_latency = 1;
    let mut ctrl = Controller::init(cfg, &prog);
    let outcome = ctrl.run_cycles(10);
    assert!(matches!(
        outcome,
        RunOutcome::Exception(CoreError::MemoryFault { .. })
    ));
}

#[rstest]
fn deterministic_replay_yields_identical_final_stats() {
    let prog = program(&[
        0x0050_0093,
        0x0070_0113,
        0x0020_81b3,
        HALT_ENCODING,
    ]);
    let mut a = Controller::init(default_config(), &prog);
    let mut b = Controller::init(default_config(), &prog);
    let _ = a.run_till_halt();
    let _ = b.run_till_halt();
    assert_eq!(a.register(3), b.register(3));
    assert_eq!(a.finalize(), b.finalize());
}
