//! Final run statistics — `spec.md` §6's `{dynamic_instructions,
//! total_cycles, ic_hits, ic_misses, dc_hits, dc_misses, load_stalls}`.
//!
//! Grounded on the teacher's `stats.rs::SimStats`, narrowed to exactly the
//! fields the core contract names (no L2/L3, no branch-prediction
//! accuracy, no user/kernel/machine cycle split — those describe hardware
//! this core does not model).

use serde::Serialize;

/// Final statistics emitted by [`crate::pipeline::Controller::finalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FinalStats {
    /// Count of non-NOP, non-halt instructions that committed at writeback.
    pub dynamic_instructions: u64,
    /// Total cycles elapsed across every call to `tick`.
    pub total_cycles: u64,
    /// I-cache hits.
    pub ic_hits: u64,
    /// I-cache misses.
    pub ic_misses: u64,
    /// D-cache hits.
    pub dc_hits: u64,
    /// D-cache misses.
    pub dc_misses: u64,
    /// Load-use and load-branch stall events (`spec.md` §8: each
    /// load-branch counted once despite its two stall cycles).
    pub load_stalls: u64,
}

impl FinalStats {
    /// Prints a human-readable summary table, the CLI's default output mode.
    pub fn print(&self) {
        println!("=========================================================");
        println!("Final statistics");
        println!("  Dynamic instructions: {}", self.dynamic_instructions);
        println!("  Total cycles:         {}", self.total_cycles);

        let ipc = if self.total_cycles > 0 {
            self.dynamic_instructions as f64 / self.total_cycles as f64
        } else {
            0.0
        };
        println!("  IPC:                  {ipc:.4}");
        println!("  Load stalls:          {}", self.load_stalls);

        let print_cache = |name: &str, hits: u64, misses: u64| {
            let total = hits + misses;
            if total > 0 {
                let rate = hits as f64 / total as f64 * 100.0;
                println!("  {name:<10} {rate:.2}% hit rate ({hits} / {total})");
            } else {
                println!("  {name:<10} no accesses");
            }
        };
        print_cache("I-cache:", self.ic_hits, self.ic_misses);
        print_cache("D-cache:", self.dc_hits, self.dc_misses);
        println!("=========================================================");
    }
}
