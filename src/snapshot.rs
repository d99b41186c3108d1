//! Per-cycle pipeline state snapshots and the logger that consumes them.
//!
//! Grounded on the teacher's `Cpu::print_pipeline_diagram`, generalized from
//! an ad hoc `eprintln!` into a structured, serializable value plus a small
//! logger trait so a trace can be captured rather than only printed.

use serde::Serialize;

use crate::instr::{Instruction, Status};

/// One cycle's worth of latch contents, published at the end of `tick`.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub cycle: u64,
    pub if_pc: u64,
    pub if_status: Status,
    pub id_instr: u32,
    pub id_status: Status,
    pub ex_instr: u32,
    pub ex_status: Status,
    pub mem_instr: u32,
    pub mem_status: Status,
    pub wb_instr: u32,
    pub wb_status: Status,
}

impl Snapshot {
    /// Builds a snapshot from the controller's latch contents at the end of
    /// a cycle.
    pub fn capture(
        cycle: u64,
        if_latch: &Instruction,
        id_latch: &Instruction,
        ex_latch: &Instruction,
        mem_latch: &Instruction,
        wb_latch: &Instruction,
    ) -> Self {
        Self {
            cycle,
            if_pc: if_latch.pc,
            if_status: if_latch.status,
            id_instr: id_latch.raw,
            id_status: id_latch.status,
            ex_instr: ex_latch.raw,
            ex_status: ex_latch.status,
            mem_instr: mem_latch.raw,
            mem_status: mem_latch.status,
            wb_instr: wb_latch.raw,
            wb_status: wb_latch.status,
        }
    }
}

/// A sink for per-cycle snapshots. The controller calls `record` once per
/// `tick` when tracing is enabled; implementations decide where the data
/// goes.
pub trait SnapshotLogger {
    /// Records one cycle's snapshot.
    fn record(&mut self, snapshot: &Snapshot);
}

/// Writes each snapshot as a line of JSON to an arbitrary [`std::io::Write`].
pub struct JsonLinesLogger<W: std::io::Write> {
    writer: W,
}

impl<W: std::io::Write> JsonLinesLogger<W> {
    /// Wraps `writer` as a snapshot sink.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: std::io::Write> SnapshotLogger for JsonLinesLogger<W> {
    fn record(&mut self, snapshot: &Snapshot) {
        match serde_json::to_string(snapshot) {
            Ok(line) => {
                if let Err(err) = writeln!(self.writer, "{line}") {
                    tracing::warn!(%err, "failed to write pipeline snapshot");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize pipeline snapshot"),
        }
    }
}

/// Accumulates every snapshot in memory, for tests and short traces.
#[derive(Debug, Default)]
pub struct VecLogger {
    pub snapshots: Vec<Snapshot>,
}

impl SnapshotLogger for VecLogger {
    fn record(&mut self, snapshot: &Snapshot) {
        self.snapshots.push(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instruction;

    #[test]
    fn capture_reads_raw_word_and_status_per_latch() {
        let nop = Instruction::default();
        let snap = Snapshot::capture(3, &nop, &nop, &nop, &nop, &nop);
        assert_eq!(snap.cycle, 3);
        assert_eq!(snap.id_instr, nop.raw);
        assert_eq!(snap.id_status, Status::Idle);
    }

    #[test]
    fn vec_logger_accumulates_every_record() {
        let mut logger = VecLogger::default();
        let nop = Instruction::default();
        let snap = Snapshot::capture(1, &nop, &nop, &nop, &nop, &nop);
        logger.record(&snap);
        logger.record(&snap);
        assert_eq!(logger.snapshots.len(), 2);
    }
}
