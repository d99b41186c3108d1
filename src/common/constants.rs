//! Global constants fixed by the architecture and this core's contract.

/// The architectural NOP: `addi x0, x0, 0`.
pub const NOP_ENCODING: u32 = 0x0000_0013;

/// The encoding the semantics façade reserves for HALT.
///
/// The controller never inspects this value directly — it only consumes
/// the `is_halt` flag the façade attaches to a decoded instruction — but
/// the constant is public so callers assembling test programs can use it.
pub const HALT_ENCODING: u32 = 0xfeed_feed;

/// Address the controller redirects `pc` to on any precise exception.
pub const EXCEPTION_HANDLER_ADDR: u64 = 0x8000;
