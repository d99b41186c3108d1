//! Precise-exception and configuration error types.

use thiserror::Error;

/// A precise exception raised while advancing the pipeline.
///
/// Both variants share the recovery behavior described by the controller:
/// the raising instruction and all younger stages are squashed, `pc` is
/// redirected to [`crate::common::EXCEPTION_HANDLER_ADDR`], and `tick`
/// returns this error after older in-flight instructions have committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A MEM-stage access whose address is `>= MEMORY_SIZE`.
    #[error("memory exception: addr={addr:#x} >= MEMORY_SIZE at pc={pc:#x}")]
    MemoryFault {
        /// The out-of-range address.
        addr: u64,
        /// The PC of the instruction that raised the fault.
        pc: u64,
    },
    /// An ID-stage instruction whose encoding is not recognized.
    #[error("illegal instruction {raw:#010x} at pc={pc:#x}")]
    IllegalInstruction {
        /// The raw 32-bit instruction word.
        raw: u32,
        /// The PC of the illegal instruction.
        pc: u64,
    },
}

/// An error constructing a [`crate::config::CacheConfig`] from malformed
/// values.
///
/// `spec.md` §3 requires `cache_size`, `block_size`, and `ways` each be a
/// positive power of two; it separately documents (§4.1) that the *derived*
/// set count (`cache_size / block_size / ways`) may legitimately come out to
/// zero even for well-formed inputs, in which case every access is defined
/// to miss without side effect. This error type enforces only the former —
/// the latter is runtime behavior, not a construction-time error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache configuration field `{field}` = {value} must be a positive power of two")]
pub struct ConfigError {
    /// Name of the offending field (`"cache_size"`, `"block_size"`, or `"ways"`).
    pub field: &'static str,
    /// The offending value.
    pub value: u64,
}
