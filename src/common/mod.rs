//! Common types and constants shared by every part of the pipeline core.
//!
//! This module provides the fundamental building blocks used throughout the
//! simulator:
//! 1. **Constants:** Encodings and addresses fixed by the architecture (NOP,
//!    HALT, the exception handler address).
//! 2. **Error Handling:** The precise-exception representation returned from
//!    `tick`.
//! 3. **Register Management:** The 32-entry general-purpose register file.

/// Global constants fixed by the architecture and this core's contract.
pub mod constants;
/// Precise-exception representation (`CoreError`) and configuration errors.
pub mod error;
/// General-purpose register file.
pub mod reg;

pub use constants::{EXCEPTION_HANDLER_ADDR, HALT_ENCODING, NOP_ENCODING};
pub use error::{ConfigError, CoreError};
pub use reg::RegisterFile;
