//! Error types for register operations

use qureg_state::StateError;
use thiserror::Error;

/// Errors raised by register construction and operations
///
/// Every argument-validation failure is raised before the state vector is
/// touched, so a returned error always leaves the register unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegisterError {
    /// Register width outside [1, index width)
    #[error("Invalid qubit count {qubit_count}, expected 1..={max}")]
    InvalidQubitCount { qubit_count: usize, max: usize },

    /// Qubit index past the end of the register
    #[error("Invalid qubit index {index} for {qubit_count}-qubit register")]
    InvalidQubitIndex { index: usize, qubit_count: usize },

    /// Bit range falls outside the register
    #[error("Invalid bit range [{start}, {start}+{length}) for {qubit_count}-qubit register")]
    InvalidRange {
        start: usize,
        length: usize,
        qubit_count: usize,
    },

    /// Basis permutation past the end of the state vector
    #[error("Invalid permutation {permutation} for {qubit_count}-qubit register")]
    InvalidPermutation {
        permutation: usize,
        qubit_count: usize,
    },

    /// A control bit was also named as the target
    #[error("Control bit {index} cannot also be the target")]
    ControlIsTarget { index: usize },

    /// The same bit was named as both controls
    #[error("Control bits cannot be the same bit ({index})")]
    DuplicateControl { index: usize },

    /// BCD operations require whole nibbles
    #[error("BCD word bit length must be a multiple of 4, got {length}")]
    BcdLength { length: usize },

    /// The carry bit must lie outside both operand ranges
    #[error("Carry bit {carry_index} overlaps an operand range")]
    CarryOverlap { carry_index: usize },

    /// Destination register width does not match the decohered range
    #[error("Destination register holds {actual} qubits, expected {expected}")]
    DestinationMismatch { expected: usize, actual: usize },

    /// No usable accelerator device or platform
    #[error("Accelerator backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// Amplitude buffer failure (capacity or allocation)
    #[error(transparent)]
    State(#[from] StateError),
}

/// Result type for register operations
pub type Result<T> = std::result::Result<T, RegisterError>;
