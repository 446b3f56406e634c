//! Error types for amplitude buffer operations

use thiserror::Error;

/// Errors that can occur while managing the amplitude buffer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Requested register width exceeds the index type
    #[error("Cannot represent a {qubit_count}-qubit register with a {max}-bit index type")]
    CapacityExceeded { qubit_count: usize, max: usize },

    /// Memory allocation failure
    #[error("Failed to allocate {size} bytes for state vector")]
    Allocation { size: usize },

    /// Amplitude slice length does not match the register dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for amplitude buffer operations
pub type Result<T> = std::result::Result<T, StateError>;
