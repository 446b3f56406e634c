//! Dense quantum register state storage with parallel dispatch primitives
//!
//! This crate provides the amplitude buffer underlying the qureg simulator:
//! a 64-byte aligned heap array of 2^n complex amplitudes with
//! resize-by-move semantics, plus the data-parallel drivers used by the
//! kernel layer (masked iteration over sub-indices, scatter copies into a
//! fresh buffer, strided in-place rotation, and an L2-norm reduction).
//!
//! # Example
//!
//! ```
//! use qureg_state::StateVector;
//! use num_complex::Complex64;
//!
//! // Three qubits, all amplitude on |000⟩
//! let mut state = StateVector::zeroed(3).unwrap();
//! state.amplitudes_mut()[0] = Complex64::new(1.0, 0.0);
//! assert_eq!(state.len(), 8);
//! ```

pub mod error;
pub mod parallel;
pub mod state_vector;

pub use error::{Result, StateError};
pub use state_vector::{AmpsPtr, StateVector};
