//! Pseudo-quantum dense state-vector register simulator
//!
//! Maintains the full 2^n amplitude vector of an n-qubit pure state and
//! transforms it under unitary gates, projective measurement, register-wide
//! arithmetic, and coherence operators. "Pseudo-quantum" operations expose
//! what a physical device cannot: exact probability reads, state cloning,
//! and arithmetic realized as classically-computed permutations of basis
//! states.
//!
//! All amplitude transformations dispatch through a process-wide kernel
//! service; the CPU backend is the reference implementation, and the `gpu`
//! feature adds the same kernel catalogue as wgpu compute pipelines.
//!
//! # Example
//!
//! ```
//! use qureg_sim::CoherentRegister;
//!
//! // |0101⟩ plus 3 is |1000⟩
//! let mut reg = CoherentRegister::new_with_permutation(4, 0b0101).unwrap();
//! reg.inc(3, 0, 4).unwrap();
//! assert!((reg.prob_all(0b1000).unwrap() - 1.0).abs() < 1e-9);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod register;

pub use backend::{BackendKind, KernelService, ServiceConfig};
pub use config::RegisterConfig;
pub use error::{RegisterError, Result};
pub use register::CoherentRegister;
