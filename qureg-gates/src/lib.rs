//! Gate matrix library for the qureg simulator
//!
//! Constant 2×2 matrices for the discrete gates, generator functions for the
//! parameterized rotations, and the dyadic-fraction angle conventions shared
//! by the rotation family. Matrices are stored flat in row-major order,
//! matching the packed layout the kernel dispatch layer consumes.

pub mod matrices;

pub use matrices::{
    dyad_angle, r1, r1_dyad_angle, rx, ry, rz, Matrix2x2, HADAMARD, IDENTITY, PAULI_X, PAULI_Y,
    PAULI_Z,
};
