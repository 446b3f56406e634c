//! Gate matrices, rotation generators, and dyadic angle conventions

use num_complex::Complex64;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// A 2×2 complex matrix, flat in row-major order
pub type Matrix2x2 = [Complex64; 4];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);
const NEG_I: Complex64 = Complex64::new(0.0, -1.0);
const NEG_ONE: Complex64 = Complex64::new(-1.0, 0.0);

/// Pauli-X (NOT)
/// X = [[0, 1],
///      [1, 0]]
pub const PAULI_X: Matrix2x2 = [ZERO, ONE, ONE, ZERO];

/// Pauli-Y
/// Y = [[0, -i],
///      [i,  0]]
pub const PAULI_Y: Matrix2x2 = [ZERO, NEG_I, I, ZERO];

/// Pauli-Z
/// Z = [[1,  0],
///      [0, -1]]
pub const PAULI_Z: Matrix2x2 = [ONE, ZERO, ZERO, NEG_ONE];

/// Hadamard
/// H = 1/√2 * [[1,  1],
///             [1, -1]]
pub const HADAMARD: Matrix2x2 = [
    Complex64::new(FRAC_1_SQRT_2, 0.0),
    Complex64::new(FRAC_1_SQRT_2, 0.0),
    Complex64::new(FRAC_1_SQRT_2, 0.0),
    Complex64::new(-FRAC_1_SQRT_2, 0.0),
];

/// Identity
pub const IDENTITY: Matrix2x2 = [ONE, ZERO, ZERO, ONE];

/// Phase shift: R1(θ) = diag(1, e^{iθ})
pub fn r1(radians: f64) -> Matrix2x2 {
    [
        ONE,
        ZERO,
        ZERO,
        Complex64::new(radians.cos(), radians.sin()),
    ]
}

/// X-axis rotation: RX(θ) = cos(θ/2)·I − i·sin(θ/2)·X
pub fn rx(radians: f64) -> Matrix2x2 {
    let cosine = (radians / 2.0).cos();
    let sine = (radians / 2.0).sin();
    [
        Complex64::new(cosine, 0.0),
        Complex64::new(0.0, -sine),
        Complex64::new(0.0, -sine),
        Complex64::new(cosine, 0.0),
    ]
}

/// Y-axis rotation: RY(θ) = cos(θ/2)·I − i·sin(θ/2)·Y
pub fn ry(radians: f64) -> Matrix2x2 {
    let cosine = (radians / 2.0).cos();
    let sine = (radians / 2.0).sin();
    [
        Complex64::new(cosine, 0.0),
        Complex64::new(-sine, 0.0),
        Complex64::new(sine, 0.0),
        Complex64::new(cosine, 0.0),
    ]
}

/// Z-axis rotation: RZ(θ) = diag(e^{−iθ/2}, e^{iθ/2})
pub fn rz(radians: f64) -> Matrix2x2 {
    let cosine = (radians / 2.0).cos();
    let sine = (radians / 2.0).sin();
    [
        Complex64::new(cosine, -sine),
        ZERO,
        ZERO,
        Complex64::new(cosine, sine),
    ]
}

/// Dyadic-fraction angle for the rotation family: −π·numerator·2/denominator
///
/// Dyadic operation angle sign is reversed from the radian rotation
/// operators and carries no division by two.
pub fn dyad_angle(numerator: i64, denominator: i64) -> f64 {
    (-PI * numerator as f64 * 2.0) / denominator as f64
}

/// Dyadic-fraction angle for R1: +π·numerator·2/denominator
///
/// R1 alone keeps the positive sign.
pub fn r1_dyad_angle(numerator: i64, denominator: i64) -> f64 {
    (PI * numerator as f64 * 2.0) / denominator as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mat_mul(a: &Matrix2x2, b: &Matrix2x2) -> Matrix2x2 {
        [
            a[0] * b[0] + a[1] * b[2],
            a[0] * b[1] + a[1] * b[3],
            a[2] * b[0] + a[3] * b[2],
            a[2] * b[1] + a[3] * b[3],
        ]
    }

    fn assert_identity(m: &Matrix2x2) {
        assert_relative_eq!(m[0].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(m[3].re, 1.0, epsilon = 1e-12);
        for entry in [m[0].im, m[1].re, m[1].im, m[2].re, m[2].im, m[3].im] {
            assert_relative_eq!(entry, 0.0, epsilon = 1e-12);
        }
    }

    fn assert_unitary(m: &Matrix2x2) {
        let dagger = [m[0].conj(), m[2].conj(), m[1].conj(), m[3].conj()];
        assert_identity(&mat_mul(&dagger, m));
    }

    #[test]
    fn test_pauli_involutions() {
        assert_identity(&mat_mul(&PAULI_X, &PAULI_X));
        assert_identity(&mat_mul(&PAULI_Y, &PAULI_Y));
        assert_identity(&mat_mul(&PAULI_Z, &PAULI_Z));
        assert_identity(&mat_mul(&HADAMARD, &HADAMARD));
    }

    #[test]
    fn test_rotations_unitary() {
        for theta in [0.0, 0.3, PI / 2.0, PI, 2.7] {
            assert_unitary(&r1(theta));
            assert_unitary(&rx(theta));
            assert_unitary(&ry(theta));
            assert_unitary(&rz(theta));
        }
    }

    #[test]
    fn test_rx_pi_is_x_up_to_phase() {
        // RX(π) = −i·X
        let m = rx(PI);
        assert_relative_eq!(m[1].im, -1.0, epsilon = 1e-12);
        assert_relative_eq!(m[2].im, -1.0, epsilon = 1e-12);
        assert_relative_eq!(m[0].re, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dyad_angle_conventions() {
        // Generic dyads: −π·num·2/den; R1 dyad keeps the positive sign.
        assert_relative_eq!(dyad_angle(1, 2), -PI, epsilon = 1e-12);
        assert_relative_eq!(r1_dyad_angle(1, 2), PI, epsilon = 1e-12);
        assert_relative_eq!(dyad_angle(1, 8), -PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_r1_matches_rz_up_to_phase() {
        // R1(θ) = e^{iθ/2}·RZ(θ)
        let theta: f64 = 0.7;
        let phase = Complex64::new((theta / 2.0).cos(), (theta / 2.0).sin());
        let lhs = r1(theta);
        let rhs = rz(theta);
        for k in 0..4 {
            let scaled = phase * rhs[k];
            assert_relative_eq!(lhs[k].re, scaled.re, epsilon = 1e-12);
            assert_relative_eq!(lhs[k].im, scaled.im, epsilon = 1e-12);
        }
    }
}
