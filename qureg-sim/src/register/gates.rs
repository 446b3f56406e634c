//! Single-bit, controlled, and doubly-controlled gates
//!
//! Every gate funnels into one `apply_2x2` dispatch. The offset pair picks
//! which two amplitudes of each masked group the matrix acts on: single-bit
//! gates pair |1⟩ against |0⟩ of the target, controlled gates pair the
//! control-set halves, anti-controlled gates the control-clear halves.

use super::CoherentRegister;
use crate::backend::Apply2x2Params;
use crate::error::{RegisterError, Result};
use num_complex::Complex64;
use qureg_gates::{matrices, Matrix2x2};
use qureg_state::{parallel, StateVector};
use smallvec::{smallvec, SmallVec};

impl CoherentRegister {
    fn apply_2x2(
        &mut self,
        offset1: usize,
        offset2: usize,
        mtrx: &Matrix2x2,
        q_powers_sorted: SmallVec<[usize; 3]>,
        do_apply_norm: bool,
        do_calc_norm: bool,
    ) {
        let nrm = if do_apply_norm {
            Complex64::new(1.0 / self.running_norm, 0.0)
        } else {
            Complex64::new(1.0, 0.0)
        };
        let params = Apply2x2Params {
            mtrx: *mtrx,
            nrm,
            offset1,
            offset2,
            q_powers_sorted,
        };
        self.service.backend().apply_2x2(&mut self.state, &params);
        if do_calc_norm {
            self.update_running_norm();
        } else {
            // Unitary on a normalized input; reassert instead of re-reducing
            self.running_norm = 1.0;
        }
    }

    fn apply_single(&mut self, index: usize, mtrx: &Matrix2x2, do_calc_norm: bool) -> Result<()> {
        self.check_bit(index)?;
        let q_power = 1usize << index;
        self.apply_2x2(q_power, 0, mtrx, smallvec![q_power], true, do_calc_norm);
        Ok(())
    }

    fn controlled_powers(&self, control: usize, target: usize) -> Result<SmallVec<[usize; 3]>> {
        self.check_bit(control)?;
        self.check_bit(target)?;
        if control == target {
            return Err(RegisterError::ControlIsTarget { index: control });
        }
        let mut powers: SmallVec<[usize; 3]> = smallvec![1 << control, 1 << target];
        powers.sort_unstable();
        Ok(powers)
    }

    fn apply_controlled(
        &mut self,
        control: usize,
        target: usize,
        mtrx: &Matrix2x2,
        do_calc_norm: bool,
    ) -> Result<()> {
        let powers = self.controlled_powers(control, target)?;
        let c_power = 1usize << control;
        let t_power = 1usize << target;
        self.apply_2x2(c_power + t_power, c_power, mtrx, powers, false, do_calc_norm);
        Ok(())
    }

    fn apply_anti_controlled(
        &mut self,
        control: usize,
        target: usize,
        mtrx: &Matrix2x2,
        do_calc_norm: bool,
    ) -> Result<()> {
        let powers = self.controlled_powers(control, target)?;
        let t_power = 1usize << target;
        self.apply_2x2(0, t_power, mtrx, powers, false, do_calc_norm);
        Ok(())
    }

    fn doubly_controlled_powers(
        &self,
        control1: usize,
        control2: usize,
        target: usize,
    ) -> Result<SmallVec<[usize; 3]>> {
        self.check_bit(control1)?;
        self.check_bit(control2)?;
        self.check_bit(target)?;
        if control1 == control2 {
            return Err(RegisterError::DuplicateControl { index: control1 });
        }
        if control1 == target || control2 == target {
            return Err(RegisterError::ControlIsTarget { index: target });
        }
        let mut powers: SmallVec<[usize; 3]> =
            smallvec![1 << control1, 1 << control2, 1 << target];
        powers.sort_unstable();
        Ok(powers)
    }

    // ------------------------------------------------------------------
    // Single-bit gates
    // ------------------------------------------------------------------

    /// Pauli-X ("not")
    pub fn x(&mut self, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::PAULI_X, false)
    }

    /// Pauli-Y
    pub fn y(&mut self, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::PAULI_Y, false)
    }

    /// Pauli-Z
    pub fn z(&mut self, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::PAULI_Z, false)
    }

    /// Hadamard
    pub fn h(&mut self, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::HADAMARD, true)
    }

    /// Phase shift around |1⟩: diag(1, e^{iθ})
    pub fn r1(&mut self, radians: f64, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::r1(radians), true)
    }

    /// Dyadic-fraction phase shift: rotates by +π·numerator·2/denominator
    pub fn r1_dyad(&mut self, numerator: i64, denominator: i64, index: usize) -> Result<()> {
        self.r1(matrices::r1_dyad_angle(numerator, denominator), index)
    }

    /// X-axis rotation
    pub fn rx(&mut self, radians: f64, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::rx(radians), true)
    }

    /// Dyadic-fraction x-axis rotation: rotates by −π·numerator·2/denominator
    pub fn rx_dyad(&mut self, numerator: i64, denominator: i64, index: usize) -> Result<()> {
        self.rx(matrices::dyad_angle(numerator, denominator), index)
    }

    /// Y-axis rotation
    pub fn ry(&mut self, radians: f64, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::ry(radians), true)
    }

    /// Dyadic-fraction y-axis rotation: rotates by −π·numerator·2/denominator
    pub fn ry_dyad(&mut self, numerator: i64, denominator: i64, index: usize) -> Result<()> {
        self.ry(matrices::dyad_angle(numerator, denominator), index)
    }

    /// Z-axis rotation
    pub fn rz(&mut self, radians: f64, index: usize) -> Result<()> {
        self.apply_single(index, &matrices::rz(radians), true)
    }

    /// Dyadic-fraction z-axis rotation: rotates by −π·numerator·2/denominator
    pub fn rz_dyad(&mut self, numerator: i64, denominator: i64, index: usize) -> Result<()> {
        self.rz(matrices::dyad_angle(numerator, denominator), index)
    }

    // ------------------------------------------------------------------
    // Controlled gates
    // ------------------------------------------------------------------

    /// Controlled-not
    pub fn cnot(&mut self, control: usize, target: usize) -> Result<()> {
        self.apply_controlled(control, target, &matrices::PAULI_X, false)
    }

    /// Anti-controlled not: applies when the control reads |0⟩
    pub fn anti_cnot(&mut self, control: usize, target: usize) -> Result<()> {
        self.apply_anti_controlled(control, target, &matrices::PAULI_X, false)
    }

    /// Controlled Pauli-Y
    pub fn cy(&mut self, control: usize, target: usize) -> Result<()> {
        self.apply_controlled(control, target, &matrices::PAULI_Y, false)
    }

    /// Controlled Pauli-Z
    pub fn cz(&mut self, control: usize, target: usize) -> Result<()> {
        self.apply_controlled(control, target, &matrices::PAULI_Z, false)
    }

    /// Controlled phase shift
    pub fn cr1(&mut self, radians: f64, control: usize, target: usize) -> Result<()> {
        self.apply_controlled(control, target, &matrices::r1(radians), true)
    }

    /// Controlled dyadic phase shift: rotates by −π·numerator·2/denominator
    pub fn cr1_dyad(
        &mut self,
        numerator: i64,
        denominator: i64,
        control: usize,
        target: usize,
    ) -> Result<()> {
        self.cr1(matrices::dyad_angle(numerator, denominator), control, target)
    }

    /// Controlled x-axis rotation
    pub fn crx(&mut self, radians: f64, control: usize, target: usize) -> Result<()> {
        self.apply_controlled(control, target, &matrices::rx(radians), true)
    }

    /// Controlled dyadic x-axis rotation
    pub fn crx_dyad(
        &mut self,
        numerator: i64,
        denominator: i64,
        control: usize,
        target: usize,
    ) -> Result<()> {
        self.crx(matrices::dyad_angle(numerator, denominator), control, target)
    }

    /// Controlled y-axis rotation
    pub fn cry(&mut self, radians: f64, control: usize, target: usize) -> Result<()> {
        self.apply_controlled(control, target, &matrices::ry(radians), true)
    }

    /// Controlled dyadic y-axis rotation
    pub fn cry_dyad(
        &mut self,
        numerator: i64,
        denominator: i64,
        control: usize,
        target: usize,
    ) -> Result<()> {
        self.cry(matrices::dyad_angle(numerator, denominator), control, target)
    }

    /// Controlled z-axis rotation
    pub fn crz(&mut self, radians: f64, control: usize, target: usize) -> Result<()> {
        self.apply_controlled(control, target, &matrices::rz(radians), true)
    }

    /// Controlled dyadic z-axis rotation
    pub fn crz_dyad(
        &mut self,
        numerator: i64,
        denominator: i64,
        control: usize,
        target: usize,
    ) -> Result<()> {
        self.crz(matrices::dyad_angle(numerator, denominator), control, target)
    }

    /// Doubly-controlled not (Toffoli)
    pub fn ccnot(&mut self, control1: usize, control2: usize, target: usize) -> Result<()> {
        let powers = self.doubly_controlled_powers(control1, control2, target)?;
        let offset2 = (1usize << control1) + (1usize << control2);
        let offset1 = offset2 + (1usize << target);
        self.apply_2x2(offset1, offset2, &matrices::PAULI_X, powers, false, false);
        Ok(())
    }

    /// Anti-doubly-controlled not: applies when both controls read |0⟩
    pub fn anti_ccnot(&mut self, control1: usize, control2: usize, target: usize) -> Result<()> {
        let powers = self.doubly_controlled_powers(control1, control2, target)?;
        let t_power = 1usize << target;
        self.apply_2x2(0, t_power, &matrices::PAULI_X, powers, false, false);
        Ok(())
    }

    /// Exchange two qubits; equal indices are a no-op
    pub fn swap(&mut self, index1: usize, index2: usize) -> Result<()> {
        self.check_bit(index1)?;
        self.check_bit(index2)?;
        if index1 == index2 {
            return Ok(());
        }
        let p1 = 1usize << index1;
        let p2 = 1usize << index2;
        let mut powers: SmallVec<[usize; 3]> = smallvec![p1, p2];
        powers.sort_unstable();
        self.apply_2x2(p2, p1, &matrices::PAULI_X, powers, false, false);
        Ok(())
    }

    /// Force a qubit to a classical value: measure, flip on mismatch
    pub fn set_bit(&mut self, index: usize, value: bool) -> Result<()> {
        if self.m(index)? != value {
            self.x(index)?;
        }
        Ok(())
    }

    /// Reverse the qubit span `[first, last)` by swapping outward-in
    pub fn reverse(&mut self, mut first: usize, mut last: usize) -> Result<()> {
        if last > first {
            self.check_range(first, last - first)?;
        }
        while first + 1 < last {
            last -= 1;
            self.swap(first, last)?;
            first += 1;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Range-broadcast forms
    // ------------------------------------------------------------------

    /// Pauli-X on every qubit in `[start, start+length)`, as one permutation
    pub fn x_range(&mut self, start: usize, length: usize) -> Result<()> {
        self.check_range(start, length)?;
        if length == 0 {
            return Ok(());
        }
        let in_out_mask = ((1usize << length) - 1) << start;
        let other_mask = (self.max_q_power - 1) ^ in_out_mask;
        let mut next = StateVector::zeroed(self.qubit_count)?;
        let dst = next.shared();
        parallel::par_for_copy(
            0,
            self.max_q_power,
            self.state.amplitudes(),
            dst,
            |lcv, src, dst| {
                let flipped = (!lcv) & in_out_mask;
                unsafe { dst.store(flipped | (lcv & other_mask), src[lcv]) }
            },
        );
        self.install(next);
        Ok(())
    }

    /// Hadamard on every qubit in `[start, start+length)`
    pub fn h_range(&mut self, start: usize, length: usize) -> Result<()> {
        self.check_range(start, length)?;
        for i in 0..length {
            self.h(start + i)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegisterConfig;
    use approx::assert_relative_eq;

    fn seeded(qubit_count: usize, perm: usize) -> CoherentRegister {
        CoherentRegister::with_config(qubit_count, perm, RegisterConfig::new().with_seed(11))
            .unwrap()
    }

    #[test]
    fn test_x_flips_basis_state() {
        let mut reg = seeded(2, 0);
        reg.x(1).unwrap();
        assert_relative_eq!(reg.prob_all(2).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_x_twice_is_identity() {
        let mut reg = seeded(1, 0);
        reg.h(0).unwrap();
        let before = reg.prob_array();
        reg.x(0).unwrap();
        reg.x(0).unwrap();
        let after = reg.prob_array();
        for (b, a) in before.iter().zip(after.iter()) {
            assert_relative_eq!(b, a, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_y_and_z_preserve_magnitudes() {
        let mut reg = seeded(1, 0);
        reg.h(0).unwrap();
        reg.y(0).unwrap();
        reg.y(0).unwrap();
        reg.z(0).unwrap();
        reg.z(0).unwrap();
        assert_relative_eq!(reg.prob(0).unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_h_uniform_superposition() {
        let mut reg = seeded(1, 0);
        reg.h(0).unwrap();
        assert_relative_eq!(reg.prob(0).unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_h_twice_is_identity() {
        let mut reg = seeded(1, 1);
        reg.h(0).unwrap();
        reg.h(0).unwrap();
        assert_relative_eq!(reg.prob_all(1).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cnot_bell_state() {
        let mut reg = seeded(2, 0);
        reg.h(0).unwrap();
        reg.cnot(0, 1).unwrap();
        assert_relative_eq!(reg.prob_all(0).unwrap(), 0.5, epsilon = 1e-9);
        assert_relative_eq!(reg.prob_all(3).unwrap(), 0.5, epsilon = 1e-9);
        assert_relative_eq!(reg.prob_all(1).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(reg.prob_all(2).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cnot_twice_is_identity() {
        let mut reg = seeded(2, 0);
        reg.h(0).unwrap();
        reg.h(1).unwrap();
        let before = reg.prob_array();
        reg.cnot(0, 1).unwrap();
        reg.cnot(0, 1).unwrap();
        let after = reg.prob_array();
        for (b, a) in before.iter().zip(after.iter()) {
            assert_relative_eq!(b, a, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_anti_cnot_fires_on_zero_control() {
        let mut reg = seeded(2, 0);
        reg.anti_cnot(0, 1).unwrap();
        assert_relative_eq!(reg.prob_all(2).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_control_is_target_rejected() {
        let mut reg = seeded(2, 0);
        assert!(matches!(
            reg.cnot(1, 1),
            Err(RegisterError::ControlIsTarget { .. })
        ));
        assert!(matches!(
            reg.ccnot(0, 0, 1),
            Err(RegisterError::DuplicateControl { .. })
        ));
        assert!(matches!(
            reg.ccnot(0, 1, 1),
            Err(RegisterError::ControlIsTarget { .. })
        ));
    }

    #[test]
    fn test_ccnot_truth_table() {
        for (input, expected) in [(0b011usize, 0b111usize), (0b001, 0b001), (0b111, 0b011)] {
            let mut reg = seeded(3, input);
            reg.ccnot(0, 1, 2).unwrap();
            assert_relative_eq!(reg.prob_all(expected).unwrap(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_anti_ccnot_fires_on_double_zero() {
        let mut reg = seeded(3, 0);
        reg.anti_ccnot(0, 1, 2).unwrap();
        assert_relative_eq!(reg.prob_all(4).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ccnot_on_uniform_superposition() {
        let mut reg = seeded(3, 0);
        for q in 0..3 {
            reg.h(q).unwrap();
        }
        reg.ccnot(0, 1, 2).unwrap();
        let total: f64 = reg.prob_array().iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        // The uniform distribution is preserved; |011⟩ and |111⟩ swap
        assert_relative_eq!(reg.prob_all(0b111).unwrap(), 0.125, epsilon = 1e-9);
        assert_relative_eq!(reg.prob_all(0b011).unwrap(), 0.125, epsilon = 1e-9);
    }

    #[test]
    fn test_swap_moves_bit() {
        let mut reg = seeded(3, 0b001);
        reg.swap(0, 2).unwrap();
        assert_relative_eq!(reg.prob_all(0b100).unwrap(), 1.0, epsilon = 1e-12);
        // Equal indices: no-op
        reg.swap(1, 1).unwrap();
        assert_relative_eq!(reg.prob_all(0b100).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_r1_phases_do_not_change_probabilities() {
        let mut reg = seeded(1, 0);
        reg.h(0).unwrap();
        reg.r1(0.731, 0).unwrap();
        assert_relative_eq!(reg.prob(0).unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rx_pi_flips() {
        let mut reg = seeded(1, 0);
        reg.rx(std::f64::consts::PI, 0).unwrap();
        assert_relative_eq!(reg.prob(0).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ry_half_pi_splits() {
        let mut reg = seeded(1, 0);
        reg.ry(std::f64::consts::FRAC_PI_2, 0).unwrap();
        assert_relative_eq!(reg.prob(0).unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rx_dyad_matches_radian_form() {
        // RXDyad(1, 2) == RX(−π·1·2/2) == RX(−π)
        let mut a = seeded(1, 0);
        let mut b = seeded(1, 0);
        a.rx_dyad(1, 2, 0).unwrap();
        b.rx(-std::f64::consts::PI, 0).unwrap();
        assert_relative_eq!(a.prob(0).unwrap(), b.prob(0).unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn test_crx_only_acts_when_control_set() {
        let mut reg = seeded(2, 0);
        reg.crx(std::f64::consts::PI, 0, 1).unwrap();
        assert_relative_eq!(reg.prob(1).unwrap(), 0.0, epsilon = 1e-9);

        let mut reg = seeded(2, 1);
        reg.crx(std::f64::consts::PI, 0, 1).unwrap();
        assert_relative_eq!(reg.prob(1).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_set_bit() {
        let mut reg = seeded(2, 0);
        reg.set_bit(1, true).unwrap();
        assert_relative_eq!(reg.prob(1).unwrap(), 1.0, epsilon = 1e-12);
        reg.set_bit(1, false).unwrap();
        assert_relative_eq!(reg.prob(1).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reverse_span() {
        let mut reg = seeded(4, 0b0010);
        reg.reverse(0, 4).unwrap();
        assert_relative_eq!(reg.prob_all(0b0100).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_x_range() {
        let mut reg = seeded(4, 0b0101);
        reg.x_range(1, 2).unwrap();
        assert_relative_eq!(reg.prob_all(0b0011).unwrap(), 1.0, epsilon = 1e-12);
        // Zero-length range is a no-op
        reg.x_range(0, 0).unwrap();
        assert_relative_eq!(reg.prob_all(0b0011).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_h_range_uniform() {
        let mut reg = seeded(3, 0);
        reg.h_range(0, 3).unwrap();
        for p in reg.prob_array() {
            assert_relative_eq!(p, 0.125, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut reg = seeded(2, 0);
        assert!(reg.x(2).is_err());
        assert!(reg.x_range(1, 2).is_err());
    }
}
