//! Coherence management: tensor composition, partial trace, disposal
//!
//! These operators resize the register. They are pseudo-quantum: composing
//! keeps only the magnitude product of the two inputs under one fresh
//! global phase, and decohering keeps only the marginal magnitude
//! distributions of the separated halves. Phase correlations across the cut
//! are destroyed by construction.

use super::CoherentRegister;
use crate::error::{RegisterError, Result};
use num_complex::Complex64;
use qureg_state::{parallel, StateVector};

impl CoherentRegister {
    /// Append a copy of `other` after this register's top qubit
    ///
    /// The combined state is the magnitude tensor product of the two
    /// normalized inputs under a single fresh global phase.
    pub fn cohere(&mut self, other: &mut CoherentRegister) -> Result<()> {
        self.normalize_if_needed();
        other.normalize_if_needed();

        let n_qubit_count = self.qubit_count + other.qubit_count;
        let mut next = StateVector::zeroed(n_qubit_count)?;

        let start_mask = self.max_q_power - 1;
        let end_mask = (next.len() - 1) ^ start_mask;
        let low_bits = self.qubit_count;
        let phase = self.random_phase();

        {
            let dst = next.shared();
            let self_amps = self.state.amplitudes();
            let other_amps = other.state.amplitudes();
            parallel::par_for(0, dst.len(), |i| {
                let low = self_amps[i & start_mask].norm_sqr();
                let high = other_amps[(i & end_mask) >> low_bits].norm_sqr();
                unsafe { dst.store(i, phase * (low * high).sqrt()) }
            });
        }

        self.install(next);
        self.update_running_norm();
        Ok(())
    }

    /// Split the qubit window `[start, start+length)` out into `destination`
    ///
    /// This register shrinks by `length` qubits and keeps the marginal
    /// magnitudes of the remainder; `destination` (which must hold exactly
    /// `length` qubits) is overwritten with the marginal magnitudes of the
    /// removed window. Each side takes its own fresh global phase.
    pub fn decohere(
        &mut self,
        start: usize,
        length: usize,
        destination: &mut CoherentRegister,
    ) -> Result<()> {
        self.check_range(start, length)?;
        if destination.qubit_count != length {
            return Err(RegisterError::DestinationMismatch {
                expected: length,
                actual: destination.qubit_count,
            });
        }
        if length == 0 {
            return Ok(());
        }
        if length == self.qubit_count {
            return Err(RegisterError::InvalidRange {
                start,
                length,
                qubit_count: self.qubit_count,
            });
        }
        self.normalize_if_needed();

        let (part_prob, remainder_prob) = self.marginal_probabilities(start, length);

        let phase = destination.random_phase();
        write_marginal(destination.state.amplitudes_mut(), &part_prob, phase);
        destination.update_running_norm();

        self.truncate_to_remainder(length, &remainder_prob)
    }

    /// Discard the qubit window `[start, start+length)`
    ///
    /// Same partial trace as [`Self::decohere`], with the removed window's
    /// marginal thrown away.
    pub fn dispose(&mut self, start: usize, length: usize) -> Result<()> {
        self.check_range(start, length)?;
        if length == 0 {
            return Ok(());
        }
        if length == self.qubit_count {
            return Err(RegisterError::InvalidRange {
                start,
                length,
                qubit_count: self.qubit_count,
            });
        }
        self.normalize_if_needed();

        let (_, remainder_prob) = self.marginal_probabilities(start, length);
        self.truncate_to_remainder(length, &remainder_prob)
    }

    /// Marginal |amplitude|² distributions of the window and its complement
    fn marginal_probabilities(&self, start: usize, length: usize) -> (Vec<f64>, Vec<f64>) {
        let mask = ((1usize << length) - 1) << start;
        let start_mask = (1usize << start) - 1;
        let end_mask = (self.max_q_power - 1) ^ mask ^ start_mask;

        let mut part_prob = vec![0.0f64; 1 << length];
        let mut remainder_prob = vec![0.0f64; 1 << (self.qubit_count - length)];
        for (i, amp) in self.state.amplitudes().iter().enumerate() {
            let prob = amp.norm_sqr();
            part_prob[(i & mask) >> start] += prob;
            remainder_prob[(i & start_mask) | ((i & end_mask) >> length)] += prob;
        }
        (part_prob, remainder_prob)
    }

    fn truncate_to_remainder(&mut self, length: usize, remainder_prob: &[f64]) -> Result<()> {
        let mut next = StateVector::zeroed(self.qubit_count - length)?;
        let phase = self.random_phase();
        write_marginal(next.amplitudes_mut(), remainder_prob, phase);
        self.install(next);
        self.update_running_norm();
        Ok(())
    }
}

/// Rebuild amplitudes from a marginal probability distribution
///
/// Each amplitude becomes √(p/total)·e^{iθ}; a fully-zero distribution
/// collapses to the phase at index 0.
fn write_marginal(amps: &mut [Complex64], probs: &[f64], phase: Complex64) {
    let total: f64 = probs.iter().sum();
    if total == 0.0 {
        amps.fill(Complex64::new(0.0, 0.0));
        amps[0] = phase;
        return;
    }
    for (amp, prob) in amps.iter_mut().zip(probs.iter()) {
        *amp = phase * (prob / total).sqrt();
    }
}
