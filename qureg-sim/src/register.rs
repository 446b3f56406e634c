//! The coherent register: an n-qubit pure state with a pseudo-quantum API
//!
//! A register owns its amplitude buffer exclusively and mutates it only
//! through the kernel service. Beyond the physical gate set it exposes
//! operations no hardware could: exact probability reads, state cloning,
//! and classically-computed arithmetic over superposed integers.
//!
//! Unobservable global phases are treated as free and actively randomized:
//! every state-resetting write multiplies the assigned amplitudes by a
//! fresh e^{iθ}.

mod arithmetic;
mod coherence;
mod gates;
mod logic;

use crate::backend::KernelService;
use crate::config::RegisterConfig;
use crate::error::{RegisterError, Result};
use num_complex::Complex64;
use qureg_state::{parallel, StateVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::f64::consts::TAU;
use std::sync::Arc;

/// An n-qubit coherent register over a dense amplitude vector
///
/// Qubit `k` carries binary weight 2^k in amplitude indices (LSB first).
/// The cached L2 norm tracks drift from unitary rounding; observable reads
/// renormalize first, so probabilities always sum to 1 within tolerance.
///
/// # Example
///
/// ```
/// use qureg_sim::CoherentRegister;
///
/// // Bell pair magnitudes
/// let mut reg = CoherentRegister::new(2).unwrap();
/// reg.h(0).unwrap();
/// reg.cnot(0, 1).unwrap();
/// assert!((reg.prob_all(0).unwrap() - 0.5).abs() < 1e-9);
/// assert!((reg.prob_all(3).unwrap() - 0.5).abs() < 1e-9);
/// ```
pub struct CoherentRegister {
    qubit_count: usize,
    max_q_power: usize,
    state: StateVector,
    running_norm: f64,
    rng: StdRng,
    norm_epsilon: f64,
    service: Arc<KernelService>,
}

impl CoherentRegister {
    /// Create a register of `qubit_count` qubits, all in |0⟩
    pub fn new(qubit_count: usize) -> Result<Self> {
        Self::with_config(qubit_count, 0, RegisterConfig::default())
    }

    /// Create a register in the basis state `initial_permutation`
    pub fn new_with_permutation(qubit_count: usize, initial_permutation: usize) -> Result<Self> {
        Self::with_config(qubit_count, initial_permutation, RegisterConfig::default())
    }

    /// Create a register with explicit configuration, using the shared
    /// kernel service
    pub fn with_config(
        qubit_count: usize,
        initial_permutation: usize,
        config: RegisterConfig,
    ) -> Result<Self> {
        Self::with_service(
            qubit_count,
            initial_permutation,
            config,
            KernelService::global(),
        )
    }

    /// Create a register bound to an explicit kernel service
    pub fn with_service(
        qubit_count: usize,
        initial_permutation: usize,
        config: RegisterConfig,
        service: Arc<KernelService>,
    ) -> Result<Self> {
        let max = usize::BITS as usize - 1;
        if qubit_count == 0 || qubit_count > max {
            return Err(RegisterError::InvalidQubitCount { qubit_count, max });
        }
        let max_q_power = 1usize << qubit_count;
        if initial_permutation >= max_q_power {
            return Err(RegisterError::InvalidPermutation {
                permutation: initial_permutation,
                qubit_count,
            });
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut state = StateVector::zeroed(qubit_count)?;
        let angle = TAU * rng.gen::<f64>();
        state.amplitudes_mut()[initial_permutation] = Complex64::from_polar(1.0, angle);

        Ok(Self {
            qubit_count,
            max_q_power,
            state,
            running_norm: 1.0,
            rng,
            norm_epsilon: config.norm_epsilon,
            service,
        })
    }

    /// Deep-copy this register
    ///
    /// Amplitudes, width, and cached norm are copied; the random source is
    /// reseeded so the clone draws an independent stream.
    pub fn clone_state(&self) -> Self {
        Self {
            qubit_count: self.qubit_count,
            max_q_power: self.max_q_power,
            state: self.state.clone(),
            running_norm: self.running_norm,
            rng: StdRng::from_entropy(),
            norm_epsilon: self.norm_epsilon,
            service: Arc::clone(&self.service),
        }
    }

    /// Number of qubits in the register
    #[inline]
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Amplitude count (2^qubit_count)
    #[inline]
    pub fn max_q_power(&self) -> usize {
        self.max_q_power
    }

    /// The cached L2 norm of the amplitude vector
    #[inline]
    pub fn running_norm(&self) -> f64 {
        self.running_norm
    }

    /// Raw view of the amplitudes, without renormalization
    #[inline]
    pub fn amplitudes(&self) -> &[Complex64] {
        self.state.amplitudes()
    }

    /// Normalized copy of the amplitude vector
    pub fn clone_raw_state(&mut self) -> Vec<Complex64> {
        self.normalize_if_needed();
        self.state.amplitudes().to_vec()
    }

    /// Re-initialize in place to the basis state `permutation`
    pub fn set_permutation(&mut self, permutation: usize) -> Result<()> {
        if permutation >= self.max_q_power {
            return Err(RegisterError::InvalidPermutation {
                permutation,
                qubit_count: self.qubit_count,
            });
        }
        let phase = self.random_phase();
        self.state.clear();
        self.state.amplitudes_mut()[permutation] = phase;
        self.running_norm = 1.0;
        Ok(())
    }

    /// Overwrite the amplitude vector with an arbitrary pure state
    pub fn set_quantum_state(&mut self, amplitudes: &[Complex64]) -> Result<()> {
        if amplitudes.len() != self.max_q_power {
            return Err(RegisterError::State(
                qureg_state::StateError::DimensionMismatch {
                    expected: self.max_q_power,
                    actual: amplitudes.len(),
                },
            ));
        }
        self.state.amplitudes_mut().copy_from_slice(amplitudes);
        self.update_running_norm();
        Ok(())
    }

    /// Draw a uniform sample from [0, 1)
    pub fn rand(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    // ------------------------------------------------------------------
    // Probes and measurement
    // ------------------------------------------------------------------

    /// Probability that qubit `index` reads |1⟩
    pub fn prob(&mut self, index: usize) -> Result<f64> {
        self.check_bit(index)?;
        self.normalize_if_needed();
        let q_power = 1usize << index;
        Ok(self.masked_prob(q_power, q_power))
    }

    /// Probability of the full register being in basis state `permutation`
    pub fn prob_all(&mut self, permutation: usize) -> Result<f64> {
        if permutation >= self.max_q_power {
            return Err(RegisterError::InvalidPermutation {
                permutation,
                qubit_count: self.qubit_count,
            });
        }
        self.normalize_if_needed();
        Ok(self.state.amplitudes()[permutation].norm_sqr())
    }

    /// Probabilities of every basis state
    pub fn prob_array(&mut self) -> Vec<f64> {
        self.normalize_if_needed();
        self.state
            .amplitudes()
            .iter()
            .map(|a| a.norm_sqr())
            .collect()
    }

    /// Projective measurement of a single qubit
    ///
    /// Collapses the state: amplitudes of the losing outcome are zeroed and
    /// the survivors are scaled by e^{iθ}/√p with a fresh random phase.
    pub fn m(&mut self, index: usize) -> Result<bool> {
        let one_chance = self.prob(index)?;
        let sample = self.rand();
        let result = sample < one_chance;

        let nrmlzr = if result {
            one_chance.sqrt()
        } else {
            (1.0 - one_chance).sqrt()
        };
        let scale = self.random_phase() / nrmlzr;

        let q_power = 1usize << index;
        let keep = if result { q_power } else { 0 };
        apply_collapse(self.state.amplitudes_mut(), |i, amp| {
            if i & q_power == keep {
                *amp *= scale;
            } else {
                *amp = Complex64::new(0.0, 0.0);
            }
        });
        self.update_running_norm();
        Ok(result)
    }

    /// Projective measurement of the whole register against one basis state
    ///
    /// Succeeds with probability |⟨p|ψ⟩|²; on success the register collapses
    /// to |p⟩, on failure the |p⟩ component is removed and the remainder
    /// rescaled.
    pub fn m_all(&mut self, permutation: usize) -> Result<bool> {
        let one_chance = self.prob_all(permutation)?;
        let sample = self.rand();
        let result = sample < one_chance;
        let phase = self.random_phase();

        if result {
            self.state.clear();
            self.state.amplitudes_mut()[permutation] = phase;
            self.running_norm = 1.0;
        } else {
            let scale = phase / (1.0 - one_chance).sqrt();
            apply_collapse(self.state.amplitudes_mut(), |i, amp| {
                if i == permutation {
                    *amp = Complex64::new(0.0, 0.0);
                } else {
                    *amp *= scale;
                }
            });
            self.update_running_norm();
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    pub(crate) fn random_phase(&mut self) -> Complex64 {
        Complex64::from_polar(1.0, TAU * self.rng.gen::<f64>())
    }

    /// Sum of |amplitude|² over indices with `(i & mask) == value`
    fn masked_prob(&self, mask: usize, value: usize) -> f64 {
        let amps = self.state.amplitudes();
        if amps.len() < parallel::PARALLEL_THRESHOLD {
            amps.iter()
                .enumerate()
                .filter(|(i, _)| i & mask == value)
                .map(|(_, a)| a.norm_sqr())
                .sum()
        } else {
            amps.par_iter()
                .enumerate()
                .filter(|(i, _)| i & mask == value)
                .map(|(_, a)| a.norm_sqr())
                .sum()
        }
    }

    pub(crate) fn update_running_norm(&mut self) {
        self.running_norm = parallel::par_norm(self.state.amplitudes());
    }

    /// Renormalize if the cached norm has drifted past tolerance
    pub(crate) fn normalize_if_needed(&mut self) {
        if (self.running_norm - 1.0).abs() > self.norm_epsilon {
            tracing::debug!(
                norm = self.running_norm,
                "renormalizing before observable read"
            );
            let inv = 1.0 / self.running_norm;
            apply_collapse(self.state.amplitudes_mut(), |_, amp| *amp *= inv);
            self.running_norm = 1.0;
        }
    }

    pub(crate) fn check_bit(&self, index: usize) -> Result<()> {
        if index >= self.qubit_count {
            return Err(RegisterError::InvalidQubitIndex {
                index,
                qubit_count: self.qubit_count,
            });
        }
        Ok(())
    }

    pub(crate) fn check_range(&self, start: usize, length: usize) -> Result<()> {
        if start > self.qubit_count || length > self.qubit_count - start {
            return Err(RegisterError::InvalidRange {
                start,
                length,
                qubit_count: self.qubit_count,
            });
        }
        Ok(())
    }

    /// Swap a freshly built sibling buffer in as the active state
    pub(crate) fn install(&mut self, next: StateVector) {
        self.qubit_count = next.qubit_count();
        self.max_q_power = next.len();
        self.state.replace(next);
    }
}

impl std::fmt::Debug for CoherentRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoherentRegister")
            .field("qubit_count", &self.qubit_count)
            .field("running_norm", &self.running_norm)
            .finish()
    }
}

/// Elementwise in-place sweep over the amplitudes
fn apply_collapse<F>(amps: &mut [Complex64], body: F)
where
    F: Fn(usize, &mut Complex64) + Sync + Send,
{
    if amps.len() < parallel::PARALLEL_THRESHOLD {
        for (i, amp) in amps.iter_mut().enumerate() {
            body(i, amp);
        }
    } else {
        amps.par_iter_mut()
            .enumerate()
            .for_each(|(i, amp)| body(i, amp));
    }
}
