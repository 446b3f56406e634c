//! Kernel dispatch service
//!
//! A register never mutates its amplitude buffer directly; every bulk
//! transformation goes through a fixed catalogue of kernels owned by a
//! process-wide service. The catalogue matches the accelerator contract:
//! `apply_2x2` transforms amplitude pairs in place, the shift and
//! arithmetic kernels scatter a permutation of the state into a fresh
//! buffer, and the carry kernels compose probability contributions from two
//! carry paths. [`CpuKernels`] is the reference implementation; the `gpu`
//! feature adds a wgpu implementation of the same catalogue.

mod cpu;
#[cfg(feature = "gpu")]
mod gpu;

pub use cpu::CpuKernels;
#[cfg(feature = "gpu")]
pub use gpu::GpuKernels;

use crate::error::{RegisterError, Result};
use num_complex::Complex64;
use qureg_state::StateVector;
use smallvec::SmallVec;
use std::sync::{Arc, OnceLock};

/// Parameters for the in-place 2×2 pair transform
///
/// The kernel visits every index whose bits at the listed powers are clear,
/// loads the pair `(state[i + offset1], state[i + offset2])`, and stores
/// `nrm · M · pair` back. `q_powers_sorted` must hold the distinct qubit
/// powers involved in the gate, in ascending order.
#[derive(Debug, Clone)]
pub struct Apply2x2Params {
    /// Row-major 2×2 matrix
    pub mtrx: [Complex64; 4],
    /// Scale folded into the transform (1/running-norm, or exactly 1)
    pub nrm: Complex64,
    pub offset1: usize,
    pub offset2: usize,
    pub q_powers_sorted: SmallVec<[usize; 3]>,
}

/// Parameters for the bit-range rotation kernels (`rol`, `ror`)
#[derive(Debug, Clone, Copy)]
pub struct ShiftParams {
    /// Mask of the rotated window
    pub reg_mask: usize,
    /// Mask of every bit outside the window
    pub other_mask: usize,
    /// 2^length
    pub length_power: usize,
    pub start: usize,
    /// Rotation distance, already reduced modulo `length` and nonzero
    pub shift: usize,
    pub length: usize,
}

/// Parameters for the two-register arithmetic kernels
/// (`add`, `sub`, `add_bcd`, `sub_bcd`)
#[derive(Debug, Clone, Copy)]
pub struct ArithParams {
    pub in_out_mask: usize,
    pub in_mask: usize,
    pub other_mask: usize,
    /// 2^length
    pub length_power: usize,
    pub in_out_start: usize,
    pub in_start: usize,
    /// length / 4 for the BCD kernels, 0 otherwise
    pub nibble_count: usize,
}

/// Parameters for the carry-threading kernels (`add_carry`, `sub_carry`)
#[derive(Debug, Clone, Copy)]
pub struct CarryParams {
    pub in_out_mask: usize,
    pub in_mask: usize,
    /// 2^carry_index
    pub carry_mask: usize,
    pub other_mask: usize,
    /// 2^length
    pub length_power: usize,
    pub in_out_start: usize,
    pub in_start: usize,
    pub carry_index: usize,
    /// Fresh global phase applied when the composed amplitudes are rebuilt
    pub phase: f64,
}

/// The fixed kernel catalogue every backend must provide
///
/// In-place kernels mutate `state` directly. Scatter kernels read `src` and
/// write a permutation of it into `dst`; the caller hands over a zeroed
/// buffer of the same dimension and swaps it in afterward. The carry
/// kernels require the zeroed buffer: they accumulate probability
/// contributions before rebuilding amplitudes in polar form.
pub trait KernelBackend: Send + Sync {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    fn apply_2x2(&self, state: &mut StateVector, params: &Apply2x2Params);

    fn rol(&self, src: &StateVector, dst: &mut StateVector, params: &ShiftParams);
    fn ror(&self, src: &StateVector, dst: &mut StateVector, params: &ShiftParams);

    fn add(&self, src: &StateVector, dst: &mut StateVector, params: &ArithParams);
    fn sub(&self, src: &StateVector, dst: &mut StateVector, params: &ArithParams);
    fn add_bcd(&self, src: &StateVector, dst: &mut StateVector, params: &ArithParams);
    fn sub_bcd(&self, src: &StateVector, dst: &mut StateVector, params: &ArithParams);

    fn add_carry(&self, src: &StateVector, dst: &mut StateVector, params: &CarryParams);
    fn sub_carry(&self, src: &StateVector, dst: &mut StateVector, params: &CarryParams);
}

/// Which backend the kernel service should own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Host-executed reference kernels
    #[default]
    Cpu,
    /// wgpu compute kernels (requires the `gpu` feature)
    Gpu,
}

/// Kernel service configuration, consumed once at initialization
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub backend: BackendKind,
    /// Adapter index for device discovery; 0 selects the default adapter
    pub adapter_index: usize,
}

/// Process-wide owner of the compiled kernel catalogue
///
/// Registers share one service; the default instance is created lazily with
/// the CPU backend. [`KernelService::init_global`] may configure the shared
/// instance once, before any register touches it; later calls are no-ops.
pub struct KernelService {
    backend: Box<dyn KernelBackend>,
}

static GLOBAL_SERVICE: OnceLock<Arc<KernelService>> = OnceLock::new();

impl KernelService {
    /// Build a standalone service from a configuration
    pub fn with_config(config: &ServiceConfig) -> Result<Self> {
        let backend: Box<dyn KernelBackend> = match config.backend {
            BackendKind::Cpu => Box::new(CpuKernels),
            #[cfg(feature = "gpu")]
            BackendKind::Gpu => Box::new(GpuKernels::new(config.adapter_index)?),
            #[cfg(not(feature = "gpu"))]
            BackendKind::Gpu => {
                return Err(RegisterError::BackendUnavailable {
                    reason: "built without the `gpu` feature".to_string(),
                })
            }
        };
        tracing::info!(backend = backend.name(), "kernel service initialized");
        Ok(Self { backend })
    }

    /// The shared process-wide service, created on first use
    pub fn global() -> Arc<KernelService> {
        Arc::clone(GLOBAL_SERVICE.get_or_init(|| {
            Arc::new(
                Self::with_config(&ServiceConfig::default())
                    .expect("default CPU kernel service cannot fail"),
            )
        }))
    }

    /// Configure the shared service before first use
    ///
    /// If the service already exists, the new platform/device selection is
    /// ignored with a warning and the existing instance is returned.
    pub fn init_global(config: &ServiceConfig) -> Result<Arc<KernelService>> {
        if let Some(existing) = GLOBAL_SERVICE.get() {
            tracing::warn!(
                backend = existing.backend.name(),
                "kernel service already initialized; ignoring new platform/device selection"
            );
            return Ok(Arc::clone(existing));
        }
        let service = Arc::new(Self::with_config(config)?);
        match GLOBAL_SERVICE.set(Arc::clone(&service)) {
            Ok(()) => Ok(service),
            // Lost the race; defer to the winner.
            Err(_) => Ok(Self::global()),
        }
    }

    /// The kernel catalogue
    #[inline]
    pub fn backend(&self) -> &dyn KernelBackend {
        self.backend.as_ref()
    }
}

impl std::fmt::Debug for KernelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelService")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_service() {
        let service = KernelService::with_config(&ServiceConfig::default()).unwrap();
        assert_eq!(service.backend().name(), "cpu");
    }

    #[test]
    fn test_global_is_shared() {
        let a = KernelService::global();
        let b = KernelService::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_gpu_unavailable_without_feature() {
        let config = ServiceConfig {
            backend: BackendKind::Gpu,
            adapter_index: 0,
        };
        assert!(matches!(
            KernelService::with_config(&config),
            Err(RegisterError::BackendUnavailable { .. })
        ));
    }
}
