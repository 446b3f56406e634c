//! Amplitude buffer with aligned memory and resize-by-move semantics

use crate::error::{Result, StateError};
use num_complex::Complex64;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Alignment for the amplitude array (64 bytes, one cache line / AVX-512 lane)
const AMP_ALIGNMENT: usize = 64;

/// Dense amplitude vector of a coherent register
///
/// Holds 2^n complex amplitudes in a 64-byte aligned heap allocation. The
/// buffer is the single source of truth for the register state; operations
/// that change the register width (cohere, decohere, dispose) allocate a
/// fresh buffer of the new size and swap it in, releasing the old one.
///
/// # Example
///
/// ```
/// use qureg_state::StateVector;
///
/// let state = StateVector::zeroed(2).unwrap();
/// assert_eq!(state.qubit_count(), 2);
/// assert_eq!(state.len(), 4);
/// ```
pub struct StateVector {
    /// Number of qubits
    qubit_count: usize,

    /// Amplitude count (2^qubit_count)
    len: usize,

    /// Pointer to aligned amplitude data
    data: NonNull<Complex64>,

    /// Memory layout for deallocation
    layout: Layout,
}

impl StateVector {
    /// Allocate an all-zero amplitude vector for `qubit_count` qubits
    ///
    /// The caller is responsible for writing at least one nonzero amplitude
    /// before treating the buffer as a register state.
    ///
    /// # Errors
    /// `CapacityExceeded` if 2^qubit_count does not fit the index type,
    /// `Allocation` if the allocator refuses the request.
    pub fn zeroed(qubit_count: usize) -> Result<Self> {
        let len = 1usize
            .checked_shl(qubit_count as u32)
            .ok_or(StateError::CapacityExceeded {
                qubit_count,
                max: usize::BITS as usize,
            })?;

        let size = len
            .checked_mul(std::mem::size_of::<Complex64>())
            .ok_or(StateError::Allocation { size: usize::MAX })?;
        let layout = Layout::from_size_align(size, AMP_ALIGNMENT)
            .map_err(|_| StateError::Allocation { size })?;

        let data = unsafe {
            let ptr = alloc_zeroed(layout) as *mut Complex64;
            if ptr.is_null() {
                return Err(StateError::Allocation { size });
            }
            NonNull::new_unchecked(ptr)
        };

        Ok(Self {
            qubit_count,
            len,
            data,
            layout,
        })
    }

    /// Allocate a buffer holding a copy of the given amplitudes
    ///
    /// # Errors
    /// `DimensionMismatch` if the slice length is not 2^qubit_count.
    pub fn from_amplitudes(qubit_count: usize, amplitudes: &[Complex64]) -> Result<Self> {
        let state = Self::zeroed(qubit_count)?;
        if amplitudes.len() != state.len {
            return Err(StateError::DimensionMismatch {
                expected: state.len,
                actual: amplitudes.len(),
            });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(amplitudes.as_ptr(), state.data.as_ptr(), state.len);
        }
        Ok(state)
    }

    /// Number of qubits represented by this buffer
    #[inline]
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Amplitude count (2^qubit_count)
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// An amplitude vector is never empty; present for clippy's sake
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Shared view of the amplitudes
    #[inline]
    pub fn amplitudes(&self) -> &[Complex64] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Mutable view of the amplitudes
    #[inline]
    pub fn amplitudes_mut(&mut self) -> &mut [Complex64] {
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    /// Raw shared-write handle for scatter kernels
    ///
    /// The returned handle aliases this buffer; see [`AmpsPtr`] for the
    /// safety contract.
    #[inline]
    pub fn shared(&mut self) -> AmpsPtr {
        AmpsPtr {
            ptr: self.data,
            len: self.len,
        }
    }

    /// Reset every amplitude to zero
    pub fn clear(&mut self) {
        unsafe {
            std::ptr::write_bytes(self.data.as_ptr(), 0, self.len);
        }
    }

    /// Replace this buffer with another, releasing the old allocation
    ///
    /// Used by the coherence operators: the new state is prepared in a
    /// sibling buffer (possibly of a different width) and swapped in once
    /// complete.
    pub fn replace(&mut self, other: StateVector) {
        *self = other;
    }
}

impl Drop for StateVector {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.data.as_ptr() as *mut u8, self.layout);
        }
    }
}

impl Clone for StateVector {
    fn clone(&self) -> Self {
        Self::from_amplitudes(self.qubit_count, self.amplitudes())
            .expect("clone of an existing buffer cannot exceed capacity")
    }
}

impl std::fmt::Debug for StateVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateVector")
            .field("qubit_count", &self.qubit_count)
            .field("len", &self.len)
            .finish()
    }
}

// Safety: StateVector owns its allocation and hands out aliasing access only
// through AmpsPtr, whose users uphold the disjoint-write contract.
unsafe impl Send for StateVector {}
unsafe impl Sync for StateVector {}

/// Shared-write handle over an amplitude buffer
///
/// Scatter kernels permute amplitudes into a destination buffer from many
/// workers at once. The permutation invariants of those kernels guarantee
/// that no two workers write the same index, which is what makes the
/// unsynchronized stores here sound. Reads and writes must stay in bounds
/// and must not race on a single index.
#[derive(Clone, Copy)]
pub struct AmpsPtr {
    ptr: NonNull<Complex64>,
    len: usize,
}

impl AmpsPtr {
    /// Buffer length in amplitudes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the amplitude at `index`
    ///
    /// # Safety
    /// `index < len()`, and no other worker may be writing `index`.
    #[inline]
    pub unsafe fn load(&self, index: usize) -> Complex64 {
        debug_assert!(index < self.len);
        *self.ptr.as_ptr().add(index)
    }

    /// Write the amplitude at `index`
    ///
    /// # Safety
    /// `index < len()`, and no other worker may be accessing `index`.
    #[inline]
    pub unsafe fn store(&self, index: usize, value: Complex64) {
        debug_assert!(index < self.len);
        *self.ptr.as_ptr().add(index) = value;
    }
}

unsafe impl Send for AmpsPtr {}
unsafe impl Sync for AmpsPtr {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let state = StateVector::zeroed(3).unwrap();
        assert_eq!(state.qubit_count(), 3);
        assert_eq!(state.len(), 8);
        for amp in state.amplitudes() {
            assert_eq!(*amp, Complex64::new(0.0, 0.0));
        }
    }

    #[test]
    fn test_alignment() {
        let state = StateVector::zeroed(5).unwrap();
        assert_eq!(state.amplitudes().as_ptr() as usize % AMP_ALIGNMENT, 0);
    }

    #[test]
    fn test_from_amplitudes() {
        let amps = vec![
            Complex64::new(0.5, 0.0),
            Complex64::new(0.5, 0.0),
            Complex64::new(0.5, 0.0),
            Complex64::new(0.5, 0.0),
        ];
        let state = StateVector::from_amplitudes(2, &amps).unwrap();
        assert_eq!(state.amplitudes(), amps.as_slice());
    }

    #[test]
    fn test_dimension_mismatch() {
        let amps = vec![Complex64::new(1.0, 0.0)];
        assert!(StateVector::from_amplitudes(2, &amps).is_err());
    }

    #[test]
    fn test_capacity_exceeded() {
        let result = StateVector::zeroed(usize::BITS as usize);
        assert!(matches!(result, Err(StateError::CapacityExceeded { .. })));
    }

    #[test]
    fn test_replace_changes_width() {
        let mut state = StateVector::zeroed(2).unwrap();
        state.replace(StateVector::zeroed(4).unwrap());
        assert_eq!(state.qubit_count(), 4);
        assert_eq!(state.len(), 16);
    }

    #[test]
    fn test_shared_roundtrip() {
        let mut state = StateVector::zeroed(1).unwrap();
        let shared = state.shared();
        unsafe {
            shared.store(1, Complex64::new(0.25, -0.5));
            assert_eq!(shared.load(1), Complex64::new(0.25, -0.5));
        }
        assert_eq!(state.amplitudes()[1], Complex64::new(0.25, -0.5));
    }
}
