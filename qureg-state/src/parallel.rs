//! Data-parallel drivers over amplitude index ranges
//!
//! Every bulk operation on a register is expressed as one of four shapes:
//! a striped sweep over a half-open index range, a masked sweep that visits
//! only indices whose set bits avoid a list of qubit powers, a scatter copy
//! from a source buffer into a pre-zeroed destination, or an L2-norm
//! reduction. Work distribution is delegated to rayon; small ranges run
//! sequentially to avoid fork-join overhead.

use crate::state_vector::AmpsPtr;
use num_complex::Complex64;
use rayon::prelude::*;

/// Minimum range length before a sweep is parallelized
pub const PARALLEL_THRESHOLD: usize = 1 << 12;

/// Expand a compressed counter into a full index avoiding the given powers
///
/// `q_powers_sorted` must hold distinct powers of two in ascending order.
/// Each power splits the counter and shifts the high part up one bit,
/// producing the `i`-th index (in order) whose bits at every listed power
/// are zero.
#[inline]
pub fn expand_masked(counter: usize, q_powers_sorted: &[usize]) -> usize {
    let mut i_high = counter;
    let mut i = 0;
    for &power in q_powers_sorted {
        let i_low = i_high & (power - 1);
        i += i_low;
        i_high = (i_high - i_low) << 1;
    }
    i + i_high
}

/// Run `body` once for every index in `[begin, end)`
///
/// The body must be pure with respect to indices other than its own; no
/// ordering holds across workers, and all effects are visible on return.
pub fn par_for<F>(begin: usize, end: usize, body: F)
where
    F: Fn(usize) + Send + Sync,
{
    if end.saturating_sub(begin) < PARALLEL_THRESHOLD {
        for i in begin..end {
            body(i);
        }
    } else {
        (begin..end).into_par_iter().for_each(body);
    }
}

/// Run `body` once for every index in `[begin, end)` that avoids the masks
///
/// The range is compressed by one bit per listed power; the body receives
/// the expanded index, at which every listed bit is clear.
pub fn par_for_mask<F>(begin: usize, end: usize, q_powers_sorted: &[usize], body: F)
where
    F: Fn(usize) + Send + Sync,
{
    debug_assert!(q_powers_sorted.windows(2).all(|w| w[0] < w[1]));
    let count = (end - begin) >> q_powers_sorted.len();
    par_for(0, count, |counter| {
        body(begin + expand_masked(counter, q_powers_sorted))
    });
}

/// Scatter sweep: read `src`, write disjoint indices of `dst`
///
/// `dst` must be pre-zeroed where the permutation leaves gaps, and the body
/// must write each destination index from at most one source index (the
/// permutation invariant of the arithmetic kernels).
pub fn par_for_copy<F>(begin: usize, end: usize, src: &[Complex64], dst: AmpsPtr, body: F)
where
    F: Fn(usize, &[Complex64], AmpsPtr) + Send + Sync,
{
    par_for(begin, end, |i| body(i, src, dst));
}

/// Parallel L2 norm of an amplitude slice
pub fn par_norm(amplitudes: &[Complex64]) -> f64 {
    let sqr_norm: f64 = if amplitudes.len() < PARALLEL_THRESHOLD {
        amplitudes.iter().map(|a| a.norm_sqr()).sum()
    } else {
        amplitudes.par_iter().map(|a| a.norm_sqr()).sum()
    };
    sqr_norm.sqrt()
}

/// Reverse the strided elements `window[first], window[first + stride], ...`
/// up to (excluding) `window[last]`
pub fn reverse_strided(window: &mut [Complex64], mut first: usize, mut last: usize, stride: usize) {
    while first + stride < last {
        last -= stride;
        window.swap(first, last);
        first += stride;
    }
}

/// Left-rotate the strided elements of `window[first..last]` so that the
/// element at `middle` lands at `first`
///
/// Classic three-reversal rotation over a stride-spaced view; used by the
/// register-body driver to add or subtract classical constants.
pub fn rotate_strided(
    window: &mut [Complex64],
    first: usize,
    middle: usize,
    last: usize,
    stride: usize,
) {
    reverse_strided(window, first, middle, stride);
    reverse_strided(window, middle, last, stride);
    reverse_strided(window, first, last, stride);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_vector::StateVector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn amps(values: &[f64]) -> Vec<Complex64> {
        values.iter().map(|&v| Complex64::new(v, 0.0)).collect()
    }

    fn reals(values: &[Complex64]) -> Vec<f64> {
        values.iter().map(|a| a.re).collect()
    }

    #[test]
    fn test_expand_masked_single_power() {
        // Skipping bit 1 (power 2): counters map to 0, 1, 4, 5, 8, ...
        let powers = [2usize];
        let expanded: Vec<usize> = (0..4).map(|c| expand_masked(c, &powers)).collect();
        assert_eq!(expanded, vec![0, 1, 4, 5]);
    }

    #[test]
    fn test_expand_masked_two_powers() {
        // Skipping bits 0 and 2: indices with both clear, in order
        let powers = [1usize, 4];
        let expanded: Vec<usize> = (0..4).map(|c| expand_masked(c, &powers)).collect();
        assert_eq!(expanded, vec![0, 2, 8, 10]);
    }

    #[test]
    fn test_par_for_visits_each_once() {
        let count = AtomicUsize::new(0);
        par_for(3, 100, |_| {
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(count.load(Ordering::Relaxed), 97);
    }

    #[test]
    fn test_par_for_mask_avoids_bits() {
        let powers = [2usize, 8];
        let hits = std::sync::Mutex::new(Vec::new());
        par_for_mask(0, 16, &powers, |i| {
            hits.lock().unwrap().push(i);
        });
        let mut hits = hits.into_inner().unwrap();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1, 4, 5]);
        for i in hits {
            assert_eq!(i & (2 | 8), 0);
        }
    }

    #[test]
    fn test_par_for_copy_scatter() {
        let src = amps(&[1.0, 2.0, 3.0, 4.0]);
        let mut dst = StateVector::zeroed(2).unwrap();
        let shared = dst.shared();
        // Reverse permutation
        par_for_copy(0, 4, &src, shared, |i, src, dst| unsafe {
            dst.store(3 - i, src[i]);
        });
        assert_eq!(reals(dst.amplitudes()), vec![4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_par_norm() {
        let v = amps(&[0.6, 0.8]);
        assert!((par_norm(&v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reverse_strided_unit_stride() {
        let mut v = amps(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        reverse_strided(&mut v, 0, 5, 1);
        assert_eq!(reals(&v), vec![4.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_rotate_strided_unit_stride() {
        let mut v = amps(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        rotate_strided(&mut v, 0, 2, 5, 1);
        assert_eq!(reals(&v), vec![2.0, 3.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rotate_strided_stride_two() {
        // Rotate the even-position elements only; odd positions untouched
        let mut v = amps(&[0.0, 10.0, 1.0, 11.0, 2.0, 12.0, 3.0, 13.0]);
        rotate_strided(&mut v, 0, 2, 8, 2);
        assert_eq!(reals(&v), vec![1.0, 10.0, 2.0, 11.0, 3.0, 12.0, 0.0, 13.0]);
    }
}
