//! Host-executed reference kernels
//!
//! Each kernel is a data-parallel sweep built on the `qureg-state` dispatch
//! primitives. The scatter kernels write through a shared destination
//! handle; their index maps are bijections (identity on amplitudes marked
//! invalid by the BCD kernels), so no two sweep iterations store to the
//! same destination index. The carry kernels run their two passes
//! sequentially and accumulate, then rebuild the buffer in polar form.

use super::{Apply2x2Params, ArithParams, CarryParams, KernelBackend, ShiftParams};
use num_complex::Complex64;
use qureg_state::{parallel, StateVector};

/// The reference CPU backend
pub struct CpuKernels;

/// Largest nibble count for a word-width BCD operand
const MAX_NIBBLES: usize = usize::BITS as usize / 4;

impl KernelBackend for CpuKernels {
    fn name(&self) -> &str {
        "cpu"
    }

    fn apply_2x2(&self, state: &mut StateVector, params: &Apply2x2Params) {
        let end = state.len();
        let mtrx = params.mtrx;
        let nrm = params.nrm;
        let offset1 = params.offset1;
        let offset2 = params.offset2;
        let shared = state.shared();
        parallel::par_for_mask(0, end, &params.q_powers_sorted, |i| unsafe {
            let y0 = shared.load(i + offset1);
            let y1 = shared.load(i + offset2);
            shared.store(i + offset1, nrm * (mtrx[0] * y0 + mtrx[1] * y1));
            shared.store(i + offset2, nrm * (mtrx[2] * y0 + mtrx[3] * y1));
        });
    }

    fn rol(&self, src: &StateVector, dst: &mut StateVector, p: &ShiftParams) {
        let len_mask = p.length_power - 1;
        let p = *p;
        let shared = dst.shared();
        parallel::par_for_copy(0, src.len(), src.amplitudes(), shared, move |lcv, src, dst| {
            let other_res = lcv & p.other_mask;
            let reg_int = (lcv & p.reg_mask) >> p.start;
            let out_int = (reg_int >> (p.length - p.shift)) | ((reg_int << p.shift) & len_mask);
            unsafe { dst.store((out_int << p.start) | other_res, src[lcv]) }
        });
    }

    fn ror(&self, src: &StateVector, dst: &mut StateVector, p: &ShiftParams) {
        let len_mask = p.length_power - 1;
        let p = *p;
        let shared = dst.shared();
        parallel::par_for_copy(0, src.len(), src.amplitudes(), shared, move |lcv, src, dst| {
            let other_res = lcv & p.other_mask;
            let reg_int = (lcv & p.reg_mask) >> p.start;
            let out_int = ((reg_int >> p.shift) | (reg_int << (p.length - p.shift))) & len_mask;
            unsafe { dst.store((out_int << p.start) | other_res, src[lcv]) }
        });
    }

    fn add(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        let len_mask = p.length_power - 1;
        let p = *p;
        let shared = dst.shared();
        parallel::par_for_copy(0, src.len(), src.amplitudes(), shared, move |lcv, src, dst| {
            let other_res = lcv & p.other_mask;
            let in_out_int = (lcv & p.in_out_mask) >> p.in_out_start;
            let in_res = lcv & p.in_mask;
            let in_int = in_res >> p.in_start;
            let out = ((in_out_int + in_int) & len_mask) << p.in_out_start;
            unsafe { dst.store(out | other_res | in_res, src[lcv]) }
        });
    }

    fn sub(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        let len_mask = p.length_power - 1;
        let p = *p;
        let shared = dst.shared();
        parallel::par_for_copy(0, src.len(), src.amplitudes(), shared, move |lcv, src, dst| {
            let other_res = lcv & p.other_mask;
            let in_out_int = (lcv & p.in_out_mask) >> p.in_out_start;
            let in_res = lcv & p.in_mask;
            let in_int = in_res >> p.in_start;
            let out = ((in_out_int + p.length_power - in_int) & len_mask) << p.in_out_start;
            unsafe { dst.store(out | other_res | in_res, src[lcv]) }
        });
    }

    fn add_bcd(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        let p = *p;
        let shared = dst.shared();
        parallel::par_for_copy(0, src.len(), src.amplitudes(), shared, move |lcv, src, dst| {
            let other_res = lcv & p.other_mask;
            if other_res == lcv {
                unsafe { dst.store(lcv, src[lcv]) }
                return;
            }
            let in_out_int = (lcv & p.in_out_mask) >> p.in_out_start;
            let in_res = lcv & p.in_mask;
            let in_int = in_res >> p.in_start;

            let mut nibbles = [0i8; MAX_NIBBLES];
            let mut is_valid = true;
            for j in 0..p.nibble_count {
                let test1 = (in_out_int >> (j * 4)) & 15;
                let test2 = (in_int >> (j * 4)) & 15;
                if test1 > 9 || test2 > 9 {
                    is_valid = false;
                }
                nibbles[j] = test1 as i8 + test2 as i8;
            }
            if !is_valid {
                unsafe { dst.store(lcv, src[lcv]) }
                return;
            }

            let mut out_int = 0usize;
            for j in 0..p.nibble_count {
                if nibbles[j] > 9 {
                    nibbles[j] -= 10;
                    if j + 1 < p.nibble_count {
                        nibbles[j + 1] += 1;
                    }
                }
                out_int |= (nibbles[j] as usize) << (j * 4);
            }
            let out = (out_int << p.in_out_start) | other_res | in_res;
            unsafe { dst.store(out, src[lcv]) }
        });
    }

    fn sub_bcd(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        let p = *p;
        let shared = dst.shared();
        parallel::par_for_copy(0, src.len(), src.amplitudes(), shared, move |lcv, src, dst| {
            let other_res = lcv & p.other_mask;
            if other_res == lcv {
                unsafe { dst.store(lcv, src[lcv]) }
                return;
            }
            let in_out_int = (lcv & p.in_out_mask) >> p.in_out_start;
            let in_res = lcv & p.in_mask;
            let in_int = in_res >> p.in_start;

            let mut nibbles = [0i8; MAX_NIBBLES];
            let mut is_valid = true;
            for j in 0..p.nibble_count {
                let test1 = (in_out_int >> (j * 4)) & 15;
                let test2 = (in_int >> (j * 4)) & 15;
                if test1 > 9 || test2 > 9 {
                    is_valid = false;
                }
                nibbles[j] = test1 as i8 - test2 as i8;
            }
            if !is_valid {
                unsafe { dst.store(lcv, src[lcv]) }
                return;
            }

            // Base-10 borrow propagation; a borrow out of the top nibble is
            // dropped, giving subtraction modulo 10^nibble_count.
            let mut out_int = 0usize;
            for j in 0..p.nibble_count {
                if nibbles[j] < 0 {
                    nibbles[j] += 10;
                    if j + 1 < p.nibble_count {
                        nibbles[j + 1] -= 1;
                    }
                }
                out_int |= (nibbles[j] as usize) << (j * 4);
            }
            let out = (out_int << p.in_out_start) | other_res | in_res;
            unsafe { dst.store(out, src[lcv]) }
        });
    }

    fn add_carry(&self, src: &StateVector, dst: &mut StateVector, p: &CarryParams) {
        let length_power = p.length_power;
        carry_kernel(src, dst, p, move |in_out_int, in_int, carry_in| {
            let out = in_out_int + in_int + carry_in;
            if out < length_power {
                (out, false)
            } else {
                (out - length_power, true)
            }
        });
    }

    fn sub_carry(&self, src: &StateVector, dst: &mut StateVector, p: &CarryParams) {
        // The borrow rides the carry bit: wrapping below zero sets it.
        let length_power = p.length_power;
        carry_kernel(src, dst, p, move |in_out_int, in_int, carry_in| {
            let out = in_out_int + length_power - in_int - carry_in;
            if out < length_power {
                (out, true)
            } else {
                (out - length_power, false)
            }
        });
    }
}

/// Shared body of the carry kernels
///
/// Two passes accumulate |amplitude|² per destination index (carry-in clear,
/// then carry-in set), stamping the fresh phase into the imaginary slot; a
/// final sweep rebuilds every amplitude as sqrt(re)·(cos im, sin im).
/// Within a pass the destination map is injective, so the unsynchronized
/// accumulation never races; across passes the sweeps are sequential.
fn carry_kernel<F>(src: &StateVector, dst: &mut StateVector, p: &CarryParams, out_of: F)
where
    F: Fn(usize, usize, usize) -> (usize, bool) + Sync,
{
    let half = src.len() >> 1;
    let phase = p.phase;
    let carry_low = p.carry_mask - 1;
    let shared = dst.shared();

    for carry_in in 0..2usize {
        parallel::par_for_copy(0, half, src.amplitudes(), shared, |lcv, src, dst| {
            // Expand the compressed counter around the carry bit
            let i_low = lcv & carry_low;
            let mut i = i_low + ((lcv - i_low) << 1);
            if carry_in == 1 {
                i |= p.carry_mask;
            }

            let other_res = i & p.other_mask;
            let in_out_int = (i & p.in_out_mask) >> p.in_out_start;
            let in_res = i & p.in_mask;
            let in_int = in_res >> p.in_start;

            let (out_int, carry_out) = out_of(in_out_int, in_int, carry_in);
            let mut out_res = (out_int << p.in_out_start) | other_res | in_res;
            if carry_out {
                out_res |= p.carry_mask;
            }

            let prob = src[i].norm_sqr();
            unsafe {
                let acc = dst.load(out_res);
                dst.store(out_res, Complex64::new(acc.re + prob, phase));
            }
        });
    }

    parallel::par_for(0, src.len(), |lcv| unsafe {
        let acc = shared.load(lcv);
        shared.store(lcv, acc.re.sqrt() * Complex64::new(acc.im.cos(), acc.im.sin()));
    });
}
