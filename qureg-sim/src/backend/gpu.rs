//! wgpu compute implementation of the kernel catalogue (feature `gpu`)
//!
//! The same nine kernels as the CPU backend, compiled once as WGSL compute
//! pipelines. WGSL carries no f64, so device-side arithmetic runs in f32;
//! amplitudes are marshalled f64↔f32 at the buffer boundary. The CPU
//! backend remains the precision-bearing reference.
//!
//! The carry kernels become three sequential dispatches (no-carry pass,
//! carry pass, polar rewrite); dispatch boundaries provide the global
//! memory barrier the accumulation needs.

use super::{Apply2x2Params, ArithParams, CarryParams, KernelBackend, ShiftParams};
use crate::error::{RegisterError, Result};
use num_complex::Complex64;
use qureg_state::StateVector;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 64;

const KERNEL_NAMES: [&str; 10] = [
    "apply2x2",
    "rol",
    "ror",
    "add_k",
    "sub_k",
    "addbcd",
    "subbcd",
    "addc_pass",
    "subc_pass",
    "carry_finish",
];

const SHADER_SOURCE: &str = r#"
@group(0) @binding(0) var<storage, read_write> state_vec: array<vec2<f32>>;
@group(0) @binding(1) var<storage, read> params_f: array<vec2<f32>>;
@group(0) @binding(2) var<storage, read> params_u: array<u32>;
@group(0) @binding(3) var<storage, read_write> n_state_vec: array<vec2<f32>>;

fn zmul(lhs: vec2<f32>, rhs: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(lhs.x * rhs.x - lhs.y * rhs.y, lhs.x * rhs.y + lhs.y * rhs.x);
}

// params_u: [bit_count, max_i, offset1, offset2, q_powers_sorted...]
// params_f: [m00, m01, m10, m11, nrm]
@compute @workgroup_size(64)
fn apply2x2(@builtin(global_invocation_id) gid: vec3<u32>) {
    let bit_count = params_u[0u];
    let max_i = params_u[1u];
    if (gid.x >= max_i) { return; }

    var i_high = gid.x;
    var i = 0u;
    for (var p = 0u; p < bit_count; p = p + 1u) {
        let i_low = i_high % params_u[4u + p];
        i = i + i_low;
        i_high = (i_high - i_low) << 1u;
    }
    i = i + i_high;

    let offset1 = params_u[2u];
    let offset2 = params_u[3u];
    let nrm = params_f[4u];
    let y0 = state_vec[i + offset1];
    let y1 = state_vec[i + offset2];
    state_vec[i + offset1] = zmul(nrm, zmul(params_f[0u], y0) + zmul(params_f[1u], y1));
    state_vec[i + offset2] = zmul(nrm, zmul(params_f[2u], y0) + zmul(params_f[3u], y1));
}

// params_u: [max_i, reg_mask, other_mask, length_power, start, shift, length]
@compute @workgroup_size(64)
fn rol(@builtin(global_invocation_id) gid: vec3<u32>) {
    let lcv = gid.x;
    if (lcv >= params_u[0u]) { return; }
    let len_mask = params_u[3u] - 1u;
    let start = params_u[4u];
    let shift = params_u[5u];
    let length = params_u[6u];
    let other_res = lcv & params_u[2u];
    let reg_int = (lcv & params_u[1u]) >> start;
    let out_int = (reg_int >> (length - shift)) | ((reg_int << shift) & len_mask);
    n_state_vec[(out_int << start) | other_res] = state_vec[lcv];
}

@compute @workgroup_size(64)
fn ror(@builtin(global_invocation_id) gid: vec3<u32>) {
    let lcv = gid.x;
    if (lcv >= params_u[0u]) { return; }
    let len_mask = params_u[3u] - 1u;
    let start = params_u[4u];
    let shift = params_u[5u];
    let length = params_u[6u];
    let other_res = lcv & params_u[2u];
    let reg_int = (lcv & params_u[1u]) >> start;
    let out_int = ((reg_int >> shift) | (reg_int << (length - shift))) & len_mask;
    n_state_vec[(out_int << start) | other_res] = state_vec[lcv];
}

// params_u: [max_i, in_out_mask, in_mask, other_mask, length_power,
//            in_out_start, in_start, nibble_count]
@compute @workgroup_size(64)
fn add_k(@builtin(global_invocation_id) gid: vec3<u32>) {
    let lcv = gid.x;
    if (lcv >= params_u[0u]) { return; }
    let len_mask = params_u[4u] - 1u;
    let other_res = lcv & params_u[3u];
    let in_out_int = (lcv & params_u[1u]) >> params_u[5u];
    let in_res = lcv & params_u[2u];
    let in_int = in_res >> params_u[6u];
    let out = ((in_out_int + in_int) & len_mask) << params_u[5u];
    n_state_vec[out | other_res | in_res] = state_vec[lcv];
}

@compute @workgroup_size(64)
fn sub_k(@builtin(global_invocation_id) gid: vec3<u32>) {
    let lcv = gid.x;
    if (lcv >= params_u[0u]) { return; }
    let length_power = params_u[4u];
    let len_mask = length_power - 1u;
    let other_res = lcv & params_u[3u];
    let in_out_int = (lcv & params_u[1u]) >> params_u[5u];
    let in_res = lcv & params_u[2u];
    let in_int = in_res >> params_u[6u];
    let out = ((in_out_int + length_power - in_int) & len_mask) << params_u[5u];
    n_state_vec[out | other_res | in_res] = state_vec[lcv];
}

fn bcd_kernel(lcv: u32, subtract: bool) {
    let other_res = lcv & params_u[3u];
    if (other_res == lcv) {
        n_state_vec[lcv] = state_vec[lcv];
        return;
    }
    let in_out_int = (lcv & params_u[1u]) >> params_u[5u];
    let in_res = lcv & params_u[2u];
    let in_int = in_res >> params_u[6u];
    let nibble_count = params_u[7u];

    var nibbles: array<i32, 8>;
    var is_valid = true;
    for (var j = 0u; j < nibble_count; j = j + 1u) {
        let test1 = i32((in_out_int >> (j * 4u)) & 15u);
        let test2 = i32((in_int >> (j * 4u)) & 15u);
        if (test1 > 9 || test2 > 9) { is_valid = false; }
        if (subtract) {
            nibbles[j] = test1 - test2;
        } else {
            nibbles[j] = test1 + test2;
        }
    }
    if (!is_valid) {
        n_state_vec[lcv] = state_vec[lcv];
        return;
    }

    var out_int = 0u;
    for (var j = 0u; j < nibble_count; j = j + 1u) {
        if (nibbles[j] > 9) {
            nibbles[j] = nibbles[j] - 10;
            if (j + 1u < nibble_count) { nibbles[j + 1u] = nibbles[j + 1u] + 1; }
        }
        if (nibbles[j] < 0) {
            nibbles[j] = nibbles[j] + 10;
            if (j + 1u < nibble_count) { nibbles[j + 1u] = nibbles[j + 1u] - 1; }
        }
        out_int = out_int | (u32(nibbles[j]) << (j * 4u));
    }
    n_state_vec[(out_int << params_u[5u]) | other_res | in_res] = state_vec[lcv];
}

@compute @workgroup_size(64)
fn addbcd(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params_u[0u]) { return; }
    bcd_kernel(gid.x, false);
}

@compute @workgroup_size(64)
fn subbcd(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params_u[0u]) { return; }
    bcd_kernel(gid.x, true);
}

// params_u: [half, in_out_mask, in_mask, carry_mask, other_mask,
//            length_power, in_out_start, in_start, carry_in, subtract]
// params_f[0].x carries the fresh phase.
fn carry_pass(lcv: u32) {
    let carry_mask = params_u[3u];
    let carry_in = params_u[8u];
    let subtract = params_u[9u] != 0u;

    let i_low = lcv & (carry_mask - 1u);
    var i = i_low + ((lcv - i_low) << 1u);
    if (carry_in == 1u) { i = i | carry_mask; }

    let other_res = i & params_u[4u];
    let in_out_int = (i & params_u[1u]) >> params_u[6u];
    let in_res = i & params_u[2u];
    let in_int = in_res >> params_u[7u];
    let length_power = params_u[5u];

    var out_int: u32;
    var carry_out: bool;
    if (subtract) {
        out_int = in_out_int + length_power - in_int - carry_in;
        carry_out = out_int < length_power;
        if (!carry_out) { out_int = out_int - length_power; }
    } else {
        out_int = in_out_int + in_int + carry_in;
        carry_out = out_int >= length_power;
        if (carry_out) { out_int = out_int - length_power; }
    }

    var out_res = (out_int << params_u[6u]) | other_res | in_res;
    if (carry_out) { out_res = out_res | carry_mask; }

    let amp = state_vec[i];
    let prob = amp.x * amp.x + amp.y * amp.y;
    n_state_vec[out_res] = vec2<f32>(n_state_vec[out_res].x + prob, params_f[0u].x);
}

@compute @workgroup_size(64)
fn addc_pass(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params_u[0u]) { return; }
    carry_pass(gid.x);
}

@compute @workgroup_size(64)
fn subc_pass(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params_u[0u]) { return; }
    carry_pass(gid.x);
}

@compute @workgroup_size(64)
fn carry_finish(@builtin(global_invocation_id) gid: vec3<u32>) {
    let lcv = gid.x;
    if (lcv >= arrayLength(&n_state_vec)) { return; }
    let acc = n_state_vec[lcv];
    n_state_vec[lcv] = sqrt(acc.x) * vec2<f32>(cos(acc.y), sin(acc.y));
}
"#;

/// The wgpu compute backend
pub struct GpuKernels {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<&'static str, wgpu::ComputePipeline>,
}

impl GpuKernels {
    /// Discover an adapter and compile the kernel catalogue
    pub fn new(adapter_index: usize) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let adapter =
            adapters
                .into_iter()
                .nth(adapter_index)
                .ok_or_else(|| RegisterError::BackendUnavailable {
                    reason: format!("no adapter at index {adapter_index}"),
                })?;
        tracing::info!(adapter = %adapter.get_info().name, "using adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("qureg"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| RegisterError::BackendUnavailable {
            reason: e.to_string(),
        })?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("qureg-kernels"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("qureg-bind"),
            entries: &[
                storage(0, false),
                storage(1, true),
                storage(2, true),
                storage(3, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("qureg-pipeline"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for name in KERNEL_NAMES {
            pipelines.insert(
                name,
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(name),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point: name,
                }),
            );
        }

        Ok(Self {
            device,
            queue,
            bind_layout,
            pipelines,
        })
    }

    fn upload_state(&self, amps: &[Complex64], writable: bool) -> wgpu::Buffer {
        let data: Vec<[f32; 2]> = amps.iter().map(|a| [a.re as f32, a.im as f32]).collect();
        let mut usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC;
        if writable {
            usage |= wgpu::BufferUsages::COPY_DST;
        }
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("state"),
                contents: bytemuck::cast_slice(&data),
                usage,
            })
    }

    fn upload_params(&self, params_f: &[[f32; 2]], params_u: &[u32]) -> (wgpu::Buffer, wgpu::Buffer) {
        let f_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("params-f"),
                contents: bytemuck::cast_slice(params_f),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let u_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("params-u"),
                contents: bytemuck::cast_slice(params_u),
                usage: wgpu::BufferUsages::STORAGE,
            });
        (f_buf, u_buf)
    }

    /// Dispatch the named passes and read `readback` into `target`
    fn run(
        &self,
        passes: &[(&'static str, u32)],
        state: &wgpu::Buffer,
        params_f: &wgpu::Buffer,
        params_u: &wgpu::Buffer,
        n_state: &wgpu::Buffer,
        readback: &wgpu::Buffer,
        target: &mut [Complex64],
    ) {
        let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("qureg-bind"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: state.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_f.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_u.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: n_state.as_entire_binding(),
                },
            ],
        });

        let byte_len = (target.len() * std::mem::size_of::<[f32; 2]>()) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("qureg-dispatch"),
            });
        for (name, items) in passes {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(name),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.pipelines[name]);
            cpass.set_bind_group(0, &bind, &[]);
            cpass.dispatch_workgroups(items.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(readback, 0, &staging, 0, byte_len);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .expect("map_async callback dropped")
            .expect("buffer map failed");

        {
            let view = slice.get_mapped_range();
            let pairs: &[[f32; 2]] = bytemuck::cast_slice(&view);
            for (amp, pair) in target.iter_mut().zip(pairs.iter()) {
                *amp = Complex64::new(pair[0] as f64, pair[1] as f64);
            }
        }
        staging.unmap();
    }

    fn run_scatter(
        &self,
        name: &'static str,
        src: &StateVector,
        dst: &mut StateVector,
        params_f: &[[f32; 2]],
        params_u: &[u32],
    ) {
        let state = self.upload_state(src.amplitudes(), false);
        let n_state = self.upload_state(dst.amplitudes(), true);
        let (f_buf, u_buf) = self.upload_params(params_f, params_u);
        let items = src.len() as u32;
        self.run(
            &[(name, items)],
            &state,
            &f_buf,
            &u_buf,
            &n_state,
            &n_state,
            dst.amplitudes_mut(),
        );
    }

    fn carry(&self, name: &'static str, src: &StateVector, dst: &mut StateVector, p: &CarryParams, subtract: bool) {
        let half = (src.len() >> 1) as u32;
        let all = src.len() as u32;
        let base = [
            half,
            p.in_out_mask as u32,
            p.in_mask as u32,
            p.carry_mask as u32,
            p.other_mask as u32,
            p.length_power as u32,
            p.in_out_start as u32,
            p.in_start as u32,
            0,
            subtract as u32,
        ];
        let mut with_carry = base;
        with_carry[8] = 1;

        let state = self.upload_state(src.amplitudes(), false);
        let n_state = self.upload_state(dst.amplitudes(), true);
        let phase = [[p.phase as f32, 0.0]];

        // Three dispatches; each needs its own carry-in selector, so the
        // first two run as separate submissions with distinct params.
        let (f_buf, u_buf) = self.upload_params(&phase, &base);
        let (_, u_buf2) = self.upload_params(&phase, &with_carry);
        let mut scratch = vec![Complex64::new(0.0, 0.0); dst.len()];
        self.run(&[(name, half)], &state, &f_buf, &u_buf, &n_state, &n_state, &mut scratch);
        self.run(&[(name, half)], &state, &f_buf, &u_buf2, &n_state, &n_state, &mut scratch);
        self.run(
            &[("carry_finish", all)],
            &state,
            &f_buf,
            &u_buf,
            &n_state,
            &n_state,
            dst.amplitudes_mut(),
        );
    }
}

impl KernelBackend for GpuKernels {
    fn name(&self) -> &str {
        "gpu"
    }

    fn apply_2x2(&self, state: &mut StateVector, params: &Apply2x2Params) {
        let bit_count = params.q_powers_sorted.len() as u32;
        let max_i = (state.len() >> bit_count) as u32;
        let mut params_u = vec![bit_count, max_i, params.offset1 as u32, params.offset2 as u32];
        params_u.extend(params.q_powers_sorted.iter().map(|&p| p as u32));

        let params_f: Vec<[f32; 2]> = params
            .mtrx
            .iter()
            .chain(std::iter::once(&params.nrm))
            .map(|c| [c.re as f32, c.im as f32])
            .collect();

        let state_buf = self.upload_state(state.amplitudes(), true);
        // apply2x2 mutates binding 0 in place; binding 3 is unused
        let n_state = self.upload_state(&[Complex64::new(0.0, 0.0)], true);
        let (f_buf, u_buf) = self.upload_params(&params_f, &params_u);
        self.run(
            &[("apply2x2", max_i)],
            &state_buf,
            &f_buf,
            &u_buf,
            &n_state,
            &state_buf,
            state.amplitudes_mut(),
        );
    }

    fn rol(&self, src: &StateVector, dst: &mut StateVector, p: &ShiftParams) {
        self.run_scatter("rol", src, dst, &[[0.0, 0.0]], &shift_words(src, p));
    }

    fn ror(&self, src: &StateVector, dst: &mut StateVector, p: &ShiftParams) {
        self.run_scatter("ror", src, dst, &[[0.0, 0.0]], &shift_words(src, p));
    }

    fn add(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        self.run_scatter("add_k", src, dst, &[[0.0, 0.0]], &arith_words(src, p));
    }

    fn sub(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        self.run_scatter("sub_k", src, dst, &[[0.0, 0.0]], &arith_words(src, p));
    }

    fn add_bcd(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        self.run_scatter("addbcd", src, dst, &[[0.0, 0.0]], &arith_words(src, p));
    }

    fn sub_bcd(&self, src: &StateVector, dst: &mut StateVector, p: &ArithParams) {
        self.run_scatter("subbcd", src, dst, &[[0.0, 0.0]], &arith_words(src, p));
    }

    fn add_carry(&self, src: &StateVector, dst: &mut StateVector, p: &CarryParams) {
        self.carry("addc_pass", src, dst, p, false);
    }

    fn sub_carry(&self, src: &StateVector, dst: &mut StateVector, p: &CarryParams) {
        self.carry("subc_pass", src, dst, p, true);
    }
}

fn shift_words(src: &StateVector, p: &ShiftParams) -> Vec<u32> {
    vec![
        src.len() as u32,
        p.reg_mask as u32,
        p.other_mask as u32,
        p.length_power as u32,
        p.start as u32,
        p.shift as u32,
        p.length as u32,
    ]
}

fn arith_words(src: &StateVector, p: &ArithParams) -> Vec<u32> {
    vec![
        src.len() as u32,
        p.in_out_mask as u32,
        p.in_mask as u32,
        p.other_mask as u32,
        p.length_power as u32,
        p.in_out_start as u32,
        p.in_start as u32,
        p.nibble_count as u32,
    ]
}
