//! Probe relight compute pipeline

use crate::render::buffer::{ProbeVolumeBuffers, RelightUniforms};

/// Threads per workgroup; each thread relights `RAY_COUNT / 64` surfels
pub const RELIGHT_WORKGROUP_SIZE: u32 = 64;

/// Largest workgroup count per dispatch dimension
const MAX_WORKGROUPS_PER_DIM: u32 = 65535;

/// Workgroup grid covering one workgroup per probe
pub fn workgroup_grid(probe_count: u32) -> (u32, u32) {
    if probe_count <= MAX_WORKGROUPS_PER_DIM {
        (probe_count, 1)
    } else {
        (MAX_WORKGROUPS_PER_DIM, probe_count.div_ceil(MAX_WORKGROUPS_PER_DIM))
    }
}

/// Integrates every probe's surfels into the current coefficient generation.
///
/// One bind group is cached per generation so a swap only changes which
/// one is bound.
pub struct RelightPipeline {
    pipeline: wgpu::ComputePipeline,
    /// Indexed by the current generation
    bind_groups: [wgpu::BindGroup; 2],
    probe_count: u32,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl RelightPipeline {
    pub fn new(device: &wgpu::Device, buffers: &ProbeVolumeBuffers) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("probe_relight_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/probe_relight.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("probe_relight_layout"),
            entries: &[
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Surfels
                storage_entry(1, true),
                // Previous generation
                storage_entry(2, true),
                // Current generation (atomic adds)
                storage_entry(3, false),
                // Surfel radiance
                storage_entry(4, false),
            ],
        });

        let bind_group = |current: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(if current == 0 { "probe_relight_bind_group_a" } else { "probe_relight_bind_group_b" }),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffers.uniform_buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffers.surfel_buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffers.coefficient_buffer(1 - current).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: buffers.coefficient_buffer(current).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: buffers.radiance_buffer().as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [bind_group(0), bind_group(1)];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("probe_relight_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("probe_relight_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_groups,
            probe_count: buffers.probe_count() as u32,
        }
    }

    /// Record the relight dispatch for the current generation
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, buffers: &ProbeVolumeBuffers) {
        if self.probe_count == 0 {
            return;
        }
        let (x, y) = workgroup_grid(self.probe_count);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("probe_relight_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[buffers.current_index()], &[]);
        pass.dispatch_workgroups(x, y, 1);
    }

    /// Swap generations, then clear and relight the new current one in a
    /// single submission
    pub fn execute(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buffers: &mut ProbeVolumeBuffers,
        uniforms: &RelightUniforms,
    ) {
        buffers.swap();
        buffers.update_uniforms(queue, uniforms);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("probe_relight_encoder"),
        });
        buffers.clear_current(&mut encoder);
        self.dispatch(&mut encoder, buffers);
        queue.submit(std::iter::once(encoder.finish()));
    }
}
