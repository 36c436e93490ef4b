//! GPU buffers mirroring a probe volume

use bytemuck::{Pod, Zeroable};

use crate::core::{Error, Result};
use crate::math::sh::SH9_SCALARS;
use crate::math::sphere::RAY_COUNT;
use crate::probe::Surfel;
use crate::scene::BoxScene;
use crate::volume::ProbeVolume;

/// Relight uniforms (must match `RelightUniforms` in probe_relight.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RelightUniforms {
    /// World position of probe (0, 0, 0) (12 bytes, offset 0)
    pub corner: [f32; 3],
    /// Probe spacing (4 bytes, offset 12)
    pub grid_size: f32,
    /// Probe counts per axis (12 bytes, offset 16)
    pub size: [u32; 3],
    /// Total probes (4 bytes, offset 28)
    pub probe_count: u32,
    /// Unit vector toward the sun (12 bytes, offset 32)
    pub sun_direction: [f32; 3],
    pub sky_light_intensity: f32,
    /// Sun color premultiplied by intensity (12 bytes, offset 48)
    pub sun_radiance: [f32; 3],
    pub gi_intensity: f32,
    /// Uniform sky color (12 bytes, offset 64)
    pub sky_color: [f32; 3],
    pub _pad: f32,
}

impl RelightUniforms {
    /// Volume placement and intensities with no lights
    pub fn from_volume(volume: &ProbeVolume) -> Self {
        Self {
            corner: volume.position().to_array(),
            grid_size: volume.grid_size(),
            size: volume.size().to_array(),
            probe_count: volume.probe_count() as u32,
            sun_direction: [0.0, 1.0, 0.0],
            sky_light_intensity: volume.sky_light_intensity(),
            sun_radiance: [0.0; 3],
            gi_intensity: volume.gi_intensity(),
            sky_color: [0.0; 3],
            _pad: 0.0,
        }
    }

    /// Volume uniforms lit by a box scene's sun and sky
    pub fn from_scene(volume: &ProbeVolume, scene: &BoxScene) -> Self {
        let mut uniforms = Self::from_volume(volume);
        if let Some(sun) = &scene.sun {
            uniforms.sun_direction = sun.direction;
            uniforms.sun_radiance = sun.radiance().to_array();
        }
        uniforms.sky_color = scene.sky_color;
        uniforms
    }
}

/// Surfels, radiance and the two coefficient generations of one volume.
///
/// Generation buffers swap roles each frame; the CPU only tracks which one
/// is current.
pub struct ProbeVolumeBuffers {
    probe_count: usize,
    surfel_buffer: wgpu::Buffer,
    radiance_buffer: wgpu::Buffer,
    coefficient_buffers: [wgpu::Buffer; 2],
    current: usize,
    uniform_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    /// Surfel store revision last uploaded per probe
    uploaded_revisions: Vec<Option<u64>>,
}

impl ProbeVolumeBuffers {
    /// Bytes of surfels per probe
    pub const SURFEL_BYTES_PER_PROBE: u64 = (RAY_COUNT * std::mem::size_of::<Surfel>()) as u64;
    /// Bytes of one probe's coefficient slot
    pub const COEFFICIENT_BYTES_PER_PROBE: u64 = (SH9_SCALARS * std::mem::size_of::<i32>()) as u64;
    /// Bytes of radiance per probe (vec4 per surfel)
    pub const RADIANCE_BYTES_PER_PROBE: u64 = (RAY_COUNT * 16) as u64;

    pub fn new(device: &wgpu::Device, probe_count: usize) -> Self {
        let count = probe_count.max(1) as u64;

        let surfel_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("probe_surfels"),
            size: count * Self::SURFEL_BYTES_PER_PROBE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let radiance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("probe_surfel_radiance"),
            size: count * Self::RADIANCE_BYTES_PER_PROBE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let coefficient_size = count * Self::COEFFICIENT_BYTES_PER_PROBE;
        let coefficient_buffer = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: coefficient_size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let coefficient_buffers = [
            coefficient_buffer("probe_coefficients_a"),
            coefficient_buffer("probe_coefficients_b"),
        ];

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("probe_relight_uniforms"),
            size: std::mem::size_of::<RelightUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("probe_coefficients_staging"),
            size: coefficient_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            probe_count,
            surfel_buffer,
            radiance_buffer,
            coefficient_buffers,
            current: 0,
            uniform_buffer,
            staging_buffer,
            uploaded_revisions: vec![None; probe_count],
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count
    }

    pub fn surfel_buffer(&self) -> &wgpu::Buffer {
        &self.surfel_buffer
    }

    pub fn radiance_buffer(&self) -> &wgpu::Buffer {
        &self.radiance_buffer
    }

    pub fn uniform_buffer(&self) -> &wgpu::Buffer {
        &self.uniform_buffer
    }

    pub fn coefficient_buffer(&self, generation: usize) -> &wgpu::Buffer {
        &self.coefficient_buffers[generation & 1]
    }

    /// Index of the generation written this frame
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_buffer(&self) -> &wgpu::Buffer {
        &self.coefficient_buffers[self.current]
    }

    pub fn previous_buffer(&self) -> &wgpu::Buffer {
        &self.coefficient_buffers[1 - self.current]
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Record a zero-fill of the current generation
    pub fn clear_current(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(self.current_buffer(), 0, None);
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, uniforms: &RelightUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Upload surfels of every probe whose store changed since the last
    /// upload. Returns the number of probes uploaded.
    pub fn upload_surfels(&mut self, queue: &wgpu::Queue, volume: &ProbeVolume) -> usize {
        let mut uploaded = 0;
        for (index, probe) in volume.probes().iter().enumerate().take(self.probe_count) {
            let Ok(store) = probe.surfels() else {
                continue;
            };
            if self.uploaded_revisions[index] == Some(store.revision()) {
                continue;
            }
            queue.write_buffer(
                &self.surfel_buffer,
                index as u64 * Self::SURFEL_BYTES_PER_PROBE,
                store.as_bytes(),
            );
            self.uploaded_revisions[index] = Some(store.revision());
            uploaded += 1;
        }
        if uploaded > 0 {
            log::debug!("Uploaded surfels for {} probes", uploaded);
        }
        uploaded
    }

    /// Copy the current generation back to the CPU. Blocks until the GPU
    /// has finished all submitted work.
    pub fn read_current_coefficients(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<i32>> {
        let size = self.probe_count as u64 * Self::COEFFICIENT_BYTES_PER_PROBE;
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("probe_coefficients_readback"),
        });
        encoder.copy_buffer_to_buffer(self.current_buffer(), 0, &self.staging_buffer, 0, size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = self.staging_buffer.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::Gpu(e.to_string()))?;

        rx.recv()
            .map_err(|e| Error::Gpu(e.to_string()))?
            .map_err(|e| Error::Gpu(e.to_string()))?;

        let data = slice.get_mapped_range();
        let coefficients = bytemuck::cast_slice::<u8, i32>(&data).to_vec();
        drop(data);
        self.staging_buffer.unmap();
        Ok(coefficients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FLOATS_PER_SURFEL;

    #[test]
    fn test_uniform_size() {
        // Must be exactly 80 bytes to match the shader struct
        assert_eq!(std::mem::size_of::<RelightUniforms>(), 80);
    }

    #[test]
    fn test_surfel_stride_matches_shader() {
        assert_eq!(
            ProbeVolumeBuffers::SURFEL_BYTES_PER_PROBE,
            (RAY_COUNT * FLOATS_PER_SURFEL * 4) as u64
        );
        assert_eq!(ProbeVolumeBuffers::COEFFICIENT_BYTES_PER_PROBE, 108);
    }

    #[test]
    fn test_uniforms_from_scene() {
        let mut volume = ProbeVolume::new("gpu", glam::Vec3::new(1.0, 2.0, 3.0));
        volume.regenerate(glam::UVec3::new(2, 3, 4), 0.5).unwrap();
        volume.set_gi_intensity(0.5);

        let scene = BoxScene::courtyard();
        let uniforms = RelightUniforms::from_scene(&volume, &scene);
        assert_eq!(uniforms.corner, [1.0, 2.0, 3.0]);
        assert_eq!(uniforms.size, [2, 3, 4]);
        assert_eq!(uniforms.probe_count, 24);
        assert_eq!(uniforms.gi_intensity, 0.5);
        assert_eq!(uniforms.sky_color, scene.sky_color);
        assert!(uniforms.sun_radiance[0] > 0.0);
    }
}
