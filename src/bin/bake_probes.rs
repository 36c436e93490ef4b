//! Bake (or load) a probe volume and relight it for a number of frames.
//!
//! Usage:
//!   cargo run --release --bin bake_probes -- [--config gi.json] [--scene scene.json]
//!       [--frames 8] [--recapture] [--gpu]

use std::path::PathBuf;

use glam::Vec3;

use surfel_gi::core::{logging, GiConfig, Result};
use surfel_gi::frame::RelightPass;
use surfel_gi::math::sh::decode_fixed;
use surfel_gi::render::{GpuContext, ProbeVolumeBuffers, RelightPipeline, RelightUniforms};
use surfel_gi::scene::BoxScene;
use surfel_gi::volume::{FileDatasetStore, ProbeVolume};

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
}

fn load_scene(path: Option<&String>) -> Result<BoxScene> {
    let Some(path) = path else {
        return Ok(BoxScene::courtyard());
    };
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map_err(|e| surfel_gi::core::Error::Config(format!("{}: {}", path, e)))
}

/// Relight the volume on the GPU for one frame and compare with the CPU result
fn gpu_check(volume: &ProbeVolume, scene: &BoxScene) -> Result<()> {
    let gpu = GpuContext::new_headless_blocking()?;
    let mut buffers = ProbeVolumeBuffers::new(&gpu.device, volume.probe_count());
    let pipeline = RelightPipeline::new(&gpu.device, &buffers);

    buffers.upload_surfels(&gpu.queue, volume);
    let mut uniforms = RelightUniforms::from_scene(volume, scene);
    // Shadows and indirect feedback are CPU-only; compare the direct term
    uniforms.gi_intensity = 0.0;
    pipeline.execute(&gpu.device, &gpu.queue, &mut buffers, &uniforms);
    let gpu_coefficients = buffers.read_current_coefficients(&gpu.device, &gpu.queue)?;

    let dc: f32 = gpu_coefficients
        .chunks_exact(27)
        .map(|c| decode_fixed(c[0]))
        .sum::<f32>()
        / volume.probe_count().max(1) as f32;
    println!("GPU mean DC (red, unshadowed direct + sky): {:.4}", dc);
    Ok(())
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let config = match arg_value(&args, "--config") {
        Some(path) => GiConfig::load(&PathBuf::from(path))?,
        None => GiConfig::default(),
    };
    let scene = load_scene(arg_value(&args, "--scene"))?;
    let frames: u32 = arg_value(&args, "--frames")
        .and_then(|s| s.parse().ok())
        .unwrap_or(8);
    let recapture = args.iter().any(|a| a == "--recapture");
    let use_gpu = args.iter().any(|a| a == "--gpu");

    let volume = config.build_volume()?;

    println!("=== Probe volume '{}' ===", volume.name());
    println!("Probes: {} ({:?}), spacing {}m", volume.probe_count(), volume.size(), volume.grid_size());
    println!("Extent: {:?}", volume.bounds().extent());

    let store = FileDatasetStore::new(&config.dataset_dir);
    let mut pass = RelightPass::new();
    let id = pass.add_volume(volume);

    let ready = if recapture {
        pass.capture_volume(id, Some(&scene), &store)
    } else {
        pass.load_or_capture(id, Some(&scene), &store)
    };
    if !ready {
        log::warn!("No surfels available; probes will relight to zero");
    }

    for _ in 0..frames {
        pass.execute(Some(&scene));
    }

    if let Some(volume) = pass.volume(id) {
        let center = volume.bounds().center();
        for normal in [Vec3::Y, Vec3::X, Vec3::NEG_X, Vec3::Z] {
            let e = volume.sample_irradiance(center, normal);
            println!("Irradiance at {:?} facing {:?}: ({:.3}, {:.3}, {:.3})", center, normal, e.x, e.y, e.z);
        }

        if use_gpu {
            if let Err(e) = gpu_check(volume, &scene) {
                log::warn!("GPU relight skipped: {}", e);
            }
        }
    }

    if store.exists(&config.name) {
        println!("Dataset: {}", store.path(&config.name).display());
    }
    println!("Relit {} frames", pass.frame_count());
    Ok(())
}

fn main() {
    logging::init();
    if let Err(e) = run() {
        log::error!("bake_probes failed: {}", e);
        std::process::exit(1);
    }
}
