//! Headless demo that renders volumetric height fog over a synthetic scene and
//! writes the composited frame to a PNG.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p vapor-demo -- --resolution quarter --temporal true`.

mod height_fog;
mod scene;

use std::path::Path;

use clap::Parser;
use glam::Vec3;
use tracing::{error, info, warn};
use vapor_config::{CliArgs, Config};
use vapor_fog::{
    Aabb, CameraTarget, FogCamera, FogShader, FrameInput, FrameOutcome, GpuError, GpuRecorder,
    LightSource, VolumeRegistry, VolumetricFogPipeline,
};

use height_fog::{HeightFogVolume, fog_shader_source};
use scene::{SceneCamera, SceneImages};

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode PNG: {0}")]
    Png(#[from] png::EncodingError),
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(|| dirs::config_dir().map(|dir| dir.join("vapor")))
        .unwrap_or_else(|| Path::new(".vapor").to_path_buf());

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    vapor_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        "Rendering {} frames at {}x{}: {:?}, temporal {}, blur {}",
        config.output.frames,
        config.output.width,
        config.output.height,
        config.fog.resolution,
        config.fog.temporal,
        !config.fog.disable_blur
    );

    if let Err(err) = run(&config) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), DemoError> {
    let (device, queue) = vapor_fog::request_device_blocking()?;
    let (width, height) = (config.output.width.max(1), config.output.height.max(1));

    let scene_camera = SceneCamera::new(width, height);
    let images = SceneImages::render(&scene_camera, width, height);
    let (color_texture, depth_texture) = images.create_textures(&device, &queue);

    let mut recorder = GpuRecorder::new(&device, &queue);
    let color = recorder.import_texture(color_texture.clone());
    let depth = recorder.import_texture(depth_texture);

    let target = CameraTarget {
        width,
        height,
        color_format: scene::COLOR_FORMAT,
        color,
        depth,
    };
    let mut camera = FogCamera::new(scene_camera.position, scene_camera.view_projection);
    if config.debug.scene_view {
        camera = camera.scene_view();
    }

    let lights = demo_lights();
    let mut volumes = VolumeRegistry::<GpuRecorder>::new();
    volumes.add(Box::new(HeightFogVolume::new(
        Aabb::new(Vec3::new(-80.0, -1.0, -190.0), Vec3::new(80.0, 12.0, 5.0)),
        0.08,
        0.35,
        0.0,
    )));

    let mut pipeline = VolumetricFogPipeline::new(
        config.fog.clone(),
        FogShader::new("height-fog", fog_shader_source()),
    );

    let mut last = None;
    for frame in 0..config.output.frames.max(1) {
        images.upload_color(&queue, &color_texture);
        let input = FrameInput {
            camera: &camera,
            target: &target,
            lights: &lights,
            main_light: Some(0),
        };
        let outcome = pipeline.execute(&input, &volumes, &mut recorder);
        recorder.submit();

        match &outcome {
            FrameOutcome::Rendered(stats) => tracing::debug!(
                frame,
                volumes = stats.volumes_drawn,
                lights = stats.lights,
                cursor = ?stats.jitter_cursor,
                "Fog frame rendered"
            ),
            FrameOutcome::Skipped(reason) => info!("Frame {frame} skipped: {reason:?}"),
            FrameOutcome::Aborted(err) => warn!("Frame {frame} aborted: {err}"),
        }
        last = Some(outcome);
    }

    if let Some(stats) = last.as_ref().and_then(FrameOutcome::stats) {
        info!(
            "Final frame: tier {:?}, {} depth passes, {} blur passes, upsampled {}, reprojected {}",
            stats.tier, stats.depth_passes, stats.blur_passes, stats.upsampled, stats.reprojected
        );
    }

    let pixels = recorder.read_texture_rgba8(color)?;
    write_png(&config.output.path, width, height, &pixels)?;
    info!("Wrote {}", config.output.path.display());

    pipeline.release(&mut recorder);
    Ok(())
}

/// A low sun with point and spot lights inside the fog.
fn demo_lights() -> Vec<LightSource> {
    vec![
        LightSource::directional(
            Vec3::new(0.3, -0.25, -1.0),
            Vec3::new(1.0, 0.92, 0.8),
            0.6,
        ),
        LightSource::point(
            Vec3::new(-6.0, 2.0, -18.0),
            Vec3::new(1.0, 0.55, 0.25),
            40.0,
            14.0,
        ),
        LightSource::point(
            Vec3::new(8.0, 1.5, -35.0),
            Vec3::new(0.35, 0.6, 1.0),
            60.0,
            18.0,
        ),
        LightSource::spot(
            Vec3::new(0.0, 6.0, -25.0),
            Vec3::NEG_Y,
            Vec3::ONE,
            80.0,
            12.0,
            20f32.to_radians(),
            40f32.to_radians(),
        ),
    ]
}

fn write_png(path: &Path, width: u32, height: u32, pixels: &[u8]) -> Result<(), DemoError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    let mut encoder = png::Encoder::new(file, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(pixels)?;
    Ok(())
}
