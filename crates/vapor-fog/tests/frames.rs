//! Whole-frame behaviour of the fog pipeline, observed through a command trace.

use glam::{Mat4, Vec3};
use vapor_config::{FogConfig, FogResolution};
use vapor_fog::binding::{MOTION_INFLUENCE, PASS_OFFSET, TEMPORAL_BUFFER, TILE_SIZE};
use vapor_fog::resources::labels;
use vapor_fog::{
    Aabb, BoxFogVolume, CameraTarget, Command, CommandRecorder, CommandTrace, FogCamera, FogError,
    FogPass, FogShader, FogTier, FrameInput, FrameOutcome, LightSource, SkipReason,
    TextureLifetime, VolumeRegistry, VolumetricFogPipeline,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 32;

struct Scene {
    trace: CommandTrace,
    camera: FogCamera,
    target: CameraTarget,
    lights: Vec<LightSource>,
    volumes: VolumeRegistry<CommandTrace>,
}

impl Scene {
    fn new() -> Self {
        Self::with_size(WIDTH, HEIGHT)
    }

    fn with_size(width: u32, height: u32) -> Self {
        let mut trace = CommandTrace::new();
        let color = trace.import_texture("color", (width, height), wgpu::TextureFormat::Rgba8Unorm);
        let depth = trace.import_texture("depth", (width, height), wgpu::TextureFormat::R32Float);
        Self {
            trace,
            camera: camera(),
            target: CameraTarget {
                width,
                height,
                color_format: wgpu::TextureFormat::Rgba8Unorm,
                color,
                depth,
            },
            lights: Vec::new(),
            volumes: VolumeRegistry::new(),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.target.color =
            self.trace
                .import_texture("color", (width, height), wgpu::TextureFormat::Rgba8Unorm);
        self.target.depth =
            self.trace
                .import_texture("depth", (width, height), wgpu::TextureFormat::R32Float);
        self.target.width = width;
        self.target.height = height;
    }

    fn add_volume_ahead(&mut self, label: &'static str) {
        self.volumes.add(Box::new(BoxFogVolume::new(
            Aabb::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::splat(2.0)),
            move |_, recorder: &mut CommandTrace| recorder.draw(label),
        )));
    }

    fn add_volume_behind(&mut self) {
        self.volumes.add(Box::new(BoxFogVolume::new(
            Aabb::from_center_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE),
            |_, recorder: &mut CommandTrace| recorder.draw("behind"),
        )));
    }

    fn run(&mut self, pipeline: &mut VolumetricFogPipeline) -> FrameOutcome {
        self.trace.clear_commands();
        let frame = FrameInput {
            camera: &self.camera,
            target: &self.target,
            lights: &self.lights,
            main_light: None,
        };
        pipeline.execute(&frame, &self.volumes, &mut self.trace)
    }
}

fn camera() -> FogCamera {
    let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
    let proj = Mat4::perspective_rh(
        std::f32::consts::FRAC_PI_2,
        WIDTH as f32 / HEIGHT as f32,
        0.1,
        100.0,
    );
    FogCamera::new(Vec3::ZERO, proj * view)
}

fn pipeline(config: FogConfig) -> VolumetricFogPipeline {
    VolumetricFogPipeline::new(config, FogShader::new("fog", "// fog"))
}

fn config(resolution: FogResolution, temporal: bool, disable_blur: bool) -> FogConfig {
    FogConfig {
        resolution,
        temporal,
        temporal_resolution: 4,
        disable_blur,
        jitter_seed: 11,
    }
}

#[test]
fn test_no_visible_volumes_skips_without_allocating() {
    let mut scene = Scene::new();
    scene.add_volume_behind();
    let mut pipeline = pipeline(config(FogResolution::Half, false, false));

    let outcome = scene.run(&mut pipeline);

    assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::NoVisibleVolumes));
    assert!(scene.trace.commands().is_empty());
    assert_eq!(pipeline.frame_count(), 0);
}

#[test]
fn test_empty_registry_skips() {
    let mut scene = Scene::new();
    let mut pipeline = pipeline(FogConfig::default());
    assert_eq!(
        scene.run(&mut pipeline),
        FrameOutcome::Skipped(SkipReason::NoVisibleVolumes)
    );
}

#[test]
fn test_half_tier_frame() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    scene.add_volume_ahead("b");
    scene.add_volume_behind();
    let mut pipeline = pipeline(config(FogResolution::Half, false, false));

    let outcome = scene.run(&mut pipeline);
    let stats = outcome.stats().expect("frame rendered").clone();

    let half = scene.trace.created(labels::HALF_FOG).unwrap();
    assert_eq!(stats.tier, FogTier::Half);
    assert_eq!(stats.fog_target, half);
    assert_eq!(stats.volumes_drawn, 2);
    assert_eq!(scene.trace.draw_targets(), vec![half, half]);
    assert_eq!(stats.depth_passes, 1);
    assert_eq!(stats.blur_passes, 2);
    assert!(stats.upsampled);
    assert!(!stats.reprojected);
    assert_eq!(stats.jitter_cursor, None);
    assert_eq!(pipeline.frame_count(), 1);
}

#[test]
fn test_pass_order() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Quarter, false, false));
    scene.run(&mut pipeline);

    let passes: Vec<FogPass> = scene.trace.blits().map(|(_, _, pass)| pass).collect();
    let kinds: Vec<&str> = passes
        .iter()
        .map(|pass| match pass {
            FogPass::DownsampleDepth => "depth",
            FogPass::Blur { .. } => "blur",
            FogPass::Upsample { .. } => "upsample",
            FogPass::TemporalReproject => "reproject",
            FogPass::Composite => "composite",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["depth", "depth", "blur", "blur", "upsample", "composite"]
    );

    let draw_index = scene
        .trace
        .commands()
        .iter()
        .position(|c| matches!(c, Command::Draw { .. }))
        .unwrap();
    let first_blur = scene
        .trace
        .commands()
        .iter()
        .position(|c| {
            matches!(
                c,
                Command::Blit {
                    pass: FogPass::Blur { .. },
                    ..
                }
            )
        })
        .unwrap();
    assert!(draw_index < first_blur);
}

#[test]
fn test_quarter_tier_chains_depth_from_half() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Quarter, false, true));
    let stats = scene.run(&mut pipeline).stats().cloned().unwrap();

    let half_depth = scene.trace.created(labels::HALF_DEPTH).unwrap();
    let quarter_depth = scene.trace.created(labels::QUARTER_DEPTH).unwrap();
    let depth_blits: Vec<_> = scene
        .trace
        .blits()
        .filter(|(_, _, pass)| *pass == FogPass::DownsampleDepth)
        .collect();
    assert_eq!(
        depth_blits,
        vec![
            (Some(scene.target.depth), half_depth, FogPass::DownsampleDepth),
            (Some(half_depth), quarter_depth, FogPass::DownsampleDepth),
        ]
    );
    assert_eq!(stats.fog_target, scene.trace.created(labels::QUARTER_FOG).unwrap());
    assert_eq!(stats.depth_passes, 2);
}

#[test]
fn test_upsample_runs_with_blur_disabled() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Half, false, true));
    let stats = scene.run(&mut pipeline).stats().cloned().unwrap();

    assert_eq!(stats.blur_passes, 0);
    assert!(stats.upsampled);
    assert!(scene.trace.created(labels::BLUR_SCRATCH).is_none());
}

#[test]
fn test_full_tier_without_blur_goes_straight_to_composite() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Full, false, true));
    let stats = scene.run(&mut pipeline).stats().cloned().unwrap();

    let full = scene.trace.created(labels::FULL_FOG).unwrap();
    assert_eq!(stats.fog_target, full);
    assert_eq!(stats.depth_passes, 0);
    assert!(!stats.upsampled);
    let passes: Vec<FogPass> = scene.trace.blits().map(|(_, _, pass)| pass).collect();
    assert_eq!(passes, vec![FogPass::Composite]);
}

#[test]
fn test_composite_writes_camera_color() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Half, false, false));
    scene.run(&mut pipeline);

    let copy = scene.trace.created(labels::COLOR_COPY).unwrap();
    let (source, target, pass) = scene.trace.blits().last().unwrap();
    assert_eq!(pass, FogPass::Composite);
    assert_eq!(source, Some(copy));
    assert_eq!(target, scene.target.color);
    assert!(scene.trace.commands().contains(&Command::CopyTexture {
        source: scene.target.color,
        target: copy,
    }));
}

#[test]
fn test_temporal_draws_into_jitter_tile() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Quarter, true, false));
    let stats = scene.run(&mut pipeline).stats().cloned().unwrap();

    let tile = scene.trace.created(labels::TEMPORAL_TILE).unwrap();
    assert_eq!(stats.tier, FogTier::Full);
    assert_eq!(stats.fog_target, tile);
    assert_eq!(scene.trace.draw_targets(), vec![tile]);
    assert!(stats.reprojected);
    assert!(!stats.upsampled);
    assert_eq!(stats.jitter_cursor, Some(1));
    assert!(scene.trace.global_vector(PASS_OFFSET).is_some());
}

#[test]
fn test_jitter_cursor_round_robin_across_frames() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Full, true, true));

    let cursors: Vec<u32> = (0..32)
        .map(|_| scene.run(&mut pipeline).stats().unwrap().jitter_cursor.unwrap())
        .collect();

    for window in cursors.chunks(16) {
        let mut sorted = window.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..16).collect::<Vec<_>>());
    }
    assert_eq!(cursors[..16], cursors[16..]);
}

#[test]
fn test_skipped_frames_do_not_advance_jitter() {
    let mut scene = Scene::new();
    scene.add_volume_behind();
    let mut pipeline = pipeline(config(FogResolution::Full, true, true));
    scene.run(&mut pipeline);
    scene.run(&mut pipeline);
    assert_eq!(pipeline.jitter_cursor(), 0);
}

#[test]
fn test_oversized_kernel_renders_with_clamped_tile() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut cfg = config(FogResolution::Full, true, false);
    cfg.temporal_resolution = 65536;
    let mut pipeline = pipeline(cfg);

    for expected in 1..=3 {
        let stats = scene.run(&mut pipeline).stats().cloned().unwrap();
        assert_eq!(stats.jitter_cursor, Some(expected));
    }
    assert_eq!(
        scene.trace.global_float(TILE_SIZE),
        Some(FogConfig::MAX_KERNEL_SIZE as f32)
    );
}

#[test]
fn test_motion_influence_per_camera_kind() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Full, true, false));

    scene.run(&mut pipeline);
    assert_eq!(scene.trace.global_float(MOTION_INFLUENCE), Some(1.0));

    scene.camera = camera().scene_view();
    scene.run(&mut pipeline);
    assert_eq!(scene.trace.global_float(MOTION_INFLUENCE), Some(0.0));
}

#[test]
fn test_history_persists_and_recreates_on_resize() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Full, true, false));

    scene.run(&mut pipeline);
    let first = scene.trace.global_texture(TEMPORAL_BUFFER).unwrap();
    assert_eq!(pipeline.history_size(&scene.trace), Some((WIDTH, HEIGHT)));

    scene.run(&mut pipeline);
    assert_eq!(scene.trace.global_texture(TEMPORAL_BUFFER), Some(first));
    assert!(scene.trace.created(labels::HISTORY).is_none());

    scene.resize(128, 96);
    scene.run(&mut pipeline);
    let second = scene.trace.global_texture(TEMPORAL_BUFFER).unwrap();
    assert_ne!(first, second);
    assert!(scene.trace.commands().contains(&Command::ReleaseTexture(first)));
    assert_eq!(pipeline.history_size(&scene.trace), Some((128, 96)));
}

#[test]
fn test_history_copied_before_blur() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Full, true, false));
    scene.run(&mut pipeline);

    let history = scene.trace.global_texture(TEMPORAL_BUFFER).unwrap();
    let commands = scene.trace.commands();
    let copy = commands
        .iter()
        .position(|c| matches!(c, Command::CopyTexture { target, .. } if *target == history))
        .unwrap();
    let reproject = commands
        .iter()
        .position(|c| {
            matches!(
                c,
                Command::Blit {
                    pass: FogPass::TemporalReproject,
                    ..
                }
            )
        })
        .unwrap();
    let blur = commands
        .iter()
        .position(|c| {
            matches!(
                c,
                Command::Blit {
                    pass: FogPass::Blur { .. },
                    ..
                }
            )
        })
        .unwrap();
    assert!(reproject < copy && copy < blur);
}

#[test]
fn test_transients_released_every_frame() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Quarter, false, false));
    for _ in 0..3 {
        assert!(scene.run(&mut pipeline).is_rendered());
        assert_eq!(scene.trace.live_textures(TextureLifetime::Transient), 0);
    }
}

#[test]
fn test_failed_draw_aborts_and_releases() {
    let mut scene = Scene::new();
    scene.volumes.add(Box::new(BoxFogVolume::new(
        Aabb::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE),
        |_, _: &mut CommandTrace| Err(FogError::VolumeDraw("shader missing".into())),
    )));
    let mut pipeline = pipeline(config(FogResolution::Half, false, false));

    let outcome = scene.run(&mut pipeline);

    assert_eq!(
        outcome,
        FrameOutcome::Aborted(FogError::VolumeDraw("shader missing".into()))
    );
    assert_eq!(scene.trace.live_textures(TextureLifetime::Transient), 0);
    assert!(scene.trace.blits().all(|(_, _, pass)| pass != FogPass::Composite));
    assert_eq!(pipeline.frame_count(), 0);
}

#[test]
fn test_allocation_failure_aborts() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    scene.trace.fail_texture_creation(labels::HALF_DEPTH);
    let mut pipeline = pipeline(config(FogResolution::Half, false, false));

    let outcome = scene.run(&mut pipeline);

    assert!(matches!(outcome, FrameOutcome::Aborted(FogError::TextureCreation { .. })));
    assert_eq!(scene.trace.live_textures(TextureLifetime::Transient), 0);
    assert!(scene.trace.draw_targets().is_empty());
}

#[test]
fn test_release_on_teardown() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Full, true, false));
    scene.run(&mut pipeline);
    assert_eq!(scene.trace.live_textures(TextureLifetime::Persistent), 3);

    pipeline.release(&mut scene.trace);
    // Only the imported camera colour and depth remain.
    assert_eq!(scene.trace.live_textures(TextureLifetime::Persistent), 2);
    assert_eq!(pipeline.history_size(&scene.trace), None);
}

#[test]
fn test_disabling_temporal_releases_history_next_frame() {
    let mut scene = Scene::new();
    scene.add_volume_ahead("a");
    let temporal = config(FogResolution::Half, true, false);
    let mut pipeline = pipeline(temporal.clone());
    scene.run(&mut pipeline);
    let history = scene.trace.global_texture(TEMPORAL_BUFFER).unwrap();

    pipeline.set_config(FogConfig {
        temporal: false,
        ..temporal
    });
    let stats = scene.run(&mut pipeline).stats().cloned().unwrap();

    assert!(scene.trace.commands().contains(&Command::ReleaseTexture(history)));
    assert_eq!(scene.trace.texture_size(history), None);
    assert_eq!(stats.tier, FogTier::Half);
}

#[test]
fn test_lights_sorted_and_reported_to_volumes() {
    let mut scene = Scene::new();
    scene.lights = vec![
        LightSource::point(Vec3::new(0.0, 0.0, -30.0), Vec3::ONE, 1.0, 5.0),
        LightSource::directional(Vec3::NEG_Y, Vec3::ONE, 1.0),
        LightSource::point(Vec3::new(0.0, 0.0, -5.0), Vec3::ONE, 1.0, 5.0),
        LightSource::point(Vec3::new(0.0, 0.0, 40.0), Vec3::ONE, 1.0, 5.0),
    ];
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = seen.clone();
    scene.volumes.add(Box::new(BoxFogVolume::new(
        Aabb::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE),
        move |ctx, recorder: &mut CommandTrace| {
            sink.borrow_mut().extend(
                ctx.lights
                    .records()
                    .iter()
                    .map(|r| (r.source_index, ctx.max_lights)),
            );
            recorder.draw("lit")
        },
    )));
    let mut pipeline = pipeline(config(FogResolution::Full, false, true));

    let stats = scene.run(&mut pipeline).stats().cloned().unwrap();

    // The light behind the camera is culled; the directional light sorts first.
    assert_eq!(stats.lights, 3);
    assert_eq!(*seen.borrow(), vec![(1, 3), (2, 3), (0, 3)]);
}

#[test]
fn test_degenerate_camera_renders() {
    let mut scene = Scene::with_size(1, 1);
    scene.add_volume_ahead("a");
    let mut pipeline = pipeline(config(FogResolution::Quarter, false, false));
    assert!(scene.run(&mut pipeline).is_rendered());
    let quarter = scene.trace.created(labels::QUARTER_FOG).unwrap();
    assert_eq!(
        scene.trace.commands().iter().find_map(|c| match c {
            Command::CreateTexture { id, desc } if *id == quarter => Some(desc.size()),
            _ => None,
        }),
        Some((1, 1))
    );
}
