//! Per-frame orchestration of the volumetric fog pipeline.

use vapor_config::FogConfig;

use crate::binding::CAMERA_DEPTH_TEXTURE;
use crate::blur::blur_and_upsample;
use crate::camera::FrameInput;
use crate::composite::composite;
use crate::culling::{VisibilitySet, cull_volumes};
use crate::depth::downsample_depth;
use crate::error::FogError;
use crate::frustum::Frustum;
use crate::history::{JitterSequence, TemporalHistory};
use crate::light::{LightConstants, LightListBuilder};
use crate::recorder::{CommandRecorder, TextureId};
use crate::resources::{FramePlan, FrameResources};
use crate::target::setup_fog_target;
use crate::temporal::reproject;
use crate::tier::FogTier;
use crate::volume::{FogShader, VolumeDrawContext, VolumeRegistry};

/// Why a frame recorded no fog work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Every registered volume was culled, or none are registered.
    NoVisibleVolumes,
}

/// Summary of a rendered frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameStats {
    /// Resolution tier the fog was rendered at.
    pub tier: FogTier,
    /// Texture the volumes drew into.
    pub fog_target: TextureId,
    /// Volumes that survived culling and were drawn.
    pub volumes_drawn: usize,
    /// Lights in the list handed to the volumes.
    pub lights: usize,
    /// Depth downsample passes recorded.
    pub depth_passes: u32,
    /// Blur passes recorded, two per blurred frame.
    pub blur_passes: u32,
    /// Whether the fog buffer was upsampled to full resolution.
    pub upsampled: bool,
    /// Whether the temporal reprojection pass ran.
    pub reprojected: bool,
    /// Jitter cursor used this frame, in temporal mode.
    pub jitter_cursor: Option<u32>,
}

/// Result of [`VolumetricFogPipeline::execute`].
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    Rendered(FrameStats),
    /// A resource or pass failed; fog is absent this frame.
    Aborted(FogError),
}

impl FrameOutcome {
    pub fn stats(&self) -> Option<&FrameStats> {
        match self {
            Self::Rendered(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

/// Owns cross-frame fog state and records one frame at a time.
pub struct VolumetricFogPipeline {
    config: FogConfig,
    fog_shader: FogShader,
    light_builder: LightListBuilder,
    temporal: TemporalHistory,
    release_history: bool,
    frame_count: u64,
}

impl VolumetricFogPipeline {
    pub fn new(config: FogConfig, fog_shader: FogShader) -> Self {
        let temporal = TemporalHistory::new(config.kernel_size(), config.jitter_seed);
        log::debug!(
            "Fog pipeline created: {:?}, temporal {}, kernel {}",
            config.resolution,
            config.temporal,
            config.kernel_size()
        );
        Self {
            config,
            fog_shader,
            light_builder: LightListBuilder::new(),
            temporal,
            release_history: false,
            frame_count: 0,
        }
    }

    /// Replace the light-constant routine.
    pub fn with_light_constants(mut self, constants: Box<dyn LightConstants>) -> Self {
        self.light_builder = LightListBuilder::with_constants(constants);
        self
    }

    pub fn config(&self) -> &FogConfig {
        &self.config
    }

    /// Apply new settings.
    ///
    /// A different kernel size restarts the jitter sequence, a different seed
    /// reseeds it, and disabling temporal mode releases history on the next frame.
    pub fn set_config(&mut self, config: FogConfig) {
        if config.jitter_seed != self.config.jitter_seed {
            self.temporal.jitter = JitterSequence::new(config.kernel_size(), config.jitter_seed);
        } else {
            self.temporal.jitter.set_kernel_size(config.kernel_size());
        }
        if self.config.temporal && !config.temporal {
            self.release_history = true;
        }
        self.config = config;
    }

    pub fn fog_shader(&self) -> &FogShader {
        &self.fog_shader
    }

    /// Swap the fog shader. Returns `false` when the fingerprint is unchanged.
    pub fn set_fog_shader(&mut self, shader: FogShader) -> bool {
        if shader.fingerprint() == self.fog_shader.fingerprint() {
            return false;
        }
        log::debug!("Fog shader changed to '{}'", shader.label());
        self.fog_shader = shader;
        true
    }

    pub fn jitter_cursor(&self) -> u32 {
        self.temporal.jitter.cursor()
    }

    /// Size of the live history buffer, if any.
    pub fn history_size<R: CommandRecorder + ?Sized>(&self, recorder: &R) -> Option<(u32, u32)> {
        self.temporal
            .buffer
            .texture()
            .and_then(|t| recorder.texture_size(t))
    }

    /// Number of frames that reached [`FrameOutcome::Rendered`].
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Record fog for one frame.
    ///
    /// Never fails: errors abort the frame, release its transients and are
    /// returned as [`FrameOutcome::Aborted`].
    pub fn execute<R: CommandRecorder + ?Sized>(
        &mut self,
        frame: &FrameInput<'_>,
        volumes: &VolumeRegistry<R>,
        recorder: &mut R,
    ) -> FrameOutcome {
        if self.release_history {
            self.temporal.buffer.release(recorder);
            self.release_history = false;
        }

        let frustum = frame.camera.frustum();
        let visible = cull_volumes(volumes, frame.camera.position, &frustum);
        if visible.is_empty() {
            log::trace!("No visible fog volumes, skipping frame");
            return FrameOutcome::Skipped(SkipReason::NoVisibleVolumes);
        }

        let plan = FramePlan::from_config(&self.config);
        let resources = match FrameResources::allocate(recorder, frame.target, &plan) {
            Ok(resources) => resources,
            Err(err) => {
                log::warn!("Fog frame aborted during allocation: {err}");
                return FrameOutcome::Aborted(err);
            }
        };

        let result = self.record(frame, volumes, &visible, &frustum, &plan, &resources, recorder);
        resources.release(recorder);

        match result {
            Ok(stats) => {
                self.frame_count += 1;
                log::debug!(
                    "Fog frame: {:?}, {} volumes, {} blur passes, reprojected {}",
                    stats.tier,
                    stats.volumes_drawn,
                    stats.blur_passes,
                    stats.reprojected
                );
                FrameOutcome::Rendered(stats)
            }
            Err(err) => {
                log::warn!("Fog frame aborted: {err}");
                FrameOutcome::Aborted(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record<R: CommandRecorder + ?Sized>(
        &mut self,
        frame: &FrameInput<'_>,
        volumes: &VolumeRegistry<R>,
        visible: &VisibilitySet,
        frustum: &Frustum,
        plan: &FramePlan,
        resources: &FrameResources,
        recorder: &mut R,
    ) -> Result<FrameStats, FogError> {
        let target = frame.target;
        let size = target.size();

        recorder.set_global_texture(CAMERA_DEPTH_TEXTURE, target.depth);
        resources.bind_globals(recorder);

        let depth_passes = downsample_depth(recorder, target.depth, resources)?;
        let (fog_target, jitter) =
            setup_fog_target(recorder, resources, plan, &mut self.temporal.jitter, size)?;

        let lights =
            self.light_builder
                .build(frame.lights, frame.main_light, frame.camera.position, frustum);
        let ctx = VolumeDrawContext {
            camera: frame.camera,
            target,
            is_scene_view: frame.camera.is_scene_view(),
            fog_shader: &self.fog_shader,
            lights: &lights,
            max_lights: lights.additional_light_count(),
            tier: plan.tier,
            fog_target,
        };

        let mut volumes_drawn = 0;
        for &handle in visible.handles() {
            if let Some(volume) = volumes.get(handle) {
                volume.draw(&ctx, recorder)?;
                volumes_drawn += 1;
            }
        }

        if plan.temporal {
            reproject(
                recorder,
                &mut self.temporal.buffer,
                resources,
                frame.camera,
                size,
            )?;
        }

        let blur = blur_and_upsample(recorder, resources, plan)?;
        composite(recorder, resources, target)?;

        Ok(FrameStats {
            tier: plan.tier,
            fog_target,
            volumes_drawn,
            lights: lights.len(),
            depth_passes,
            blur_passes: blur.blur_passes,
            upsampled: blur.upsampled,
            reprojected: plan.temporal,
            jitter_cursor: jitter.map(|j| j.cursor),
        })
    }

    /// Release cross-frame resources. Call on teardown.
    pub fn release<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R) {
        self.temporal.buffer.release(recorder);
        self.release_history = false;
    }
}
