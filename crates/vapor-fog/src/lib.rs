//! Volumetric fog frame pipeline: tiered fog targets, depth mirrors, light lists,
//! temporal jitter with history reprojection, blur, upsampling and compositing.
//!
//! The pipeline records through a [`CommandRecorder`]. [`GpuRecorder`] executes on
//! wgpu; [`CommandTrace`] only records, for inspecting what a frame issues.

pub mod binding;
pub mod blur;
pub mod camera;
pub mod composite;
pub mod culling;
pub mod depth;
pub mod error;
pub mod frustum;
pub mod gpu;
pub mod gpu_passes;
pub mod history;
pub mod light;
pub mod pipeline;
pub mod recorder;
pub mod resources;
pub mod target;
pub mod temporal;
pub mod tier;
pub mod trace;
pub mod volume;

pub use binding::ShaderBinding;
pub use camera::{CameraKind, CameraTarget, FogCamera, FrameInput};
pub use culling::{VisibilitySet, cull_volumes};
pub use error::FogError;
pub use frustum::{Aabb, Frustum};
pub use gpu::{GpuError, GpuRecorder, request_device, request_device_blocking};
pub use gpu_passes::{FOG_GLOBALS_WGSL, FogGlobalsUniform};
pub use history::{HistoryBuffer, JitterSample, JitterSequence, TemporalHistory};
pub use light::{
    LightConstants, LightKind, LightList, LightListBuilder, LightRecord, LightRecordGpu,
    LightSource, StandardLightConstants,
};
pub use pipeline::{FrameOutcome, FrameStats, SkipReason, VolumetricFogPipeline};
pub use recorder::{CommandRecorder, FogPass, TextureDesc, TextureId, TextureLifetime};
pub use resources::{FramePlan, FrameResources};
pub use tier::FogTier;
pub use trace::{Command, CommandTrace};
pub use volume::{
    BoxFogVolume, FogShader, FogVolume, VolumeDrawContext, VolumeHandle, VolumeRegistry,
};
