//! Full-screen fog passes: WGSL source, globals uniform and pipeline creation.
//!
//! Every pass shares `vs_fullscreen` and one pipeline layout: group 0 holds the
//! fog globals uniform, group 1 three unfilterable textures read with
//! `textureLoad`. Unused texture slots are bound to a 1x1 fallback.

use bytemuck::{Pod, Zeroable};

use crate::recorder::{BlurAxis, FogPass};

/// Number of texture slots in group 1.
pub const PASS_TEXTURE_SLOTS: usize = 3;

/// Fog globals as seen by pass and volume shaders (group 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FogGlobalsUniform {
    /// xy = jitter cell, zw = random sub-cell offset.
    pub pass_offset: [f32; 4],
    /// xy = camera size / kernel, zw = reciprocal.
    pub temporal_render_size: [f32; 4],
    /// x = tile size, y = motion influence, z = 1 in temporal mode.
    pub params: [f32; 4],
}

/// WGSL declarations volume shaders can prepend to bind the fog globals.
pub const FOG_GLOBALS_WGSL: &str = r#"
struct FogGlobals {
    pass_offset: vec4<f32>,
    temporal_render_size: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> globals: FogGlobals;
"#;

/// WGSL source for every fog pass.
pub const PASS_SHADER_SOURCE: &str = r#"
struct FogGlobals {
    pass_offset: vec4<f32>,
    temporal_render_size: vec4<f32>,
    params: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0) var<uniform> globals: FogGlobals;
@group(1) @binding(0) var tex0: texture_2d<f32>;
@group(1) @binding(1) var tex1: texture_2d<f32>;
@group(1) @binding(2) var tex2: texture_2d<f32>;

const DEPTH_SHARPNESS: f32 = 100.0;

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

fn clamp_coord(p: vec2<i32>, dims: vec2<u32>) -> vec2<i32> {
    return clamp(p, vec2<i32>(0), vec2<i32>(dims) - vec2<i32>(1));
}

fn load0(p: vec2<i32>) -> vec4<f32> {
    return textureLoad(tex0, clamp_coord(p, textureDimensions(tex0)), 0);
}

fn load1(p: vec2<i32>) -> vec4<f32> {
    return textureLoad(tex1, clamp_coord(p, textureDimensions(tex1)), 0);
}

fn load2(p: vec2<i32>) -> vec4<f32> {
    return textureLoad(tex2, clamp_coord(p, textureDimensions(tex2)), 0);
}

// tex0 = source depth. Keeps the nearest of each 2x2 block.
@fragment
fn fs_downsample_depth(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = vec2<i32>(in.position.xy) * 2;
    let a = load0(base).r;
    let b = load0(base + vec2<i32>(1, 0)).r;
    let c = load0(base + vec2<i32>(0, 1)).r;
    let d = load0(base + vec2<i32>(1, 1)).r;
    return vec4<f32>(min(min(a, b), min(c, d)), 0.0, 0.0, 0.0);
}

// tex0 = fog, tex1 = depth at the same resolution.
fn bilateral(p: vec2<i32>, dir: vec2<i32>) -> vec4<f32> {
    var weights = array<f32, 4>(0.383, 0.242, 0.061, 0.006);
    let center_depth = load1(p).r;
    var sum = load0(p) * weights[0];
    var total = weights[0];
    for (var i = 1; i < 4; i = i + 1) {
        for (var s = -1; s <= 1; s = s + 2) {
            let q = p + dir * (i * s);
            let w = weights[i] * exp(-abs(load1(q).r - center_depth) * DEPTH_SHARPNESS);
            sum = sum + load0(q) * w;
            total = total + w;
        }
    }
    return sum / total;
}

@fragment
fn fs_blur_horizontal(in: VertexOutput) -> @location(0) vec4<f32> {
    return bilateral(vec2<i32>(in.position.xy), vec2<i32>(1, 0));
}

@fragment
fn fs_blur_vertical(in: VertexOutput) -> @location(0) vec4<f32> {
    return bilateral(vec2<i32>(in.position.xy), vec2<i32>(0, 1));
}

// tex0 = low-res fog, tex1 = low-res depth, tex2 = full-res camera depth.
@fragment
fn fs_upsample(in: VertexOutput) -> @location(0) vec4<f32> {
    let full_depth = load2(vec2<i32>(in.position.xy)).r;
    let low = in.uv * vec2<f32>(textureDimensions(tex0)) - vec2<f32>(0.5);
    let base = vec2<i32>(floor(low));
    var sum = vec4<f32>(0.0);
    var total = 0.0;
    for (var y = 0; y < 2; y = y + 1) {
        for (var x = 0; x < 2; x = x + 1) {
            let q = base + vec2<i32>(x, y);
            let w = 1.0 / (0.0001 + abs(load1(q).r - full_depth));
            sum = sum + load0(q) * w;
            total = total + w;
        }
    }
    return sum / total;
}

// tex0 = jitter tile, tex1 = history.
@fragment
fn fs_temporal_reproject(in: VertexOutput) -> @location(0) vec4<f32> {
    let p = vec2<i32>(in.position.xy);
    let k = max(i32(globals.params.x), 1);
    let cell = vec2<i32>(globals.pass_offset.xy);
    let current = load0(p / k);
    let history = load1(p);
    if (all(p % k == cell)) {
        return current;
    }
    let blend = globals.params.y / f32(k * k);
    return mix(history, current, blend);
}

// tex0 = _BlitSource, tex1 = _BlitAdd.
@fragment
fn fs_composite(in: VertexOutput) -> @location(0) vec4<f32> {
    let p = vec2<i32>(in.position.xy);
    let scene = load0(p);
    let fog = load1(p);
    let src_factor = 1.0 - clamp(fog.a, 0.0, 1.0);
    return vec4<f32>(scene.rgb * src_factor + fog.rgb, 1.0);
}
"#;

/// One compiled pass variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    DownsampleDepth,
    BlurHorizontal,
    BlurVertical,
    Upsample,
    TemporalReproject,
    Composite,
}

impl PassKind {
    pub const ALL: [PassKind; 6] = [
        Self::DownsampleDepth,
        Self::BlurHorizontal,
        Self::BlurVertical,
        Self::Upsample,
        Self::TemporalReproject,
        Self::Composite,
    ];

    pub fn fragment_entry(self) -> &'static str {
        match self {
            Self::DownsampleDepth => "fs_downsample_depth",
            Self::BlurHorizontal => "fs_blur_horizontal",
            Self::BlurVertical => "fs_blur_vertical",
            Self::Upsample => "fs_upsample",
            Self::TemporalReproject => "fs_temporal_reproject",
            Self::Composite => "fs_composite",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DownsampleDepth => "fog-downsample-depth",
            Self::BlurHorizontal => "fog-blur-h",
            Self::BlurVertical => "fog-blur-v",
            Self::Upsample => "fog-upsample",
            Self::TemporalReproject => "fog-temporal-reproject",
            Self::Composite => "fog-composite",
        }
    }
}

impl From<FogPass> for PassKind {
    fn from(pass: FogPass) -> Self {
        match pass {
            FogPass::DownsampleDepth => Self::DownsampleDepth,
            FogPass::Blur {
                axis: BlurAxis::Horizontal,
                ..
            } => Self::BlurHorizontal,
            FogPass::Blur {
                axis: BlurAxis::Vertical,
                ..
            } => Self::BlurVertical,
            FogPass::Upsample { .. } => Self::Upsample,
            FogPass::TemporalReproject => Self::TemporalReproject,
            FogPass::Composite => Self::Composite,
        }
    }
}

/// Layout of group 0: the fog globals uniform.
pub fn create_globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("fog-globals-bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(
                    std::mem::size_of::<FogGlobalsUniform>() as u64,
                ),
            },
            count: None,
        }],
    })
}

/// Layout of group 1: [`PASS_TEXTURE_SLOTS`] unfilterable float textures.
pub fn create_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..PASS_TEXTURE_SLOTS as u32)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("fog-pass-textures-bgl"),
        entries: &entries,
    })
}

/// Create a full-screen pipeline for `kind` writing `target_format`.
pub fn create_pass_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    kind: PassKind,
    target_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(kind.label()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(kind.fragment_entry()),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}
