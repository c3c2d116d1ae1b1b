//! A bounded height-fog volume rasterized through [`GpuRecorder`].

use std::cell::RefCell;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use vapor_fog::{
    Aabb, FOG_GLOBALS_WGSL, FogError, FogVolume, Frustum, GpuRecorder, LightRecordGpu,
    VolumeDrawContext,
};

/// Volume shader body. [`fog_shader_source`] prepends the fog globals.
const HEIGHT_FOG_WGSL: &str = r#"
struct Volume {
    inv_view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    bounds_min: vec4<f32>,
    bounds_max: vec4<f32>,
    // x = density, y = height falloff, z = base height, w = light count
    params: vec4<f32>,
    albedo: vec4<f32>,
};

struct Light {
    position: vec4<f32>,
    color: vec4<f32>,
    attenuation: vec4<f32>,
    spot_direction: vec4<f32>,
    range_distance: vec4<f32>,
    flags: vec4<u32>,
};

@group(1) @binding(0) var<uniform> volume: Volume;
@group(1) @binding(1) var<storage, read> lights: array<Light>;
@group(1) @binding(2) var depth_tex: texture_2d<f32>;

const STEPS: i32 = 24;

@vertex
fn vs_main(@builtin(vertex_index) idx: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

fn light_at(light: Light, p: vec3<f32>) -> vec3<f32> {
    if light.flags.y == 1u {
        return light.color.rgb;
    }
    let to_light = light.position.xyz - p;
    let d2 = max(dot(to_light, to_light), 1e-4);
    let factor = d2 * light.attenuation.x;
    let smooth_factor = clamp(1.0 - factor * factor, 0.0, 1.0);
    var atten = smooth_factor * smooth_factor / d2;
    let cd = dot(light.spot_direction.xyz, to_light * inverseSqrt(d2));
    let spot = clamp(cd * light.attenuation.z + light.attenuation.w, 0.0, 1.0);
    atten = atten * spot * spot;
    return light.color.rgb * atten;
}

fn density_at(p: vec3<f32>) -> f32 {
    if any(p < volume.bounds_min.xyz) || any(p > volume.bounds_max.xyz) {
        return 0.0;
    }
    return volume.params.x * exp(-volume.params.y * max(p.y - volume.params.z, 0.0));
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let dims = vec2<i32>(textureDimensions(depth_tex));
    var px = vec2<i32>(frag.xy);
    if globals.params.z > 0.5 {
        let k = i32(globals.params.x);
        px = px * k + vec2<i32>(globals.pass_offset.xy);
    }
    px = clamp(px, vec2<i32>(0), dims - vec2<i32>(1));

    let depth = textureLoad(depth_tex, px, 0).r;
    let uv = (vec2<f32>(px) + 0.5) / vec2<f32>(dims);
    let ndc = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let world_h = volume.inv_view_proj * ndc;
    let end = world_h.xyz / world_h.w;

    let start = volume.camera_position.xyz;
    let segment = end - start;
    let step_len = length(segment) / f32(STEPS);
    let light_count = u32(volume.params.w);

    var transmittance = 1.0;
    var inscatter = vec3<f32>(0.0);
    for (var i = 0; i < STEPS; i = i + 1) {
        let p = start + segment * ((f32(i) + 0.5) / f32(STEPS));
        let sigma = density_at(p);
        if sigma <= 0.0 {
            continue;
        }
        var radiance = vec3<f32>(0.05);
        for (var l = 0u; l < light_count; l = l + 1u) {
            radiance = radiance + light_at(lights[l], p);
        }
        let absorbed = 1.0 - exp(-sigma * step_len);
        inscatter = inscatter + transmittance * absorbed * radiance * volume.albedo.rgb;
        transmittance = transmittance * (1.0 - absorbed);
    }

    return vec4<f32>(inscatter, 1.0 - transmittance);
}
"#;

/// Complete WGSL for the height-fog volume shader.
pub fn fog_shader_source() -> String {
    format!("{FOG_GLOBALS_WGSL}{HEIGHT_FOG_WGSL}")
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct VolumeUniform {
    inv_view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    bounds_min: [f32; 4],
    bounds_max: [f32; 4],
    params: [f32; 4],
    albedo: [f32; 4],
}

struct CachedPipeline {
    fingerprint: u64,
    format: wgpu::TextureFormat,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
}

/// Exponential height fog confined to a box.
pub struct HeightFogVolume {
    bounds: Aabb,
    density: f32,
    height_falloff: f32,
    base_height: f32,
    albedo: Vec3,
    pipeline: RefCell<Option<CachedPipeline>>,
}

impl HeightFogVolume {
    pub fn new(bounds: Aabb, density: f32, height_falloff: f32, base_height: f32) -> Self {
        Self {
            bounds,
            density,
            height_falloff,
            base_height,
            albedo: Vec3::splat(0.9),
            pipeline: RefCell::new(None),
        }
    }

    /// Pipeline and group-1 layout for the current shader and target format,
    /// rebuilt when either changes.
    fn pipeline(
        &self,
        ctx: &VolumeDrawContext<'_>,
        recorder: &GpuRecorder,
        format: wgpu::TextureFormat,
    ) -> (wgpu::BindGroupLayout, wgpu::RenderPipeline) {
        let fingerprint = ctx.fog_shader.fingerprint();
        let mut cache = self.pipeline.borrow_mut();
        if let Some(cached) = cache.as_ref()
            && cached.fingerprint == fingerprint
            && cached.format == format
        {
            return (cached.layout.clone(), cached.pipeline.clone());
        }

        tracing::debug!(
            "Compiling height fog pipeline '{}' for {:?}",
            ctx.fog_shader.label(),
            format
        );
        let device = recorder.device();
        let layout = create_volume_layout(device);
        let pipeline = create_volume_pipeline(device, recorder, &layout, ctx, format);
        *cache = Some(CachedPipeline {
            fingerprint,
            format,
            layout: layout.clone(),
            pipeline: pipeline.clone(),
        });
        (layout, pipeline)
    }

    fn uniform(&self, ctx: &VolumeDrawContext<'_>) -> VolumeUniform {
        VolumeUniform {
            inv_view_proj: ctx.camera.view_projection.inverse().to_cols_array_2d(),
            camera_position: ctx.camera.position.extend(1.0).to_array(),
            bounds_min: self.bounds.min.extend(0.0).to_array(),
            bounds_max: self.bounds.max.extend(0.0).to_array(),
            params: [
                self.density,
                self.height_falloff,
                self.base_height,
                ctx.lights.len() as f32,
            ],
            albedo: self.albedo.extend(1.0).to_array(),
        }
    }
}

impl FogVolume<GpuRecorder> for HeightFogVolume {
    fn cull(&self, _camera_position: Vec3, frustum: &Frustum) -> bool {
        !frustum.is_aabb_visible(&self.bounds)
    }

    fn draw(&self, ctx: &VolumeDrawContext<'_>, recorder: &mut GpuRecorder) -> Result<(), FogError> {
        use wgpu::util::DeviceExt;

        let format = recorder
            .bound_target_format()
            .ok_or(FogError::NoRenderTarget)?;
        let (layout, pipeline) = self.pipeline(ctx, recorder, format);

        let depth_view = recorder
            .global_texture_view(ctx.tier.depth_binding())
            .ok_or_else(|| FogError::VolumeDraw("depth for the active tier is not bound".into()))?;

        // Storage bindings cannot be empty.
        let mut lights = ctx.lights.to_gpu();
        if lights.is_empty() {
            lights.push(LightRecordGpu::zeroed());
        }

        let device = recorder.device();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("height-fog-volume"),
            contents: bytemuck::cast_slice(&[self.uniform(ctx)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("height-fog-lights"),
            contents: bytemuck::cast_slice(&lights),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("height-fog-bg"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
            ],
        });

        let mut pass = recorder.begin_volume_pass("height-fog")?;
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(1, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}

fn create_volume_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("height-fog-layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ],
    })
}

fn create_volume_pipeline(
    device: &wgpu::Device,
    recorder: &GpuRecorder,
    layout: &wgpu::BindGroupLayout,
    ctx: &VolumeDrawContext<'_>,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(ctx.fog_shader.label()),
        source: wgpu::ShaderSource::Wgsl(ctx.fog_shader.source().into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("height-fog-pipeline-layout"),
        bind_group_layouts: &[recorder.globals_layout(), layout],
        immediate_size: 0,
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("height-fog-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
