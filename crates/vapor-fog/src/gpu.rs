//! wgpu implementation of [`CommandRecorder`].
//!
//! [`GpuRecorder`] owns a texture table, the fog globals uniform and a cache of
//! pass pipelines keyed by pass kind and target format. Commands are encoded
//! into a lazily created command encoder and submitted by [`GpuRecorder::submit`].

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use glam::Vec4;

use crate::binding::{
    BLIT_ADD, BLIT_SOURCE, CAMERA_DEPTH_TEXTURE, MOTION_INFLUENCE, PASS_OFFSET, ShaderBinding,
    TEMPORAL_BUFFER, TEMPORAL_RENDER_SIZE, TEMPORAL_RENDERING_KEYWORD, TEMPORAL_TARGET, TILE_SIZE,
};
use crate::error::FogError;
use crate::gpu_passes::{
    FogGlobalsUniform, PASS_SHADER_SOURCE, PASS_TEXTURE_SLOTS, PassKind, create_globals_layout,
    create_pass_pipeline, create_texture_layout,
};
use crate::recorder::{CommandRecorder, FogPass, TextureDesc, TextureId};
use crate::volume::source_fingerprint;

/// Error type for device setup and readback.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Mapping a readback buffer failed.
    #[error("texture readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    /// Readback only supports 8-bit four-channel formats.
    #[error("cannot read back a {0:?} texture")]
    UnsupportedReadback(wgpu::TextureFormat),

    #[error(transparent)]
    Fog(#[from] FogError),
}

/// Request a headless device and queue.
pub async fn request_device() -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|_| GpuError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!(
        "Selected GPU: {} ({:?}, {:?})",
        info.name,
        info.backend,
        info.device_type
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("vapor-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        })
        .await?;
    Ok((device, queue))
}

/// [`request_device`] driven to completion with `pollster`.
pub fn request_device_blocking() -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    pollster::block_on(request_device())
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

#[derive(Default)]
struct GlobalState {
    textures: HashMap<u32, TextureId>,
    floats: HashMap<u32, f32>,
    vectors: HashMap<u32, Vec4>,
    keywords: HashSet<String>,
}

impl GlobalState {
    fn texture(&self, binding: ShaderBinding) -> Option<TextureId> {
        self.textures.get(&binding.id()).copied()
    }

    fn uniform(&self) -> FogGlobalsUniform {
        let vector = |b: ShaderBinding| self.vectors.get(&b.id()).copied().unwrap_or(Vec4::ZERO);
        let float = |b: ShaderBinding| self.floats.get(&b.id()).copied().unwrap_or(0.0);
        let temporal = self.keywords.contains(TEMPORAL_RENDERING_KEYWORD);
        FogGlobalsUniform {
            pass_offset: vector(PASS_OFFSET).to_array(),
            temporal_render_size: vector(TEMPORAL_RENDER_SIZE).to_array(),
            params: [
                float(TILE_SIZE),
                float(MOTION_INFLUENCE),
                if temporal { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

/// Records fog commands with wgpu.
pub struct GpuRecorder {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureId, GpuTexture>,
    next_id: u32,
    globals: GlobalState,
    globals_buffer: wgpu::Buffer,
    globals_layout: wgpu::BindGroupLayout,
    globals_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    pass_layout: wgpu::PipelineLayout,
    pass_shader: wgpu::ShaderModule,
    pass_fingerprint: u64,
    pipelines: HashMap<(PassKind, wgpu::TextureFormat), wgpu::RenderPipeline>,
    fallback_view: wgpu::TextureView,
    encoder: Option<wgpu::CommandEncoder>,
    bound_target: Option<TextureId>,
}

const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

impl GpuRecorder {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let globals_layout = create_globals_layout(device);
        let texture_layout = create_texture_layout(device);
        let pass_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fog-pass-layout"),
            bind_group_layouts: &[&globals_layout, &texture_layout],
            immediate_size: 0,
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fog-globals"),
            size: std::mem::size_of::<FogGlobalsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fog-globals-bg"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let fallback = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("fog-fallback"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TextureDesc::FOG_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_view = fallback.create_view(&wgpu::TextureViewDescriptor::default());

        let pass_shader = create_pass_module(device, PASS_SHADER_SOURCE);

        Self {
            device: device.clone(),
            queue: queue.clone(),
            textures: HashMap::new(),
            next_id: 0,
            globals: GlobalState::default(),
            globals_buffer,
            globals_layout,
            globals_bind_group,
            texture_layout,
            pass_layout,
            pass_shader,
            pass_fingerprint: source_fingerprint(PASS_SHADER_SOURCE),
            pipelines: HashMap::new(),
            fallback_view,
            encoder: None,
            bound_target: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Layout of group 0, for volume pipelines that read the fog globals.
    pub fn globals_layout(&self) -> &wgpu::BindGroupLayout {
        &self.globals_layout
    }

    /// Register a host-owned texture. It must allow `TEXTURE_BINDING`, and
    /// `RENDER_ATTACHMENT | COPY_SRC` when used as the camera colour target.
    pub fn import_texture(&mut self, texture: wgpu::Texture) -> TextureId {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let entry = GpuTexture {
            format: texture.format(),
            size: (texture.width(), texture.height()),
            texture,
            view,
        };
        let id = TextureId::from_raw(self.next_id);
        self.next_id += 1;
        self.textures.insert(id, entry);
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(&id).map(|t| &t.texture)
    }

    pub fn texture_view(&self, id: TextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(&id).map(|t| &t.view)
    }

    /// View of the texture currently bound under `binding`.
    pub fn global_texture_view(&self, binding: ShaderBinding) -> Option<&wgpu::TextureView> {
        self.globals
            .texture(binding)
            .and_then(|id| self.texture_view(id))
    }

    pub fn bound_target(&self) -> Option<TextureId> {
        self.bound_target
    }

    pub fn bound_target_format(&self) -> Option<wgpu::TextureFormat> {
        self.bound_target
            .and_then(|id| self.textures.get(&id))
            .map(|t| t.format)
    }

    /// Replace the pass shader source. Cached pipelines are rebuilt only when
    /// the source fingerprint changes; returns whether it did.
    pub fn set_pass_shader(&mut self, source: impl Into<Cow<'static, str>>) -> bool {
        let source = source.into();
        let fingerprint = source_fingerprint(&source);
        if fingerprint == self.pass_fingerprint {
            return false;
        }
        self.pass_shader = create_pass_module(&self.device, &source);
        self.pass_fingerprint = fingerprint;
        self.pipelines.clear();
        log::debug!("Fog pass shader replaced, pipeline cache cleared");
        true
    }

    /// Number of pass pipelines compiled so far.
    pub fn cached_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// Compile every pass for `format` ahead of the first frame.
    pub fn warm_pipelines(&mut self, format: wgpu::TextureFormat) {
        for kind in PassKind::ALL {
            self.pipeline(kind, format);
        }
    }

    /// Begin a render pass into the bound target for a volume draw.
    ///
    /// Group 0 is set to the fog globals.
    pub fn begin_volume_pass(&mut self, label: &str) -> Result<wgpu::RenderPass<'_>, FogError> {
        let target = self.bound_target.ok_or(FogError::NoRenderTarget)?;
        let view = &self
            .textures
            .get(&target)
            .ok_or(FogError::UnknownTexture(target))?
            .view;
        let encoder = active_encoder(&mut self.encoder, &self.device);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(color_attachment(view, wgpu::LoadOp::Load))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        Ok(pass)
    }

    /// Upload the globals and submit everything recorded so far.
    pub fn submit(&mut self) -> Option<wgpu::SubmissionIndex> {
        let uniform = self.globals.uniform();
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[uniform]));
        let encoder = self.encoder.take()?;
        Some(self.queue.submit(Some(encoder.finish())))
    }

    /// Read an 8-bit four-channel texture back as tightly packed RGBA rows.
    pub fn read_texture_rgba8(&mut self, id: TextureId) -> Result<Vec<u8>, GpuError> {
        let entry = self
            .textures
            .get(&id)
            .ok_or(FogError::UnknownTexture(id))?;
        let is_bgra = match entry.format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            other => return Err(GpuError::UnsupportedReadback(other)),
        };
        let (width, height) = entry.size;
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fog-readback"),
            size: u64::from(padded * height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let encoder = active_encoder(&mut self.encoder, &self.device);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            extent(entry.size),
        );
        self.submit();

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        rx.recv()
            .map_err(|_| GpuError::Readback(wgpu::BufferAsyncError))??;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in 0..height {
            let start = (row * padded) as usize;
            let row_data = &mapped[start..start + unpadded as usize];
            if is_bgra {
                for chunk in row_data.chunks_exact(4) {
                    pixels.extend_from_slice(&[chunk[2], chunk[1], chunk[0], chunk[3]]);
                }
            } else {
                pixels.extend_from_slice(row_data);
            }
        }
        drop(mapped);
        buffer.unmap();
        Ok(pixels)
    }

    fn pipeline(&mut self, kind: PassKind, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        self.pipelines
            .entry((kind, format))
            .or_insert_with(|| {
                log::debug!("Compiling fog pass {:?} for {:?}", kind, format);
                create_pass_pipeline(
                    &self.device,
                    &self.pass_shader,
                    &self.pass_layout,
                    kind,
                    format,
                )
            })
            .clone()
    }

    fn pass_inputs(&self, source: Option<TextureId>, pass: FogPass) -> [Option<TextureId>; 3] {
        let global = |binding| self.globals.texture(binding);
        match pass {
            FogPass::DownsampleDepth => [source, None, None],
            FogPass::Blur { tier, .. } => [source, global(tier.depth_binding()), None],
            FogPass::Upsample { from } => [
                source,
                global(from.depth_binding()),
                global(CAMERA_DEPTH_TEXTURE),
            ],
            FogPass::TemporalReproject => [global(TEMPORAL_TARGET), global(TEMPORAL_BUFFER), None],
            FogPass::Composite => [global(BLIT_SOURCE).or(source), global(BLIT_ADD), None],
        }
    }

    fn entry(&self, id: TextureId) -> Result<&GpuTexture, FogError> {
        self.textures.get(&id).ok_or(FogError::UnknownTexture(id))
    }
}

impl CommandRecorder for GpuRecorder {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, FogError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(FogError::TextureCreation {
                label: desc.label,
                width: desc.width,
                height: desc.height,
                reason: format!("exceeds device limit {max}"),
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: extent(desc.size()),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: TEXTURE_USAGE,
            view_formats: &[],
        });
        log::trace!("Created {} {}x{}", desc.label, desc.width, desc.height);
        Ok(self.import_texture(texture))
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() && self.bound_target == Some(texture) {
            self.bound_target = None;
        }
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| t.size)
    }

    fn set_global_texture(&mut self, binding: ShaderBinding, texture: TextureId) {
        self.globals.textures.insert(binding.id(), texture);
    }

    fn set_global_float(&mut self, binding: ShaderBinding, value: f32) {
        self.globals.floats.insert(binding.id(), value);
    }

    fn set_global_vector(&mut self, binding: ShaderBinding, value: Vec4) {
        self.globals.vectors.insert(binding.id(), value);
    }

    fn set_keyword(&mut self, keyword: &str, enabled: bool) {
        if enabled {
            self.globals.keywords.insert(keyword.to_owned());
        } else {
            self.globals.keywords.remove(keyword);
        }
    }

    fn set_render_target(&mut self, target: TextureId) -> Result<(), FogError> {
        self.entry(target)?;
        self.bound_target = Some(target);
        Ok(())
    }

    fn clear_render_target(&mut self, color: [f32; 4]) {
        let Some(entry) = self.bound_target.and_then(|id| self.textures.get(&id)) else {
            return;
        };
        let encoder = active_encoder(&mut self.encoder, &self.device);
        let clear = wgpu::Color {
            r: f64::from(color[0]),
            g: f64::from(color[1]),
            b: f64::from(color[2]),
            a: f64::from(color[3]),
        };
        let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fog-clear"),
            color_attachments: &[Some(color_attachment(&entry.view, wgpu::LoadOp::Clear(clear)))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn blit(
        &mut self,
        source: Option<TextureId>,
        target: TextureId,
        pass: FogPass,
    ) -> Result<(), FogError> {
        let kind = PassKind::from(pass);
        let format = self.entry(target)?.format;
        let pipeline = self.pipeline(kind, format);

        let bind_group = {
            let mut views = Vec::with_capacity(PASS_TEXTURE_SLOTS);
            for input in self.pass_inputs(source, pass) {
                views.push(match input {
                    Some(id) => &self.entry(id)?.view,
                    None => &self.fallback_view,
                });
            }
            let entries: Vec<wgpu::BindGroupEntry> = views
                .iter()
                .enumerate()
                .map(|(binding, view)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                })
                .collect();
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kind.label()),
                layout: &self.texture_layout,
                entries: &entries,
            })
        };

        let target_view = &self
            .textures
            .get(&target)
            .ok_or(FogError::UnknownTexture(target))?
            .view;
        let encoder = active_encoder(&mut self.encoder, &self.device);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(kind.label()),
            color_attachments: &[Some(color_attachment(
                target_view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            ))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
        render_pass.set_bind_group(1, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }

    fn copy_texture(&mut self, source: TextureId, target: TextureId) -> Result<(), FogError> {
        let from = self
            .textures
            .get(&source)
            .ok_or(FogError::UnknownTexture(source))?;
        let to = self
            .textures
            .get(&target)
            .ok_or(FogError::UnknownTexture(target))?;
        if from.size != to.size {
            return Err(FogError::CopySizeMismatch {
                from: from.size,
                to: to.size,
            });
        }
        let encoder = active_encoder(&mut self.encoder, &self.device);
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &from.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &to.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            extent(from.size),
        );
        Ok(())
    }
}

fn active_encoder<'a>(
    encoder: &'a mut Option<wgpu::CommandEncoder>,
    device: &wgpu::Device,
) -> &'a mut wgpu::CommandEncoder {
    encoder.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fog-encoder"),
        })
    })
}

fn color_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPassColorAttachment<'_> {
    wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    }
}

fn create_pass_module(device: &wgpu::Device, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fog-pass-shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_owned())),
    })
}

fn extent((width, height): (u32, u32)) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Create a test GPU device and queue. Returns `None` if no GPU is available.
#[cfg(test)]
pub(crate) fn create_test_device_queue() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;

        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: Default::default(),
                ..Default::default()
            })
            .await
            .ok()
    })
}
