//! Synthetic camera inputs: a ground plane under a sky gradient.

use glam::{Mat4, Vec3};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

const FAR: f32 = 200.0;
const NEAR: f32 = 0.1;
const SKY_ZENITH: Vec3 = Vec3::new(0.18, 0.32, 0.62);
const SKY_HORIZON: Vec3 = Vec3::new(0.72, 0.80, 0.90);
const GROUND_A: Vec3 = Vec3::new(0.22, 0.30, 0.16);
const GROUND_B: Vec3 = Vec3::new(0.30, 0.36, 0.20);

/// Camera placement for the demo.
#[derive(Clone, Copy, Debug)]
pub struct SceneCamera {
    pub position: Vec3,
    pub view_projection: Mat4,
}

impl SceneCamera {
    /// Camera a few metres above the ground, looking slightly down the -Z axis.
    pub fn new(width: u32, height: u32) -> Self {
        let position = Vec3::new(0.0, 2.5, 0.0);
        let view = Mat4::look_to_rh(position, Vec3::new(0.0, -0.12, -1.0), Vec3::Y);
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let proj = Mat4::perspective_rh(60f32.to_radians(), aspect, NEAR, FAR);
        Self {
            position,
            view_projection: proj * view,
        }
    }
}

/// CPU-side colour and depth images for the camera.
pub struct SceneImages {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8.
    pub color: Vec<u8>,
    /// One f32 per pixel, wgpu clip-space depth in [0, 1].
    pub depth: Vec<f32>,
}

impl SceneImages {
    /// Ray-cast the ground plane `y = 0` for every pixel.
    pub fn render(camera: &SceneCamera, width: u32, height: u32) -> Self {
        let inv = camera.view_projection.inverse();
        let mut color = Vec::with_capacity((width * height * 4) as usize);
        let mut depth = Vec::with_capacity((width * height) as usize);

        for y in 0..height {
            for x in 0..width {
                let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                let ndc_y = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;
                let far = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
                let dir = (far - camera.position).normalize_or_zero();

                let (rgb, z) = match ground_hit(camera.position, dir) {
                    Some(hit) => {
                        let clip = camera.view_projection * hit.extend(1.0);
                        let z = (clip.z / clip.w).clamp(0.0, 1.0);
                        (checker(hit), z)
                    }
                    None => (sky(dir), 1.0),
                };

                color.extend(rgb.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
                color.push(255);
                depth.push(z);
            }
        }

        Self {
            width,
            height,
            color,
            depth,
        }
    }

    /// Create the GPU textures for these images and upload them.
    pub fn create_textures(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> (wgpu::Texture, wgpu::Texture) {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene-color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene-depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.upload_color(queue, &color);
        write_texture(queue, &depth, bytemuck::cast_slice(&self.depth), 4, size);
        (color, depth)
    }

    /// Restore the unfogged colour. The compositor overwrites it every frame.
    pub fn upload_color(&self, queue: &wgpu::Queue, texture: &wgpu::Texture) {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        write_texture(queue, texture, &self.color, 4, size);
    }
}

fn write_texture(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    data: &[u8],
    bytes_per_pixel: u32,
    size: wgpu::Extent3d,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * bytes_per_pixel),
            rows_per_image: Some(size.height),
        },
        size,
    );
}

fn ground_hit(origin: Vec3, dir: Vec3) -> Option<Vec3> {
    if dir.y >= -1e-4 {
        return None;
    }
    let t = -origin.y / dir.y;
    (t < FAR * 0.95).then(|| origin + dir * t)
}

fn checker(hit: Vec3) -> Vec3 {
    let cell = (hit.x.div_euclid(2.0) + hit.z.div_euclid(2.0)) as i32;
    if cell.rem_euclid(2) == 0 {
        GROUND_A
    } else {
        GROUND_B
    }
}

fn sky(dir: Vec3) -> Vec3 {
    let t = dir.y.clamp(0.0, 1.0).sqrt();
    SKY_HORIZON.lerp(SKY_ZENITH, t)
}
