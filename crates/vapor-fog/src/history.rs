//! State that outlives a frame: the temporal history buffer and the jitter cursor.

use glam::{Vec2, Vec4};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use vapor_config::FogConfig;

use crate::error::FogError;
use crate::recorder::{CommandRecorder, TextureDesc, TextureId};
use crate::resources::labels;

/// The persistent full-resolution history buffer.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    texture: Option<TextureId>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a history texture of exactly `width` x `height`.
    ///
    /// Recreated when absent, released by the backend, or sized differently.
    /// Recreation discards the previous contents.
    pub fn ensure_sized<R: CommandRecorder + ?Sized>(
        &mut self,
        recorder: &mut R,
        width: u32,
        height: u32,
    ) -> Result<TextureId, FogError> {
        let desc = TextureDesc::persistent(labels::HISTORY, (width, height), TextureDesc::FOG_FORMAT);

        if let Some(texture) = self.texture {
            match recorder.texture_size(texture) {
                Some(size) if size == desc.size() => return Ok(texture),
                Some(size) => {
                    log::info!(
                        "Fog history resized {}x{} -> {}x{}",
                        size.0,
                        size.1,
                        desc.width,
                        desc.height
                    );
                    recorder.release_texture(texture);
                }
                None => log::info!("Fog history handle invalid, recreating"),
            }
            self.texture = None;
        }

        let texture = recorder.create_texture(&desc)?;
        log::info!("Created fog history {}x{}", desc.width, desc.height);
        self.texture = Some(texture);
        Ok(texture)
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Release the buffer if held.
    pub fn release<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R) {
        if let Some(texture) = self.texture.take() {
            recorder.release_texture(texture);
            log::debug!("Released fog history");
        }
    }
}

/// One frame's jitter: the kernel cell and a random sub-cell offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JitterSample {
    /// Round-robin cursor in `[0, kernel_size²)`.
    pub cursor: u32,
    pub kernel_size: u32,
    /// Random offset in `[0, kernel_size)` per axis.
    pub offset: Vec2,
}

impl JitterSample {
    /// Kernel cell `(cursor % k, cursor / k)`.
    pub fn cell(&self) -> (u32, u32) {
        (self.cursor % self.kernel_size, self.cursor / self.kernel_size)
    }

    /// `_PassOffset`: xy = cell, zw = random offset.
    pub fn pass_offset(&self) -> Vec4 {
        let (x, y) = self.cell();
        Vec4::new(x as f32, y as f32, self.offset.x, self.offset.y)
    }
}

/// Round-robin jitter cursor with an owned, explicitly seeded generator.
#[derive(Clone, Debug)]
pub struct JitterSequence {
    kernel_size: u32,
    cursor: u32,
    seed: u64,
    rng: Xoshiro256StarStar,
}

impl JitterSequence {
    pub fn new(kernel_size: u32, seed: u64) -> Self {
        Self {
            kernel_size: clamp_kernel(kernel_size),
            cursor: 0,
            seed,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
        }
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of distinct cells, `kernel_size²`.
    pub fn cell_count(&self) -> u32 {
        let k = u64::from(self.kernel_size);
        u32::try_from(k * k).unwrap_or(u32::MAX)
    }

    /// Change the kernel size. A different size restarts the sequence.
    pub fn set_kernel_size(&mut self, kernel_size: u32) {
        let kernel_size = clamp_kernel(kernel_size);
        if kernel_size != self.kernel_size {
            *self = Self::new(kernel_size, self.seed);
        }
    }

    /// Advance the cursor once and draw a fresh offset.
    pub fn advance(&mut self) -> JitterSample {
        self.cursor = (self.cursor + 1) % self.cell_count();
        let k = self.kernel_size as f32;
        let offset = Vec2::new(self.rng.gen_range(0.0..k), self.rng.gen_range(0.0..k));
        JitterSample {
            cursor: self.cursor,
            kernel_size: self.kernel_size,
            offset,
        }
    }
}

fn clamp_kernel(kernel_size: u32) -> u32 {
    kernel_size.clamp(FogConfig::MIN_KERNEL_SIZE, FogConfig::MAX_KERNEL_SIZE)
}

/// `_TemporalRenderSize`: xy = camera size / k, zw = reciprocal.
pub fn temporal_render_size(width: u32, height: u32, kernel_size: u32) -> Vec4 {
    let k = kernel_size.max(1) as f32;
    let w = width.max(1) as f32 / k;
    let h = height.max(1) as f32 / k;
    Vec4::new(w, h, 1.0 / w, 1.0 / h)
}

/// History buffer paired with its jitter cursor.
#[derive(Debug)]
pub struct TemporalHistory {
    pub buffer: HistoryBuffer,
    pub jitter: JitterSequence,
}

impl TemporalHistory {
    pub fn new(kernel_size: u32, seed: u64) -> Self {
        Self {
            buffer: HistoryBuffer::new(),
            jitter: JitterSequence::new(kernel_size, seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::TextureLifetime;
    use crate::trace::CommandTrace;
    use std::collections::HashSet;

    #[test]
    fn test_cursor_visits_every_cell_once() {
        for k in [2u32, 3, 4, 8] {
            let mut jitter = JitterSequence::new(k, 7);
            let n = k * k;
            let window: Vec<u32> = (0..n).map(|_| jitter.advance().cursor).collect();
            let unique: HashSet<u32> = window.iter().copied().collect();
            assert_eq!(unique.len() as u32, n, "kernel {k}");
            assert!(window.iter().all(|&c| c < n));

            let next: Vec<u32> = (0..n).map(|_| jitter.advance().cursor).collect();
            assert_eq!(window, next, "kernel {k} does not repeat");
        }
    }

    #[test]
    fn test_cursor_independent_of_seed() {
        let mut a = JitterSequence::new(4, 1);
        let mut b = JitterSequence::new(4, 2);
        for _ in 0..20 {
            let (sa, sb) = (a.advance(), b.advance());
            assert_eq!(sa.cursor, sb.cursor);
        }
    }

    #[test]
    fn test_offsets_reproducible_from_seed() {
        let mut a = JitterSequence::new(4, 99);
        let mut b = JitterSequence::new(4, 99);
        for _ in 0..10 {
            assert_eq!(a.advance(), b.advance());
        }
    }

    #[test]
    fn test_offsets_in_range() {
        let mut jitter = JitterSequence::new(3, 5);
        for _ in 0..100 {
            let s = jitter.advance();
            assert!((0.0..3.0).contains(&s.offset.x));
            assert!((0.0..3.0).contains(&s.offset.y));
        }
    }

    #[test]
    fn test_kernel_below_two_is_clamped() {
        assert_eq!(JitterSequence::new(0, 0).kernel_size(), 2);
        assert_eq!(JitterSequence::new(1, 0).cell_count(), 4);
    }

    #[test]
    fn test_oversized_kernel_is_clamped() {
        let mut jitter = JitterSequence::new(65536, 3);
        assert_eq!(jitter.kernel_size(), FogConfig::MAX_KERNEL_SIZE);
        assert_eq!(jitter.cell_count(), 256 * 256);
        assert_eq!(jitter.advance().cursor, 1);

        jitter.set_kernel_size(u32::MAX);
        assert_eq!(jitter.kernel_size(), 256);
        let sample = jitter.advance();
        assert!(sample.offset.x < 256.0 && sample.offset.y < 256.0);
    }

    #[test]
    fn test_kernel_change_resets_cursor() {
        let mut jitter = JitterSequence::new(4, 0);
        jitter.advance();
        jitter.advance();
        jitter.set_kernel_size(4);
        assert_eq!(jitter.cursor(), 2);
        jitter.set_kernel_size(3);
        assert_eq!(jitter.cursor(), 0);
        assert_eq!(jitter.kernel_size(), 3);
    }

    #[test]
    fn test_pass_offset_layout() {
        let sample = JitterSample {
            cursor: 6,
            kernel_size: 4,
            offset: Vec2::new(0.5, 3.25),
        };
        assert_eq!(sample.cell(), (2, 1));
        assert_eq!(sample.pass_offset(), Vec4::new(2.0, 1.0, 0.5, 3.25));
    }

    #[test]
    fn test_temporal_render_size() {
        let size = temporal_render_size(1280, 720, 4);
        assert_eq!(size, Vec4::new(320.0, 180.0, 1.0 / 320.0, 1.0 / 180.0));
    }

    #[test]
    fn test_history_reused_when_size_matches() {
        let mut trace = CommandTrace::new();
        let mut history = HistoryBuffer::new();
        let a = history.ensure_sized(&mut trace, 64, 32).unwrap();
        let b = history.ensure_sized(&mut trace, 64, 32).unwrap();
        assert_eq!(a, b);
        assert_eq!(trace.desc(a).map(|d| d.format), Some(TextureDesc::FOG_FORMAT));
    }

    #[test]
    fn test_history_recreated_on_resize() {
        let mut trace = CommandTrace::new();
        let mut history = HistoryBuffer::new();
        let a = history.ensure_sized(&mut trace, 64, 32).unwrap();
        let b = history.ensure_sized(&mut trace, 128, 64).unwrap();
        assert_ne!(a, b);
        assert_eq!(trace.texture_size(a), None);
        assert_eq!(trace.texture_size(b), Some((128, 64)));
        assert_eq!(trace.live_textures(TextureLifetime::Persistent), 1);
    }

    #[test]
    fn test_history_recreated_when_invalid() {
        let mut trace = CommandTrace::new();
        let mut history = HistoryBuffer::new();
        let a = history.ensure_sized(&mut trace, 16, 16).unwrap();
        trace.release_texture(a);
        let b = history.ensure_sized(&mut trace, 16, 16).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_history_release() {
        let mut trace = CommandTrace::new();
        let mut history = HistoryBuffer::new();
        history.ensure_sized(&mut trace, 16, 16).unwrap();
        history.release(&mut trace);
        assert!(history.texture().is_none());
        assert_eq!(trace.live_textures(TextureLifetime::Persistent), 0);
        history.release(&mut trace);
    }
}
