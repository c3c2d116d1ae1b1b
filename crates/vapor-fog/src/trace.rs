//! A [`CommandRecorder`] that records commands instead of executing them.
//!
//! Used to inspect exactly what the pipeline issues for a frame: which textures
//! it creates, what it binds, and the order of its passes.

use std::collections::HashMap;

use glam::Vec4;

use crate::binding::ShaderBinding;
use crate::error::FogError;
use crate::recorder::{CommandRecorder, FogPass, TextureDesc, TextureId, TextureLifetime};

/// One recorded call.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTexture { id: TextureId, desc: TextureDesc },
    ReleaseTexture(TextureId),
    SetGlobalTexture { binding: ShaderBinding, texture: TextureId },
    SetGlobalFloat { binding: ShaderBinding, value: f32 },
    SetGlobalVector { binding: ShaderBinding, value: Vec4 },
    SetKeyword { keyword: String, enabled: bool },
    SetRenderTarget(TextureId),
    ClearRenderTarget { target: TextureId, color: [f32; 4] },
    Blit {
        source: Option<TextureId>,
        target: TextureId,
        pass: FogPass,
    },
    CopyTexture { source: TextureId, target: TextureId },
    /// A volume draw into the bound target.
    Draw { target: TextureId, label: String },
}

/// Records every call in order and validates handles like a real backend would.
#[derive(Debug, Default)]
pub struct CommandTrace {
    commands: Vec<Command>,
    textures: HashMap<TextureId, TextureDesc>,
    next_id: u32,
    bound_target: Option<TextureId>,
    fail_label: Option<&'static str>,
}

impl CommandTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an externally owned texture, such as the camera's colour or depth.
    /// Not recorded as a command.
    pub fn import_texture(
        &mut self,
        label: &'static str,
        size: (u32, u32),
        format: wgpu::TextureFormat,
    ) -> TextureId {
        let id = self.allocate_id();
        self.textures
            .insert(id, TextureDesc::persistent(label, size, format));
        id
    }

    /// Make every later `create_texture` with this label fail.
    pub fn fail_texture_creation(&mut self, label: &'static str) {
        self.fail_label = Some(label);
    }

    /// Record a volume draw into the bound target.
    pub fn draw(&mut self, label: impl Into<String>) -> Result<(), FogError> {
        let target = self.bound_target.ok_or(FogError::NoRenderTarget)?;
        self.commands.push(Command::Draw {
            target,
            label: label.into(),
        });
        Ok(())
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Forget recorded commands. Live textures are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn bound_target(&self) -> Option<TextureId> {
        self.bound_target
    }

    /// Description of a live texture.
    pub fn desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&id)
    }

    /// Number of live textures with the given lifetime.
    pub fn live_textures(&self, lifetime: TextureLifetime) -> usize {
        self.textures
            .values()
            .filter(|d| d.lifetime == lifetime)
            .count()
    }

    /// Texture created under `label` in the recorded stream, newest first.
    pub fn created(&self, label: &str) -> Option<TextureId> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::CreateTexture { id, desc } if desc.label == label => Some(*id),
            _ => None,
        })
    }

    /// Most recent texture bound under `binding`.
    pub fn global_texture(&self, binding: ShaderBinding) -> Option<TextureId> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::SetGlobalTexture { binding: b, texture } if *b == binding => Some(*texture),
            _ => None,
        })
    }

    /// Most recent float set under `binding`.
    pub fn global_float(&self, binding: ShaderBinding) -> Option<f32> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::SetGlobalFloat { binding: b, value } if *b == binding => Some(*value),
            _ => None,
        })
    }

    /// Most recent vector set under `binding`.
    pub fn global_vector(&self, binding: ShaderBinding) -> Option<Vec4> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::SetGlobalVector { binding: b, value } if *b == binding => Some(*value),
            _ => None,
        })
    }

    /// Most recent state of `keyword`.
    pub fn keyword(&self, keyword: &str) -> Option<bool> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::SetKeyword { keyword: k, enabled } if k == keyword => Some(*enabled),
            _ => None,
        })
    }

    /// Recorded passes in order.
    pub fn blits(&self) -> impl Iterator<Item = (Option<TextureId>, TextureId, FogPass)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::Blit {
                source,
                target,
                pass,
            } => Some((*source, *target, *pass)),
            _ => None,
        })
    }

    /// Targets of recorded volume draws, in order.
    pub fn draw_targets(&self) -> Vec<TextureId> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    fn allocate_id(&mut self) -> TextureId {
        let id = TextureId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    fn check(&self, id: TextureId) -> Result<(u32, u32), FogError> {
        self.texture_size(id).ok_or(FogError::UnknownTexture(id))
    }
}

impl CommandRecorder for CommandTrace {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, FogError> {
        if self.fail_label == Some(desc.label) {
            return Err(FogError::TextureCreation {
                label: desc.label,
                width: desc.width,
                height: desc.height,
                reason: "injected failure".into(),
            });
        }
        let id = self.allocate_id();
        self.textures.insert(id, desc.clone());
        self.commands.push(Command::CreateTexture {
            id,
            desc: desc.clone(),
        });
        Ok(id)
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            if self.bound_target == Some(texture) {
                self.bound_target = None;
            }
            self.commands.push(Command::ReleaseTexture(texture));
        }
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(TextureDesc::size)
    }

    fn set_global_texture(&mut self, binding: ShaderBinding, texture: TextureId) {
        self.commands
            .push(Command::SetGlobalTexture { binding, texture });
    }

    fn set_global_float(&mut self, binding: ShaderBinding, value: f32) {
        self.commands.push(Command::SetGlobalFloat { binding, value });
    }

    fn set_global_vector(&mut self, binding: ShaderBinding, value: Vec4) {
        self.commands.push(Command::SetGlobalVector { binding, value });
    }

    fn set_keyword(&mut self, keyword: &str, enabled: bool) {
        self.commands.push(Command::SetKeyword {
            keyword: keyword.to_owned(),
            enabled,
        });
    }

    fn set_render_target(&mut self, target: TextureId) -> Result<(), FogError> {
        self.check(target)?;
        self.bound_target = Some(target);
        self.commands.push(Command::SetRenderTarget(target));
        Ok(())
    }

    fn clear_render_target(&mut self, color: [f32; 4]) {
        if let Some(target) = self.bound_target {
            self.commands.push(Command::ClearRenderTarget { target, color });
        }
    }

    fn blit(
        &mut self,
        source: Option<TextureId>,
        target: TextureId,
        pass: FogPass,
    ) -> Result<(), FogError> {
        if let Some(source) = source {
            self.check(source)?;
        }
        self.check(target)?;
        self.commands.push(Command::Blit {
            source,
            target,
            pass,
        });
        Ok(())
    }

    fn copy_texture(&mut self, source: TextureId, target: TextureId) -> Result<(), FogError> {
        let from = self.check(source)?;
        let to = self.check(target)?;
        if from != to {
            return Err(FogError::CopySizeMismatch { from, to });
        }
        self.commands.push(Command::CopyTexture { source, target });
        Ok(())
    }
}
