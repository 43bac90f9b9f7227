//! Per-pass state-binding descriptors.
//!
//! A [`PassDescriptor`] lists everything a pass touches: the program, the
//! resources bound at each sampler slot and the attachments it writes. The
//! pipeline controller applies the descriptor when a pass begins and tears the
//! bindings down again when it ends.

use crate::backend::{ProgramHandle, TextureHandle, VolumeHandle};
use crate::error::{PipelineError, Result};

/// Resource bound at a sampler slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingResource {
    /// A 2D attachment.
    Texture(TextureHandle),
    /// The voxel volume, either the whole mip chain or one level.
    Volume {
        volume: VolumeHandle,
        mip: Option<u32>,
    },
}

/// A resource bound at a fixed slot ("texture unit").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    pub slot: u32,
    pub resource: BindingResource,
}

/// Where a pass writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutput {
    /// Offscreen attachments, in color-output order.
    Target {
        color: Vec<TextureHandle>,
        depth: Option<TextureHandle>,
    },
    /// The presentation surface (with its depth buffer).
    Screen,
}

/// Everything one pass binds and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub label: String,
    pub program: ProgramHandle,
    pub bindings: Vec<TextureBinding>,
    pub output: PassOutput,
    /// Clear color for color outputs; `None` keeps previous contents.
    pub clear_color: Option<[f32; 4]>,
}

impl PassDescriptor {
    /// Creates a pass writing `output` with no bindings.
    pub fn new(label: impl Into<String>, program: ProgramHandle, output: PassOutput) -> Self {
        Self {
            label: label.into(),
            program,
            bindings: Vec::new(),
            output,
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
        }
    }

    /// Binds a 2D attachment at `slot`.
    #[must_use]
    pub fn bind_texture(mut self, slot: u32, texture: TextureHandle) -> Self {
        self.bindings.push(TextureBinding {
            slot,
            resource: BindingResource::Texture(texture),
        });
        self
    }

    /// Binds the voxel volume at `slot`.
    #[must_use]
    pub fn bind_volume(mut self, slot: u32, volume: VolumeHandle, mip: Option<u32>) -> Self {
        self.bindings.push(TextureBinding {
            slot,
            resource: BindingResource::Volume { volume, mip },
        });
        self
    }

    /// Sets the clear color.
    #[must_use]
    pub fn with_clear_color(mut self, color: Option<[f32; 4]>) -> Self {
        self.clear_color = color;
        self
    }

    /// Slots this pass binds.
    #[must_use]
    pub fn slots(&self) -> Vec<u32> {
        self.bindings.iter().map(|b| b.slot).collect()
    }

    /// The texture bound at `slot`, if it is a 2D attachment.
    #[must_use]
    pub fn texture_at(&self, slot: u32) -> Option<TextureHandle> {
        self.bindings.iter().find_map(|b| match b.resource {
            BindingResource::Texture(t) if b.slot == slot => Some(t),
            _ => None,
        })
    }

    /// Textures written by this pass.
    #[must_use]
    pub fn written_textures(&self) -> Vec<TextureHandle> {
        match &self.output {
            PassOutput::Target { color, depth } => {
                color.iter().copied().chain(depth.iter().copied()).collect()
            }
            PassOutput::Screen => Vec::new(),
        }
    }

    /// Rejects duplicate slots and passes that sample what they write.
    pub fn validate(&self) -> Result<()> {
        for (i, b) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|o| o.slot == b.slot) {
                return Err(PipelineError::Backend(format!(
                    "pass '{}' binds slot {} twice",
                    self.label, b.slot
                )));
            }
        }
        let written = self.written_textures();
        for b in &self.bindings {
            if let BindingResource::Texture(t) = b.resource {
                if written.contains(&t) {
                    return Err(PipelineError::FeedbackLoop {
                        pass: self.label.clone(),
                        texture: t,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(color: u32) -> PassOutput {
        PassOutput::Target {
            color: vec![TextureHandle(color)],
            depth: None,
        }
    }

    #[test]
    fn test_descriptor_slots() {
        let pass = PassDescriptor::new("Blur", ProgramHandle(0), target(9))
            .bind_texture(0, TextureHandle(3))
            .bind_texture(1, TextureHandle(4));
        assert_eq!(pass.slots(), vec![0, 1]);
        assert_eq!(pass.texture_at(1), Some(TextureHandle(4)));
        assert!(pass.validate().is_ok());
    }

    #[test]
    fn test_feedback_loop_rejected() {
        let pass =
            PassDescriptor::new("Blur", ProgramHandle(0), target(9)).bind_texture(0, TextureHandle(9));
        assert!(matches!(
            pass.validate(),
            Err(PipelineError::FeedbackLoop { .. })
        ));
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let pass = PassDescriptor::new("Final", ProgramHandle(0), target(9))
            .bind_texture(0, TextureHandle(1))
            .bind_texture(0, TextureHandle(2));
        assert!(pass.validate().is_err());
    }

    #[test]
    fn test_screen_output_writes_no_textures() {
        let pass = PassDescriptor::new("Forward", ProgramHandle(0), PassOutput::Screen);
        assert!(pass.written_textures().is_empty());
    }
}
