//! Render target and attachment descriptions.
//!
//! A [`FrameBufferTarget`] bundles one or more typed attachments that share a
//! single resolution. Targets are allocated once by the backend from a
//! [`TargetDesc`] and live as long as the pipeline that requested them.

use serde::{Deserialize, Serialize};

use crate::backend::TextureHandle;
use crate::error::{PipelineError, Result};

/// The role an attachment plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttachmentKind {
    /// Surface albedo written by the geometry pass.
    Color,
    /// World-space normals.
    Normal,
    /// Scene depth.
    Depth,
    /// Per-surface glow / glossiness written by the geometry pass.
    Glow,
    /// World-space tangents.
    Tangent,
    /// World-space bitangents.
    Bitangent,
    /// Direct diffuse lighting.
    Light,
    /// Specular glow produced alongside direct lighting.
    Specular,
    /// Glossy reflections.
    Glossy,
    /// Raw cone-traced indirect lighting.
    Indirect,
    /// Blurred indirect lighting.
    Blur,
    /// Composited image.
    Final,
}

impl AttachmentKind {
    /// Returns a short label used for GPU object names.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AttachmentKind::Color => "color",
            AttachmentKind::Normal => "normal",
            AttachmentKind::Depth => "depth",
            AttachmentKind::Glow => "glow",
            AttachmentKind::Tangent => "tangent",
            AttachmentKind::Bitangent => "bitangent",
            AttachmentKind::Light => "light",
            AttachmentKind::Specular => "specular",
            AttachmentKind::Glossy => "glossy",
            AttachmentKind::Indirect => "indirect",
            AttachmentKind::Blur => "blur",
            AttachmentKind::Final => "final",
        }
    }
}

/// Texel format of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentFormat {
    /// 8-bit normalized RGBA.
    Rgba8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl AttachmentFormat {
    /// Whether the format is a depth format.
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, AttachmentFormat::Depth32Float)
    }

    /// Bytes per texel.
    #[must_use]
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            AttachmentFormat::Rgba8Unorm | AttachmentFormat::Depth32Float => 4,
            AttachmentFormat::Rgba16Float => 8,
            AttachmentFormat::Rgba32Float => 16,
        }
    }
}

/// One attachment slot of a target description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub kind: AttachmentKind,
    pub format: AttachmentFormat,
}

impl AttachmentDesc {
    /// Creates an attachment description.
    #[must_use]
    pub const fn new(kind: AttachmentKind, format: AttachmentFormat) -> Self {
        Self { kind, format }
    }
}

/// Description of a fixed-resolution render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDesc {
    /// Label used in logs and GPU object names.
    pub label: String,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Attachments in color-output order. At most one depth attachment.
    pub attachments: Vec<AttachmentDesc>,
}

impl TargetDesc {
    /// Creates an empty target description.
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            attachments: Vec::new(),
        }
    }

    /// Adds an attachment.
    #[must_use]
    pub fn with_attachment(mut self, kind: AttachmentKind, format: AttachmentFormat) -> Self {
        self.attachments.push(AttachmentDesc::new(kind, format));
        self
    }

    /// Color formats in output order (depth excluded).
    #[must_use]
    pub fn color_formats(&self) -> Vec<AttachmentFormat> {
        self.attachments
            .iter()
            .filter(|a| !a.format.is_depth())
            .map(|a| a.format)
            .collect()
    }

    /// The depth format, if the target has a depth attachment.
    #[must_use]
    pub fn depth_format(&self) -> Option<AttachmentFormat> {
        self.attachments
            .iter()
            .find(|a| a.format.is_depth())
            .map(|a| a.format)
    }

    /// Checks that the description can be allocated.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| PipelineError::InvalidTarget {
            target: self.label.clone(),
            reason: reason.to_string(),
        };

        if self.width == 0 || self.height == 0 {
            return Err(invalid("zero-sized target"));
        }
        if self.attachments.is_empty() {
            return Err(invalid("target has no attachments"));
        }
        if self.attachments.iter().filter(|a| a.format.is_depth()).count() > 1 {
            return Err(invalid("more than one depth attachment"));
        }
        for (i, a) in self.attachments.iter().enumerate() {
            if self.attachments[..i].iter().any(|b| b.kind == a.kind) {
                return Err(invalid(&format!("duplicate {} attachment", a.kind.name())));
            }
            if (a.kind == AttachmentKind::Depth) != a.format.is_depth() {
                return Err(invalid("depth attachment must use a depth format"));
            }
        }
        Ok(())
    }
}

/// An allocated render target: every attachment shares the target's size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferTarget {
    label: String,
    width: u32,
    height: u32,
    attachments: Vec<(AttachmentKind, AttachmentFormat, TextureHandle)>,
}

impl FrameBufferTarget {
    /// Assembles a target from backend-allocated textures.
    ///
    /// `textures` must be in the same order as `desc.attachments`.
    pub fn from_parts(desc: &TargetDesc, textures: Vec<TextureHandle>) -> Result<Self> {
        if textures.len() != desc.attachments.len() {
            return Err(PipelineError::TargetAllocationFailed {
                target: desc.label.clone(),
                reason: format!(
                    "expected {} textures, backend returned {}",
                    desc.attachments.len(),
                    textures.len()
                ),
            });
        }
        Ok(Self {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            attachments: desc
                .attachments
                .iter()
                .zip(textures)
                .map(|(a, t)| (a.kind, a.format, t))
                .collect(),
        })
    }

    /// Target label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shared attachment size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Looks up an attachment texture.
    #[must_use]
    pub fn attachment(&self, kind: AttachmentKind) -> Option<TextureHandle> {
        self.attachments
            .iter()
            .find(|(k, _, _)| *k == kind)
            .map(|(_, _, t)| *t)
    }

    /// Looks up an attachment texture, failing if the target lacks it.
    pub fn require(&self, kind: AttachmentKind) -> Result<TextureHandle> {
        self.attachment(kind)
            .ok_or_else(|| PipelineError::MissingAttachment {
                target: self.label.clone(),
                attachment: kind,
            })
    }

    /// Color attachment textures in output order.
    #[must_use]
    pub fn color_textures(&self) -> Vec<TextureHandle> {
        self.attachments
            .iter()
            .filter(|(_, f, _)| !f.is_depth())
            .map(|(_, _, t)| *t)
            .collect()
    }

    /// The depth attachment texture, if any.
    #[must_use]
    pub fn depth_texture(&self) -> Option<TextureHandle> {
        self.attachments
            .iter()
            .find(|(_, f, _)| f.is_depth())
            .map(|(_, _, t)| *t)
    }

    /// All attachment textures.
    pub fn textures(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.attachments.iter().map(|(_, _, t)| *t)
    }

    /// Whether `texture` belongs to this target.
    #[must_use]
    pub fn owns(&self, texture: TextureHandle) -> bool {
        self.textures().any(|t| t == texture)
    }
}
