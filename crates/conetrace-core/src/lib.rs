//! Core abstractions for conetrace.
//!
//! This crate provides the backend-agnostic data model of the render pipeline:
//! - [`RenderBackend`] / [`DrawContext`], the seam every GPU backend implements
//! - Render target, attachment and per-pass binding descriptors
//! - [`RenderPathSelector`] and the view/projection state
//! - Collaborator traits for the scene, camera, voxelizer and profiler
//! - Configuration options

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Texel and voxel counts are far below f32 precision limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod attachment;
pub mod backend;
pub mod binding;
pub mod camera;
pub mod error;
pub mod grid;
pub mod mesh;
pub mod options;
pub mod profiler;
pub mod program;
pub mod render_state;
pub mod scene;
pub mod view;
pub mod voxel;

pub use attachment::{AttachmentDesc, AttachmentFormat, AttachmentKind, FrameBufferTarget, TargetDesc};
pub use backend::{
    BufferHandle, DrawContext, MeshHandle, ProgramHandle, RenderBackend, TextureHandle,
    VolumeHandle,
};
pub use binding::{BindingResource, PassDescriptor, PassOutput, TextureBinding};
pub use camera::CameraRig;
pub use error::{PipelineError, Result};
pub use grid::Grid;
pub use mesh::{MeshData, MeshVertex};
pub use options::{
    BlurConfig, CompositeConfig, GridConfig, LightConfig, PipelineOptions, ProjectionConfig,
    VoxelConfig,
};
pub use profiler::{NullProfiler, Profiler};
pub use program::{
    OutputLayout, ProgramInterface, SamplerKind, Topology, UniformType, UniformValue, VertexInput,
    FRAGMENT_OUTPUT, VERTEX_ATTRIBUTES,
};
pub use render_state::{RenderChannel, RenderPath, RenderPathSelector, RenderState, Transition};
pub use scene::Scene;
pub use view::{FrameMatrices, Ortho, Perspective, ViewTransform, Viewport};
pub use voxel::{LightSource, VolumeDesc, Voxelizer};

// Re-export glam types for convenience
pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
