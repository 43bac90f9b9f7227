//! Rendering backends for conetrace.
//!
//! This crate provides two implementations of
//! [`conetrace_core::RenderBackend`]:
//! - [`WgpuBackend`], which compiles WGSL programs and encodes real GPU passes
//! - [`RecordingBackend`], which records every command for inspection
//!
//! It also carries the std140 uniform packing, the fixed vertex layouts and a
//! look-at [`Camera`].

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Texel, vertex and offset counts are far below the truncation limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod camera;
pub mod engine;
pub mod error;
pub mod recording;
pub mod uniforms;
pub mod vertex;

pub use camera::Camera;
pub use engine::{ProgramSource, WgpuBackend};
pub use error::{RenderError, RenderResult};
pub use recording::{Command, RecordingBackend};
pub use uniforms::{UniformBlock, UniformLayout, UniformWriteError};
