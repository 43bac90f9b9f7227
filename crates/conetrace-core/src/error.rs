//! Error types for conetrace.

use thiserror::Error;

use crate::attachment::AttachmentKind;
use crate::backend::TextureHandle;

/// The main error type for conetrace operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No program with the given name is registered with the backend.
    #[error("shader program '{0}' not found")]
    ProgramNotFound(String),

    /// A program exists but does not declare the interface a pass expects.
    #[error("shader program '{program}' interface mismatch: {reason}")]
    ProgramInterfaceMismatch { program: String, reason: String },

    /// Shader module or pipeline creation failed.
    #[error("shader program '{program}' failed to compile: {message}")]
    ShaderCompilationFailed { program: String, message: String },

    /// A frame buffer target could not be allocated.
    #[error("failed to allocate target '{target}': {reason}")]
    TargetAllocationFailed { target: String, reason: String },

    /// The voxel volume could not be allocated.
    #[error("failed to allocate voxel volume: {0}")]
    VolumeAllocationFailed(String),

    /// A vertex or instance buffer could not be allocated.
    #[error("failed to allocate buffer '{label}': {reason}")]
    BufferAllocationFailed { label: String, reason: String },

    /// A target description is inconsistent.
    #[error("invalid target description '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Voxel resolution must be a non-zero power of two.
    #[error("voxel resolution {0} is not a power of two")]
    InvalidVoxelResolution(u32),

    /// A pass asked a target for an attachment it does not carry.
    #[error("target '{target}' has no {attachment:?} attachment")]
    MissingAttachment {
        target: String,
        attachment: AttachmentKind,
    },

    /// A pass would sample the attachment it is writing.
    #[error("pass '{pass}' samples texture {texture:?} that it also writes")]
    FeedbackLoop { pass: String, texture: TextureHandle },

    /// A handle does not refer to a live backend resource.
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },

    /// A draw or end-of-pass call arrived outside an open pass.
    #[error("no render pass is open")]
    PassNotOpen,

    /// A pass was opened while another one is still recording.
    #[error("render pass '{0}' is still open")]
    PassAlreadyOpen(String),

    /// The external voxelizer reported a failure.
    #[error("voxelization failed: {0}")]
    Voxelization(String),

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PipelineError {
    /// Returns true for errors that can only occur while setting the pipeline up.
    #[must_use]
    pub fn is_initialization_failure(&self) -> bool {
        matches!(
            self,
            Self::ProgramNotFound(_)
                | Self::ProgramInterfaceMismatch { .. }
                | Self::ShaderCompilationFailed { .. }
                | Self::TargetAllocationFailed { .. }
                | Self::VolumeAllocationFailed(_)
                | Self::BufferAllocationFailed { .. }
                | Self::InvalidTarget { .. }
                | Self::InvalidVoxelResolution(_)
        )
    }
}

/// A specialized Result type for conetrace operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_failing_resource() {
        let err = PipelineError::ProgramNotFound("Indirect".into());
        assert_eq!(err.to_string(), "shader program 'Indirect' not found");
        assert!(err.is_initialization_failure());
    }

    #[test]
    fn test_frame_errors_are_not_initialization_failures() {
        assert!(!PipelineError::PassNotOpen.is_initialization_failure());
        let err = PipelineError::MissingAttachment {
            target: "GBuffer".into(),
            attachment: AttachmentKind::Light,
        };
        assert!(!err.is_initialization_failure());
        assert!(err.to_string().contains("GBuffer"));
    }
}
