//! Camera collaborator interface.

use glam::{Mat4, Vec3};

/// A camera the pipeline reads once per frame.
///
/// The pipeline never owns the camera's lifecycle. It advances it once per
/// frame and reads it during rendering.
pub trait CameraRig {
    /// World-to-camera matrix.
    fn view_matrix(&self) -> Mat4;

    /// World-space eye position.
    fn eye(&self) -> Vec3;

    /// Applies the camera to the current view matrix.
    fn transform(&self, view: Mat4) -> Mat4 {
        view * self.view_matrix()
    }

    /// Applies the camera transform to an arbitrary matrix.
    fn transform_to_matrix(&self, matrix: Mat4) -> Mat4 {
        matrix * self.view_matrix()
    }

    /// Advances camera motion by `step` nominal 60 Hz ticks.
    fn advance(&mut self, _step: f32) {}
}
