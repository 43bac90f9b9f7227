//! Projection, view and viewport state.

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::CameraRig;

/// A viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport at the origin.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Width divided by height.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Perspective projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Perspective {
    /// Projection matrix for a 0..1 depth range.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }
}

/// Orthographic projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ortho {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Ortho {
    /// The unit square used for full-screen presentation.
    pub const UNIT: Self = Self {
        left: 0.0,
        right: 1.0,
        bottom: 0.0,
        top: 1.0,
        near: 0.0,
        far: 1.0,
    };

    /// Projection matrix for this volume.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        )
    }
}

/// Matrices for one frame, computed from identity and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    pub projection: Mat4,
    /// Camera-relative view (modelview) matrix.
    pub view: Mat4,
    pub normal: Mat3,
    pub viewport: Viewport,
    /// World-space eye position.
    pub eye: Vec3,
}

impl FrameMatrices {
    /// Inverse of the camera (view) matrix.
    #[must_use]
    pub fn inverse_camera(&self) -> Mat4 {
        self.view.inverse()
    }

    /// Inverse of the projection matrix.
    #[must_use]
    pub fn inverse_projection(&self) -> Mat4 {
        self.projection.inverse()
    }
}

/// Holds projection/viewport state and the camera-relative view matrix.
///
/// Resizing only touches this struct; fixed-resolution render targets are
/// unaffected.
#[derive(Debug, Clone)]
pub struct ViewTransform {
    projection: Mat4,
    view: Mat4,
    normal: Mat3,
    viewport: Viewport,
    perspective: Perspective,
    ortho: Ortho,
}

impl ViewTransform {
    /// Creates a view with the given perspective parameters and a 1x1 viewport.
    #[must_use]
    pub fn new(fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            normal: Mat3::IDENTITY,
            viewport: Viewport::new(1, 1),
            perspective: Perspective {
                fov_degrees,
                aspect: 1.0,
                near,
                far,
            },
            ortho: Ortho::UNIT,
        }
    }

    /// Updates the viewport and both projections for a new output size.
    ///
    /// A zero height is clamped to 1 so the aspect ratio stays finite.
    pub fn resize(&mut self, width: u32, height: u32) -> Viewport {
        let height = height.max(1);
        self.viewport = Viewport::new(width, height);
        self.perspective.aspect = width as f32 / height as f32;
        self.ortho = Ortho::UNIT;
        self.viewport
    }

    /// Resets projection, view and normal matrices to identity.
    pub fn reset(&mut self) {
        self.projection = Mat4::IDENTITY;
        self.view = Mat4::IDENTITY;
        self.normal = Mat3::IDENTITY;
    }

    /// Loads the perspective projection.
    pub fn use_3d(&mut self) {
        self.projection = self.perspective.matrix();
    }

    /// Loads the orthographic projection.
    pub fn use_2d(&mut self) {
        self.projection = self.ortho.matrix();
    }

    /// Resets, loads the perspective projection and applies the camera.
    pub fn begin_3d(&mut self, camera: &dyn CameraRig) -> FrameMatrices {
        self.reset();
        self.use_3d();
        self.view = camera.transform(self.view);
        self.normal = Mat3::from_mat4(self.view).inverse().transpose();
        FrameMatrices {
            projection: self.projection,
            view: self.view,
            normal: self.normal,
            viewport: self.viewport,
            eye: camera.eye(),
        }
    }

    /// Resets to an orthographic identity view over the unit square.
    pub fn begin_2d(&mut self) -> FrameMatrices {
        self.reset();
        self.use_2d();
        FrameMatrices {
            projection: self.projection,
            view: self.view,
            normal: self.normal,
            viewport: self.viewport,
            eye: Vec3::ZERO,
        }
    }

    /// Current projection matrix.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Current view matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Current normal matrix.
    #[must_use]
    pub fn normal(&self) -> Mat3 {
        self.normal
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Perspective parameters.
    #[must_use]
    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    /// Current aspect ratio.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.perspective.aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct FixedCamera;

    impl CameraRig for FixedCamera {
        fn view_matrix(&self) -> Mat4 {
            Mat4::look_at_rh(Vec3::splat(5.0), Vec3::ZERO, Vec3::Y)
        }

        fn eye(&self) -> Vec3 {
            Vec3::splat(5.0)
        }
    }

    #[test]
    fn test_resize_zero_height_clamps() {
        let mut view = ViewTransform::new(45.0, 0.01, 50.0);
        view.resize(1280, 720);
        let viewport = view.resize(800, 0);
        assert_eq!(viewport, Viewport::new(800, 1));
        assert_eq!(view.aspect(), 800.0);
        assert!(view.aspect().is_finite());
    }

    #[test]
    fn test_begin_3d_starts_from_identity() {
        let mut view = ViewTransform::new(45.0, 0.01, 50.0);
        view.resize(1280, 720);
        let first = view.begin_3d(&FixedCamera);
        let second = view.begin_3d(&FixedCamera);
        // Re-applying the camera must not compound the previous view.
        assert_eq!(first.view, second.view);
        assert_eq!(first.view, FixedCamera.view_matrix());
    }

    #[test]
    fn test_begin_2d_is_unit_ortho() {
        let mut view = ViewTransform::new(45.0, 0.01, 50.0);
        view.begin_3d(&FixedCamera);
        let frame = view.begin_2d();
        assert_eq!(frame.view, Mat4::IDENTITY);
        let corner = frame.projection.project_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
        let origin = frame.projection.project_point3(Vec3::ZERO);
        assert!((origin.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_reset_clears_matrices() {
        let mut view = ViewTransform::new(45.0, 0.01, 50.0);
        view.begin_3d(&FixedCamera);
        view.reset();
        assert_eq!(view.projection(), Mat4::IDENTITY);
        assert_eq!(view.view(), Mat4::IDENTITY);
        assert_eq!(view.normal(), Mat3::IDENTITY);
    }

    proptest! {
        #[test]
        fn prop_resize_uses_clamped_height(width in 0u32..8192, height in 0u32..8192) {
            let mut view = ViewTransform::new(45.0, 0.01, 50.0);
            let viewport = view.resize(width, height);
            let expected_height = height.max(1);
            prop_assert_eq!(viewport.height, expected_height);
            prop_assert_eq!(viewport.width, width);
            prop_assert_eq!(view.aspect(), width as f32 / expected_height as f32);
        }
    }
}
