//! Look-at camera.

use conetrace_core::CameraRig;
use glam::{Mat4, Vec3};

/// A look-at camera with simple orbit/pan/zoom motion.
///
/// Motion is expressed as per-tick velocities and integrated by
/// [`CameraRig::advance`], so the render loop controls how far the camera
/// moves each frame.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Movement speed multiplier.
    pub move_speed: f32,
    /// Orbit rate in radians per tick (yaw, pitch).
    pub orbit_velocity: (f32, f32),
    /// Pan rate in world units per tick (right, up).
    pub pan_velocity: (f32, f32),
    /// Zoom rate in world units per tick.
    pub zoom_velocity: f32,
}

impl Camera {
    /// Creates a camera at `position` looking at `target`.
    #[must_use]
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            target,
            up,
            move_speed: 1.0,
            orbit_velocity: (0.0, 0.0),
            pan_velocity: (0.0, 0.0),
            zoom_velocity: 0.0,
        }
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    /// Orbits the camera around the target.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let radius = (self.position - self.target).length();
        let mut theta = (self.position.x - self.target.x).atan2(self.position.z - self.target.z);
        let mut phi = ((self.position.y - self.target.y) / radius).acos();

        theta -= delta_x;
        phi = (phi - delta_y).clamp(0.01, std::f32::consts::PI - 0.01);

        self.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Slides position and target together along the view plane.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.right() * delta_x + self.up * delta_y;
        self.position += offset;
        self.target += offset;
    }

    /// Moves the camera toward (positive) or away from the target.
    pub fn zoom(&mut self, delta: f32) {
        let direction = self.forward();
        let distance = (self.position - self.target).length();
        let new_distance = (distance - delta).max(0.1);
        self.position = self.target - direction * new_distance;
    }

    /// Stops all motion.
    pub fn stop(&mut self) {
        self.orbit_velocity = (0.0, 0.0);
        self.pan_velocity = (0.0, 0.0);
        self.zoom_velocity = 0.0;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::splat(5.0), Vec3::ZERO, Vec3::Y)
    }
}

impl CameraRig for Camera {
    fn view_matrix(&self) -> Mat4 {
        Camera::view_matrix(self)
    }

    fn eye(&self) -> Vec3 {
        self.position
    }

    fn advance(&mut self, step: f32) {
        let scale = step * self.move_speed;
        let (yaw, pitch) = self.orbit_velocity;
        if yaw != 0.0 || pitch != 0.0 {
            self.orbit(yaw * scale, pitch * scale);
        }
        let (right, up) = self.pan_velocity;
        if right != 0.0 || up != 0.0 {
            self.pan(right * scale, up * scale);
        }
        if self.zoom_velocity != 0.0 {
            self.zoom(self.zoom_velocity * scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_eq!(camera.position, Vec3::splat(5.0));
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.up, Vec3::Y);
        assert_eq!(camera.move_speed, 1.0);
    }

    #[test]
    fn test_eye_matches_position() {
        let camera = Camera::default();
        assert_eq!(camera.eye(), camera.position);
        let origin = camera.view_matrix().transform_point3(camera.position);
        assert!(origin.length() < 1e-4);
    }

    #[test]
    fn test_advance_without_velocity_is_still() {
        let mut camera = Camera::default();
        camera.advance(1.0);
        assert_eq!(camera.position, Vec3::splat(5.0));
    }

    #[test]
    fn test_advance_scales_with_step() {
        let mut a = Camera::default();
        let mut b = Camera::default();
        a.zoom_velocity = 0.5;
        b.zoom_velocity = 0.5;
        a.advance(2.0);
        b.advance(1.0);
        b.advance(1.0);
        assert!((a.position - b.position).length() < 1e-4);
        assert!(a.position.length() < Vec3::splat(5.0).length());
    }

    #[test]
    fn test_orbit_keeps_radius() {
        let mut camera = Camera::default();
        let radius = camera.position.length();
        camera.orbit(0.3, 0.1);
        assert!((camera.position.length() - radius).abs() < 1e-4);
    }

    #[test]
    fn test_zoom_clamps_distance() {
        let mut camera = Camera::default();
        camera.zoom(100.0);
        assert!(((camera.position - camera.target).length() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_advance_pans_position_and_target() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        camera.pan_velocity = (1.0, 0.5);
        camera.advance(2.0);
        // Looking down -Z, right is +X.
        assert!((camera.target - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-4);
        assert!((camera.position - Vec3::new(2.0, 1.0, 5.0)).length() < 1e-4);

        camera.stop();
        camera.advance(1.0);
        assert!((camera.target - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-4);
    }
}
