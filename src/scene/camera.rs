//! Camera system

use glam::{Mat4, Vec3};

/// Camera viewing the scene.
///
/// Supplied by the host each frame; the renderer only reads it to build the
/// view and projection matrices for the scene block and the per-instance
/// combined transforms.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Normalized forward direction.
    pub direction: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 5.0),
            direction: -Vec3::Z,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            ..Default::default()
        }
    }

    /// Point the camera at a world-space target.
    pub fn look_at(&mut self, target: Vec3) {
        self.direction = (target - self.position).normalize();
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.direction, self.up)
    }

    /// Get the projection matrix for the given aspect ratio
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_normalizes_the_direction() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::X);
        camera.look_at(Vec3::new(0.0, 0.0, -10.0));

        assert!((camera.direction.length() - 1.0).abs() < 1e-6);
        assert!((camera.direction - (-Vec3::Z)).length() < 1e-6);
    }

    #[test]
    fn view_matrix_places_the_camera_at_the_origin_of_view_space() {
        let camera = Camera::new(Vec3::new(3.0, 1.0, 2.0), -Vec3::Z);
        let view = camera.view_matrix();
        let eye_in_view = view.transform_point3(camera.position);

        assert!(eye_in_view.length() < 1e-5);
    }
}
