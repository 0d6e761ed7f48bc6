//! Orthographic and perspective cameras
//!
//! Cameras are backend-independent view/projection matrix holders feeding
//! uniform data to the active pipeline. The view matrix is recomputed from
//! position/rotation on every [`OrthographicCamera::update`] /
//! [`PerspectiveCamera::update`] call; the projection matrix is recomputed
//! only by explicit setters, since projection parameters change far less
//! often than position.
//!
//! Zero or negative zoom/FOV is not validated. Degenerate or inverted
//! projections are a caller responsibility.

use nalgebra::{Matrix4, Rotation3, Vector3};

/// Orthographic projection bounds derived from aspect ratio and zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicBounds {
    /// Left clip plane
    pub left: f32,
    /// Right clip plane
    pub right: f32,
    /// Bottom clip plane
    pub bottom: f32,
    /// Top clip plane
    pub top: f32,
}

/// 2D-style camera with an orthographic projection
///
/// Zoom scales the aspect-derived base rectangle multiplicatively: the base
/// bounds are `[-aspect, aspect] x [-1, 1]`, and a zoom of `z` scales all
/// four bounds by `z`.
#[derive(Debug, Clone)]
pub struct OrthographicCamera {
    position: Vector3<f32>,
    /// Rotation about the view axis in radians
    rotation: f32,
    zoom: f32,
    aspect: f32,
    bounds: OrthographicBounds,
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
}

impl OrthographicCamera {
    /// Create a camera at the origin with zoom 1.0
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            position: Vector3::zeros(),
            rotation: 0.0,
            zoom: 1.0,
            aspect,
            bounds: OrthographicBounds {
                left: -aspect,
                right: aspect,
                bottom: -1.0,
                top: 1.0,
            },
            projection: Matrix4::identity(),
            view: Matrix4::identity(),
        };
        camera.recalculate_projection();
        camera.update();
        camera
    }

    /// Camera position in world space
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Move the camera; takes effect at the next [`OrthographicCamera::update`]
    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        log::trace!("Orthographic camera position set to {:?}", position);
    }

    /// Rotation about the view axis in radians
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Rotate the camera; takes effect at the next [`OrthographicCamera::update`]
    pub fn set_rotation(&mut self, radians: f32) {
        self.rotation = radians;
    }

    /// Current zoom factor
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom factor and recompute the projection
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
        self.recalculate_projection();
    }

    /// Current aspect ratio
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    /// Set the aspect ratio and recompute the projection
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.recalculate_projection();
    }

    /// Current projection bounds
    pub fn bounds(&self) -> OrthographicBounds {
        self.bounds
    }

    /// Recompute the view matrix from the current position and rotation
    ///
    /// Must be called after mutating position/rotation and before the matrix
    /// is consumed by a draw call; stale matrices are a correctness bug.
    pub fn update(&mut self) {
        let transform = Matrix4::new_translation(&self.position)
            * Matrix4::from_axis_angle(&Vector3::z_axis(), self.rotation);
        self.view = transform.try_inverse().unwrap_or_else(Matrix4::identity);
    }

    /// View matrix as of the last [`OrthographicCamera::update`]
    pub fn view_matrix(&self) -> &Matrix4<f32> {
        &self.view
    }

    /// Projection matrix as of the last setter call
    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    /// Combined projection * view matrix
    pub fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection * self.view
    }

    fn recalculate_projection(&mut self) {
        self.bounds = OrthographicBounds {
            left: -self.aspect * self.zoom,
            right: self.aspect * self.zoom,
            bottom: -self.zoom,
            top: self.zoom,
        };
        self.projection = Matrix4::new_orthographic(
            self.bounds.left,
            self.bounds.right,
            self.bounds.bottom,
            self.bounds.top,
            -1.0,
            1.0,
        );
    }
}

/// 3D camera with a perspective projection
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    position: Vector3<f32>,
    /// Euler rotation (pitch, yaw, roll) in radians
    rotation: Vector3<f32>,
    /// Vertical field of view in radians
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
}

impl PerspectiveCamera {
    /// Create a camera at the origin looking down -Z
    pub fn new(fov_radians: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            fov: fov_radians,
            aspect,
            near,
            far,
            projection: Matrix4::identity(),
            view: Matrix4::identity(),
        };
        camera.recalculate_projection();
        camera.update();
        camera
    }

    /// Camera position in world space
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Move the camera; takes effect at the next [`PerspectiveCamera::update`]
    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        log::trace!("Perspective camera position set to {:?}", position);
    }

    /// Euler rotation (pitch, yaw, roll) in radians
    pub fn rotation(&self) -> Vector3<f32> {
        self.rotation
    }

    /// Rotate the camera; takes effect at the next [`PerspectiveCamera::update`]
    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.rotation = rotation;
    }

    /// Vertical field of view in radians
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Set the vertical field of view and recompute the projection
    pub fn set_fov(&mut self, fov_radians: f32) {
        self.fov = fov_radians;
        self.recalculate_projection();
    }

    /// Current aspect ratio
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    /// Set the aspect ratio and recompute the projection
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.recalculate_projection();
    }

    /// Recompute the view matrix from the current position and rotation
    pub fn update(&mut self) {
        let rotation =
            Rotation3::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z);
        let transform = Matrix4::new_translation(&self.position) * rotation.to_homogeneous();
        self.view = transform.try_inverse().unwrap_or_else(Matrix4::identity);
    }

    /// View matrix as of the last [`PerspectiveCamera::update`]
    pub fn view_matrix(&self) -> &Matrix4<f32> {
        &self.view
    }

    /// Projection matrix as of the last setter call
    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    /// Combined projection * view matrix
    pub fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection * self.view
    }

    fn recalculate_projection(&mut self) {
        self.projection = Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orthographic_zoom_round_trips() {
        let mut camera = OrthographicCamera::new(16.0 / 9.0);
        camera.set_zoom(2.5);
        assert_eq!(camera.zoom(), 2.5);
    }

    #[test]
    fn orthographic_bounds_scale_linearly_with_zoom() {
        let mut camera = OrthographicCamera::new(16.0 / 9.0);
        camera.set_zoom(1.5);
        let b1 = camera.bounds();
        camera.set_zoom(3.0);
        let b2 = camera.bounds();

        assert_relative_eq!(b2.left, 2.0 * b1.left, epsilon = 1e-6);
        assert_relative_eq!(b2.right, 2.0 * b1.right, epsilon = 1e-6);
        assert_relative_eq!(b2.bottom, 2.0 * b1.bottom, epsilon = 1e-6);
        assert_relative_eq!(b2.top, 2.0 * b1.top, epsilon = 1e-6);
    }

    #[test]
    fn orthographic_view_follows_position() {
        let mut camera = OrthographicCamera::new(1.0);
        camera.set_position(Vector3::new(3.0, -2.0, 0.0));
        camera.update();

        // The view matrix is the inverse of the camera transform, so it
        // carries the negated translation.
        let view = camera.view_matrix();
        assert_relative_eq!(view[(0, 3)], -3.0, epsilon = 1e-6);
        assert_relative_eq!(view[(1, 3)], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn perspective_fov_round_trips() {
        let mut camera = PerspectiveCamera::new(1.0, 16.0 / 9.0, 0.1, 100.0);
        camera.set_fov(1.2);
        assert_eq!(camera.fov(), 1.2);
    }

    #[test]
    fn perspective_projection_encodes_fov() {
        let fov = std::f32::consts::FRAC_PI_3;
        let mut camera = PerspectiveCamera::new(1.0, 4.0 / 3.0, 0.1, 100.0);
        camera.set_fov(fov);

        // m11 = 1 / tan(fov / 2) for a standard perspective matrix, so the
        // vertical FOV can be back-derived from the projection.
        let m11 = camera.projection_matrix()[(1, 1)];
        let derived = 2.0 * (1.0 / m11).atan();
        assert_relative_eq!(derived, fov, epsilon = 1e-4);
    }

    #[test]
    fn stale_view_until_update_is_called() {
        let mut camera = PerspectiveCamera::new(1.0, 1.0, 0.1, 10.0);
        camera.update();
        let before = *camera.view_matrix();

        camera.set_position(Vector3::new(0.0, 5.0, 0.0));
        assert_eq!(*camera.view_matrix(), before);

        camera.update();
        assert_ne!(*camera.view_matrix(), before);
    }
}
